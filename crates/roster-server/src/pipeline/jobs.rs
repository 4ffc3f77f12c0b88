//! Queue payloads exchanged between pipeline stages

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::NewEmployee;

/// Stage 1 payload: a staged spreadsheet waiting to be parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseValidatePayload {
    pub job_id: i32,
    pub file_path: PathBuf,
    pub filename: String,
}

/// Stage 2 payload: one chunk of validated rows to insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataInsertPayload {
    pub job_id: i32,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub rows: Vec<NewEmployee>,
}

/// Stage 3 payload: per-row errors to persist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorLoggingPayload {
    pub job_id: i32,
    pub errors: Vec<RowError>,
}

/// A single failed spreadsheet row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowError {
    /// 1-based data row number in the source spreadsheet.
    pub row_number: i32,
    /// "validation" or "insertion".
    pub error_type: String,
    pub error_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<serde_json::Value>,
}
