//! Core domain models shared across features and the upload pipeline

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// An employee record as stored in the `employees` table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Employee {
    pub id: i32,
    pub firstname: String,
    pub lastname: String,
    pub gender: String,
    pub country: String,
    pub age: i32,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A validated employee row ready for insertion. Produced by the
/// parse-validate stage and carried through the insert queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewEmployee {
    pub firstname: String,
    pub lastname: String,
    pub gender: String,
    pub country: String,
    pub age: i32,
    pub date: NaiveDate,
}

/// An upload job row tracking a spreadsheet import from submission to
/// completion.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UploadJob {
    pub id: i32,
    pub filename: String,
    pub status: String,
    pub total_records: Option<i32>,
    pub processed_records: i32,
    pub failed_records: i32,
    pub error_details: Option<serde_json::Value>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A persisted per-row error from the error-logging stage.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UploadErrorRecord {
    pub id: i32,
    pub job_id: i32,
    pub row_number: i32,
    pub error_type: String,
    pub error_message: String,
    pub raw_data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

