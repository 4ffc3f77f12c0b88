//! Spreadsheet upload command
//!
//! Accepts the uploaded bytes, creates the tracking job, stages the file on
//! disk, and enqueues the parse-validate stage. The HTTP request returns as
//! soon as the job is queued; all heavy work happens in the pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use mediator::Request;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::UploadsConfig;
use crate::pipeline::jobs::ParseValidatePayload;
use crate::pipeline::{store, TOPIC_PARSE_VALIDATE};
use crate::queue::{JobQueue, QueueError};

/// File extensions the parser can read.
pub const ALLOWED_EXTENSIONS: [&str; 2] = ["xlsx", "xls"];

/// Upload size ceiling: 10 MiB.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Command carrying the uploaded spreadsheet
#[derive(Debug, Clone)]
pub struct UploadSpreadsheetCommand {
    pub filename: String,
    pub data: Vec<u8>,
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSpreadsheetResponse {
    pub job_id: i32,
    pub filename: String,
    pub status: String,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadSpreadsheetError {
    #[error("Uploaded file is empty")]
    EmptyFile,

    #[error("Unsupported file type '{0}', expected one of: xlsx, xls")]
    UnsupportedFileType(String),

    #[error("File exceeds the {MAX_UPLOAD_BYTES} byte upload limit")]
    FileTooLarge,

    #[error("Failed to stage upload: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to enqueue upload: {0}")]
    Queue(#[from] QueueError),
}

impl Request<Result<UploadSpreadsheetResponse, UploadSpreadsheetError>>
    for UploadSpreadsheetCommand
{
}

impl crate::cqrs::middleware::Command for UploadSpreadsheetCommand {}

impl UploadSpreadsheetCommand {
    pub fn validate(&self) -> Result<(), UploadSpreadsheetError> {
        if self.data.is_empty() {
            return Err(UploadSpreadsheetError::EmptyFile);
        }
        if self.data.len() > MAX_UPLOAD_BYTES {
            return Err(UploadSpreadsheetError::FileTooLarge);
        }

        let extension = extension_of(&self.filename);
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(UploadSpreadsheetError::UnsupportedFileType(extension));
        }

        Ok(())
    }
}

#[tracing::instrument(
    skip(pool, queue, uploads, command),
    fields(filename = %command.filename, bytes = command.data.len())
)]
pub async fn handle(
    pool: PgPool,
    queue: Arc<JobQueue>,
    uploads: UploadsConfig,
    command: UploadSpreadsheetCommand,
) -> Result<UploadSpreadsheetResponse, UploadSpreadsheetError> {
    command.validate()?;

    let job = store::create_upload_job(&pool, &command.filename, command.created_by.as_deref())
        .await?;

    match stage_and_enqueue(&queue, &uploads, job.id, &command).await {
        Ok(()) => {
            tracing::info!(job_id = job.id, "Upload accepted");
            Ok(UploadSpreadsheetResponse {
                job_id: job.id,
                filename: command.filename,
                status: job.status,
            })
        },
        Err(e) => {
            // The job row exists but nothing will process it, fail it now
            let details = json!({ "stage": "upload", "error": e.to_string() });
            if let Err(db_err) = store::mark_job_failed(&pool, job.id, &details).await {
                tracing::error!(job_id = job.id, error = %db_err, "Failed to record upload failure");
            }
            Err(e)
        },
    }
}

async fn stage_and_enqueue(
    queue: &JobQueue,
    uploads: &UploadsConfig,
    job_id: i32,
    command: &UploadSpreadsheetCommand,
) -> Result<(), UploadSpreadsheetError> {
    tokio::fs::create_dir_all(&uploads.dir).await?;

    let staged: PathBuf = uploads
        .dir
        .join(format!("{}-{}-{}", job_id, Uuid::new_v4(), sanitize(&command.filename)));
    tokio::fs::write(&staged, &command.data).await?;

    let payload = ParseValidatePayload {
        job_id,
        file_path: staged,
        filename: command.filename.clone(),
    };
    queue.send(TOPIC_PARSE_VALIDATE, &payload).await?;

    Ok(())
}

fn extension_of(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default()
}

/// Keep staged filenames shell and path safe.
fn sanitize(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(filename: &str, data: Vec<u8>) -> UploadSpreadsheetCommand {
        UploadSpreadsheetCommand {
            filename: filename.to_string(),
            data,
            created_by: None,
        }
    }

    #[test]
    fn test_accepts_spreadsheet_extensions() {
        assert!(command("staff.xlsx", vec![1]).validate().is_ok());
        assert!(command("STAFF.XLS", vec![1]).validate().is_ok());
    }

    #[test]
    fn test_rejects_other_extensions() {
        assert!(matches!(
            command("report.pdf", vec![1]).validate(),
            Err(UploadSpreadsheetError::UnsupportedFileType(ext)) if ext == "pdf"
        ));
        assert!(matches!(
            command("noextension", vec![1]).validate(),
            Err(UploadSpreadsheetError::UnsupportedFileType(_))
        ));
    }

    #[test]
    fn test_rejects_empty_file() {
        assert!(matches!(
            command("staff.xlsx", vec![]).validate(),
            Err(UploadSpreadsheetError::EmptyFile)
        ));
    }

    #[test]
    fn test_rejects_oversized_file() {
        let cmd = command("staff.xlsx", vec![0; MAX_UPLOAD_BYTES + 1]);
        assert!(matches!(
            cmd.validate(),
            Err(UploadSpreadsheetError::FileTooLarge)
        ));
    }

    #[test]
    fn test_sanitize_strips_path_separators() {
        assert_eq!(sanitize("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize("q3 roster.xlsx"), "q3_roster.xlsx");
    }
}
