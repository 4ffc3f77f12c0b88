//! Upload job status lookup

use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::models::UploadJob;
use crate::pipeline::store;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetUploadJobQuery {
    pub id: i32,
}

/// Job row plus derived progress for polling clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadJobDetails {
    #[serde(flatten)]
    pub job: UploadJob,
    /// Percentage of rows accounted for, absent until parsing finishes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    pub error_count: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum GetUploadJobError {
    #[error("Upload job {0} not found")]
    NotFound(i32),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<UploadJobDetails, GetUploadJobError>> for GetUploadJobQuery {}

impl crate::cqrs::middleware::Query for GetUploadJobQuery {}

#[tracing::instrument(skip(pool), fields(job_id = query.id))]
pub async fn handle(
    pool: PgPool,
    query: GetUploadJobQuery,
) -> Result<UploadJobDetails, GetUploadJobError> {
    let job = store::get_upload_job(&pool, query.id)
        .await?
        .ok_or(GetUploadJobError::NotFound(query.id))?;

    let (error_count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM upload_errors WHERE job_id = $1")
            .bind(query.id)
            .fetch_one(&pool)
            .await?;

    let progress = progress_of(&job);

    Ok(UploadJobDetails {
        job,
        progress,
        error_count,
    })
}

fn progress_of(job: &UploadJob) -> Option<u8> {
    let total = job.total_records?;
    if total <= 0 {
        return Some(100);
    }
    let done = i64::from(job.processed_records) + i64::from(job.failed_records);
    Some(((done * 100) / i64::from(total)).clamp(0, 100) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn job(total: Option<i32>, processed: i32, failed: i32) -> UploadJob {
        UploadJob {
            id: 1,
            filename: "staff.xlsx".to_string(),
            status: "processing".to_string(),
            total_records: total,
            processed_records: processed,
            failed_records: failed,
            error_details: None,
            created_by: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    #[test]
    fn test_progress_absent_before_parse() {
        assert_eq!(progress_of(&job(None, 0, 0)), None);
    }

    #[test]
    fn test_progress_counts_failures() {
        assert_eq!(progress_of(&job(Some(200), 100, 50)), Some(75));
    }

    #[test]
    fn test_progress_complete() {
        assert_eq!(progress_of(&job(Some(10), 10, 0)), Some(100));
        assert_eq!(progress_of(&job(Some(0), 0, 0)), Some(100));
    }
}
