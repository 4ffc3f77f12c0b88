//! Worker callbacks for the three pipeline stages

use std::sync::Arc;

use anyhow::Context;
use serde_json::json;
use sqlx::PgPool;

use super::jobs::{DataInsertPayload, ErrorLoggingPayload, ParseValidatePayload, RowError};
use super::{
    parser, store, validator, CHUNK_SIZE, ERROR_LOGGING_PRIORITY, TOPIC_DATA_INSERT,
    TOPIC_ERROR_LOGGING,
};
use crate::cache::{InvalidationScope, RecordCache};
use crate::models::NewEmployee;
use crate::queue::{ActiveJob, JobQueue};

/// Stage 1: parse the staged file, validate every row, fan out insert
/// chunks, and queue validation errors for logging.
///
/// The staged file is deleted once parsing has happened, whether the
/// fan-out succeeds or not.
#[tracing::instrument(skip(pool, queue, job), fields(job_id = job.payload.job_id))]
pub async fn parse_validate(
    pool: PgPool,
    queue: Arc<JobQueue>,
    job: ActiveJob<ParseValidatePayload>,
) -> anyhow::Result<()> {
    let payload = job.payload;

    // Visible as processing from the moment the file is picked up, not
    // only after the parse finishes
    store::mark_job_processing(&pool, payload.job_id)
        .await
        .context("failed to mark job processing")?;

    let parsed = match parser::parse_workbook(&payload.file_path) {
        Ok(parsed) => parsed,
        Err(e) => {
            // Parse failures are permanent, fail the job now rather than
            // after the retry window
            let details = json!({
                "stage": "parse-validate",
                "error": e.to_string(),
            });
            if let Err(db_err) = store::mark_job_failed(&pool, payload.job_id, &details).await {
                tracing::error!(job_id = payload.job_id, error = %db_err, "Failed to record parse failure");
            }
            remove_staged_file(&payload.file_path).await;
            return Err(anyhow::Error::new(e).context("spreadsheet parse failed"));
        },
    };

    let total = parsed.len();
    let (valid, errors) = partition_rows(&parsed);

    tracing::info!(
        job_id = payload.job_id,
        total,
        valid = valid.len(),
        invalid = errors.len(),
        "Spreadsheet parsed"
    );

    let outcome = fan_out(&pool, &queue, payload.job_id, total, valid, errors).await;
    remove_staged_file(&payload.file_path).await;
    outcome
}

/// Split parsed rows into insertable employees and validation errors.
fn partition_rows(parsed: &[parser::ParsedRow]) -> (Vec<NewEmployee>, Vec<RowError>) {
    let mut valid = Vec::new();
    let mut errors = Vec::new();

    for row in parsed {
        match validator::validate_row(&row.cells) {
            Ok(employee) => valid.push(employee),
            Err(messages) => errors.push(RowError {
                row_number: row.row_number,
                error_type: "validation".to_string(),
                error_message: messages.join("; "),
                raw_data: serde_json::to_value(&row.cells).ok(),
            }),
        }
    }

    (valid, errors)
}

/// Package valid rows into fixed-size insert chunks for one job.
fn chunk_payloads(job_id: i32, valid: &[NewEmployee]) -> Vec<DataInsertPayload> {
    let chunks: Vec<&[NewEmployee]> = valid.chunks(CHUNK_SIZE).collect();
    let total_chunks = chunks.len();

    chunks
        .into_iter()
        .enumerate()
        .map(|(chunk_index, chunk)| DataInsertPayload {
            job_id,
            chunk_index,
            total_chunks,
            rows: chunk.to_vec(),
        })
        .collect()
}

async fn fan_out(
    pool: &PgPool,
    queue: &JobQueue,
    job_id: i32,
    total: usize,
    valid: Vec<NewEmployee>,
    errors: Vec<RowError>,
) -> anyhow::Result<()> {
    store::begin_processing(pool, job_id, total as i32, errors.len() as i32)
        .await
        .context("failed to record parse totals")?;

    for insert in chunk_payloads(job_id, &valid) {
        queue
            .send(TOPIC_DATA_INSERT, &insert)
            .await
            .context("failed to enqueue insert chunk")?;
    }

    if !errors.is_empty() {
        let logging = ErrorLoggingPayload { job_id, errors };
        queue
            .send_with_priority(TOPIC_ERROR_LOGGING, &logging, ERROR_LOGGING_PRIORITY)
            .await
            .context("failed to enqueue validation errors")?;
    }

    Ok(())
}

/// Stage 2: insert one chunk. Transient failures are retried by the queue;
/// on the final attempt the whole chunk is written off as insertion errors.
#[tracing::instrument(
    skip(pool, cache, queue, job),
    fields(job_id = job.payload.job_id, chunk = job.payload.chunk_index)
)]
pub async fn data_insert(
    pool: PgPool,
    cache: RecordCache,
    queue: Arc<JobQueue>,
    job: ActiveJob<DataInsertPayload>,
) -> anyhow::Result<()> {
    let final_attempt = job.is_final_attempt();
    let payload = job.payload;
    let chunk_len = payload.rows.len();

    match store::insert_employees(&pool, &payload.rows).await {
        Ok(inserted) => {
            tracing::debug!(
                job_id = payload.job_id,
                chunk = payload.chunk_index,
                inserted,
                "Chunk inserted"
            );

            let status = store::add_processed(&pool, payload.job_id, chunk_len as i32)
                .await
                .context("failed to record chunk progress")?;

            refresh_cache(&cache, &status).await;

            if status == "completed" {
                tracing::info!(job_id = payload.job_id, "Upload job completed");
            }

            Ok(())
        },
        Err(e) if !final_attempt => {
            Err(anyhow::Error::new(e).context("chunk insert failed, will retry"))
        },
        Err(e) => {
            // Out of retries: write the chunk off row by row so the job can
            // still complete
            let message = format!("database insert failed: {}", e);
            let errors = write_off_errors(payload.chunk_index, &payload.rows, &message);

            let logging = ErrorLoggingPayload {
                job_id: payload.job_id,
                errors,
            };
            if let Err(send_err) = queue
                .send_with_priority(TOPIC_ERROR_LOGGING, &logging, ERROR_LOGGING_PRIORITY)
                .await
            {
                tracing::error!(
                    job_id = payload.job_id,
                    error = %send_err,
                    "Failed to enqueue insertion errors"
                );
            }

            match store::add_failed(&pool, payload.job_id, chunk_len as i32).await {
                Ok(status) => refresh_cache(&cache, &status).await,
                Err(db_err) => tracing::error!(
                    job_id = payload.job_id,
                    error = %db_err,
                    "Failed to record chunk failure"
                ),
            }

            Err(anyhow::Error::new(e).context("chunk insert failed permanently"))
        },
    }
}

/// Convert a written-off chunk into per-row insertion errors, reconstructing
/// each row's position from the chunk index. Only the last chunk can be
/// short, so preceding chunks are always full.
fn write_off_errors(chunk_index: usize, rows: &[NewEmployee], message: &str) -> Vec<RowError> {
    rows.iter()
        .enumerate()
        .map(|(offset, row)| RowError {
            row_number: (chunk_index * CHUNK_SIZE + offset + 1) as i32,
            error_type: "insertion".to_string(),
            error_message: message.to_string(),
            raw_data: serde_json::to_value(row).ok(),
        })
        .collect()
}

/// Stage 3: persist row errors collected by earlier stages.
#[tracing::instrument(
    skip(pool, job),
    fields(job_id = job.payload.job_id, count = job.payload.errors.len())
)]
pub async fn error_logging(
    pool: PgPool,
    job: ActiveJob<ErrorLoggingPayload>,
) -> anyhow::Result<()> {
    let payload = job.payload;

    let written = store::insert_upload_errors(&pool, payload.job_id, &payload.errors)
        .await
        .context("failed to persist upload errors")?;

    tracing::debug!(job_id = payload.job_id, written, "Row errors persisted");

    Ok(())
}

/// Drop the cached dataset and derived aggregates after every write; on
/// completion drop the whole search namespace as well.
async fn refresh_cache(cache: &RecordCache, status: &str) {
    let scope = if status == "completed" {
        InvalidationScope::Full
    } else {
        InvalidationScope::Dataset
    };

    if let Err(e) = cache.invalidate(scope).await {
        tracing::warn!(error = %e, "Cache invalidation failed");
    }

    if let Err(e) = cache.invalidate_aggregates().await {
        tracing::warn!(error = %e, "Aggregate cache invalidation failed");
    }
}

async fn remove_staged_file(path: &std::path::Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove staged upload");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::parser::ParsedRow;
    use crate::pipeline::validator::{CellValue, RawRow};
    use chrono::NaiveDate;

    fn employee(n: usize) -> NewEmployee {
        NewEmployee {
            firstname: format!("First{}", n),
            lastname: format!("Last{}", n),
            gender: "Female".to_string(),
            country: "Japan".to_string(),
            age: 30,
            date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        }
    }

    fn parsed_row(row_number: i32, age: f64) -> ParsedRow {
        let mut cells = RawRow::new();
        cells.insert("firstname".to_string(), CellValue::Text("Kai".to_string()));
        cells.insert("lastname".to_string(), CellValue::Text("Tan".to_string()));
        cells.insert("gender".to_string(), CellValue::Text("Male".to_string()));
        cells.insert(
            "country".to_string(),
            CellValue::Text("Singapore".to_string()),
        );
        cells.insert("age".to_string(), CellValue::Number(age));
        cells.insert(
            "date".to_string(),
            CellValue::Date(NaiveDate::from_ymd_opt(2021, 3, 15).unwrap()),
        );
        ParsedRow { row_number, cells }
    }

    #[test]
    fn test_partition_accounts_for_every_row() {
        let parsed = vec![
            parsed_row(1, 30.0),
            parsed_row(2, 150.0),
            parsed_row(3, 45.0),
            parsed_row(4, 28.0),
        ];

        let (valid, errors) = partition_rows(&parsed);

        assert_eq!(valid.len() + errors.len(), parsed.len());
        assert_eq!(valid.len(), 3);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].row_number, 2);
        assert_eq!(errors[0].error_type, "validation");
    }

    #[test]
    fn test_chunk_fan_out_partition() {
        let valid: Vec<NewEmployee> = (0..250).map(employee).collect();

        let payloads = chunk_payloads(7, &valid);

        assert_eq!(payloads.len(), 3);
        let lengths: Vec<usize> = payloads.iter().map(|p| p.rows.len()).collect();
        assert_eq!(lengths, vec![100, 100, 50]);
        assert_eq!(lengths.iter().sum::<usize>(), 250);
        for (i, payload) in payloads.iter().enumerate() {
            assert_eq!(payload.job_id, 7);
            assert_eq!(payload.chunk_index, i);
            assert_eq!(payload.total_chunks, 3);
        }
    }

    #[test]
    fn test_chunk_fan_out_empty() {
        assert!(chunk_payloads(7, &[]).is_empty());
    }

    #[test]
    fn test_write_off_row_numbers() {
        let rows: Vec<NewEmployee> = (0..3).map(employee).collect();

        let errors = write_off_errors(2, &rows, "database insert failed: timeout");

        let numbers: Vec<i32> = errors.iter().map(|e| e.row_number).collect();
        assert_eq!(numbers, vec![201, 202, 203]);
        for error in &errors {
            assert_eq!(error.error_type, "insertion");
            assert_eq!(error.error_message, "database insert failed: timeout");
            assert!(error.raw_data.is_some());
        }
    }

    #[tokio::test]
    async fn test_staged_file_removed() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.into_temp_path().keep().unwrap();

        remove_staged_file(&path).await;
        assert!(!path.exists());

        // Removing an already-missing file only warns
        remove_staged_file(&path).await;
    }
}
