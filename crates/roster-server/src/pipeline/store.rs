//! Persistence for upload jobs, row errors, and batch employee inserts
//!
//! Progress counters are updated with single-statement `CASE` expressions so
//! concurrent insert workers never race the completion flip: the row is
//! marked completed by whichever update makes processed plus failed reach the
//! total.

use chrono::NaiveDate;
use sqlx::PgPool;

use super::jobs::RowError;
use crate::models::{NewEmployee, UploadJob};

/// Create a pending upload job for a staged file.
pub async fn create_upload_job(
    pool: &PgPool,
    filename: &str,
    created_by: Option<&str>,
) -> sqlx::Result<UploadJob> {
    sqlx::query_as(
        r#"
        INSERT INTO upload_jobs (filename, created_by)
        VALUES ($1, $2)
        RETURNING *
        "#,
    )
    .bind(filename)
    .bind(created_by)
    .fetch_one(pool)
    .await
}

pub async fn get_upload_job(pool: &PgPool, job_id: i32) -> sqlx::Result<Option<UploadJob>> {
    sqlx::query_as("SELECT * FROM upload_jobs WHERE id = $1")
        .bind(job_id)
        .fetch_optional(pool)
        .await
}

pub async fn list_upload_jobs(
    pool: &PgPool,
    limit: i64,
    offset: i64,
) -> sqlx::Result<(Vec<UploadJob>, i64)> {
    let jobs: Vec<UploadJob> = sqlx::query_as(
        "SELECT * FROM upload_jobs ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM upload_jobs")
        .fetch_one(pool)
        .await?;

    Ok((jobs, total))
}

/// Flip a freshly claimed job out of pending. No-op on retries and on jobs
/// already past pending.
pub async fn mark_job_processing(pool: &PgPool, job_id: i32) -> sqlx::Result<()> {
    sqlx::query("UPDATE upload_jobs SET status = 'processing' WHERE id = $1 AND status = 'pending'")
        .bind(job_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Record the parse outcome: the row total and any rows that failed
/// validation up front. Runs once per job; the `total_records IS NULL`
/// guard keeps a retried parse from counting validation failures twice.
/// Flips straight to completed when nothing valid remains to insert.
pub async fn begin_processing(
    pool: &PgPool,
    job_id: i32,
    total_records: i32,
    invalid_records: i32,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE upload_jobs
        SET total_records = $2,
            failed_records = $3,
            status = CASE
                WHEN $3 >= $2 THEN 'completed'
                ELSE 'processing'
            END,
            completed_at = CASE
                WHEN $3 >= $2 THEN now()
                ELSE completed_at
            END
        WHERE id = $1
          AND total_records IS NULL
          AND status IN ('pending', 'processing')
        "#,
    )
    .bind(job_id)
    .bind(total_records)
    .bind(invalid_records)
    .execute(pool)
    .await?;
    Ok(())
}

/// Count successfully inserted rows. Returns the job status after the
/// update so callers can react to completion.
pub async fn add_processed(pool: &PgPool, job_id: i32, count: i32) -> sqlx::Result<String> {
    let (status,): (String,) = sqlx::query_as(
        r#"
        UPDATE upload_jobs
        SET processed_records = processed_records + $2,
            status = CASE
                WHEN status = 'processing' AND total_records IS NOT NULL
                     AND processed_records + $2 + failed_records >= total_records
                THEN 'completed'
                ELSE status
            END,
            completed_at = CASE
                WHEN status = 'processing' AND total_records IS NOT NULL
                     AND processed_records + $2 + failed_records >= total_records
                THEN now()
                ELSE completed_at
            END
        WHERE id = $1
        RETURNING status
        "#,
    )
    .bind(job_id)
    .bind(count)
    .fetch_one(pool)
    .await?;
    Ok(status)
}

/// Count rows that permanently failed insertion. Same completion arithmetic
/// as [`add_processed`].
pub async fn add_failed(pool: &PgPool, job_id: i32, count: i32) -> sqlx::Result<String> {
    let (status,): (String,) = sqlx::query_as(
        r#"
        UPDATE upload_jobs
        SET failed_records = failed_records + $2,
            status = CASE
                WHEN status = 'processing' AND total_records IS NOT NULL
                     AND processed_records + failed_records + $2 >= total_records
                THEN 'completed'
                ELSE status
            END,
            completed_at = CASE
                WHEN status = 'processing' AND total_records IS NOT NULL
                     AND processed_records + failed_records + $2 >= total_records
                THEN now()
                ELSE completed_at
            END
        WHERE id = $1
        RETURNING status
        "#,
    )
    .bind(job_id)
    .bind(count)
    .fetch_one(pool)
    .await?;
    Ok(status)
}

/// Mark a job as failed outright. Only pending or processing jobs can fail;
/// a completed job is left alone.
pub async fn mark_job_failed(
    pool: &PgPool,
    job_id: i32,
    error_details: &serde_json::Value,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE upload_jobs
        SET status = 'failed', error_details = $2, completed_at = now()
        WHERE id = $1 AND status IN ('pending', 'processing')
        "#,
    )
    .bind(job_id)
    .bind(error_details)
    .execute(pool)
    .await?;
    Ok(())
}

/// Insert a chunk of validated employees in one round trip.
pub async fn insert_employees(pool: &PgPool, rows: &[NewEmployee]) -> sqlx::Result<u64> {
    if rows.is_empty() {
        return Ok(0);
    }

    let mut firstnames: Vec<String> = Vec::with_capacity(rows.len());
    let mut lastnames: Vec<String> = Vec::with_capacity(rows.len());
    let mut genders: Vec<String> = Vec::with_capacity(rows.len());
    let mut countries: Vec<String> = Vec::with_capacity(rows.len());
    let mut ages: Vec<i32> = Vec::with_capacity(rows.len());
    let mut dates: Vec<NaiveDate> = Vec::with_capacity(rows.len());

    for row in rows {
        firstnames.push(row.firstname.clone());
        lastnames.push(row.lastname.clone());
        genders.push(row.gender.clone());
        countries.push(row.country.clone());
        ages.push(row.age);
        dates.push(row.date);
    }

    let result = sqlx::query(
        r#"
        INSERT INTO employees (firstname, lastname, gender, country, age, date)
        SELECT * FROM UNNEST(
            $1::varchar[], $2::varchar[], $3::varchar[],
            $4::varchar[], $5::int[], $6::date[]
        )
        "#,
    )
    .bind(&firstnames)
    .bind(&lastnames)
    .bind(&genders)
    .bind(&countries)
    .bind(&ages)
    .bind(&dates)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Persist a batch of row errors for a job.
pub async fn insert_upload_errors(
    pool: &PgPool,
    job_id: i32,
    errors: &[RowError],
) -> sqlx::Result<u64> {
    if errors.is_empty() {
        return Ok(0);
    }

    let mut row_numbers: Vec<i32> = Vec::with_capacity(errors.len());
    let mut error_types: Vec<String> = Vec::with_capacity(errors.len());
    let mut messages: Vec<String> = Vec::with_capacity(errors.len());
    let mut raw_data: Vec<serde_json::Value> = Vec::with_capacity(errors.len());

    for error in errors {
        row_numbers.push(error.row_number);
        error_types.push(error.error_type.clone());
        messages.push(error.error_message.clone());
        raw_data.push(error.raw_data.clone().unwrap_or(serde_json::Value::Null));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO upload_errors (job_id, row_number, error_type, error_message, raw_data)
        SELECT $1, * FROM UNNEST($2::int[], $3::varchar[], $4::text[], $5::jsonb[])
        "#,
    )
    .bind(job_id)
    .bind(&row_numbers)
    .bind(&error_types)
    .bind(&messages)
    .bind(&raw_data)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Errors recorded for a job, ordered by source row.
pub async fn list_upload_errors(
    pool: &PgPool,
    job_id: i32,
    limit: i64,
    offset: i64,
) -> sqlx::Result<(Vec<crate::models::UploadErrorRecord>, i64)> {
    let errors: Vec<crate::models::UploadErrorRecord> = sqlx::query_as(
        r#"
        SELECT * FROM upload_errors
        WHERE job_id = $1
        ORDER BY row_number
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(job_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let (total,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM upload_errors WHERE job_id = $1")
            .bind(job_id)
            .fetch_one(pool)
            .await?;

    Ok((errors, total))
}
