//! Dashboard aggregate statistics
//!
//! Aggregates are cheap enough to compute on demand but are hit by every
//! dashboard, so they sit behind a short Redis TTL.

use chrono::{DateTime, Utc};
use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::cache::RecordCache;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DashboardStatsQuery {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_employees: i64,
    pub total_countries: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_age: Option<f64>,
    pub by_gender: Vec<GroupCount>,
    pub by_country: Vec<GroupCount>,
    pub uploads: UploadCounts,
}

/// One bucket of a GROUP BY breakdown, largest buckets first.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GroupCount {
    pub label: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadCounts {
    pub total: i64,
    pub completed: i64,
    pub failed: i64,
    pub in_progress: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, thiserror::Error)]
pub enum DashboardStatsError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<DashboardStats, DashboardStatsError>> for DashboardStatsQuery {}

impl crate::cqrs::middleware::Query for DashboardStatsQuery {}

#[tracing::instrument(skip(pool, cache, _query))]
pub async fn handle(
    pool: PgPool,
    cache: RecordCache,
    _query: DashboardStatsQuery,
) -> Result<DashboardStats, DashboardStatsError> {
    match cache.get_dashboard_stats().await {
        Ok(Some(cached)) => {
            if let Ok(stats) = serde_json::from_value::<DashboardStats>(cached) {
                return Ok(stats);
            }
            // Stale shape from an older release, recompute below
        },
        Ok(None) => {},
        Err(e) => tracing::warn!(error = %e, "Dashboard cache read failed"),
    }

    let (total_employees, total_countries, average_age): (i64, i64, Option<f64>) =
        sqlx::query_as(
            "SELECT COUNT(*), COUNT(DISTINCT country), AVG(age)::float8 FROM employees",
        )
        .fetch_one(&pool)
        .await?;

    let by_gender: Vec<GroupCount> = sqlx::query_as(
        "SELECT gender AS label, COUNT(*) AS count FROM employees \
         GROUP BY gender ORDER BY count DESC, label",
    )
    .fetch_all(&pool)
    .await?;

    let by_country: Vec<GroupCount> = sqlx::query_as(
        "SELECT country AS label, COUNT(*) AS count FROM employees \
         GROUP BY country ORDER BY count DESC, label",
    )
    .fetch_all(&pool)
    .await?;

    let (total, completed, failed, in_progress, last_completed_at): (
        i64,
        i64,
        i64,
        i64,
        Option<DateTime<Utc>>,
    ) = sqlx::query_as(
        r#"
        SELECT COUNT(*),
               COUNT(*) FILTER (WHERE status = 'completed'),
               COUNT(*) FILTER (WHERE status = 'failed'),
               COUNT(*) FILTER (WHERE status IN ('pending', 'processing')),
               MAX(completed_at) FILTER (WHERE status = 'completed')
        FROM upload_jobs
        "#,
    )
    .fetch_one(&pool)
    .await?;

    let stats = DashboardStats {
        total_employees,
        total_countries,
        average_age,
        by_gender,
        by_country,
        uploads: UploadCounts {
            total,
            completed,
            failed,
            in_progress,
            last_completed_at,
        },
    };

    match serde_json::to_value(&stats) {
        Ok(value) => {
            if let Err(e) = cache.set_dashboard_stats(&value).await {
                tracing::warn!(error = %e, "Dashboard cache write failed");
            }
        },
        Err(e) => tracing::warn!(error = %e, "Dashboard stats not cacheable"),
    }

    Ok(stats)
}
