//! Delete employee command

use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::cache::{InvalidationScope, RecordCache};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteEmployeeCommand {
    pub id: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteEmployeeResponse {
    pub id: i32,
}

#[derive(Debug, thiserror::Error)]
pub enum DeleteEmployeeError {
    #[error("Employee {0} not found")]
    NotFound(i32),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<DeleteEmployeeResponse, DeleteEmployeeError>> for DeleteEmployeeCommand {}

impl crate::cqrs::middleware::Command for DeleteEmployeeCommand {}

#[tracing::instrument(skip(pool, cache), fields(employee_id = command.id))]
pub async fn handle(
    pool: PgPool,
    cache: RecordCache,
    command: DeleteEmployeeCommand,
) -> Result<DeleteEmployeeResponse, DeleteEmployeeError> {
    let deleted: Option<(i32,)> = sqlx::query_as("DELETE FROM employees WHERE id = $1 RETURNING id")
        .bind(command.id)
        .fetch_optional(&pool)
        .await?;

    let (id,) = deleted.ok_or(DeleteEmployeeError::NotFound(command.id))?;

    tracing::info!(employee_id = id, "Employee deleted");

    // A point delete only needs to evict its own cached member
    if let Err(e) = cache.invalidate(InvalidationScope::Record(id)).await {
        tracing::warn!(error = %e, "Cache eviction failed after delete");
    }
    if let Err(e) = cache.invalidate_aggregates().await {
        tracing::warn!(error = %e, "Aggregate invalidation failed after delete");
    }

    Ok(DeleteEmployeeResponse { id })
}
