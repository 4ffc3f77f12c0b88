//! Single employee lookup

use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::models::Employee;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetEmployeeQuery {
    pub id: i32,
}

#[derive(Debug, thiserror::Error)]
pub enum GetEmployeeError {
    #[error("Employee {0} not found")]
    NotFound(i32),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<Employee, GetEmployeeError>> for GetEmployeeQuery {}

impl crate::cqrs::middleware::Query for GetEmployeeQuery {}

#[tracing::instrument(skip(pool), fields(employee_id = query.id))]
pub async fn handle(pool: PgPool, query: GetEmployeeQuery) -> Result<Employee, GetEmployeeError> {
    sqlx::query_as("SELECT * FROM employees WHERE id = $1")
        .bind(query.id)
        .fetch_optional(&pool)
        .await?
        .ok_or(GetEmployeeError::NotFound(query.id))
}
