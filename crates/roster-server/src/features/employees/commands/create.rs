//! Create employee command
//!
//! Commands are plain data validated up front; the handler owns the SQL and
//! the cache invalidation that follows a successful write.

use chrono::NaiveDate;
use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::cache::{InvalidationScope, RecordCache};
use crate::features::shared::validation::{
    validate_age, validate_country, validate_firstname, validate_gender, validate_lastname,
    FieldError,
};
use crate::models::Employee;

/// Command to create a new employee record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEmployeeCommand {
    pub firstname: String,
    pub lastname: String,
    pub gender: String,
    pub country: String,
    pub age: i32,
    pub date: NaiveDate,
}

/// Errors that can occur when creating an employee
#[derive(Debug, thiserror::Error)]
pub enum CreateEmployeeError {
    #[error("{0}")]
    Validation(#[from] FieldError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<Employee, CreateEmployeeError>> for CreateEmployeeCommand {}

impl crate::cqrs::middleware::Command for CreateEmployeeCommand {}

impl CreateEmployeeCommand {
    pub fn validate(&self) -> Result<(), CreateEmployeeError> {
        validate_firstname(&self.firstname)?;
        validate_lastname(&self.lastname)?;
        validate_gender(&self.gender)?;
        validate_country(&self.country)?;
        validate_age(self.age)?;
        Ok(())
    }
}

#[tracing::instrument(skip(pool, cache, command), fields(firstname = %command.firstname))]
pub async fn handle(
    pool: PgPool,
    cache: RecordCache,
    command: CreateEmployeeCommand,
) -> Result<Employee, CreateEmployeeError> {
    command.validate()?;

    let employee: Employee = sqlx::query_as(
        r#"
        INSERT INTO employees (firstname, lastname, gender, country, age, date)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(command.firstname.trim())
    .bind(command.lastname.trim())
    .bind(command.gender.trim())
    .bind(command.country.trim())
    .bind(command.age)
    .bind(command.date)
    .fetch_one(&pool)
    .await?;

    tracing::info!(employee_id = employee.id, "Employee created");

    // Cache failures must not fail the write
    if let Err(e) = cache.invalidate(InvalidationScope::Dataset).await {
        tracing::warn!(error = %e, "Cache invalidation failed after create");
    }
    if let Err(e) = cache.invalidate_aggregates().await {
        tracing::warn!(error = %e, "Aggregate invalidation failed after create");
    }

    Ok(employee)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command() -> CreateEmployeeCommand {
        CreateEmployeeCommand {
            firstname: "Ines".to_string(),
            lastname: "Aguiar".to_string(),
            gender: "Female".to_string(),
            country: "Portugal".to_string(),
            age: 41,
            date: NaiveDate::from_ymd_opt(2021, 9, 1).unwrap(),
        }
    }

    #[test]
    fn test_validation_success() {
        assert!(command().validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_long_firstname() {
        let mut cmd = command();
        cmd.firstname = "Wilhelmina-Rose".to_string();
        assert!(matches!(
            cmd.validate(),
            Err(CreateEmployeeError::Validation(FieldError::TooLong("firstname", 10)))
        ));
    }

    #[test]
    fn test_validation_rejects_age_out_of_range() {
        let mut cmd = command();
        cmd.age = 140;
        assert!(matches!(
            cmd.validate(),
            Err(CreateEmployeeError::Validation(FieldError::AgeOutOfRange))
        ));
    }
}
