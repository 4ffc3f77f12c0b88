//! Partial employee update command

use chrono::NaiveDate;
use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, QueryBuilder};

use crate::cache::{InvalidationScope, RecordCache};
use crate::features::shared::validation::{
    validate_age, validate_country, validate_firstname, validate_gender, validate_lastname,
    FieldError,
};
use crate::models::Employee;

/// Command to update an existing employee. Only the provided fields change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateEmployeeCommand {
    /// Set from the URL path, not the request body.
    #[serde(default)]
    pub id: i32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub firstname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, thiserror::Error)]
pub enum UpdateEmployeeError {
    #[error("{0}")]
    Validation(#[from] FieldError),

    #[error("No fields to update")]
    NoFieldsToUpdate,

    #[error("Employee {0} not found")]
    NotFound(i32),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<Employee, UpdateEmployeeError>> for UpdateEmployeeCommand {}

impl crate::cqrs::middleware::Command for UpdateEmployeeCommand {}

impl UpdateEmployeeCommand {
    pub fn has_changes(&self) -> bool {
        self.firstname.is_some()
            || self.lastname.is_some()
            || self.gender.is_some()
            || self.country.is_some()
            || self.age.is_some()
            || self.date.is_some()
    }

    pub fn validate(&self) -> Result<(), UpdateEmployeeError> {
        if !self.has_changes() {
            return Err(UpdateEmployeeError::NoFieldsToUpdate);
        }
        if let Some(ref firstname) = self.firstname {
            validate_firstname(firstname)?;
        }
        if let Some(ref lastname) = self.lastname {
            validate_lastname(lastname)?;
        }
        if let Some(ref gender) = self.gender {
            validate_gender(gender)?;
        }
        if let Some(ref country) = self.country {
            validate_country(country)?;
        }
        if let Some(age) = self.age {
            validate_age(age)?;
        }
        Ok(())
    }
}

#[tracing::instrument(skip(pool, cache, command), fields(employee_id = command.id))]
pub async fn handle(
    pool: PgPool,
    cache: RecordCache,
    command: UpdateEmployeeCommand,
) -> Result<Employee, UpdateEmployeeError> {
    command.validate()?;

    let mut builder = QueryBuilder::new("UPDATE employees SET updated_at = now()");

    if let Some(ref firstname) = command.firstname {
        builder.push(", firstname = ").push_bind(firstname.trim());
    }
    if let Some(ref lastname) = command.lastname {
        builder.push(", lastname = ").push_bind(lastname.trim());
    }
    if let Some(ref gender) = command.gender {
        builder.push(", gender = ").push_bind(gender.trim());
    }
    if let Some(ref country) = command.country {
        builder.push(", country = ").push_bind(country.trim());
    }
    if let Some(age) = command.age {
        builder.push(", age = ").push_bind(age);
    }
    if let Some(date) = command.date {
        builder.push(", date = ").push_bind(date);
    }

    builder.push(" WHERE id = ").push_bind(command.id);
    builder.push(" RETURNING *");

    let employee: Employee = builder
        .build_query_as()
        .fetch_optional(&pool)
        .await?
        .ok_or(UpdateEmployeeError::NotFound(command.id))?;

    tracing::info!(employee_id = employee.id, "Employee updated");

    if let Err(e) = cache.invalidate(InvalidationScope::Dataset).await {
        tracing::warn!(error = %e, "Cache invalidation failed after update");
    }
    if let Err(e) = cache.invalidate_aggregates().await {
        tracing::warn!(error = %e, "Aggregate invalidation failed after update");
    }

    Ok(employee)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_update_rejected() {
        let cmd = UpdateEmployeeCommand {
            id: 1,
            firstname: None,
            lastname: None,
            gender: None,
            country: None,
            age: None,
            date: None,
        };
        assert!(matches!(
            cmd.validate(),
            Err(UpdateEmployeeError::NoFieldsToUpdate)
        ));
    }

    #[test]
    fn test_partial_update_validates_only_present_fields() {
        let cmd = UpdateEmployeeCommand {
            id: 1,
            firstname: None,
            lastname: None,
            gender: None,
            country: Some("Brazil".to_string()),
            age: None,
            date: None,
        };
        assert!(cmd.validate().is_ok());
    }

    #[test]
    fn test_invalid_field_rejected() {
        let cmd = UpdateEmployeeCommand {
            id: 1,
            firstname: None,
            lastname: None,
            gender: Some("Undeclared".to_string()),
            country: None,
            age: None,
            date: None,
        };
        assert!(matches!(
            cmd.validate(),
            Err(UpdateEmployeeError::Validation(_))
        ));
    }
}
