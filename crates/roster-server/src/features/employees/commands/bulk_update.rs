//! Bulk employee update command
//!
//! Applies a batch of partial updates in one transaction. Missing ids are
//! reported rather than failing the batch; validation errors fail the whole
//! batch before any row is touched.

use chrono::NaiveDate;
use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, QueryBuilder};

use crate::cache::{InvalidationScope, RecordCache};
use crate::features::shared::validation::{
    validate_age, validate_country, validate_firstname, validate_gender, validate_lastname,
    FieldError,
};

/// Maximum rows accepted in one bulk update.
pub const MAX_BATCH_SIZE: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkUpdateItem {
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

impl BulkUpdateItem {
    fn has_changes(&self) -> bool {
        self.firstname.is_some()
            || self.lastname.is_some()
            || self.gender.is_some()
            || self.country.is_some()
            || self.age.is_some()
            || self.date.is_some()
    }

    fn validate(&self) -> Result<(), FieldError> {
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

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkUpdateEmployeesCommand {
    pub updates: Vec<BulkUpdateItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkUpdateEmployeesResponse {
    pub updated: usize,
    /// Ids from the request that matched no employee.
    pub missing: Vec<i32>,
}

#[derive(Debug, thiserror::Error)]
pub enum BulkUpdateEmployeesError {
    #[error("Update batch is empty")]
    EmptyBatch,

    #[error("Update batch exceeds {MAX_BATCH_SIZE} rows")]
    BatchTooLarge,

    #[error("Update for employee {id} has no fields")]
    EmptyItem { id: i32 },

    #[error("Update for employee {id} is invalid: {source}")]
    Validation { id: i32, source: FieldError },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<BulkUpdateEmployeesResponse, BulkUpdateEmployeesError>>
    for BulkUpdateEmployeesCommand
{
}

impl crate::cqrs::middleware::Command for BulkUpdateEmployeesCommand {}

impl BulkUpdateEmployeesCommand {
    pub fn validate(&self) -> Result<(), BulkUpdateEmployeesError> {
        if self.updates.is_empty() {
            return Err(BulkUpdateEmployeesError::EmptyBatch);
        }
        if self.updates.len() > MAX_BATCH_SIZE {
            return Err(BulkUpdateEmployeesError::BatchTooLarge);
        }
        for item in &self.updates {
            if !item.has_changes() {
                return Err(BulkUpdateEmployeesError::EmptyItem { id: item.id });
            }
            item.validate()
                .map_err(|source| BulkUpdateEmployeesError::Validation {
                    id: item.id,
                    source,
                })?;
        }
        Ok(())
    }
}

#[tracing::instrument(skip(pool, cache, command), fields(batch = command.updates.len()))]
pub async fn handle(
    pool: PgPool,
    cache: RecordCache,
    command: BulkUpdateEmployeesCommand,
) -> Result<BulkUpdateEmployeesResponse, BulkUpdateEmployeesError> {
    command.validate()?;

    let mut tx = pool.begin().await?;
    let mut updated = 0usize;
    let mut missing = Vec::new();

    for item in &command.updates {
        let mut builder = QueryBuilder::new("UPDATE employees SET updated_at = now()");

        if let Some(ref firstname) = item.firstname {
            builder.push(", firstname = ").push_bind(firstname.trim());
        }
        if let Some(ref lastname) = item.lastname {
            builder.push(", lastname = ").push_bind(lastname.trim());
        }
        if let Some(ref gender) = item.gender {
            builder.push(", gender = ").push_bind(gender.trim());
        }
        if let Some(ref country) = item.country {
            builder.push(", country = ").push_bind(country.trim());
        }
        if let Some(age) = item.age {
            builder.push(", age = ").push_bind(age);
        }
        if let Some(date) = item.date {
            builder.push(", date = ").push_bind(date);
        }

        builder.push(" WHERE id = ").push_bind(item.id);

        let result = builder.build().execute(&mut *tx).await?;
        if result.rows_affected() == 0 {
            missing.push(item.id);
        } else {
            updated += 1;
        }
    }

    tx.commit().await?;

    tracing::info!(updated, missing = missing.len(), "Bulk employee update applied");

    // A bulk write can touch anything, drop every cached search key
    if let Err(e) = cache.invalidate(InvalidationScope::Full).await {
        tracing::warn!(error = %e, "Cache invalidation failed after bulk update");
    }
    if let Err(e) = cache.invalidate_aggregates().await {
        tracing::warn!(error = %e, "Aggregate invalidation failed after bulk update");
    }

    Ok(BulkUpdateEmployeesResponse { updated, missing })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i32) -> BulkUpdateItem {
        BulkUpdateItem {
            id,
            firstname: None,
            lastname: None,
            gender: None,
            country: Some("Kenya".to_string()),
            age: None,
            date: None,
        }
    }

    #[test]
    fn test_empty_batch_rejected() {
        let cmd = BulkUpdateEmployeesCommand { updates: vec![] };
        assert!(matches!(
            cmd.validate(),
            Err(BulkUpdateEmployeesError::EmptyBatch)
        ));
    }

    #[test]
    fn test_oversized_batch_rejected() {
        let cmd = BulkUpdateEmployeesCommand {
            updates: (0..=MAX_BATCH_SIZE as i32).map(item).collect(),
        };
        assert!(matches!(
            cmd.validate(),
            Err(BulkUpdateEmployeesError::BatchTooLarge)
        ));
    }

    #[test]
    fn test_item_without_fields_rejected() {
        let empty = BulkUpdateItem {
            id: 7,
            firstname: None,
            lastname: None,
            gender: None,
            country: None,
            age: None,
            date: None,
        };
        let cmd = BulkUpdateEmployeesCommand {
            updates: vec![item(1), empty],
        };
        assert!(matches!(
            cmd.validate(),
            Err(BulkUpdateEmployeesError::EmptyItem { id: 7 })
        ));
    }

    #[test]
    fn test_invalid_item_names_offender() {
        let mut bad = item(9);
        bad.age = Some(150);
        let cmd = BulkUpdateEmployeesCommand {
            updates: vec![bad],
        };
        match cmd.validate() {
            Err(BulkUpdateEmployeesError::Validation { id, .. }) => assert_eq!(id, 9),
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
