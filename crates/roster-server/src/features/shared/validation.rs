//! Field validation shared by employee commands
//!
//! The limits mirror the `employees` column widths, so API writes and
//! spreadsheet imports enforce the same constraints.

use thiserror::Error;

use crate::pipeline::validator::{
    MAX_AGE, MAX_COUNTRY_LEN, MAX_GENDER_LEN, MAX_NAME_LEN, MIN_AGE,
};

/// A single field constraint violation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldError {
    #[error("{0} is required")]
    Required(&'static str),

    #[error("{0} must be at most {1} characters")]
    TooLong(&'static str, usize),

    #[error("age must be between {MIN_AGE} and {MAX_AGE}")]
    AgeOutOfRange,
}

pub fn validate_text(field: &'static str, value: &str, max_len: usize) -> Result<(), FieldError> {
    if value.trim().is_empty() {
        return Err(FieldError::Required(field));
    }
    if value.trim().chars().count() > max_len {
        return Err(FieldError::TooLong(field, max_len));
    }
    Ok(())
}

pub fn validate_firstname(value: &str) -> Result<(), FieldError> {
    validate_text("firstname", value, MAX_NAME_LEN)
}

pub fn validate_lastname(value: &str) -> Result<(), FieldError> {
    validate_text("lastname", value, MAX_NAME_LEN)
}

pub fn validate_gender(value: &str) -> Result<(), FieldError> {
    validate_text("gender", value, MAX_GENDER_LEN)
}

pub fn validate_country(value: &str) -> Result<(), FieldError> {
    validate_text("country", value, MAX_COUNTRY_LEN)
}

pub fn validate_age(age: i32) -> Result<(), FieldError> {
    if (MIN_AGE..=MAX_AGE).contains(&i64::from(age)) {
        Ok(())
    } else {
        Err(FieldError::AgeOutOfRange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_fields() {
        assert_eq!(
            validate_firstname("  "),
            Err(FieldError::Required("firstname"))
        );
        assert!(validate_firstname("Ada").is_ok());
    }

    #[test]
    fn test_length_limits() {
        assert_eq!(
            validate_gender("Nonbinary"),
            Err(FieldError::TooLong("gender", 6))
        );
        assert!(validate_country("New Zealand").is_ok());
    }

    #[test]
    fn test_age_bounds() {
        assert!(validate_age(0).is_ok());
        assert!(validate_age(99).is_ok());
        assert_eq!(validate_age(100), Err(FieldError::AgeOutOfRange));
        assert_eq!(validate_age(-1), Err(FieldError::AgeOutOfRange));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            FieldError::TooLong("firstname", 10).to_string(),
            "firstname must be at most 10 characters"
        );
        assert_eq!(
            FieldError::AgeOutOfRange.to_string(),
            "age must be between 0 and 99"
        );
    }
}
