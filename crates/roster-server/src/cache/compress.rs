//! Compact member encoding for cached employee records
//!
//! Cached sorted-set members store employees under single-letter keys to keep
//! Redis memory roughly a third of the full JSON representation.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Employee;

/// Compact wire form of an [`Employee`].
#[derive(Debug, Serialize, Deserialize)]
struct CompactEmployee {
    i: i32,
    f: String,
    l: String,
    g: String,
    c: String,
    a: i32,
    d: NaiveDate,
    ca: DateTime<Utc>,
    ua: DateTime<Utc>,
}

impl From<&Employee> for CompactEmployee {
    fn from(e: &Employee) -> Self {
        Self {
            i: e.id,
            f: e.firstname.clone(),
            l: e.lastname.clone(),
            g: e.gender.clone(),
            c: e.country.clone(),
            a: e.age,
            d: e.date,
            ca: e.created_at,
            ua: e.updated_at,
        }
    }
}

impl From<CompactEmployee> for Employee {
    fn from(c: CompactEmployee) -> Self {
        Self {
            id: c.i,
            firstname: c.f,
            lastname: c.l,
            gender: c.g,
            country: c.c,
            age: c.a,
            date: c.d,
            created_at: c.ca,
            updated_at: c.ua,
        }
    }
}

/// Encode an employee into its compact cached form.
pub fn compress(employee: &Employee) -> serde_json::Result<String> {
    serde_json::to_string(&CompactEmployee::from(employee))
}

/// Decode a cached member back into a full employee.
pub fn decompress(member: &str) -> serde_json::Result<Employee> {
    serde_json::from_str::<CompactEmployee>(member).map(Employee::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Employee {
        Employee {
            id: 42,
            firstname: "Maya".to_string(),
            lastname: "Lund".to_string(),
            gender: "Female".to_string(),
            country: "Norway".to_string(),
            age: 34,
            date: NaiveDate::from_ymd_opt(2023, 5, 17).unwrap(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
        }
    }

    #[test]
    fn test_compress_uses_short_keys() {
        let encoded = compress(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value["i"], 42);
        assert_eq!(value["f"], "Maya");
        assert!(value.get("firstname").is_none());
    }

    #[test]
    fn test_decompress_restores_employee() {
        let original = sample();
        let decoded = decompress(&compress(&original).unwrap()).unwrap();
        assert_eq!(decoded.id, original.id);
        assert_eq!(decoded.firstname, original.firstname);
        assert_eq!(decoded.date, original.date);
        assert_eq!(decoded.created_at, original.created_at);
    }

    #[test]
    fn test_decompress_rejects_garbage() {
        assert!(decompress("{not json").is_err());
    }
}
