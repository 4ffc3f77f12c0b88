//! Row validation for uploaded spreadsheets
//!
//! Every constraint is checked so a bad row reports all of its problems at
//! once rather than failing on the first.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::NewEmployee;

/// Column headers a spreadsheet must provide, matched case-insensitively.
pub const EXPECTED_HEADERS: [&str; 6] =
    ["firstname", "lastname", "gender", "country", "age", "date"];

pub const MAX_NAME_LEN: usize = 10;
pub const MAX_GENDER_LEN: usize = 6;
pub const MAX_COUNTRY_LEN: usize = 20;
pub const MIN_AGE: i64 = 0;
pub const MAX_AGE: i64 = 99;

/// Excel serial day 0 is 1899-12-30 in the 1900 date system.
const EXCEL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

/// A single spreadsheet cell, typed as loosely as the source data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Bool(bool),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

/// A raw row keyed by lowercased header name.
pub type RawRow = BTreeMap<String, CellValue>;

/// Validate one raw row into an insertable employee.
///
/// Returns every violation found, in column order.
pub fn validate_row(row: &RawRow) -> Result<NewEmployee, Vec<String>> {
    let mut errors = Vec::new();

    let firstname = take_text(row, "firstname", MAX_NAME_LEN, &mut errors);
    let lastname = take_text(row, "lastname", MAX_NAME_LEN, &mut errors);
    let gender = take_text(row, "gender", MAX_GENDER_LEN, &mut errors);
    let country = take_text(row, "country", MAX_COUNTRY_LEN, &mut errors);
    let age = take_age(row, &mut errors);
    let date = take_date(row, &mut errors);

    if errors.is_empty() {
        // All fields are Some when no errors were recorded
        match (firstname, lastname, gender, country, age, date) {
            (Some(firstname), Some(lastname), Some(gender), Some(country), Some(age), Some(date)) => {
                Ok(NewEmployee {
                    firstname,
                    lastname,
                    gender,
                    country,
                    age,
                    date,
                })
            },
            _ => Err(vec!["row could not be assembled".to_string()]),
        }
    } else {
        Err(errors)
    }
}

fn take_text(
    row: &RawRow,
    field: &str,
    max_len: usize,
    errors: &mut Vec<String>,
) -> Option<String> {
    let cell = row.get(field).unwrap_or(&CellValue::Empty);

    if cell.is_empty() {
        errors.push(format!("{} is required", field));
        return None;
    }

    let text = match cell {
        CellValue::Text(s) => s.trim().to_string(),
        CellValue::Number(n) => format_number(*n),
        CellValue::Bool(b) => b.to_string(),
        CellValue::Date(d) => d.to_string(),
        CellValue::Empty => unreachable!(),
    };

    if text.chars().count() > max_len {
        errors.push(format!("{} must be at most {} characters", field, max_len));
        return None;
    }

    Some(text)
}

fn take_age(row: &RawRow, errors: &mut Vec<String>) -> Option<i32> {
    let cell = row.get("age").unwrap_or(&CellValue::Empty);

    if cell.is_empty() {
        errors.push("age is required".to_string());
        return None;
    }

    let value: Option<i64> = match cell {
        CellValue::Number(n) if n.fract() == 0.0 => Some(*n as i64),
        CellValue::Text(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    match value {
        Some(age) if (MIN_AGE..=MAX_AGE).contains(&age) => Some(age as i32),
        Some(_) => {
            errors.push(format!("age must be between {} and {}", MIN_AGE, MAX_AGE));
            None
        },
        None => {
            errors.push("age must be a number".to_string());
            None
        },
    }
}

fn take_date(row: &RawRow, errors: &mut Vec<String>) -> Option<NaiveDate> {
    let cell = row.get("date").unwrap_or(&CellValue::Empty);

    if cell.is_empty() {
        errors.push("date is required".to_string());
        return None;
    }

    let parsed = match cell {
        CellValue::Date(d) => Some(*d),
        CellValue::Text(s) => parse_text_date(s.trim()),
        CellValue::Number(n) => excel_serial_to_date(*n),
        _ => None,
    };

    match parsed {
        Some(date) => Some(date),
        None => {
            errors.push("invalid date format".to_string());
            None
        },
    }
}

fn parse_text_date(text: &str) -> Option<NaiveDate> {
    const FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

/// Convert an Excel 1900-system serial number to a date.
fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 || serial > 200_000.0 {
        return None;
    }
    let (y, m, d) = EXCEL_EPOCH;
    let epoch = NaiveDate::from_ymd_opt(y, m, d)?;
    epoch.checked_add_days(chrono::Days::new(serial.trunc() as u64))
}

/// Numbers that are whole render without a fractional part, so a numeric
/// cell like 42 becomes "42" rather than "42.0".
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[(&str, CellValue)]) -> RawRow {
        cells
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn valid_row() -> RawRow {
        row(&[
            ("firstname", CellValue::Text("Amara".to_string())),
            ("lastname", CellValue::Text("Osei".to_string())),
            ("gender", CellValue::Text("Female".to_string())),
            ("country", CellValue::Text("Ghana".to_string())),
            ("age", CellValue::Number(29.0)),
            ("date", CellValue::Date(NaiveDate::from_ymd_opt(2023, 3, 15).unwrap())),
        ])
    }

    #[test]
    fn test_valid_row_passes() {
        let employee = validate_row(&valid_row()).unwrap();
        assert_eq!(employee.firstname, "Amara");
        assert_eq!(employee.age, 29);
        assert_eq!(employee.date, NaiveDate::from_ymd_opt(2023, 3, 15).unwrap());
    }

    #[test]
    fn test_missing_fields_all_reported() {
        let errors = validate_row(&RawRow::new()).unwrap_err();
        assert_eq!(errors.len(), 6);
        assert!(errors.contains(&"firstname is required".to_string()));
        assert!(errors.contains(&"date is required".to_string()));
    }

    #[test]
    fn test_name_length_limit() {
        let mut r = valid_row();
        r.insert(
            "firstname".to_string(),
            CellValue::Text("Maximiliana".to_string()),
        );
        let errors = validate_row(&r).unwrap_err();
        assert_eq!(errors, vec!["firstname must be at most 10 characters"]);
    }

    #[test]
    fn test_gender_length_limit() {
        let mut r = valid_row();
        r.insert(
            "gender".to_string(),
            CellValue::Text("Unspecified".to_string()),
        );
        let errors = validate_row(&r).unwrap_err();
        assert_eq!(errors, vec!["gender must be at most 6 characters"]);
    }

    #[test]
    fn test_country_length_limit() {
        let mut r = valid_row();
        r.insert(
            "country".to_string(),
            CellValue::Text("The Grand Duchy of Westphalia".to_string()),
        );
        assert!(validate_row(&r).is_err());
    }

    #[test]
    fn test_numeric_text_field_is_coerced() {
        let mut r = valid_row();
        r.insert("firstname".to_string(), CellValue::Number(42.0));
        let employee = validate_row(&r).unwrap();
        assert_eq!(employee.firstname, "42");
    }

    #[test]
    fn test_age_from_text() {
        let mut r = valid_row();
        r.insert("age".to_string(), CellValue::Text(" 57 ".to_string()));
        assert_eq!(validate_row(&r).unwrap().age, 57);
    }

    #[test]
    fn test_age_out_of_range() {
        for bad in [-1.0, 100.0, 250.0] {
            let mut r = valid_row();
            r.insert("age".to_string(), CellValue::Number(bad));
            let errors = validate_row(&r).unwrap_err();
            assert_eq!(errors, vec!["age must be between 0 and 99"]);
        }
    }

    #[test]
    fn test_age_boundary_values_accepted() {
        for ok in [0.0, 99.0] {
            let mut r = valid_row();
            r.insert("age".to_string(), CellValue::Number(ok));
            assert!(validate_row(&r).is_ok());
        }
    }

    #[test]
    fn test_fractional_age_rejected() {
        let mut r = valid_row();
        r.insert("age".to_string(), CellValue::Number(29.5));
        let errors = validate_row(&r).unwrap_err();
        assert_eq!(errors, vec!["age must be a number"]);
    }

    #[test]
    fn test_text_date_formats() {
        for text in ["2023-03-15", "2023/03/15", "03/15/2023"] {
            let mut r = valid_row();
            r.insert("date".to_string(), CellValue::Text(text.to_string()));
            assert_eq!(
                validate_row(&r).unwrap().date,
                NaiveDate::from_ymd_opt(2023, 3, 15).unwrap(),
                "format {} should parse",
                text
            );
        }
    }

    #[test]
    fn test_excel_serial_date() {
        // 45000 is 2023-03-15 in the 1900 date system
        let mut r = valid_row();
        r.insert("date".to_string(), CellValue::Number(45000.0));
        assert_eq!(
            validate_row(&r).unwrap().date,
            NaiveDate::from_ymd_opt(2023, 3, 15).unwrap()
        );
    }

    #[test]
    fn test_invalid_date_reported() {
        let mut r = valid_row();
        r.insert("date".to_string(), CellValue::Text("15th March".to_string()));
        let errors = validate_row(&r).unwrap_err();
        assert_eq!(errors, vec!["invalid date format"]);
    }

    #[test]
    fn test_whitespace_only_text_is_empty() {
        let mut r = valid_row();
        r.insert("lastname".to_string(), CellValue::Text("   ".to_string()));
        let errors = validate_row(&r).unwrap_err();
        assert_eq!(errors, vec!["lastname is required"]);
    }

    #[test]
    fn test_multiple_violations_collected() {
        let r = row(&[
            ("firstname", CellValue::Text("Bartholomew".to_string())),
            ("lastname", CellValue::Text("Okonkwo-Smith".to_string())),
            ("gender", CellValue::Text("Female".to_string())),
            ("country", CellValue::Text("Nigeria".to_string())),
            ("age", CellValue::Number(140.0)),
            ("date", CellValue::Text("soon".to_string())),
        ]);
        let errors = validate_row(&r).unwrap_err();
        assert_eq!(errors.len(), 4);
    }
}
