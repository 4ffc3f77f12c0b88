//! Spreadsheet parsing via calamine
//!
//! Reads the first worksheet, matches headers case-insensitively, and turns
//! each data row into loosely typed cells for the validator. Row numbers are
//! 1-based positions below the header row so error reports line up with what
//! the uploader sees in their spreadsheet program.

use calamine::{open_workbook_auto, Data, DataType, Range, Reader};
use std::path::Path;
use thiserror::Error;

use super::validator::{CellValue, RawRow, EXPECTED_HEADERS};

/// Parsing failures. All of these are permanent: retrying the same file
/// cannot succeed.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Failed to read workbook: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("Workbook has no worksheets")]
    NoWorksheet,

    #[error("Missing required columns: {0}")]
    MissingHeaders(String),

    #[error("Spreadsheet has no data rows")]
    NoData,
}

/// One data row with its position in the sheet.
#[derive(Debug, Clone)]
pub struct ParsedRow {
    /// 1-based row number below the header.
    pub row_number: i32,
    pub cells: RawRow,
}

/// Parse the first worksheet of the file at `path`.
pub fn parse_workbook(path: &Path) -> Result<Vec<ParsedRow>, ParseError> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ParseError::NoWorksheet)??;
    parse_range(&range)
}

fn parse_range(range: &Range<Data>) -> Result<Vec<ParsedRow>, ParseError> {
    let mut rows = range.rows();

    let header_row = rows.next().ok_or(ParseError::NoData)?;
    let headers: Vec<String> = header_row
        .iter()
        .map(|cell| cell.as_string().unwrap_or_default().trim().to_lowercase())
        .collect();

    let missing: Vec<&str> = EXPECTED_HEADERS
        .iter()
        .filter(|expected| !headers.iter().any(|h| h == *expected))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(ParseError::MissingHeaders(missing.join(", ")));
    }

    let mut parsed = Vec::new();
    for (index, row) in rows.enumerate() {
        if row.iter().all(is_blank) {
            continue;
        }

        let mut cells = RawRow::new();
        for (header, cell) in headers.iter().zip(row.iter()) {
            if header.is_empty() {
                continue;
            }
            cells.insert(header.clone(), convert_cell(cell));
        }

        parsed.push(ParsedRow {
            row_number: (index + 1) as i32,
            cells,
        });
    }

    if parsed.is_empty() {
        return Err(ParseError::NoData);
    }

    Ok(parsed)
}

fn is_blank(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => match cell.as_date() {
            Some(date) => CellValue::Date(date),
            None => CellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => match cell.as_date() {
            Some(date) => CellValue::Date(date),
            None => CellValue::Text(s.clone()),
        },
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(_) => CellValue::Empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(rows: &[&[Data]]) -> Range<Data> {
        let cols = rows.iter().map(|r| r.len()).max().unwrap_or(1);
        let mut range = Range::new((0, 0), (rows.len() as u32 - 1, cols as u32 - 1));
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                range.set_value((r as u32, c as u32), cell.clone());
            }
        }
        range
    }

    fn header() -> Vec<Data> {
        ["Firstname", "Lastname", "Gender", "Country", "Age", "Date"]
            .iter()
            .map(|s| Data::String(s.to_string()))
            .collect()
    }

    fn data_row(name: &str) -> Vec<Data> {
        vec![
            Data::String(name.to_string()),
            Data::String("Reyes".to_string()),
            Data::String("Male".to_string()),
            Data::String("Chile".to_string()),
            Data::Float(44.0),
            Data::String("2022-11-02".to_string()),
        ]
    }

    #[test]
    fn test_headers_matched_case_insensitively() {
        let range = sheet(&[&header(), &data_row("Pablo")]);
        let rows = parse_range(&range).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].cells.get("firstname"),
            Some(&CellValue::Text("Pablo".to_string()))
        );
    }

    #[test]
    fn test_missing_headers_reported() {
        let partial: Vec<Data> = ["firstname", "lastname"]
            .iter()
            .map(|s| Data::String(s.to_string()))
            .collect();
        let range = sheet(&[&partial, &data_row("x")[..2].to_vec()]);
        match parse_range(&range) {
            Err(ParseError::MissingHeaders(missing)) => {
                assert!(missing.contains("gender"));
                assert!(missing.contains("date"));
                assert!(!missing.contains("firstname"));
            },
            other => panic!("expected MissingHeaders, got {:?}", other),
        }
    }

    #[test]
    fn test_row_numbers_skip_header_and_count_blanks() {
        let blank = vec![Data::Empty; 6];
        let range = sheet(&[&header(), &data_row("Ana"), &blank, &data_row("Bo")]);
        let rows = parse_range(&range).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row_number, 1);
        assert_eq!(rows[1].row_number, 3);
    }

    #[test]
    fn test_empty_sheet_rejected() {
        let range = sheet(&[&header()]);
        assert!(matches!(parse_range(&range), Err(ParseError::NoData)));
    }

    #[test]
    fn test_numeric_cells_preserved() {
        let range = sheet(&[&header(), &data_row("Ana")]);
        let rows = parse_range(&range).unwrap();
        assert_eq!(rows[0].cells.get("age"), Some(&CellValue::Number(44.0)));
    }

    #[test]
    fn test_corrupt_workbook_rejected() {
        use std::io::Write;

        let mut file = tempfile::Builder::new()
            .suffix(".xlsx")
            .tempfile()
            .unwrap();
        file.write_all(b"this is not a spreadsheet").unwrap();
        assert!(matches!(
            parse_workbook(file.path()),
            Err(ParseError::Workbook(_))
        ));
    }
}
