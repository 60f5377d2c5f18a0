//! CSV ingest.
//!
//! Two shapes are read from disk:
//!
//! - a plain observation file (`date,value`, headers configurable) for sources
//!   that arrive as files rather than API responses
//! - the wide outbreak table, read cell-for-cell with no header interpretation so
//!   the decoder sees the label row exactly as exported
//!
//! Design goals:
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Deterministic behavior** (rows keep file order)
//! - **Separation of concerns**: no aggregation or decoding here

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;
use serde::{Deserialize, Serialize};

use crate::decode::WideTable;
use crate::domain::RawObservation;
use crate::error::AppError;

/// Column layout of an observation CSV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservationCsvSpec {
    pub date_column: String,
    pub value_column: String,
    /// Tried in order; the first format that parses wins.
    pub date_formats: Vec<String>,
}

impl Default for ObservationCsvSpec {
    fn default() -> Self {
        Self {
            date_column: "date".to_string(),
            value_column: "value".to_string(),
            date_formats: vec!["%Y-%m-%d".to_string(), "%m/%d/%Y".to_string(), "%d-%b-%y".to_string()],
        }
    }
}

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Parsed observations plus the rows that were skipped.
#[derive(Debug, Clone)]
pub struct IngestedObservations {
    pub observations: Vec<RawObservation>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Open `path` and read it as an observation CSV.
pub fn load_observations_csv(path: &Path, spec: &ObservationCsvSpec) -> Result<IngestedObservations, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    read_observations(file, spec)
}

/// Read `date,value` observations from any reader.
///
/// Blank, `"."`, `"NA"` and non-numeric values become `None` (a reported gap);
/// rows with an unparseable date are skipped and listed in `row_errors`.
pub fn read_observations<R: Read>(reader: R, spec: &ObservationCsvSpec) -> Result<IngestedObservations, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let date_idx = column_index(&header_map, &spec.date_column)?;
    let value_idx = column_index(&header_map, &spec.value_column)?;

    let mut observations = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2: records() starts after the header, and lines are 1-based.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        let raw_date = record.get(date_idx).unwrap_or_default();
        let Some(date) = parse_date(raw_date, &spec.date_formats) else {
            row_errors.push(RowError {
                line,
                message: format!("Invalid date '{raw_date}'"),
            });
            continue;
        };

        let value = record.get(value_idx).and_then(parse_value);
        observations.push(RawObservation::new(date, value));
    }

    Ok(IngestedObservations {
        observations,
        row_errors,
        rows_read,
    })
}

/// Open `path` and read it as a wide outbreak table.
pub fn load_wide_table(path: &Path) -> Result<WideTable, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open outbreak table '{}': {e}", path.display())))?;
    read_wide_table(file)
}

/// Read every row verbatim; blank cells become `None`.
///
/// Invalid UTF-8 is replaced with U+FFFD, so a corrupt byte only affects its
/// own cell.
pub fn read_wide_table<R: Read>(reader: R) -> Result<WideTable, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut rows: Vec<Vec<Option<String>>> = Vec::new();
    for (idx, result) in reader.byte_records().enumerate() {
        let record =
            result.map_err(|e| AppError::new(2, format!("Outbreak table parse error at line {}: {e}", idx + 1)))?;
        rows.push(
            record
                .iter()
                .map(|bytes| {
                    let cell = String::from_utf8_lossy(bytes);
                    let cell = cell.trim().trim_start_matches('\u{feff}');
                    (!cell.is_empty()).then(|| cell.to_string())
                })
                .collect(),
        );
    }

    Ok(WideTable::new(rows))
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

fn column_index(header_map: &HashMap<String, usize>, name: &str) -> Result<usize, AppError> {
    header_map
        .get(&normalize_header_name(name))
        .copied()
        .ok_or_else(|| AppError::new(2, format!("Missing required column: `{name}`")))
}

fn parse_date(s: &str, formats: &[String]) -> Option<NaiveDate> {
    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s.trim(), fmt).ok())
}

fn parse_value(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed.eq_ignore_ascii_case("na") {
        return None;
    }
    let cleaned: String = trimmed.chars().filter(|c| *c != ',').collect();
    let v = cleaned.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}
