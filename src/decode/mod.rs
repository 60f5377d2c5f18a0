//! Release-date decoder for the wide outbreak table.
//!
//! The outbreak export encodes each event's release date *positionally*: one
//! label row maps every release column to a calendar date (or a sentinel), and a
//! data row marks its release by populating exactly one of those columns with
//! the affected count. This module turns that implicit sparse matrix back into
//! `OutbreakRecord`s.
//!
//! Design goals:
//! - **Tolerant scan**: the one-cell-per-row contract is external; violations are
//!   resolved deterministically (leftmost cell wins) and counted, never hidden
//! - **Row-level faults**: bad rows are dropped or degraded, decoding never aborts
//! - **No globals**: formats and sentinel labels arrive via `DecodeConfig`

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{OutbreakRecord, RawObservation};

/// Columns of the metadata prefix, in file order. Positions at or past
/// `prefix_width` belong to the release block and are never read as metadata.
const COL_CONFIRMED: usize = 0;
const COL_STATE: usize = 1;
const COL_COUNTY: usize = 2;
// Column 3 is the upstream's internal identifier; it is not carried.
const COL_PRODUCTION: usize = 4;

/// A raw table as read from disk: every cell is optional text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WideTable {
    pub rows: Vec<Vec<Option<String>>>,
}

impl WideTable {
    pub fn new(rows: Vec<Vec<Option<String>>>) -> Self {
        Self { rows }
    }
}

/// Decoder settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Index of the label row; rows above it are ignored, rows below are data.
    pub label_row: usize,
    /// Number of metadata columns before the first release column.
    pub prefix_width: usize,
    /// `chrono` format for both the confirmation date and the release labels.
    pub date_format: String,
    /// Label meaning "not released yet".
    pub active_label: String,
    /// Label meaning "release does not apply".
    pub not_applicable_label: String,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            label_row: 0,
            prefix_width: 5,
            date_format: "%d-%b-%y".to_string(),
            active_label: "Active".to_string(),
            not_applicable_label: "N/A".to_string(),
        }
    }
}

/// Outcome of scanning one row's release columns.
///
/// `column` is relative to the first release column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReleaseScan {
    /// Exactly one populated cell.
    Resolved { column: usize, magnitude: Option<f64> },
    /// No populated cell: the outbreak is unresolved.
    Active,
    /// More than one populated cell. The leftmost is used; `extra` counts the rest.
    Ambiguous {
        column: usize,
        magnitude: Option<f64>,
        extra: usize,
    },
}

/// A per-row data-quality problem.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeFault {
    /// The row was dropped: it cannot be placed on the calendar.
    #[error("unparseable confirmation date {raw:?}")]
    RowDecode { raw: Option<String> },
    #[error("{extra} extra populated release column(s); kept leftmost column {selected}")]
    AmbiguousRelease { selected: usize, extra: usize },
    /// The release label did not parse; the record degrades to active.
    #[error("unparseable release label {raw:?}; treated as active")]
    UnparseableReleaseDate { raw: Option<String> },
    /// The record was rejected: release precedes confirmation.
    #[error("release date precedes confirmation ({days} days)")]
    NegativeDuration { days: i64 },
    /// The populated cell was not a non-negative number; magnitude set to 0.
    #[error("non-numeric affected count {raw:?}; treated as 0")]
    NonNumericMagnitude { raw: String },
}

/// A fault tied to its data row (1-based, counted from the first row after the label row).
#[derive(Debug, Clone, PartialEq)]
pub struct RowFault {
    pub row: usize,
    pub fault: DecodeFault,
}

/// A record that decoded but violates the duration invariant.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidRecord {
    pub row: usize,
    pub confirmation_date: NaiveDate,
    pub release_date: NaiveDate,
    pub days_to_release: i64,
}

/// Fault totals for a decode run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FaultCounts {
    pub dropped_rows: usize,
    pub ambiguous_releases: usize,
    pub unparseable_releases: usize,
    pub negative_durations: usize,
    pub non_numeric_magnitudes: usize,
}

impl FaultCounts {
    pub fn total(&self) -> usize {
        self.dropped_rows
            + self.ambiguous_releases
            + self.unparseable_releases
            + self.negative_durations
            + self.non_numeric_magnitudes
    }
}

/// Decode output: clean records + rejected records + per-row faults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodeReport {
    pub records: Vec<OutbreakRecord>,
    pub invalid: Vec<InvalidRecord>,
    pub faults: Vec<RowFault>,
    pub rows_read: usize,
}

impl DecodeReport {
    pub fn fault_counts(&self) -> FaultCounts {
        let mut counts = FaultCounts::default();
        for f in &self.faults {
            match f.fault {
                DecodeFault::RowDecode { .. } => counts.dropped_rows += 1,
                DecodeFault::AmbiguousRelease { .. } => counts.ambiguous_releases += 1,
                DecodeFault::UnparseableReleaseDate { .. } => counts.unparseable_releases += 1,
                DecodeFault::NegativeDuration { .. } => counts.negative_durations += 1,
                DecodeFault::NonNumericMagnitude { .. } => counts.non_numeric_magnitudes += 1,
            }
        }
        counts
    }

    pub fn active_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_active()).count()
    }
}

/// Decode every data row of `table` into outbreak records.
///
/// A table without a label row decodes to an empty report. Records rejected
/// for a negative duration go to `invalid` and never reach the panel.
pub fn decode(table: &WideTable, config: &DecodeConfig) -> DecodeReport {
    let mut report = DecodeReport::default();

    let Some(label_row) = table.rows.get(config.label_row) else {
        return report;
    };
    let labels: Vec<Option<&str>> = label_row
        .iter()
        .skip(config.prefix_width)
        .map(|c| c.as_deref())
        .collect();

    for (idx, row) in table.rows.iter().skip(config.label_row + 1).enumerate() {
        let line = idx + 1;
        report.rows_read += 1;
        decode_row(row, line, &labels, config, &mut report);
    }

    report
}

fn decode_row(
    row: &[Option<String>],
    line: usize,
    labels: &[Option<&str>],
    config: &DecodeConfig,
    report: &mut DecodeReport,
) {
    let (metadata, release_cells) = row.split_at(config.prefix_width.min(row.len()));

    let confirmed_raw = cell_text(metadata, COL_CONFIRMED);
    let Some(confirmed) = confirmed_raw.and_then(|s| parse_date(s, &config.date_format)) else {
        report.faults.push(RowFault {
            row: line,
            fault: DecodeFault::RowDecode {
                raw: confirmed_raw.map(str::to_string),
            },
        });
        return;
    };

    let scan = scan_release_columns(release_cells);

    let (column, magnitude) = match scan {
        ReleaseScan::Active => (None, Some(0.0)),
        ReleaseScan::Resolved { column, magnitude } => (Some(column), magnitude),
        ReleaseScan::Ambiguous {
            column,
            magnitude,
            extra,
        } => {
            report.faults.push(RowFault {
                row: line,
                fault: DecodeFault::AmbiguousRelease {
                    selected: config.prefix_width + column,
                    extra,
                },
            });
            (Some(column), magnitude)
        }
    };

    let affected_count = match (column, magnitude) {
        (Some(col), None) => {
            let raw = cell_text(release_cells, col).unwrap_or_default().to_string();
            report.faults.push(RowFault {
                row: line,
                fault: DecodeFault::NonNumericMagnitude { raw },
            });
            0.0
        }
        (_, m) => m.unwrap_or(0.0),
    };

    let release = match column {
        None => None,
        Some(col) => {
            let label = labels.get(col).copied().flatten().map(str::trim);
            match label {
                Some(l) if is_sentinel(l, config) => None,
                Some(l) if !l.is_empty() => {
                    let parsed = parse_date(l, &config.date_format);
                    if parsed.is_none() {
                        report.faults.push(RowFault {
                            row: line,
                            fault: DecodeFault::UnparseableReleaseDate {
                                raw: Some(l.to_string()),
                            },
                        });
                    }
                    parsed
                }
                _ => {
                    report.faults.push(RowFault {
                        row: line,
                        fault: DecodeFault::UnparseableReleaseDate { raw: None },
                    });
                    None
                }
            }
        }
    };

    let state = cell_text(metadata, COL_STATE).unwrap_or_default();
    let county = cell_text(metadata, COL_COUNTY).unwrap_or_default();
    let production = cell_text(metadata, COL_PRODUCTION).unwrap_or_default();

    match OutbreakRecord::new(confirmed, state, county, production, Some(affected_count), release) {
        Ok(record) => report.records.push(record),
        Err(neg) => {
            report.faults.push(RowFault {
                row: line,
                fault: DecodeFault::NegativeDuration { days: neg.days },
            });
            if let Some(release_date) = release {
                report.invalid.push(InvalidRecord {
                    row: line,
                    confirmation_date: confirmed,
                    release_date,
                    days_to_release: neg.days,
                });
            }
        }
    }
}

/// Scan release cells left to right; the leftmost populated cell wins.
pub fn scan_release_columns(cells: &[Option<String>]) -> ReleaseScan {
    let mut populated = cells
        .iter()
        .enumerate()
        .filter_map(|(idx, c)| non_blank(c.as_deref()).map(|s| (idx, s)));

    let Some((column, text)) = populated.next() else {
        return ReleaseScan::Active;
    };
    let magnitude = parse_magnitude(text);
    let extra = populated.count();

    if extra == 0 {
        ReleaseScan::Resolved { column, magnitude }
    } else {
        ReleaseScan::Ambiguous {
            column,
            magnitude,
            extra,
        }
    }
}

/// Convert decoded records into event observations keyed by confirmation date.
pub fn records_to_observations(records: &[OutbreakRecord]) -> Vec<RawObservation> {
    records
        .iter()
        .map(|r| RawObservation::new(r.confirmation_date(), r.affected_count()))
        .collect()
}

fn is_sentinel(label: &str, config: &DecodeConfig) -> bool {
    label.eq_ignore_ascii_case(config.active_label.trim())
        || label.eq_ignore_ascii_case(config.not_applicable_label.trim())
}

fn cell_text(row: &[Option<String>], idx: usize) -> Option<&str> {
    row.get(idx).and_then(|c| non_blank(c.as_deref()))
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_date(s: &str, fmt: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), fmt).ok()
}

fn parse_magnitude(s: &str) -> Option<f64> {
    let cleaned: String = s.chars().filter(|c| *c != ',').collect();
    let v = cleaned.trim().parse::<f64>().ok()?;
    if v.is_finite() && v >= 0.0 { Some(v) } else { None }
}
