//! Multi-source alignment and tiered gap filling.
//!
//! All monthly columns are outer-joined onto one contiguous calendar, then gaps
//! are resolved column by column in a fixed order:
//!
//! 1. bounded forward fill (`ffill_window`)
//! 2. bounded backward fill of leading gaps only (`bfill_window`)
//! 3. event columns: every month without an observation is forced to 0
//! 4. anything still missing becomes 0
//!
//! The tiers do not commute. Step 3 must see the output of 1–2 so it can undo
//! any value carried into an event column.

use std::collections::HashSet;

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::{
    CellOrigin, ColumnKind, FillStats, FillWindows, MergedPanel, Month, MonthlyColumn, PanelRow, is_month_start,
};

/// Input that cannot be placed on a monthly calendar.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MergeError {
    #[error("column `{column}`: {date} is not a month start")]
    NotMonthStart { column: String, date: NaiveDate },
    #[error("column `{column}`: month keys not strictly increasing at {date} (after {previous})")]
    NonMonotonic {
        column: String,
        previous: NaiveDate,
        date: NaiveDate,
    },
    #[error("column `{column}`: non-finite value at {date}")]
    NonFiniteValue { column: String, date: NaiveDate },
    #[error("duplicate column `{0}`")]
    DuplicateColumn(String),
    #[error("event column `{0}` is not among the merged columns")]
    UnknownEventColumn(String),
}

/// Outer-join `columns` onto a contiguous monthly calendar and fill every gap.
///
/// Columns listed in `event_columns` (or whose kind is `Event`) get the
/// zero-override tier. Column order in the panel follows `columns`.
pub fn merge(
    columns: &[MonthlyColumn],
    event_columns: &[String],
    windows: FillWindows,
) -> Result<MergedPanel, MergeError> {
    validate(columns, event_columns)?;

    let calendar = calendar_span(columns);

    let mut names = Vec::with_capacity(columns.len());
    let mut kinds = Vec::with_capacity(columns.len());
    let mut filled = Vec::with_capacity(columns.len());
    let mut fill_stats = Vec::with_capacity(columns.len());

    for col in columns {
        let is_event = col.kind == ColumnKind::Event || event_columns.contains(&col.name);
        let aligned = align(col, &calendar);
        let (values, origins) = fill_column(&aligned, is_event, windows);

        let mut stats = FillStats::default();
        for origin in origins {
            stats.record(origin);
        }

        names.push(col.name.clone());
        kinds.push(if is_event { ColumnKind::Event } else { ColumnKind::Continuous });
        filled.push(values);
        fill_stats.push(stats);
    }

    let rows = calendar
        .iter()
        .enumerate()
        .map(|(i, month)| PanelRow {
            month: *month,
            values: filled.iter().map(|col| col[i]).collect(),
        })
        .collect();

    Ok(MergedPanel {
        columns: names,
        kinds,
        rows,
        fill_stats,
    })
}

/// Convenience wrapper: event columns are taken from each column's kind.
pub fn merge_columns(columns: &[MonthlyColumn], windows: FillWindows) -> Result<MergedPanel, MergeError> {
    merge(columns, &[], windows)
}

fn validate(columns: &[MonthlyColumn], event_columns: &[String]) -> Result<(), MergeError> {
    let mut seen = HashSet::new();
    for col in columns {
        if !seen.insert(col.name.as_str()) {
            return Err(MergeError::DuplicateColumn(col.name.clone()));
        }

        let mut previous: Option<NaiveDate> = None;
        for &(date, value) in &col.values {
            if !is_month_start(date) {
                return Err(MergeError::NotMonthStart {
                    column: col.name.clone(),
                    date,
                });
            }
            if let Some(prev) = previous {
                if date <= prev {
                    return Err(MergeError::NonMonotonic {
                        column: col.name.clone(),
                        previous: prev,
                        date,
                    });
                }
            }
            if !value.is_finite() {
                return Err(MergeError::NonFiniteValue {
                    column: col.name.clone(),
                    date,
                });
            }
            previous = Some(date);
        }
    }

    for name in event_columns {
        if !seen.contains(name.as_str()) {
            return Err(MergeError::UnknownEventColumn(name.clone()));
        }
    }

    Ok(())
}

/// Every month from the earliest to the latest key across all columns.
fn calendar_span(columns: &[MonthlyColumn]) -> Vec<NaiveDate> {
    let first = columns.iter().filter_map(|c| c.values.first().map(|v| v.0)).min();
    let last = columns.iter().filter_map(|c| c.values.last().map(|v| v.0)).max();

    let (Some(first), Some(last)) = (first, last) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    let mut month = Month::containing(first);
    while month.start() <= last {
        out.push(month.start());
        month = month.succ();
    }
    out
}

fn align(col: &MonthlyColumn, calendar: &[NaiveDate]) -> Vec<Option<f64>> {
    let mut out = vec![None; calendar.len()];
    let mut values = col.values.iter().peekable();
    for (slot, month) in out.iter_mut().zip(calendar) {
        if let Some(&&(date, v)) = values.peek() {
            if date == *month {
                *slot = Some(v);
                values.next();
            }
        }
    }
    out
}

/// Apply the fill tiers to one aligned column.
fn fill_column(aligned: &[Option<f64>], is_event: bool, windows: FillWindows) -> (Vec<f64>, Vec<CellOrigin>) {
    let mut cells: Vec<Option<(f64, CellOrigin)>> =
        aligned.iter().map(|v| v.map(|x| (x, CellOrigin::Observed))).collect();

    // Forward fill, counted from the last observed month.
    let mut last: Option<(usize, f64)> = None;
    for (i, cell) in cells.iter_mut().enumerate() {
        match (aligned[i], last) {
            (Some(v), _) => last = Some((i, v)),
            (None, Some((j, v))) if i - j <= windows.ffill_window => {
                *cell = Some((v, CellOrigin::ForwardFilled));
            }
            _ => {}
        }
    }

    // Backward fill: only the gap before the first observation.
    if let Some(first) = aligned.iter().position(Option::is_some) {
        let v = aligned[first].unwrap_or_default();
        let from = first.saturating_sub(windows.bfill_window);
        for cell in &mut cells[from..first] {
            *cell = Some((v, CellOrigin::BackwardFilled));
        }
    }

    // Event columns: no observation means zero occurrences.
    if is_event {
        for (cell, observed) in cells.iter_mut().zip(aligned) {
            if observed.is_none() {
                *cell = Some((0.0, CellOrigin::EventZero));
            }
        }
    }

    cells
        .into_iter()
        .map(|cell| cell.unwrap_or((0.0, CellOrigin::ResidualZero)))
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn continuous(name: &str, values: &[(NaiveDate, f64)]) -> MonthlyColumn {
        MonthlyColumn {
            name: name.to_string(),
            kind: ColumnKind::Continuous,
            values: values.to_vec(),
        }
    }

    fn event(name: &str, values: &[(NaiveDate, f64)]) -> MonthlyColumn {
        MonthlyColumn {
            name: name.to_string(),
            kind: ColumnKind::Event,
            values: values.to_vec(),
        }
    }

    fn column_values(panel: &MergedPanel, name: &str) -> Vec<f64> {
        let idx = panel.column_index(name).unwrap();
        panel.rows.iter().map(|r| r.values[idx]).collect()
    }

    #[test]
    fn forward_fill_covers_short_gap_and_events_stay_zero() {
        let a = continuous("a", &[(d(2020, 1), 1.0), (d(2020, 2), 2.0), (d(2020, 5), 5.0)]);
        let count = event("b_count", &[(d(2020, 4), 1.0)]);
        let sum = event("b_birds_sum", &[(d(2020, 4), 500.0)]);

        let panel = merge(&[a, count, sum], &[], FillWindows::default()).unwrap();

        let months: Vec<NaiveDate> = panel.rows.iter().map(|r| r.month).collect();
        assert_eq!(months, vec![d(2020, 1), d(2020, 2), d(2020, 3), d(2020, 4), d(2020, 5)]);
        assert_eq!(column_values(&panel, "a"), vec![1.0, 2.0, 2.0, 2.0, 5.0]);
        assert_eq!(column_values(&panel, "b_count"), vec![0.0, 0.0, 0.0, 1.0, 0.0]);
        assert_eq!(column_values(&panel, "b_birds_sum"), vec![0.0, 0.0, 0.0, 500.0, 0.0]);
        assert_eq!(panel.fill_stats[0].forward_filled, 2);
        assert_eq!(panel.fill_stats[1].event_zeroed, 4);
    }

    #[test]
    fn forward_fill_stops_at_window_then_residual_zero() {
        let a = continuous("a", &[(d(2020, 1), 7.0), (d(2020, 7), 9.0)]);
        let panel = merge(&[a], &[], FillWindows::default()).unwrap();

        assert_eq!(column_values(&panel, "a"), vec![7.0, 7.0, 7.0, 7.0, 0.0, 0.0, 9.0]);
        assert_eq!(panel.fill_stats[0].forward_filled, 3);
        assert_eq!(panel.fill_stats[0].residual_zeroed, 2);
    }

    #[test]
    fn backward_fill_only_patches_short_leading_gap() {
        let early = continuous("early", &[(d(2020, 1), 1.0), (d(2020, 4), 4.0)]);
        let late = continuous("late", &[(d(2020, 4), 40.0)]);
        let panel = merge(&[early, late], &[], FillWindows::default()).unwrap();

        // Three leading gaps, bfill window of one: only March is patched.
        assert_eq!(column_values(&panel, "late"), vec![0.0, 0.0, 40.0, 40.0]);
        assert_eq!(panel.fill_stats[1].backward_filled, 1);
        assert_eq!(panel.fill_stats[1].residual_zeroed, 2);
    }

    #[test]
    fn named_event_column_is_never_forward_filled() {
        let counts = continuous("outbreaks", &[(d(2021, 1), 3.0), (d(2021, 4), 1.0)]);
        let panel = merge(&[counts], &["outbreaks".to_string()], FillWindows::default()).unwrap();

        assert_eq!(column_values(&panel, "outbreaks"), vec![3.0, 0.0, 0.0, 1.0]);
        assert_eq!(panel.kinds, vec![ColumnKind::Event]);
    }

    #[test]
    fn calendar_includes_months_missing_from_every_source() {
        let a = continuous("a", &[(d(2019, 11), 1.0)]);
        let b = continuous("b", &[(d(2020, 2), 2.0)]);
        let panel = merge(&[a, b], &[], FillWindows { ffill_window: 0, bfill_window: 0 }).unwrap();

        let months: Vec<NaiveDate> = panel.rows.iter().map(|r| r.month).collect();
        assert_eq!(months, vec![d(2019, 11), d(2019, 12), d(2020, 1), d(2020, 2)]);
        assert!(panel.rows.iter().all(|r| r.values.iter().all(|v| v.is_finite())));
    }

    #[test]
    fn merge_is_idempotent_on_complete_panel() {
        let a = continuous("a", &[(d(2020, 1), 1.0), (d(2020, 3), 3.0)]);
        let b = event("b_count", &[(d(2020, 2), 2.0)]);
        let once = merge(&[a, b], &[], FillWindows::default()).unwrap();
        let twice = merge(&once.to_columns(), &[], FillWindows::default()).unwrap();

        assert_eq!(once.columns, twice.columns);
        assert_eq!(once.rows, twice.rows);
    }

    #[test]
    fn rejects_non_month_start_keys() {
        let bad = continuous("a", &[(NaiveDate::from_ymd_opt(2020, 1, 15).unwrap(), 1.0)]);
        let err = merge(&[bad], &[], FillWindows::default()).unwrap_err();
        assert!(matches!(err, MergeError::NotMonthStart { .. }));
    }

    #[test]
    fn rejects_non_monotonic_keys() {
        let bad = continuous("a", &[(d(2020, 3), 1.0), (d(2020, 2), 2.0)]);
        let err = merge(&[bad], &[], FillWindows::default()).unwrap_err();
        assert_eq!(
            err,
            MergeError::NonMonotonic {
                column: "a".to_string(),
                previous: d(2020, 3),
                date: d(2020, 2),
            }
        );
    }

    #[test]
    fn rejects_duplicate_and_unknown_columns() {
        let a = continuous("a", &[(d(2020, 1), 1.0)]);
        let err = merge(&[a.clone(), a.clone()], &[], FillWindows::default()).unwrap_err();
        assert_eq!(err, MergeError::DuplicateColumn("a".to_string()));

        let err = merge(&[a], &["nope".to_string()], FillWindows::default()).unwrap_err();
        assert_eq!(err, MergeError::UnknownEventColumn("nope".to_string()));
    }

    #[test]
    fn empty_input_yields_empty_panel() {
        let panel = merge_columns(&[], FillWindows::default()).unwrap();
        assert!(panel.rows.is_empty());
        assert!(panel.columns.is_empty());
    }
}
