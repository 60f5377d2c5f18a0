//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - produced by the extraction/ingest wrappers
//! - passed through the decode → resample → merge core
//! - exported to CSV/JSON at the end of a run

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// One reported value of a single source at a single timestamp.
///
/// `value` is `None` when the upstream reports a missing point (FRED uses `"."`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

impl RawObservation {
    pub fn new(date: NaiveDate, value: Option<f64>) -> Self {
        Self { date, value }
    }
}

/// How a source is collapsed to one value per calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationPolicy {
    /// Continuous measurement: monthly average.
    Mean,
    /// Occurrence data: monthly event count plus the sum of `magnitude_field`.
    Event { magnitude_field: String },
}

impl AggregationPolicy {
    pub fn is_event(&self) -> bool {
        matches!(self, AggregationPolicy::Event { .. })
    }
}

/// A decoded outbreak event.
///
/// Fields are private so the duration invariant cannot be broken after
/// construction: `days_to_release` exists iff `release_date` exists, and is
/// never negative.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutbreakRecord {
    confirmation_date: NaiveDate,
    state: String,
    county: String,
    production_type: String,
    affected_count: Option<f64>,
    release_date: Option<NaiveDate>,
    days_to_release: Option<i64>,
}

/// Returned by [`OutbreakRecord::new`] when the release precedes confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegativeDuration {
    pub days: i64,
}

impl OutbreakRecord {
    pub fn new(
        confirmation_date: NaiveDate,
        state: impl Into<String>,
        county: impl Into<String>,
        production_type: impl Into<String>,
        affected_count: Option<f64>,
        release_date: Option<NaiveDate>,
    ) -> Result<Self, NegativeDuration> {
        let days_to_release = match release_date {
            Some(release) => {
                let days = (release - confirmation_date).num_days();
                if days < 0 {
                    return Err(NegativeDuration { days });
                }
                Some(days)
            }
            None => None,
        };

        Ok(Self {
            confirmation_date,
            state: state.into(),
            county: county.into(),
            production_type: production_type.into(),
            affected_count: affected_count.filter(|v| v.is_finite() && *v >= 0.0),
            release_date,
            days_to_release,
        })
    }

    pub fn confirmation_date(&self) -> NaiveDate {
        self.confirmation_date
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn county(&self) -> &str {
        &self.county
    }

    pub fn production_type(&self) -> &str {
        &self.production_type
    }

    pub fn affected_count(&self) -> Option<f64> {
        self.affected_count
    }

    pub fn release_date(&self) -> Option<NaiveDate> {
        self.release_date
    }

    pub fn days_to_release(&self) -> Option<i64> {
        self.days_to_release
    }

    /// An outbreak without a release date is still active.
    pub fn is_active(&self) -> bool {
        self.release_date.is_none()
    }
}

/// One month's aggregate for a single source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MonthlyValue {
    Mean(f64),
    Event { count: u64, magnitude_sum: f64 },
}

/// A single source normalized to month-start keys.
///
/// Months with no data are absent rather than defaulted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySeries {
    pub name: String,
    pub policy: AggregationPolicy,
    pub points: BTreeMap<NaiveDate, MonthlyValue>,
}

/// Whether a merged column carries a continuous measure or an event-derived count/sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Continuous,
    Event,
}

/// A named, month-keyed column as consumed by the merger.
///
/// `values` must be sorted by strictly increasing month-start dates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyColumn {
    pub name: String,
    pub kind: ColumnKind,
    pub values: Vec<(NaiveDate, f64)>,
}

impl MonthlySeries {
    /// Flatten into the columns this series contributes to a panel.
    ///
    /// Mean series contribute one column named after the series; event series
    /// contribute a count column followed by a magnitude-sum column.
    pub fn columns(&self) -> Vec<MonthlyColumn> {
        match &self.policy {
            AggregationPolicy::Mean => {
                let values = self
                    .points
                    .iter()
                    .filter_map(|(month, v)| match v {
                        MonthlyValue::Mean(x) => Some((*month, *x)),
                        MonthlyValue::Event { .. } => None,
                    })
                    .collect();
                vec![MonthlyColumn {
                    name: self.name.clone(),
                    kind: ColumnKind::Continuous,
                    values,
                }]
            }
            AggregationPolicy::Event { magnitude_field } => {
                let mut counts = Vec::with_capacity(self.points.len());
                let mut sums = Vec::with_capacity(self.points.len());
                for (month, v) in &self.points {
                    if let MonthlyValue::Event { count, magnitude_sum } = v {
                        counts.push((*month, *count as f64));
                        sums.push((*month, *magnitude_sum));
                    }
                }
                vec![
                    MonthlyColumn {
                        name: format!("{}_count", self.name),
                        kind: ColumnKind::Event,
                        values: counts,
                    },
                    MonthlyColumn {
                        name: format!("{}_{magnitude_field}_sum", self.name),
                        kind: ColumnKind::Event,
                        values: sums,
                    },
                ]
            }
        }
    }
}

/// Bounds for the forward/backward fill tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FillWindows {
    /// Max consecutive months a value is carried forward.
    pub ffill_window: usize,
    /// Max months a series' first value is carried backward over leading gaps.
    pub bfill_window: usize,
}

impl Default for FillWindows {
    fn default() -> Self {
        Self {
            ffill_window: 3,
            bfill_window: 1,
        }
    }
}

/// Where a merged cell's final value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CellOrigin {
    Observed,
    ForwardFilled,
    BackwardFilled,
    EventZero,
    ResidualZero,
}

/// Per-column counts of how each cell was resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FillStats {
    pub observed: usize,
    pub forward_filled: usize,
    pub backward_filled: usize,
    pub event_zeroed: usize,
    pub residual_zeroed: usize,
}

impl FillStats {
    pub fn record(&mut self, origin: CellOrigin) {
        match origin {
            CellOrigin::Observed => self.observed += 1,
            CellOrigin::ForwardFilled => self.forward_filled += 1,
            CellOrigin::BackwardFilled => self.backward_filled += 1,
            CellOrigin::EventZero => self.event_zeroed += 1,
            CellOrigin::ResidualZero => self.residual_zeroed += 1,
        }
    }
}

/// One merged month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelRow {
    pub month: NaiveDate,
    /// One value per panel column, in `MergedPanel::columns` order.
    pub values: Vec<f64>,
}

/// Contiguous monthly panel with no null cells.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedPanel {
    pub columns: Vec<String>,
    pub kinds: Vec<ColumnKind>,
    pub rows: Vec<PanelRow>,
    pub fill_stats: Vec<FillStats>,
}

impl MergedPanel {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Value at (`month`, `column`), if both exist.
    pub fn value(&self, month: NaiveDate, column: &str) -> Option<f64> {
        let idx = self.column_index(column)?;
        self.rows
            .iter()
            .find(|r| r.month == month)
            .and_then(|r| r.values.get(idx).copied())
    }

    pub fn first_month(&self) -> Option<NaiveDate> {
        self.rows.first().map(|r| r.month)
    }

    pub fn last_month(&self) -> Option<NaiveDate> {
        self.rows.last().map(|r| r.month)
    }

    /// Re-express the panel as columns, e.g. to feed it back into a merge.
    pub fn to_columns(&self) -> Vec<MonthlyColumn> {
        self.columns
            .iter()
            .zip(&self.kinds)
            .enumerate()
            .map(|(idx, (name, kind))| MonthlyColumn {
                name: name.clone(),
                kind: *kind,
                values: self.rows.iter().map(|r| (r.month, r.values[idx])).collect(),
            })
            .collect()
    }
}

/// A month key (first calendar day of the month).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month(NaiveDate);

impl Month {
    pub fn containing(date: NaiveDate) -> Self {
        Self(month_start(date))
    }

    pub fn start(self) -> NaiveDate {
        self.0
    }

    pub fn succ(self) -> Self {
        let (y, m) = if self.0.month() == 12 {
            (self.0.year() + 1, 1)
        } else {
            (self.0.year(), self.0.month() + 1)
        };
        // Day 1 of a valid month always exists.
        Self(NaiveDate::from_ymd_opt(y, m, 1).unwrap_or(self.0))
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m"))
    }
}

/// First day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn is_month_start(date: NaiveDate) -> bool {
    date.day() == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn month_succ_rolls_over_year() {
        let dec = Month::containing(d(2021, 12, 17));
        assert_eq!(dec.start(), d(2021, 12, 1));
        assert_eq!(dec.succ().start(), d(2022, 1, 1));
        assert_eq!(dec.to_string(), "2021-12");
    }

    #[test]
    fn outbreak_record_rejects_negative_duration() {
        let err = OutbreakRecord::new(d(2022, 3, 10), "IA", "Buena Vista", "Layers", Some(10.0), Some(d(2022, 3, 1)))
            .unwrap_err();
        assert_eq!(err.days, -9);
    }

    #[test]
    fn outbreak_record_duration_present_iff_release() {
        let active = OutbreakRecord::new(d(2022, 3, 10), "IA", "Sac", "Turkeys", Some(5.0), None).unwrap();
        assert!(active.is_active());
        assert_eq!(active.days_to_release(), None);

        let released =
            OutbreakRecord::new(d(2022, 3, 10), "IA", "Sac", "Turkeys", Some(5.0), Some(d(2022, 4, 9))).unwrap();
        assert_eq!(released.days_to_release(), Some(30));
    }

    #[test]
    fn event_series_contributes_count_then_sum_columns() {
        let mut points = BTreeMap::new();
        points.insert(d(2020, 4, 1), MonthlyValue::Event { count: 1, magnitude_sum: 500.0 });
        let series = MonthlySeries {
            name: "hpai".to_string(),
            policy: AggregationPolicy::Event {
                magnitude_field: "birds".to_string(),
            },
            points,
        };

        let cols = series.columns();
        assert_eq!(cols.len(), 2);
        assert_eq!(cols[0].name, "hpai_count");
        assert_eq!(cols[1].name, "hpai_birds_sum");
        assert_eq!(cols[0].values, vec![(d(2020, 4, 1), 1.0)]);
        assert_eq!(cols[1].values, vec![(d(2020, 4, 1), 500.0)]);
        assert!(cols.iter().all(|c| c.kind == ColumnKind::Event));
    }

    #[test]
    fn mean_series_contributes_one_column_named_after_itself() {
        let mut points = BTreeMap::new();
        points.insert(d(2020, 1, 1), MonthlyValue::Mean(100.0));
        let series = MonthlySeries {
            name: "eggs".to_string(),
            policy: AggregationPolicy::Mean,
            points,
        };

        let cols = series.columns();
        assert_eq!(cols.len(), 1);
        assert_eq!(cols[0].name, "eggs");
        assert_eq!(cols[0].kind, ColumnKind::Continuous);
        assert_eq!(cols[0].values, vec![(d(2020, 1, 1), 100.0)]);
    }
}
