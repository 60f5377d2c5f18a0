//! Monthly resampling of a single source.
//!
//! Every observation is bucketed by the first day of its calendar month. Months
//! without usable data are left out; gap handling belongs to the merger.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::domain::{AggregationPolicy, MonthlySeries, MonthlyValue, RawObservation, month_start};

/// Collapse `observations` to one value per month under `policy`.
///
/// - `Mean`: average of the non-null, finite values in the month.
/// - `Event`: number of observations in the month, plus the sum of their
///   non-null magnitudes (a null magnitude still counts as an event).
pub fn resample(name: &str, observations: &[RawObservation], policy: &AggregationPolicy) -> MonthlySeries {
    let points = match policy {
        AggregationPolicy::Mean => monthly_means(observations),
        AggregationPolicy::Event { .. } => monthly_events(observations),
    };

    MonthlySeries {
        name: name.to_string(),
        policy: policy.clone(),
        points,
    }
}

fn monthly_means(observations: &[RawObservation]) -> BTreeMap<NaiveDate, MonthlyValue> {
    let mut acc: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for obs in observations {
        let Some(v) = obs.value.filter(|v| v.is_finite()) else {
            continue;
        };
        let slot = acc.entry(month_start(obs.date)).or_insert((0.0, 0));
        slot.0 += v;
        slot.1 += 1;
    }

    acc.into_iter()
        .map(|(month, (sum, n))| (month, MonthlyValue::Mean(sum / n as f64)))
        .collect()
}

fn monthly_events(observations: &[RawObservation]) -> BTreeMap<NaiveDate, MonthlyValue> {
    let mut acc: BTreeMap<NaiveDate, (u64, f64)> = BTreeMap::new();
    for obs in observations {
        let slot = acc.entry(month_start(obs.date)).or_insert((0, 0.0));
        slot.0 += 1;
        if let Some(v) = obs.value.filter(|v| v.is_finite()) {
            slot.1 += v;
        }
    }

    acc.into_iter()
        .map(|(month, (count, magnitude_sum))| (month, MonthlyValue::Event { count, magnitude_sum }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn obs(date: NaiveDate, value: Option<f64>) -> RawObservation {
        RawObservation::new(date, value)
    }

    #[test]
    fn mean_averages_within_month_and_keys_to_month_start() {
        let input = [
            obs(d(2020, 1, 3), Some(10.0)),
            obs(d(2020, 1, 31), Some(20.0)),
            obs(d(2020, 2, 14), Some(5.0)),
        ];
        let series = resample("wheat", &input, &AggregationPolicy::Mean);

        assert_eq!(series.points.len(), 2);
        assert_eq!(series.points[&d(2020, 1, 1)], MonthlyValue::Mean(15.0));
        assert_eq!(series.points[&d(2020, 2, 1)], MonthlyValue::Mean(5.0));
    }

    #[test]
    fn mean_leaves_empty_months_absent() {
        let input = [
            obs(d(2020, 1, 1), Some(1.0)),
            obs(d(2020, 2, 1), None),
            obs(d(2020, 4, 1), Some(4.0)),
        ];
        let series = resample("cpi", &input, &AggregationPolicy::Mean);

        let months: Vec<NaiveDate> = series.points.keys().copied().collect();
        assert_eq!(months, vec![d(2020, 1, 1), d(2020, 4, 1)]);
    }

    #[test]
    fn event_counts_and_sums_per_month() {
        let policy = AggregationPolicy::Event {
            magnitude_field: "birds".to_string(),
        };
        let input = [
            obs(d(2022, 2, 9), Some(29_000.0)),
            obs(d(2022, 2, 20), None),
            obs(d(2022, 2, 21), Some(1_000.0)),
            obs(d(2022, 5, 2), Some(3.0)),
        ];
        let series = resample("hpai", &input, &policy);

        assert_eq!(
            series.points[&d(2022, 2, 1)],
            MonthlyValue::Event {
                count: 3,
                magnitude_sum: 30_000.0
            }
        );
        assert!(!series.points.contains_key(&d(2022, 3, 1)));
        assert_eq!(series.points.len(), 2);
    }

    #[test]
    fn unsorted_input_produces_ascending_months() {
        let input = [obs(d(2021, 3, 5), Some(3.0)), obs(d(2020, 11, 5), Some(1.0))];
        let series = resample("x", &input, &AggregationPolicy::Mean);
        let months: Vec<NaiveDate> = series.points.keys().copied().collect();
        assert_eq!(months, vec![d(2020, 11, 1), d(2021, 3, 1)]);
    }
}
