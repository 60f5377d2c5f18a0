//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the core stays free of printing
//! - output changes are localized

use crate::decode::DecodeReport;
use crate::domain::{ColumnKind, MergedPanel, MonthlySeries};

/// Format the full run summary (sources + decode faults + fill statistics).
pub fn format_run_summary(series: &[MonthlySeries], decode: Option<&DecodeReport>, panel: &MergedPanel) -> String {
    let mut out = String::new();

    out.push_str("=== tsh - monthly harmonization ===\n");
    if let (Some(first), Some(last)) = (panel.first_month(), panel.last_month()) {
        out.push_str(&format!(
            "Calendar: {} .. {} ({} months)\n",
            first.format("%Y-%m"),
            last.format("%Y-%m"),
            panel.rows.len()
        ));
    }

    out.push_str("\nSources:\n");
    for s in series {
        let policy = if s.policy.is_event() { "event" } else { "mean" };
        out.push_str(&format!("  {:<24} {:<6} {:>5} month(s)\n", s.name, policy, s.points.len()));
    }

    if let Some(report) = decode {
        out.push('\n');
        out.push_str(&format_decode_summary(report));
    }

    out.push_str("\nFill:\n");
    out.push_str(&format!(
        "  {:<28} {:>8} {:>8} {:>8} {:>8} {:>8}\n",
        "column", "observed", "ffill", "bfill", "ev-zero", "zero"
    ));
    for ((name, kind), stats) in panel.columns.iter().zip(&panel.kinds).zip(&panel.fill_stats) {
        let label = match kind {
            ColumnKind::Event => format!("{name} *"),
            ColumnKind::Continuous => name.clone(),
        };
        out.push_str(&format!(
            "  {:<28} {:>8} {:>8} {:>8} {:>8} {:>8}\n",
            label,
            stats.observed,
            stats.forward_filled,
            stats.backward_filled,
            stats.event_zeroed,
            stats.residual_zeroed
        ));
    }
    out.push_str("  (* event column: months without events are 0)\n");

    out
}

/// Format decode totals and fault counts.
pub fn format_decode_summary(report: &DecodeReport) -> String {
    let counts = report.fault_counts();
    let mut out = String::new();
    out.push_str("Outbreak decode:\n");
    out.push_str(&format!(
        "  rows={} records={} active={} rejected={}\n",
        report.rows_read,
        report.records.len(),
        report.active_count(),
        report.invalid.len()
    ));
    out.push_str(&format!(
        "  faults: dropped={} ambiguous={} bad_release_label={} negative_duration={} non_numeric={}\n",
        counts.dropped_rows,
        counts.ambiguous_releases,
        counts.unparseable_releases,
        counts.negative_durations,
        counts.non_numeric_magnitudes
    ));
    out
}

/// Render the last `n` panel rows as a fixed-width table.
pub fn format_panel_tail(panel: &MergedPanel, n: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:<10}", "month"));
    for c in &panel.columns {
        out.push_str(&format!(" {:>14}", truncate(c, 14)));
    }
    out.push('\n');

    let skip = panel.rows.len().saturating_sub(n);
    for row in panel.rows.iter().skip(skip) {
        out.push_str(&format!("{:<10}", row.month.format("%Y-%m")));
        for v in &row.values {
            out.push_str(&format!(" {v:>14.3}"));
        }
        out.push('\n');
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}
