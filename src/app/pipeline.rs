//! Shared harmonization pipeline used by the CLI commands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! fetch/load -> decode outbreaks -> resample every source -> merge + fill
//!
//! `harmonize` is the IO-free half so the whole chain is testable in-process.

use log::{info, warn};

use crate::data::{FetchedSource, fetch_sources};
use crate::decode::{DecodeReport, decode, records_to_observations};
use crate::domain::{ColumnKind, FillWindows, MergedPanel, MonthlySeries};
use crate::error::AppError;
use crate::io::ingest::load_wide_table;
use crate::io::manifest::{Manifest, OutbreakSpec};
use crate::merge::merge;
use crate::resample::resample;

/// All computed outputs of a single `tsh run`.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub series: Vec<MonthlySeries>,
    pub decode: Option<DecodeReport>,
    pub panel: MergedPanel,
}

/// Execute the full pipeline for `manifest`.
pub fn run_pipeline(manifest: &Manifest, fill: FillWindows) -> Result<RunOutput, AppError> {
    // 1) Extract every remote/file source.
    let fetched = fetch_sources(&manifest.sources, manifest.observation_start)?;

    // 2) Decode the outbreak table, if any.
    let decoded = match &manifest.outbreaks {
        Some(spec) => {
            let table = load_wide_table(&spec.path)?;
            let report = decode(&table, &spec.decode);
            log_decode_report(&spec.name, &report);
            Some((spec, report))
        }
        None => None,
    };

    harmonize(&fetched, decoded, fill)
}

/// Resample every source and merge them into one panel.
///
/// Panel column order: manifest sources in order, then the outbreak series.
pub fn harmonize(
    fetched: &[FetchedSource],
    outbreaks: Option<(&OutbreakSpec, DecodeReport)>,
    fill: FillWindows,
) -> Result<RunOutput, AppError> {
    let mut series: Vec<MonthlySeries> = fetched
        .iter()
        .map(|f| resample(&f.spec.name, &f.observations, &f.spec.policy))
        .collect();

    let decode = match outbreaks {
        Some((spec, report)) => {
            let observations = records_to_observations(&report.records);
            series.push(resample(&spec.name, &observations, &spec.policy()));
            Some(report)
        }
        None => None,
    };

    for s in &series {
        if s.points.is_empty() {
            warn!("{}: no monthly values after resampling", s.name);
        }
    }

    let columns: Vec<_> = series.iter().flat_map(MonthlySeries::columns).collect();
    let event_columns: Vec<String> = columns
        .iter()
        .filter(|c| c.kind == ColumnKind::Event)
        .map(|c| c.name.clone())
        .collect();

    let panel = merge(&columns, &event_columns, fill)?;
    if panel.rows.is_empty() {
        return Err(AppError::new(3, "No observations in any source; nothing to merge."));
    }

    info!(
        "merged {} column(s) over {} month(s)",
        panel.columns.len(),
        panel.rows.len()
    );

    Ok(RunOutput { series, decode, panel })
}

pub fn log_decode_report(name: &str, report: &DecodeReport) {
    let counts = report.fault_counts();
    info!(
        "{name}: decoded {} of {} row(s), {} active",
        report.records.len(),
        report.rows_read,
        report.active_count()
    );
    if counts.total() > 0 {
        warn!(
            "{name}: {} dropped row(s), {} ambiguous release(s), {} unparseable release label(s), \
             {} negative duration(s), {} non-numeric count(s)",
            counts.dropped_rows,
            counts.ambiguous_releases,
            counts.unparseable_releases,
            counts.negative_durations,
            counts.non_numeric_magnitudes
        );
    }
    for f in &report.faults {
        log::debug!("{name}: row {}: {}", f.row, f.fault);
    }
}
