//! Extraction: pull raw observations for every manifest source.
//!
//! Each source is one independent request (or file read), so sources are
//! fetched in parallel. Results come back in manifest order.

use chrono::NaiveDate;
use log::{info, warn};
use rayon::prelude::*;

use crate::domain::RawObservation;
use crate::error::AppError;
use crate::io::ingest::load_observations_csv;
use crate::io::manifest::{Provider, SourceSpec};

pub mod fred;
pub mod yahoo;

pub use fred::FredClient;
pub use yahoo::YahooClient;

/// Raw observations for one source, ready for resampling.
#[derive(Debug, Clone)]
pub struct FetchedSource {
    pub spec: SourceSpec,
    pub observations: Vec<RawObservation>,
}

/// Fetch every source; the first failure aborts the run.
pub fn fetch_sources(
    sources: &[SourceSpec],
    observation_start: Option<NaiveDate>,
) -> Result<Vec<FetchedSource>, AppError> {
    // Clients are only built when a source needs them, so a CSV-only manifest
    // does not require FRED_API_KEY.
    let fred = if sources.iter().any(|s| matches!(s.provider, Provider::Fred { .. })) {
        Some(FredClient::from_env()?)
    } else {
        None
    };
    let yahoo = if sources.iter().any(|s| matches!(s.provider, Provider::Yahoo { .. })) {
        Some(YahooClient::new()?)
    } else {
        None
    };

    sources
        .par_iter()
        .map(|spec| -> Result<FetchedSource, AppError> {
            let observations = match &spec.provider {
                Provider::Fred { series_id } => {
                    let client = fred
                        .as_ref()
                        .ok_or_else(|| AppError::new(2, "FRED client not configured."))?;
                    client.fetch_series(series_id, observation_start)?
                }
                Provider::Yahoo { symbol } => {
                    let client = yahoo
                        .as_ref()
                        .ok_or_else(|| AppError::new(2, "Yahoo client not configured."))?;
                    client.fetch_closes(symbol, observation_start)?
                }
                Provider::Csv { path, layout } => {
                    let ingested = load_observations_csv(path, layout)?;
                    if !ingested.row_errors.is_empty() {
                        warn!(
                            "{}: skipped {} of {} rows in '{}' (first: line {}: {})",
                            spec.name,
                            ingested.row_errors.len(),
                            ingested.rows_read,
                            path.display(),
                            ingested.row_errors[0].line,
                            ingested.row_errors[0].message,
                        );
                    }
                    ingested.observations
                }
            };

            let missing = observations.iter().filter(|o| o.value.is_none()).count();
            info!(
                "{}: {} observations ({} missing values)",
                spec.name,
                observations.len(),
                missing
            );

            Ok(FetchedSource {
                spec: spec.clone(),
                observations,
            })
        })
        .collect()
}
