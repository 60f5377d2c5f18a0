//! Source manifest: which series to pull and how to combine them.
//!
//! The manifest is a JSON file so a run is reproducible from one artifact:
//!
//! ```json
//! {
//!   "sources": [
//!     {"name": "cpi", "provider": {"fred": {"series_id": "CPIAUCSL"}}, "policy": "mean"},
//!     {"name": "wheat", "provider": {"csv": {"path": "wheat.csv"}}, "policy": "mean"}
//!   ],
//!   "outbreaks": {"name": "hpai", "path": "hpai.csv", "magnitude_field": "birds_affected"},
//!   "fill": {"ffill_window": 3, "bfill_window": 1}
//! }
//! ```
//!
//! Relative paths are resolved against the manifest's directory.

use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decode::DecodeConfig;
use crate::domain::{AggregationPolicy, FillWindows};
use crate::error::AppError;
use crate::io::ingest::ObservationCsvSpec;

/// Where a source's raw observations come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Fred { series_id: String },
    Yahoo { symbol: String },
    Csv {
        path: PathBuf,
        #[serde(default)]
        layout: ObservationCsvSpec,
    },
}

/// One named source and its monthly aggregation policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub name: String,
    pub provider: Provider,
    pub policy: AggregationPolicy,
}

/// The wide outbreak table and how to decode it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutbreakSpec {
    pub name: String,
    pub path: PathBuf,
    #[serde(default = "default_magnitude_field")]
    pub magnitude_field: String,
    #[serde(default)]
    pub decode: DecodeConfig,
}

fn default_magnitude_field() -> String {
    "affected".to_string()
}

impl OutbreakSpec {
    pub fn policy(&self) -> AggregationPolicy {
        AggregationPolicy::Event {
            magnitude_field: self.magnitude_field.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub sources: Vec<SourceSpec>,
    #[serde(default)]
    pub outbreaks: Option<OutbreakSpec>,
    #[serde(default)]
    pub fill: FillWindows,
    /// Earliest observation date requested from remote providers.
    #[serde(default)]
    pub observation_start: Option<NaiveDate>,
}

impl Manifest {
    /// Names of every series that will appear in the panel, in order.
    pub fn series_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sources.iter().map(|s| s.name.as_str()).collect();
        if let Some(o) = &self.outbreaks {
            names.push(o.name.as_str());
        }
        names
    }

    fn resolve_paths(&mut self, base: &Path) {
        for source in &mut self.sources {
            if let Provider::Csv { path, .. } = &mut source.provider {
                if path.is_relative() {
                    *path = base.join(&*path);
                }
            }
        }
        if let Some(o) = &mut self.outbreaks {
            if o.path.is_relative() {
                o.path = base.join(&o.path);
            }
        }
    }

    fn validate(&self) -> Result<(), AppError> {
        let names = self.series_names();
        if names.is_empty() {
            return Err(AppError::new(2, "Manifest declares no sources."));
        }
        let mut seen = HashSet::new();
        for name in names {
            if name.trim().is_empty() {
                return Err(AppError::new(2, "Manifest source with empty name."));
            }
            if !seen.insert(name) {
                return Err(AppError::new(2, format!("Duplicate source name `{name}` in manifest.")));
            }
        }
        Ok(())
    }
}

/// Load, validate and path-resolve a manifest file.
pub fn load_manifest(path: &Path) -> Result<Manifest, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open manifest '{}': {e}", path.display())))?;
    let mut manifest: Manifest =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid manifest JSON: {e}")))?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    manifest.resolve_paths(base);
    manifest.validate()?;
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Manifest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn parses_all_provider_kinds_and_defaults() {
        let m = parse(
            r#"{
                "sources": [
                    {"name": "cpi", "provider": {"fred": {"series_id": "CPIAUCSL"}}, "policy": "mean"},
                    {"name": "corn", "provider": {"yahoo": {"symbol": "ZC=F"}}, "policy": "mean"},
                    {"name": "eggs", "provider": {"csv": {"path": "eggs.csv", "layout": {"value_column": "price"}}}, "policy": "mean"}
                ],
                "outbreaks": {"name": "hpai", "path": "hpai.csv", "magnitude_field": "birds_affected"}
            }"#,
        );

        assert_eq!(m.fill, FillWindows::default());
        assert_eq!(m.series_names(), vec!["cpi", "corn", "eggs", "hpai"]);
        match &m.sources[2].provider {
            Provider::Csv { layout, .. } => {
                assert_eq!(layout.value_column, "price");
                assert_eq!(layout.date_column, "date");
            }
            other => panic!("unexpected provider {other:?}"),
        }
        let outbreaks = m.outbreaks.as_ref().unwrap();
        assert_eq!(outbreaks.decode, DecodeConfig::default());
        assert!(outbreaks.policy().is_event());
    }

    #[test]
    fn event_policy_for_regular_sources() {
        let m = parse(
            r#"{"sources": [{"name": "recalls", "provider": {"csv": {"path": "r.csv"}},
                "policy": {"event": {"magnitude_field": "units"}}}]}"#,
        );
        assert_eq!(
            m.sources[0].policy,
            AggregationPolicy::Event {
                magnitude_field: "units".to_string()
            }
        );
    }

    #[test]
    fn relative_paths_resolve_against_manifest_dir() {
        let mut m = parse(
            r#"{"sources": [{"name": "eggs", "provider": {"csv": {"path": "eggs.csv"}}, "policy": "mean"}],
                "outbreaks": {"name": "hpai", "path": "/abs/hpai.csv"}}"#,
        );
        m.resolve_paths(Path::new("/data/run"));

        match &m.sources[0].provider {
            Provider::Csv { path, .. } => assert_eq!(path, &PathBuf::from("/data/run/eggs.csv")),
            other => panic!("unexpected provider {other:?}"),
        }
        assert_eq!(m.outbreaks.unwrap().path, PathBuf::from("/abs/hpai.csv"));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let m = parse(
            r#"{"sources": [
                {"name": "cpi", "provider": {"fred": {"series_id": "A"}}, "policy": "mean"},
                {"name": "cpi", "provider": {"fred": {"series_id": "B"}}, "policy": "mean"}
            ]}"#,
        );
        assert_eq!(m.validate().unwrap_err().exit_code(), 2);
    }
}
