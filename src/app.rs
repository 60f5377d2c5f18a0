//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads the manifest and resolves fill windows
//! - runs the pipeline
//! - prints reports
//! - writes optional exports

use clap::Parser;
use log::info;

use crate::cli::{Command, DecodeArgs, RunArgs};
use crate::decode::{DecodeConfig, decode};
use crate::domain::FillWindows;
use crate::error::AppError;
use crate::io::manifest::load_manifest;

pub mod pipeline;

/// Entry point for the `tsh` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Decode(args) => handle_decode(args),
    }
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let manifest = load_manifest(&args.manifest)?;
    let fill = fill_windows_from_args(&args, manifest.fill);
    info!(
        "loaded manifest '{}' ({} source(s)), ffill={} bfill={}",
        args.manifest.display(),
        manifest.series_names().len(),
        fill.ffill_window,
        fill.bfill_window
    );

    let run = pipeline::run_pipeline(&manifest, fill)?;

    println!(
        "{}",
        crate::report::format_run_summary(&run.series, run.decode.as_ref(), &run.panel)
    );
    if args.tail > 0 {
        println!("{}", crate::report::format_panel_tail(&run.panel, args.tail));
    }

    if let Some(path) = &args.out {
        crate::io::export::write_panel_csv(path, &run.panel)?;
        info!("wrote panel CSV to '{}'", path.display());
    }
    if let Some(path) = &args.json {
        crate::io::export::write_panel_json(path, &run.panel)?;
        info!("wrote panel JSON to '{}'", path.display());
    }
    if let Some(path) = &args.records {
        match &run.decode {
            Some(report) => {
                crate::io::export::write_records_csv(path, &report.records)?;
                info!("wrote {} record(s) to '{}'", report.records.len(), path.display());
            }
            None => log::warn!("--records given but the manifest has no outbreak table"),
        }
    }

    Ok(())
}

fn handle_decode(args: DecodeArgs) -> Result<(), AppError> {
    let config = decode_config_from_args(&args);
    let table = crate::io::ingest::load_wide_table(&args.table)?;
    let report = decode(&table, &config);

    let name = args.table.display().to_string();
    pipeline::log_decode_report(&name, &report);
    println!("{}", crate::report::format_decode_summary(&report));

    if args.verbose {
        for f in &report.faults {
            println!("row {}: {}", f.row, f.fault);
        }
    }

    if let Some(path) = &args.out {
        crate::io::export::write_records_csv(path, &report.records)?;
        info!("wrote {} record(s) to '{}'", report.records.len(), path.display());
    }

    Ok(())
}

/// CLI overrides win over the manifest's windows.
pub fn fill_windows_from_args(args: &RunArgs, manifest: FillWindows) -> FillWindows {
    FillWindows {
        ffill_window: args.ffill_window.unwrap_or(manifest.ffill_window),
        bfill_window: args.bfill_window.unwrap_or(manifest.bfill_window),
    }
}

pub fn decode_config_from_args(args: &DecodeArgs) -> DecodeConfig {
    DecodeConfig {
        label_row: args.label_row,
        prefix_width: args.prefix_width,
        date_format: args.date_format.clone(),
        active_label: args.active_label.clone(),
        not_applicable_label: args.not_applicable_label.clone(),
    }
}
