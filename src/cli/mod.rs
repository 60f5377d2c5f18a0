//! Command-line parsing for the monthly harmonizer.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the decoding/merging code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "tsh", version, about = "Monthly time-series harmonizer (prices + outbreak events)")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch every manifest source, decode outbreaks, and write the merged monthly panel.
    Run(RunArgs),
    /// Decode a wide outbreak table and report data-quality faults.
    Decode(DecodeArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct RunArgs {
    /// Source manifest (JSON).
    #[arg(short = 'm', long, value_name = "JSON")]
    pub manifest: PathBuf,

    /// Override the manifest's forward-fill window (months).
    #[arg(long)]
    pub ffill_window: Option<usize>,

    /// Override the manifest's backward-fill window (months).
    #[arg(long)]
    pub bfill_window: Option<usize>,

    /// Write the merged panel to CSV.
    #[arg(short = 'o', long)]
    pub out: Option<PathBuf>,

    /// Write the merged panel (with fill statistics) to JSON.
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Write decoded outbreak records to CSV.
    #[arg(long)]
    pub records: Option<PathBuf>,

    /// Number of trailing panel rows to print.
    #[arg(long, default_value_t = 12)]
    pub tail: usize,
}

#[derive(Debug, Parser, Clone)]
pub struct DecodeArgs {
    /// Wide outbreak table (CSV).
    #[arg(short = 't', long, value_name = "CSV")]
    pub table: PathBuf,

    /// Index of the label row (rows above it are ignored).
    #[arg(long, default_value_t = 0)]
    pub label_row: usize,

    /// Number of metadata columns before the release columns.
    #[arg(long, default_value_t = 5)]
    pub prefix_width: usize,

    /// Date format for confirmation dates and release labels.
    #[arg(long, default_value = "%d-%b-%y")]
    pub date_format: String,

    /// Label meaning the outbreak is still active.
    #[arg(long, default_value = "Active")]
    pub active_label: String,

    /// Label meaning no release applies.
    #[arg(long, default_value = "N/A")]
    pub not_applicable_label: String,

    /// Write decoded records to CSV.
    #[arg(short = 'o', long)]
    pub out: Option<PathBuf>,

    /// Print every per-row fault.
    #[arg(long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_overrides() {
        let cli = Cli::parse_from(["tsh", "run", "-m", "sources.json", "--ffill-window", "2", "-o", "panel.csv"]);
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.manifest, PathBuf::from("sources.json"));
                assert_eq!(args.ffill_window, Some(2));
                assert_eq!(args.bfill_window, None);
                assert_eq!(args.out, Some(PathBuf::from("panel.csv")));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn decode_defaults_match_usda_layout() {
        let cli = Cli::parse_from(["tsh", "decode", "--table", "hpai.csv"]);
        match cli.command {
            Command::Decode(args) => {
                assert_eq!(args.prefix_width, 5);
                assert_eq!(args.date_format, "%d-%b-%y");
                assert!(!args.verbose);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
