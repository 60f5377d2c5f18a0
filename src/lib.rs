//! `ts-harmonize` library crate.
//!
//! The binary (`tsh`) is a thin wrapper around this library so that:
//!
//! - the decode → resample → merge core is testable without spawning processes
//! - fetch/load/export wrappers stay separate from the core's pure functions
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod decode;
pub mod domain;
pub mod error;
pub mod io;
pub mod merge;
pub mod report;
pub mod resample;
