//! Input/output helpers.
//!
//! - CSV ingest of observation files and the wide outbreak table (`ingest`)
//! - panel/record exports (CSV/JSON) (`export`)
//! - source manifest loading (`manifest`)

pub mod export;
pub mod ingest;
pub mod manifest;

pub use export::*;
pub use ingest::*;
pub use manifest::*;
