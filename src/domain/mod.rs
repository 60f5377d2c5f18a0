//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - raw inputs (`RawObservation`) and decoded outbreak events (`OutbreakRecord`)
//! - monthly aggregates (`MonthlySeries`, `MonthlyColumn`)
//! - the merged output (`MergedPanel`) and its fill bookkeeping

pub mod types;

pub use types::*;
