//! Terminal reporting for pipeline runs.

pub mod format;

pub use format::*;
