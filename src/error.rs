//! Application-level error type.
//!
//! Every failure that reaches `main` carries a process exit code:
//!
//! - `2`: configuration or local IO (missing file, bad manifest, missing API key)
//! - `3`: nothing usable to merge
//! - `4`: upstream fetch failures and calendar-integrity faults

use crate::merge::MergeError;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<MergeError> for AppError {
    fn from(err: MergeError) -> Self {
        AppError::new(4, format!("Calendar integrity fault: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn merge_errors_map_to_integrity_exit_code() {
        let err: AppError = MergeError::NotMonthStart {
            column: "cpi".to_string(),
            date: NaiveDate::from_ymd_opt(2020, 1, 15).unwrap(),
        }
        .into();
        assert_eq!(err.exit_code(), 4);
        assert!(err.message().contains("cpi"));
    }
}
