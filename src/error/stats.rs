// Stats transfer error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Stats error code constants
///
/// Error code range: 4001-4005
pub struct StatsErrorCodes {}

impl StatsErrorCodes {
    /// A flat stats array has the wrong length for the scale count
    pub const LAYOUT_MISMATCH: i32 = 4001;

    /// A crossing status code is not 1, 2 or 3
    pub const INVALID_STATUS: i32 = 4002;

    /// The run-scale plane of a context-area export is inconsistent
    pub const CONTEXT_AREA_MISMATCH: i32 = 4003;

    /// Reading or writing a cache file failed
    pub const IO: i32 = 4004;

    /// A cache file could not be parsed
    pub const PARSE: i32 = 4005;
}

/// Log a stats error with structured context
pub fn log_stats_error(err: &StatsError, context: &str) {
    error!(
        "Stats error in {}: code={}, component=StatsTransfer, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised when importing persisted calculator stats
#[derive(Debug, Clone, PartialEq)]
pub enum StatsError {
    /// Array `field` holds `actual` entries where `expected` are required
    LayoutMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Unknown crossing status code
    InvalidStatus { code: i32 },

    /// Run-scale plane entry does not match its column
    ContextAreaMismatch {
        scale: usize,
        run_scale: usize,
        found: i32,
    },

    /// Cache file could not be read or written
    Io { reason: String },

    /// Cache file contents are not valid JSON for the expected layout
    Parse { reason: String },
}

impl ErrorCode for StatsError {
    fn code(&self) -> i32 {
        match self {
            StatsError::LayoutMismatch { .. } => StatsErrorCodes::LAYOUT_MISMATCH,
            StatsError::InvalidStatus { .. } => StatsErrorCodes::INVALID_STATUS,
            StatsError::ContextAreaMismatch { .. } => StatsErrorCodes::CONTEXT_AREA_MISMATCH,
            StatsError::Io { .. } => StatsErrorCodes::IO,
            StatsError::Parse { .. } => StatsErrorCodes::PARSE,
        }
    }

    fn message(&self) -> String {
        match self {
            StatsError::LayoutMismatch {
                field,
                expected,
                actual,
            } => format!(
                "Stats field '{}' has {} entries, expected {}",
                field, actual, expected
            ),
            StatsError::InvalidStatus { code } => {
                format!("Invalid threshold crossing status code {}", code)
            }
            StatsError::ContextAreaMismatch {
                scale,
                run_scale,
                found,
            } => format!(
                "Context area of scale {} lists run scale {} in column {}",
                scale, found, run_scale
            ),
            StatsError::Io { reason } => format!("Cache I/O failed: {}", reason),
            StatsError::Parse { reason } => format!("Cache parse failed: {}", reason),
        }
    }
}

impl fmt::Display for StatsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StatsError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for StatsError {}

impl From<std::io::Error> for StatsError {
    fn from(err: std::io::Error) -> Self {
        StatsError::Io {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for StatsError {
    fn from(err: serde_json::Error) -> Self {
        StatsError::Parse {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_error_codes() {
        assert_eq!(
            StatsError::LayoutMismatch {
                field: "mean",
                expected: 4,
                actual: 3
            }
            .code(),
            StatsErrorCodes::LAYOUT_MISMATCH
        );
        assert_eq!(
            StatsError::InvalidStatus { code: 9 }.code(),
            StatsErrorCodes::INVALID_STATUS
        );
        assert_eq!(
            StatsError::ContextAreaMismatch {
                scale: 0,
                run_scale: 1,
                found: 2
            }
            .code(),
            StatsErrorCodes::CONTEXT_AREA_MISMATCH
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: StatsError = io.into();
        assert_eq!(err.code(), StatsErrorCodes::IO);
        assert!(err.message().contains("missing"));
    }

    #[test]
    fn test_parse_error_conversion() {
        let parse = serde_json::from_str::<Vec<f64>>("not json").unwrap_err();
        let err: StatsError = parse.into();
        assert_eq!(err.code(), StatsErrorCodes::PARSE);
    }
}
