// Front-end error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Front-end error code constants
///
/// Error code range: 5001-5004
pub struct FrontendErrorCodes {}

impl FrontendErrorCodes {
    pub const WAV_OPEN: i32 = 5001;
    pub const UNSUPPORTED_FORMAT: i32 = 5002;
    pub const EMPTY_SIGNAL: i32 = 5003;
    pub const IO: i32 = 5004;
}

/// Log a front-end error with structured context
pub fn log_frontend_error(err: &FrontendError, context: &str) {
    error!(
        "Frontend error in {}: code={}, component=Frontend, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised while turning audio or matrix files into a time-frequency grid
#[derive(Debug, Clone, PartialEq)]
pub enum FrontendError {
    /// WAV file could not be opened or decoded
    WavOpen { path: String, reason: String },

    /// Channel count or sample format is not supported
    UnsupportedFormat { reason: String },

    /// Signal too short to produce a single analysis frame
    EmptySignal { samples: usize, window: usize },

    /// Matrix file could not be read or parsed
    Io { reason: String },
}

impl ErrorCode for FrontendError {
    fn code(&self) -> i32 {
        match self {
            FrontendError::WavOpen { .. } => FrontendErrorCodes::WAV_OPEN,
            FrontendError::UnsupportedFormat { .. } => FrontendErrorCodes::UNSUPPORTED_FORMAT,
            FrontendError::EmptySignal { .. } => FrontendErrorCodes::EMPTY_SIGNAL,
            FrontendError::Io { .. } => FrontendErrorCodes::IO,
        }
    }

    fn message(&self) -> String {
        match self {
            FrontendError::WavOpen { path, reason } => {
                format!("Failed to open WAV {}: {}", path, reason)
            }
            FrontendError::UnsupportedFormat { reason } => {
                format!("Unsupported audio format: {}", reason)
            }
            FrontendError::EmptySignal { samples, window } => format!(
                "Signal of {} samples is shorter than the {} sample window",
                samples, window
            ),
            FrontendError::Io { reason } => format!("Matrix I/O failed: {}", reason),
        }
    }
}

impl fmt::Display for FrontendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FrontendError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for FrontendError {}

impl From<std::io::Error> for FrontendError {
    fn from(err: std::io::Error) -> Self {
        FrontendError::Io {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for FrontendError {
    fn from(err: serde_json::Error) -> Self {
        FrontendError::UnsupportedFormat {
            reason: format!("invalid time-frequency JSON: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frontend_error_codes() {
        assert_eq!(
            FrontendError::EmptySignal {
                samples: 10,
                window: 1024
            }
            .code(),
            FrontendErrorCodes::EMPTY_SIGNAL
        );
        assert_eq!(
            FrontendError::UnsupportedFormat {
                reason: "stereo".to_string()
            }
            .code(),
            FrontendErrorCodes::UNSUPPORTED_FORMAT
        );
    }

    #[test]
    fn test_frontend_error_display() {
        let err = FrontendError::Io {
            reason: "gone".to_string(),
        };
        let display = format!("{}", err);
        assert!(display.contains("FrontendError"));
        assert!(display.contains("gone"));
    }
}
