// Extractor error types and constants

use crate::error::{ErrorCode, StatsError};
use log::error;
use std::fmt;

/// Extractor error code constants
///
/// Error code range: 3001-3007
pub struct ExtractorErrorCodes {}

impl ExtractorErrorCodes {
    /// Descriptor requested before calibration or stats import
    pub const NOT_INITIALIZED: i32 = 3001;

    /// Scale count differs between cooperating components
    pub const DIMENSION_MISMATCH: i32 = 3002;

    /// Caller buffer length does not match the declared dimensions
    pub const BUFFER_SIZE_MISMATCH: i32 = 3003;

    /// Too few frames to estimate per-scale statistics
    pub const INSUFFICIENT_FRAMES: i32 = 3004;

    /// Configuration values rejected by validation
    pub const INVALID_CONFIG: i32 = 3005;

    /// Descriptor code not one of f/s/u/d
    pub const UNKNOWN_DESCRIPTOR: i32 = 3006;

    /// Persisted stats could not be imported
    pub const INVALID_STATS: i32 = 3007;
}

/// Log an extractor error with structured context
pub fn log_extractor_error(err: &ExtractorError, context: &str) {
    error!(
        "Extractor error in {}: code={}, component=StructureExtractor, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised while driving the descriptor pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractorError {
    /// The descriptor has neither been calibrated nor restored from stats
    NotInitialized { descriptor: char },

    /// Scale counts of two components disagree
    DimensionMismatch { expected: usize, actual: usize },

    /// A flat buffer does not hold `noof_scales * noof_frames` values
    BufferSizeMismatch { expected: usize, actual: usize },

    /// Fewer than two frames were supplied for calibration
    InsufficientFrames { frames: usize },

    /// A configuration field failed validation
    InvalidConfig { reason: String },

    /// Unknown descriptor code
    UnknownDescriptor { code: char },

    /// Stats import rejected the supplied layout
    InvalidStats { source: StatsError },
}

impl ErrorCode for ExtractorError {
    fn code(&self) -> i32 {
        match self {
            ExtractorError::NotInitialized { .. } => ExtractorErrorCodes::NOT_INITIALIZED,
            ExtractorError::DimensionMismatch { .. } => ExtractorErrorCodes::DIMENSION_MISMATCH,
            ExtractorError::BufferSizeMismatch { .. } => {
                ExtractorErrorCodes::BUFFER_SIZE_MISMATCH
            }
            ExtractorError::InsufficientFrames { .. } => ExtractorErrorCodes::INSUFFICIENT_FRAMES,
            ExtractorError::InvalidConfig { .. } => ExtractorErrorCodes::INVALID_CONFIG,
            ExtractorError::UnknownDescriptor { .. } => ExtractorErrorCodes::UNKNOWN_DESCRIPTOR,
            ExtractorError::InvalidStats { .. } => ExtractorErrorCodes::INVALID_STATS,
        }
    }

    fn message(&self) -> String {
        match self {
            ExtractorError::NotInitialized { descriptor } => {
                format!(
                    "Descriptor '{}' is not initialized. Calibrate or import stats first.",
                    descriptor
                )
            }
            ExtractorError::DimensionMismatch { expected, actual } => {
                format!("Scale count mismatch: expected {}, got {}", expected, actual)
            }
            ExtractorError::BufferSizeMismatch { expected, actual } => {
                format!(
                    "Buffer holds {} values but dimensions require {}",
                    actual, expected
                )
            }
            ExtractorError::InsufficientFrames { frames } => {
                format!("At least 2 frames are required (got {})", frames)
            }
            ExtractorError::InvalidConfig { reason } => format!("Invalid config: {}", reason),
            ExtractorError::UnknownDescriptor { code } => {
                format!("Unknown descriptor code '{}' (allowed: f, s, u, d)", code)
            }
            ExtractorError::InvalidStats { source } => {
                format!("Stats import failed: {}", source.message())
            }
        }
    }
}

impl fmt::Display for ExtractorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ExtractorError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ExtractorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExtractorError::InvalidStats { source } => Some(source),
            _ => None,
        }
    }
}

impl From<StatsError> for ExtractorError {
    fn from(source: StatsError) -> Self {
        ExtractorError::InvalidStats { source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extractor_error_codes() {
        assert_eq!(
            ExtractorError::NotInitialized { descriptor: 'f' }.code(),
            ExtractorErrorCodes::NOT_INITIALIZED
        );
        assert_eq!(
            ExtractorError::DimensionMismatch {
                expected: 4,
                actual: 5
            }
            .code(),
            ExtractorErrorCodes::DIMENSION_MISMATCH
        );
        assert_eq!(
            ExtractorError::BufferSizeMismatch {
                expected: 8,
                actual: 7
            }
            .code(),
            ExtractorErrorCodes::BUFFER_SIZE_MISMATCH
        );
        assert_eq!(
            ExtractorError::InsufficientFrames { frames: 1 }.code(),
            ExtractorErrorCodes::INSUFFICIENT_FRAMES
        );
        assert_eq!(
            ExtractorError::InvalidConfig {
                reason: "test".to_string()
            }
            .code(),
            ExtractorErrorCodes::INVALID_CONFIG
        );
        assert_eq!(
            ExtractorError::UnknownDescriptor { code: 'x' }.code(),
            ExtractorErrorCodes::UNKNOWN_DESCRIPTOR
        );
    }

    #[test]
    fn test_extractor_error_messages() {
        let err = ExtractorError::DimensionMismatch {
            expected: 4,
            actual: 5,
        };
        assert_eq!(err.message(), "Scale count mismatch: expected 4, got 5");

        let err = ExtractorError::InsufficientFrames { frames: 1 };
        assert_eq!(err.message(), "At least 2 frames are required (got 1)");

        let err = ExtractorError::NotInitialized { descriptor: 's' };
        assert!(err.message().contains("'s'"));
    }

    #[test]
    fn test_stats_error_conversion() {
        let err: ExtractorError = StatsError::InvalidStatus { code: 9 }.into();
        assert_eq!(err.code(), ExtractorErrorCodes::INVALID_STATS);
        assert!(err.message().contains("status code 9"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_extractor_error_display() {
        let err = ExtractorError::UnknownDescriptor { code: 'q' };
        let display = format!("{}", err);
        assert!(display.contains("ExtractorError"));
        assert!(display.contains(&err.code().to_string()));
    }
}
