// Error types for the structure extractor
//
// This module defines the error families surfaced at the host-facing
// boundary: extractor orchestration, stats/cache transfer and the
// time-frequency front end. Scan degeneracy and boundary exhaustion are not
// errors; they travel as `CrossingStatus` values on threshold crossings.

mod extractor;
mod frontend;
mod stats;

pub use extractor::{log_extractor_error, ExtractorError, ExtractorErrorCodes};
pub use frontend::{log_frontend_error, FrontendError, FrontendErrorCodes};
pub use stats::{log_stats_error, StatsError, StatsErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, so hosts persisting or driving the pipeline can
/// react to failures without parsing strings.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
