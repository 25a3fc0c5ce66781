// Structure Extractor - multiscale pulse/tone/chirp descriptors
// Correlation-driven activation (PAS) and texture signals over
// time-frequency representations

// Module declarations
pub mod calibration;
pub mod config;
pub mod error;
pub mod frontend;
pub mod grid;
pub mod stream;
pub mod structure;

// Re-exports for convenience
pub use calibration::StructureCache;
pub use config::{AppConfig, ExtractorConfig, SpectrogramConfig, StreamConfig};
pub use error::{ErrorCode, ExtractorError, FrontendError, StatsError};
pub use frontend::TfRepresentation;
pub use grid::{Grid, Margin};
pub use stream::{Continuity, DescriptorFrames, StreamProcessor};
pub use structure::{DescriptorType, StructureExtractor};
