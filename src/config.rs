//! Configuration management for the structure pipeline
//!
//! This module provides runtime configuration loading from JSON files, so the
//! correlation threshold, axis stretch factors and front-end resolution can
//! be tuned without recompilation.

use crate::error::ExtractorError;
use crate::structure::crossing::DEFAULT_THRESHOLD;
use crate::structure::DescriptorType;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub extractor: ExtractorConfig,
    pub spectrogram: SpectrogramConfig,
    pub stream: StreamConfig,
}

/// Descriptor pipeline parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Correlation level at which a line scan stops
    pub threshold: f64,
    /// Largest frame delay kept in the correlation matrix
    pub max_delay: usize,
    /// Z-score PAS and texture output against calibration moments
    pub normalize: bool,
    /// Treat calibration PAS as zero-mean (white noise calibration)
    pub white_calibration: bool,
    /// Stretch applied to primary-axis crossings when building context areas
    pub primary_axis_factor: f64,
    /// Stretch applied to orthogonal-axis crossings when building context areas
    pub orthogonal_axis_factor: f64,
    /// Compute every correlation matrix cell, not just the ones scans visit
    pub full_correlation_matrix: bool,
    /// Descriptor types to build
    pub descriptors: Vec<DescriptorType>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            max_delay: 20,
            normalize: false,
            white_calibration: true,
            primary_axis_factor: 0.7,
            orthogonal_axis_factor: 2.0,
            full_correlation_matrix: false,
            descriptors: DescriptorType::ALL.to_vec(),
        }
    }
}

impl ExtractorConfig {
    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<(), ExtractorError> {
        let invalid = |reason: String| Err(ExtractorError::InvalidConfig { reason });

        if !self.threshold.is_finite() || self.threshold <= -1.0 || self.threshold >= 1.0 {
            return invalid(format!(
                "threshold must lie in (-1, 1), got {}",
                self.threshold
            ));
        }
        for (name, factor) in [
            ("primary_axis_factor", self.primary_axis_factor),
            ("orthogonal_axis_factor", self.orthogonal_axis_factor),
        ] {
            if !factor.is_finite() || factor <= 0.0 {
                return invalid(format!("{} must be positive, got {}", name, factor));
            }
        }
        if self.descriptors.is_empty() {
            return invalid("at least one descriptor type is required".to_string());
        }
        for (index, kind) in self.descriptors.iter().enumerate() {
            if self.descriptors[..index].contains(kind) {
                return invalid(format!("descriptor type {} listed twice", kind));
            }
        }
        Ok(())
    }
}

/// Log-band spectrogram front end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrogramConfig {
    /// FFT window size in samples
    pub window_size: usize,
    /// Hop size between frames in samples
    pub hop_size: usize,
    /// Number of log-spaced bands (scales)
    pub noof_bands: usize,
    /// Lower edge of the lowest band
    pub min_frequency_hz: f32,
    /// Energy added before taking the logarithm
    pub energy_floor: f64,
}

impl Default for SpectrogramConfig {
    fn default() -> Self {
        Self {
            window_size: 1024,
            hop_size: 256,
            noof_bands: 48,
            min_frequency_hz: 50.0,
            energy_floor: 1e-10,
        }
    }
}

/// Chunked processing options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Return the PAS alongside the texture
    pub emit_pas: bool,
    /// Crop output to the frames free of edge effects
    pub crop_to_valid: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            emit_pas: true,
            crop_to_valid: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The loaded configuration, or the defaults when the file is missing
    /// or not valid JSON
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }
}
