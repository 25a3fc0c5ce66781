// Frontend module - time-frequency input for the structure extractor
//
// Inputs are either WAV files (decoded with hound and turned into a log-band
// spectrogram) or JSON files holding a ready-made time-frequency matrix.

pub mod fft;
pub mod wav;

pub use fft::SpectrogramProcessor;
pub use wav::{read_wav, Signal};

use std::fs;
use std::path::Path;

use crate::config::SpectrogramConfig;
use crate::error::{log_frontend_error, FrontendError};
use crate::grid::Grid;

/// Row-major `noof_scales x noof_frames` time-frequency matrix
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TfRepresentation {
    pub noof_scales: usize,
    pub noof_frames: usize,
    /// Frames per second; 0 when unknown
    #[serde(default)]
    pub frame_rate: f64,
    pub data: Vec<f64>,
}

impl TfRepresentation {
    /// Check that `data` matches the declared dimensions
    pub fn validate(&self) -> Result<(), FrontendError> {
        if self.data.len() != self.noof_scales * self.noof_frames {
            return Err(FrontendError::UnsupportedFormat {
                reason: format!(
                    "matrix holds {} values, expected {} scales x {} frames",
                    self.data.len(),
                    self.noof_scales,
                    self.noof_frames
                ),
            });
        }
        Ok(())
    }

    pub fn as_grid(&self) -> Grid<'_> {
        Grid::new(&self.data, self.noof_scales, self.noof_frames)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), FrontendError> {
        fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, FrontendError> {
        let tf: Self = serde_json::from_str(&fs::read_to_string(path)?)?;
        tf.validate()?;
        Ok(tf)
    }

    /// Spectrogram of a WAV file
    pub fn from_wav(path: &Path, config: &SpectrogramConfig) -> Result<Self, FrontendError> {
        let signal = read_wav(path)?;
        SpectrogramProcessor::new(config, signal.sample_rate)?.process(&signal.samples)
    }
}

/// Load `.wav` files through the spectrogram, anything else as matrix JSON
pub fn load_input(
    path: &Path,
    config: &SpectrogramConfig,
) -> Result<TfRepresentation, FrontendError> {
    let is_wav = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));

    let loaded = if is_wav {
        TfRepresentation::from_wav(path, config)
    } else {
        TfRepresentation::load(path)
    };
    loaded.inspect_err(|err| log_frontend_error(err, "load_input"))
}
