// Spectrogram - log-band energies from a Hann-windowed STFT
//
// Bands are log-spaced between the configured lower frequency and Nyquist.
// Band 0 is the lowest, so scale indices grow with frequency. Each cell holds
// the band energy in dB.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use super::TfRepresentation;
use crate::config::SpectrogramConfig;
use crate::error::FrontendError;

/// Short-time Fourier front end producing `noof_bands x noof_frames` grids
pub struct SpectrogramProcessor {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    hop_size: usize,
    sample_rate: u32,
    /// FFT bin range summed into each band
    bands: Vec<std::ops::Range<usize>>,
    energy_floor: f64,
}

impl SpectrogramProcessor {
    /// Plan the FFT and the band layout for signals at `sample_rate`
    ///
    /// # Returns
    /// `Err(UnsupportedFormat)` when the configuration cannot produce a
    /// single band below Nyquist
    pub fn new(config: &SpectrogramConfig, sample_rate: u32) -> Result<Self, FrontendError> {
        let nyquist = sample_rate as f32 / 2.0;
        if config.window_size < 2 || config.hop_size == 0 || config.noof_bands == 0 {
            return Err(FrontendError::UnsupportedFormat {
                reason: format!(
                    "window {} / hop {} / bands {} cannot form a spectrogram",
                    config.window_size, config.hop_size, config.noof_bands
                ),
            });
        }
        if !(config.min_frequency_hz > 0.0 && config.min_frequency_hz < nyquist) {
            return Err(FrontendError::UnsupportedFormat {
                reason: format!(
                    "lowest band at {} Hz does not fit below Nyquist ({} Hz)",
                    config.min_frequency_hz, nyquist
                ),
            });
        }

        let size = config.window_size;
        // Pre-compute Hann window to reduce spectral leakage
        let window = (0..size)
            .map(|i| {
                0.5 * (1.0 - ((2.0 * std::f32::consts::PI * i as f32) / (size as f32 - 1.0)).cos())
            })
            .collect();

        let fft = FftPlanner::new().plan_fft_forward(size);
        let bands = band_layout(
            config.min_frequency_hz,
            nyquist,
            config.noof_bands,
            sample_rate as f32 / size as f32,
            size / 2 + 1,
        );

        Ok(Self {
            fft,
            window,
            hop_size: config.hop_size,
            sample_rate,
            bands,
            energy_floor: config.energy_floor,
        })
    }

    pub fn noof_bands(&self) -> usize {
        self.bands.len()
    }

    /// Frames per second of the output grid
    pub fn frame_rate(&self) -> f64 {
        f64::from(self.sample_rate) / self.hop_size as f64
    }

    /// Number of full windows that fit in `len` samples
    pub fn noof_frames(&self, len: usize) -> usize {
        if len < self.window.len() {
            0
        } else {
            1 + (len - self.window.len()) / self.hop_size
        }
    }

    /// Compute the log-band spectrogram of `samples`
    pub fn process(&self, samples: &[f32]) -> Result<TfRepresentation, FrontendError> {
        let noof_frames = self.noof_frames(samples.len());
        if noof_frames == 0 {
            return Err(FrontendError::EmptySignal {
                samples: samples.len(),
                window: self.window.len(),
            });
        }

        let noof_bands = self.bands.len();
        let mut data = vec![0.0; noof_bands * noof_frames];
        let mut buffer = vec![Complex::new(0.0f32, 0.0); self.window.len()];
        let mut scratch = vec![Complex::new(0.0f32, 0.0); self.fft.get_inplace_scratch_len()];

        for frame in 0..noof_frames {
            let start = frame * self.hop_size;
            let segment = &samples[start..start + self.window.len()];
            for ((slot, &sample), &weight) in buffer.iter_mut().zip(segment).zip(&self.window) {
                *slot = Complex::new(sample * weight, 0.0);
            }
            self.fft.process_with_scratch(&mut buffer, &mut scratch);

            for (band, bins) in self.bands.iter().enumerate() {
                let energy: f64 = buffer[bins.clone()]
                    .iter()
                    .map(|c| f64::from(c.norm_sqr()))
                    .sum();
                data[band * noof_frames + frame] = 10.0 * (energy + self.energy_floor).log10();
            }
        }

        tracing::debug!(
            noof_bands,
            noof_frames,
            frame_rate = self.frame_rate(),
            "spectrogram computed"
        );
        Ok(TfRepresentation {
            noof_scales: noof_bands,
            noof_frames,
            frame_rate: self.frame_rate(),
            data,
        })
    }
}

/// Split `[min_hz, max_hz)` into `noof_bands` log-spaced FFT bin ranges
///
/// A band too narrow to contain a bin takes the bin nearest its geometric
/// centre, so no band is ever empty.
fn band_layout(
    min_hz: f32,
    max_hz: f32,
    noof_bands: usize,
    bin_hz: f32,
    noof_bins: usize,
) -> Vec<std::ops::Range<usize>> {
    let ratio = max_hz / min_hz;
    let edge = |k: usize| min_hz * ratio.powf(k as f32 / noof_bands as f32);
    let last_bin = noof_bins - 1;

    (0..noof_bands)
        .map(|band| {
            let (low, high) = (edge(band), edge(band + 1));
            let first = ((low / bin_hz).ceil() as usize).min(last_bin);
            let end = if band + 1 == noof_bands {
                noof_bins
            } else {
                ((high / bin_hz).ceil() as usize).min(noof_bins)
            };
            if first < end {
                first..end
            } else {
                let centre = ((low * high).sqrt() / bin_hz).round() as usize;
                let bin = centre.min(last_bin);
                bin..bin + 1
            }
        })
        .collect()
}
