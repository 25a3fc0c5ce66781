// WAV input - decode to mono f32 samples in [-1, 1]

use std::path::Path;

use crate::error::FrontendError;

/// Decoded mono signal
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Read a WAV file, averaging all channels into one
pub fn read_wav(path: &Path) -> Result<Signal, FrontendError> {
    let wav_error = |err: hound::Error| FrontendError::WavOpen {
        path: path.display().to_string(),
        reason: err.to_string(),
    };

    let mut reader = hound::WavReader::open(path).map_err(wav_error)?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels);
    if channels == 0 {
        return Err(FrontendError::UnsupportedFormat {
            reason: format!("{} declares no channels", path.display()),
        });
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(wav_error)?,
        hound::SampleFormat::Int => {
            let max = ((1i64 << (spec.bits_per_sample - 1)) - 1) as f32;
            match spec.bits_per_sample {
                8 | 16 | 24 | 32 => reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|value| value as f32 / max))
                    .collect::<Result<_, _>>()
                    .map_err(wav_error)?,
                other => {
                    return Err(FrontendError::UnsupportedFormat {
                        reason: format!(
                            "unsupported bits per sample {} in {}",
                            other,
                            path.display()
                        ),
                    })
                }
            }
        }
    };

    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    log::debug!(
        "[Frontend] Read {} samples at {} Hz from {:?} ({} channel(s))",
        samples.len(),
        spec.sample_rate,
        path,
        channels
    );
    Ok(Signal {
        samples,
        sample_rate: spec.sample_rate,
    })
}
