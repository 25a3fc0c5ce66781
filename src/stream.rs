// StreamProcessor - chunked PAS/texture extraction
//
// Each descriptor type keeps the trailing `first + last` frame offsets of
// the previous chunk. A chunk continuous with its predecessor is processed
// with that remainder prepended, so after cropping to the valid frames the
// outputs of consecutive chunks tile the stream without gaps or overlap.

use std::ops::Range;

use crate::config::StreamConfig;
use crate::error::{log_extractor_error, ExtractorError};
use crate::grid::Margin;
use crate::structure::{DescriptorTable, DescriptorType, StructureExtractor};

/// Relation of a chunk to the chunk processed before it
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Continuity {
    /// Start of a new stream; remainders are discarded
    Discontinuous,
    /// Frames directly follow the previous chunk
    WithPrevious,
}

/// PAS and texture of one descriptor type for one chunk
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DescriptorFrames {
    pub kind: DescriptorType,
    pub noof_scales: usize,
    pub noof_frames: usize,
    /// Stream frame index of the first output column
    pub first_frame: u64,
    pub margin: Margin,
    pub texture: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pas: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Default)]
struct Remainder {
    data: Vec<f64>,
    noof_frames: usize,
    /// Stream frame index of the first remainder column
    first_frame: u64,
}

#[derive(Debug)]
pub struct StreamProcessor {
    extractor: StructureExtractor,
    config: StreamConfig,
    kinds: Vec<DescriptorType>,
    remainders: DescriptorTable<Remainder>,
    frames_seen: u64,
}

impl StreamProcessor {
    /// Wrap a fitted extractor
    ///
    /// # Returns
    /// `Err(NotInitialized)` when a configured descriptor type has no
    /// calculators
    pub fn new(
        extractor: StructureExtractor,
        config: StreamConfig,
    ) -> Result<Self, ExtractorError> {
        let kinds = extractor.config().descriptors.clone();
        for &kind in &kinds {
            if !extractor.is_initialized(kind) {
                return Err(ExtractorError::NotInitialized {
                    descriptor: kind.code(),
                });
            }
        }

        Ok(Self {
            extractor,
            config,
            kinds,
            remainders: DescriptorTable::default(),
            frames_seen: 0,
        })
    }

    pub fn extractor(&self) -> &StructureExtractor {
        &self.extractor
    }

    pub fn descriptors(&self) -> &[DescriptorType] {
        &self.kinds
    }

    /// Forget all remainders; the next chunk starts a new stream
    pub fn reset(&mut self) {
        self.remainders = DescriptorTable::default();
        self.frames_seen = 0;
    }

    /// Process one `noof_scales x noof_frames` chunk for every descriptor
    pub fn process(
        &mut self,
        chunk: &[f64],
        noof_frames: usize,
        continuity: Continuity,
    ) -> Result<Vec<DescriptorFrames>, ExtractorError> {
        let (noof_scales, _) = self.extractor.dimensions();
        let expected = noof_scales * noof_frames;
        if chunk.len() != expected {
            return Err(ExtractorError::BufferSizeMismatch {
                expected,
                actual: chunk.len(),
            });
        }

        if continuity == Continuity::Discontinuous {
            self.reset();
        }
        let chunk_start = self.frames_seen;
        self.frames_seen += noof_frames as u64;

        let mut outputs = Vec::with_capacity(self.kinds.len());
        for kind in self.kinds.clone() {
            let remainder = std::mem::take(&mut self.remainders[kind]);
            let (current, current_frames, first_frame) = if remainder.noof_frames > 0 {
                (
                    concat_frames(
                        &remainder.data,
                        remainder.noof_frames,
                        chunk,
                        noof_frames,
                        noof_scales,
                    ),
                    remainder.noof_frames + noof_frames,
                    remainder.first_frame,
                )
            } else {
                (chunk.to_vec(), noof_frames, chunk_start)
            };

            let margin = self.extractor.texture_margin(kind)?;
            let (pas, texture) = self
                .extractor
                .calc_texture(kind, &current, current_frames)
                .inspect_err(|err| log_extractor_error(err, "StreamProcessor::process"))?;
            let frames = if self.config.crop_to_valid {
                margin.frame_range(current_frames)
            } else {
                0..current_frames
            };
            tracing::debug!(
                descriptor = %kind,
                frames = current_frames,
                valid = ?frames,
                "chunk processed"
            );

            outputs.push(DescriptorFrames {
                kind,
                noof_scales,
                noof_frames: frames.len(),
                first_frame: first_frame + frames.start as u64,
                margin,
                texture: crop_frames(texture.as_slice(), current_frames, noof_scales, &frames),
                pas: self
                    .config
                    .emit_pas
                    .then(|| crop_frames(pas.as_slice(), current_frames, noof_scales, &frames)),
            });

            let keep = (margin.first_frame_offset + margin.last_frame_offset).min(current_frames);
            let tail = current_frames - keep..current_frames;
            self.remainders[kind] = Remainder {
                data: crop_frames(&current, current_frames, noof_scales, &tail),
                noof_frames: keep,
                first_frame: first_frame + tail.start as u64,
            };
        }
        Ok(outputs)
    }
}

/// Join two row-major grids with the same scale count along the frame axis
fn concat_frames(
    head: &[f64],
    head_frames: usize,
    tail: &[f64],
    tail_frames: usize,
    noof_scales: usize,
) -> Vec<f64> {
    let mut out = Vec::with_capacity(noof_scales * (head_frames + tail_frames));
    for scale in 0..noof_scales {
        out.extend_from_slice(&head[scale * head_frames..(scale + 1) * head_frames]);
        out.extend_from_slice(&tail[scale * tail_frames..(scale + 1) * tail_frames]);
    }
    out
}

/// Copy the columns `frames` of a row-major grid
fn crop_frames(
    data: &[f64],
    noof_frames: usize,
    noof_scales: usize,
    frames: &Range<usize>,
) -> Vec<f64> {
    let mut out = Vec::with_capacity(noof_scales * frames.len());
    for scale in 0..noof_scales {
        let row = scale * noof_frames;
        out.extend_from_slice(&data[row + frames.start..row + frames.end]);
    }
    out
}
