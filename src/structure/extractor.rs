// StructureExtractor - correlator, PAS and texture calculators per descriptor
//
// Calibration scans every scale four times along the axes and four times
// along two diagonals. Each scan result feeds two descriptor types: once as
// a primary-axis pair and once as an orthogonal-axis pair.
//
// - Pulse (f): frame scans primary, scale scans orthogonal
// - Tone (s): scale scans primary, frame scans orthogonal
// - Chirp up (u): rising diagonals primary, falling diagonals orthogonal
// - Chirp down (d): the transpose of chirp up

use std::fmt;
use std::ops::{Index, IndexMut};

use super::correlator::Correlator;
use super::crossing::{ceil_map, floor_map, ThresholdCrossing, ThresholdPair};
use super::pas::{PasCalculator, PasStats};
use super::texture::{TextureCalculator, TextureStats};
use crate::calibration::StructureCache;
use crate::config::ExtractorConfig;
use crate::error::ExtractorError;
use crate::grid::{Grid, Margin};

/// The four structure descriptors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptorType {
    Pulse,
    Tone,
    ChirpUp,
    ChirpDown,
}

impl DescriptorType {
    pub const ALL: [DescriptorType; 4] = [
        DescriptorType::Pulse,
        DescriptorType::Tone,
        DescriptorType::ChirpUp,
        DescriptorType::ChirpDown,
    ];

    /// Single-letter code used by hosts
    pub fn code(&self) -> char {
        match self {
            DescriptorType::Pulse => 'f',
            DescriptorType::Tone => 's',
            DescriptorType::ChirpUp => 'u',
            DescriptorType::ChirpDown => 'd',
        }
    }

    pub fn from_code(code: char) -> Result<Self, ExtractorError> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.code() == code)
            .ok_or(ExtractorError::UnknownDescriptor { code })
    }

    fn slot(&self) -> usize {
        match self {
            DescriptorType::Pulse => 0,
            DescriptorType::Tone => 1,
            DescriptorType::ChirpUp => 2,
            DescriptorType::ChirpDown => 3,
        }
    }
}

impl fmt::Display for DescriptorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DescriptorType::Pulse => "pulse",
            DescriptorType::Tone => "tone",
            DescriptorType::ChirpUp => "chirp_up",
            DescriptorType::ChirpDown => "chirp_down",
        };
        f.write_str(name)
    }
}

/// Fixed table with one entry per descriptor type
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescriptorTable<T>([T; 4]);

impl<T> DescriptorTable<T> {
    pub fn from_fn(f: impl FnMut(DescriptorType) -> T) -> Self {
        Self(DescriptorType::ALL.map(f))
    }

    pub fn iter(&self) -> impl Iterator<Item = (DescriptorType, &T)> {
        DescriptorType::ALL.into_iter().zip(self.0.iter())
    }
}

impl<T> Index<DescriptorType> for DescriptorTable<T> {
    type Output = T;

    fn index(&self, kind: DescriptorType) -> &T {
        &self.0[kind.slot()]
    }
}

impl<T> IndexMut<DescriptorType> for DescriptorTable<T> {
    fn index_mut(&mut self, kind: DescriptorType) -> &mut T {
        &mut self.0[kind.slot()]
    }
}

/// Fitted calculators of one descriptor type
#[derive(Debug, Clone, Default)]
struct DescriptorSlot {
    pas: Option<PasCalculator>,
    texture: Option<TextureCalculator>,
}

/// Crossing tables produced by calibration scans, per descriptor type
struct ScanTables {
    primary: DescriptorTable<Vec<ThresholdPair>>,
    orthogonal: DescriptorTable<Vec<ThresholdPair>>,
}

#[derive(Debug)]
pub struct StructureExtractor {
    config: ExtractorConfig,
    noof_scales: usize,
    correlation_matrix: Vec<f64>,
    slots: DescriptorTable<DescriptorSlot>,
}

impl StructureExtractor {
    /// Create an uncalibrated extractor
    pub fn new(config: ExtractorConfig) -> Result<Self, ExtractorError> {
        config.validate()?;
        Ok(Self {
            config,
            noof_scales: 0,
            correlation_matrix: Vec::new(),
            slots: DescriptorTable::default(),
        })
    }

    /// Calibrate every configured descriptor against a noise representation
    ///
    /// # Arguments
    /// * `noise` - Row-major `noof_scales x noof_frames` calibration grid
    ///
    /// # Returns
    /// `Err` when the buffer does not match the dimensions or holds fewer
    /// than two frames
    pub fn init(
        &mut self,
        noise: &[f64],
        noof_scales: usize,
        noof_frames: usize,
    ) -> Result<(), ExtractorError> {
        let grid = checked_grid(noise, noof_scales, noof_frames)?;
        if noof_frames < 2 {
            return Err(ExtractorError::InsufficientFrames {
                frames: noof_frames,
            });
        }

        tracing::info!(
            noof_scales,
            noof_frames,
            threshold = self.config.threshold,
            max_delay = self.config.max_delay,
            "calibrating structure extractor"
        );

        let mut correlator = Correlator::new(grid.clone(), self.config.max_delay);
        let tables = self.scan_crossings(&mut correlator, noof_scales);
        if self.config.full_correlation_matrix {
            correlator.compute_full_matrix();
        }
        self.correlation_matrix = correlator.correlation_matrix().to_vec();
        self.noof_scales = noof_scales;

        let ScanTables {
            mut primary,
            mut orthogonal,
        } = tables;
        self.slots = DescriptorTable::default();
        for kind in self.config.descriptors.clone() {
            let mut pas = PasCalculator::new(
                std::mem::take(&mut primary[kind]),
                std::mem::take(&mut orthogonal[kind]),
                self.config.normalize,
            );
            pas.initialize(&grid, self.config.white_calibration);
            let texture = TextureCalculator::new(
                &pas,
                self.config.primary_axis_factor,
                self.config.orthogonal_axis_factor,
            );
            tracing::debug!(
                descriptor = %kind,
                fitted_scales = pas.fitted_scales().len(),
                pas_margin = ?pas.margin(),
                texture_margin = ?texture.margin(),
                "descriptor calibrated"
            );
            self.slots[kind] = DescriptorSlot {
                pas: Some(pas),
                texture: Some(texture),
            };
        }
        Ok(())
    }

    fn scan_crossings(&self, correlator: &mut Correlator<'_>, noof_scales: usize) -> ScanTables {
        let threshold = self.config.threshold;
        let mut primary: DescriptorTable<Vec<ThresholdPair>> = DescriptorTable::default();
        let mut orthogonal: DescriptorTable<Vec<ThresholdPair>> = DescriptorTable::default();

        for scale in 0..noof_scales {
            let frame_pair = ThresholdPair::new(
                correlator.scan_line_from_origin(scale, 0, 1, threshold),
                correlator.scan_line_from_origin(scale, 0, -1, threshold),
            );
            let scale_pair = ThresholdPair::new(
                correlator.scan_line_from_origin(scale, 1, 0, threshold),
                correlator.scan_line_from_origin(scale, -1, 0, threshold),
            );
            primary[DescriptorType::Pulse].push(frame_pair);
            orthogonal[DescriptorType::Tone].push(frame_pair);
            orthogonal[DescriptorType::Pulse].push(scale_pair);
            primary[DescriptorType::Tone].push(scale_pair);
        }

        // diagonal directions come from the midpoints of the tone crossings
        for scale in 0..noof_scales {
            let frames = orthogonal[DescriptorType::Tone][scale];
            let scales = primary[DescriptorType::Tone][scale];
            let forward = frame_midpoint(&frames.tc1);
            let backward = frame_midpoint(&frames.tc2);
            let up = scale_midpoint(&scales.tc1);
            let down = scale_midpoint(&scales.tc2);

            let mut diagonal = |dscale: Option<f64>, dframe: Option<f64>| {
                merged_scan(correlator, scale, dscale, dframe, threshold)
            };
            let rising = ThresholdPair::new(diagonal(up, forward), diagonal(down, backward));
            let falling = ThresholdPair::new(diagonal(up, backward), diagonal(down, forward));

            primary[DescriptorType::ChirpUp].push(rising);
            orthogonal[DescriptorType::ChirpDown].push(rising);
            primary[DescriptorType::ChirpDown].push(falling);
            orthogonal[DescriptorType::ChirpUp].push(falling);
        }

        ScanTables {
            primary,
            orthogonal,
        }
    }

    /// Rebuild a fitted extractor from a calibration cache
    ///
    /// Threshold, delay window and normalization come from the cache; the
    /// remaining settings from `config`. Only descriptors present in both the
    /// cache and `config.descriptors` are restored. The correlation matrix is
    /// not persisted and stays empty.
    pub fn from_cache(
        cache: &StructureCache,
        config: ExtractorConfig,
    ) -> Result<Self, ExtractorError> {
        let config = ExtractorConfig {
            threshold: cache.threshold,
            max_delay: cache.max_delay,
            normalize: cache.normalize,
            ..config
        };
        let mut extractor = Self::new(config)?;
        extractor.noof_scales = cache.noof_scales;

        let mut restored = 0;
        for entry in &cache.descriptors {
            if !extractor.config.descriptors.contains(&entry.kind) {
                continue;
            }
            extractor.set_pas_stats(entry.kind, &entry.pas)?;
            extractor.set_texture_stats(entry.kind, &entry.texture)?;
            restored += 1;
        }
        tracing::info!(
            noof_scales = cache.noof_scales,
            restored,
            "structure extractor restored from cache"
        );
        Ok(extractor)
    }

    /// Replace the correlation threshold used by the next calibration
    pub fn set_threshold(&mut self, threshold: f64) -> Result<(), ExtractorError> {
        let config = ExtractorConfig {
            threshold,
            ..self.config.clone()
        };
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn threshold(&self) -> f64 {
        self.config.threshold
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// `(noof_scales, max_delay)`
    pub fn dimensions(&self) -> (usize, usize) {
        (self.noof_scales, self.config.max_delay)
    }

    /// `noof_scales x noof_scales x (2 * max_delay + 1)` correlations from calibration
    pub fn correlation_matrix(&self) -> &[f64] {
        &self.correlation_matrix
    }

    pub fn is_initialized(&self, kind: DescriptorType) -> bool {
        let slot = &self.slots[kind];
        slot.pas.is_some() && slot.texture.is_some()
    }

    /// Compute the PAS of `input` for one descriptor
    pub fn calc_pas(
        &mut self,
        kind: DescriptorType,
        input: &[f64],
        noof_frames: usize,
    ) -> Result<Grid<'_>, ExtractorError> {
        let grid = checked_grid(input, self.noof_scales, noof_frames)?;
        let pas = self.slots[kind]
            .pas
            .as_mut()
            .ok_or(ExtractorError::NotInitialized {
                descriptor: kind.code(),
            })?;
        Ok(pas.calc_pas(&grid))
    }

    /// Compute PAS and texture of `input` for one descriptor
    ///
    /// # Returns
    /// `(pas, texture)` views, both valid until the next call
    pub fn calc_texture(
        &mut self,
        kind: DescriptorType,
        input: &[f64],
        noof_frames: usize,
    ) -> Result<(Grid<'_>, Grid<'_>), ExtractorError> {
        let grid = checked_grid(input, self.noof_scales, noof_frames)?;
        let not_initialized = ExtractorError::NotInitialized {
            descriptor: kind.code(),
        };
        let DescriptorSlot { pas, texture } = &mut self.slots[kind];
        let (Some(pas), Some(texture)) = (pas.as_mut(), texture.as_mut()) else {
            return Err(not_initialized);
        };

        pas.calc_pas(&grid);
        let pas: &PasCalculator = pas;
        let texture = texture.calc_texture(&pas.pas());
        Ok((pas.pas(), texture))
    }

    pub fn pas(&self, kind: DescriptorType) -> Result<Grid<'_>, ExtractorError> {
        Ok(self.pas_calculator(kind)?.pas())
    }

    pub fn texture(&self, kind: DescriptorType) -> Result<Grid<'_>, ExtractorError> {
        Ok(self.texture_calculator(kind)?.texture())
    }

    pub fn pas_margin(&self, kind: DescriptorType) -> Result<Margin, ExtractorError> {
        Ok(self.pas_calculator(kind)?.margin())
    }

    pub fn texture_margin(&self, kind: DescriptorType) -> Result<Margin, ExtractorError> {
        Ok(self.texture_calculator(kind)?.margin())
    }

    pub fn pas_calculator(&self, kind: DescriptorType) -> Result<&PasCalculator, ExtractorError> {
        self.slots[kind]
            .pas
            .as_ref()
            .ok_or(ExtractorError::NotInitialized {
                descriptor: kind.code(),
            })
    }

    pub fn texture_calculator(
        &self,
        kind: DescriptorType,
    ) -> Result<&TextureCalculator, ExtractorError> {
        self.slots[kind]
            .texture
            .as_ref()
            .ok_or(ExtractorError::NotInitialized {
                descriptor: kind.code(),
            })
    }

    pub fn pas_stats(&self, kind: DescriptorType) -> Result<PasStats, ExtractorError> {
        Ok(self.pas_calculator(kind)?.stats())
    }

    pub fn texture_stats(&self, kind: DescriptorType) -> Result<TextureStats, ExtractorError> {
        Ok(self.texture_calculator(kind)?.stats())
    }

    /// Restore a PAS calculator; the texture calculator of the same type is
    /// dropped until its stats are restored too
    pub fn set_pas_stats(
        &mut self,
        kind: DescriptorType,
        stats: &PasStats,
    ) -> Result<(), ExtractorError> {
        if self.noof_scales != 0 && stats.noof_scales != self.noof_scales {
            return Err(ExtractorError::DimensionMismatch {
                expected: self.noof_scales,
                actual: stats.noof_scales,
            });
        }

        let pas = PasCalculator::from_stats(stats, self.config.normalize)?;
        self.noof_scales = stats.noof_scales;
        self.slots[kind] = DescriptorSlot {
            pas: Some(pas),
            texture: None,
        };
        Ok(())
    }

    /// Restore a texture calculator on top of the PAS calculator of its type
    pub fn set_texture_stats(
        &mut self,
        kind: DescriptorType,
        stats: &TextureStats,
    ) -> Result<(), ExtractorError> {
        let texture = TextureCalculator::from_stats(self.pas_calculator(kind)?, stats)?;
        self.slots[kind].texture = Some(texture);
        Ok(())
    }
}

fn checked_grid(data: &[f64], noof_scales: usize, noof_frames: usize) -> Result<Grid<'_>, ExtractorError> {
    let expected = noof_scales * noof_frames;
    if data.len() != expected {
        return Err(ExtractorError::BufferSizeMismatch {
            expected,
            actual: data.len(),
        });
    }
    Ok(Grid::new(data, noof_scales, noof_frames))
}

/// Mean frame offset of a crossing, the frame step of a diagonal
fn frame_midpoint(tc: &ThresholdCrossing) -> Option<f64> {
    tc.is_found()
        .then(|| f64::from(tc.sub_point().frame + tc.super_point().frame) / 2.0)
}

/// Mean scale offset of a crossing from its centre, the scale step of a diagonal
fn scale_midpoint(tc: &ThresholdCrossing) -> Option<f64> {
    tc.is_found().then(|| {
        f64::from(tc.sub_point().scale + tc.super_point().scale - 2 * tc.scale() as i32) / 2.0
    })
}

/// Floor- and ceil-rounded scans of one diagonal, merged
fn merged_scan(
    correlator: &mut Correlator<'_>,
    scale: usize,
    dscale: Option<f64>,
    dframe: Option<f64>,
    threshold: f64,
) -> ThresholdCrossing {
    let (Some(dscale), Some(dframe)) = (dscale, dframe) else {
        return ThresholdCrossing::illegal(scale);
    };
    let floor = correlator.scan_line_rational(scale, dscale, dframe, floor_map, threshold);
    let ceil = correlator.scan_line_rational(scale, dscale, dframe, ceil_map, threshold);
    ThresholdCrossing::merge(&floor, &ceil, threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_descriptor_codes() {
        for kind in DescriptorType::ALL {
            assert_eq!(DescriptorType::from_code(kind.code()), Ok(kind));
        }
        assert_eq!(
            DescriptorType::from_code('x'),
            Err(ExtractorError::UnknownDescriptor { code: 'x' })
        );
        assert_eq!(DescriptorType::ChirpUp.to_string(), "chirp_up");
    }

    #[test]
    fn test_descriptor_table_indexing() {
        let mut table = DescriptorTable::from_fn(|kind| kind.code());
        assert_eq!(table[DescriptorType::Tone], 's');
        table[DescriptorType::ChirpDown] = 'x';
        let codes: Vec<char> = table.iter().map(|(_, code)| *code).collect();
        assert_eq!(codes, vec!['f', 's', 'u', 'x']);
    }

    #[test]
    fn test_uninitialized_descriptor_errors() {
        let mut extractor = StructureExtractor::new(ExtractorConfig::default()).unwrap();
        let err = extractor.calc_pas(DescriptorType::Pulse, &[], 0).unwrap_err();
        assert_eq!(err, ExtractorError::NotInitialized { descriptor: 'f' });
        assert!(extractor.pas_stats(DescriptorType::Tone).is_err());
    }

    #[test]
    fn test_init_checks_buffer() {
        let mut extractor = StructureExtractor::new(ExtractorConfig::default()).unwrap();
        let err = extractor.init(&[0.0; 5], 2, 3).unwrap_err();
        assert_eq!(
            err,
            ExtractorError::BufferSizeMismatch {
                expected: 6,
                actual: 5
            }
        );

        let err = extractor.init(&[0.0; 2], 2, 1).unwrap_err();
        assert_eq!(err.code(), 3004);
    }

    #[test]
    fn test_set_threshold_validates() {
        let mut extractor = StructureExtractor::new(ExtractorConfig::default()).unwrap();
        assert!(extractor.set_threshold(0.35).is_ok());
        assert_eq!(extractor.threshold(), 0.35);
        assert!(extractor.set_threshold(f64::NAN).is_err());
        assert_eq!(extractor.threshold(), 0.35);
    }

    #[test]
    fn test_midpoints_require_found_crossings() {
        assert_eq!(frame_midpoint(&ThresholdCrossing::illegal(2)), None);
        assert_eq!(scale_midpoint(&ThresholdCrossing::illegal(2)), None);
    }
}
