// StructureCache - persisted calibration of a structure extractor
//
// Calibration runs every correlator scan over the noise grid, which is the
// expensive part of the pipeline. The cache keeps what the calculators need
// afterwards (crossings, margins, moments and context areas) so a fitted
// extractor can be rebuilt from a JSON file.

use std::fs;
use std::path::Path;

use crate::error::{log_stats_error, ExtractorError, StatsError};
use crate::structure::{DescriptorType, PasStats, StructureExtractor, TextureStats};

/// Calibration of one descriptor type
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CachedDescriptor {
    pub kind: DescriptorType,
    pub pas: PasStats,
    pub texture: TextureStats,
}

/// Serializable calibration of every fitted descriptor type
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StructureCache {
    /// Correlation threshold the crossings were found with
    pub threshold: f64,
    pub max_delay: usize,
    /// Whether moments in the stats were fitted for normalized output
    pub normalize: bool,
    pub noof_scales: usize,
    pub descriptors: Vec<CachedDescriptor>,
}

impl StructureCache {
    /// Snapshot every initialized descriptor of `extractor`
    ///
    /// # Returns
    /// `Err(NotInitialized)` when no descriptor has been calibrated
    pub fn capture(extractor: &StructureExtractor) -> Result<Self, ExtractorError> {
        let mut descriptors = Vec::new();
        for kind in DescriptorType::ALL {
            if !extractor.is_initialized(kind) {
                continue;
            }
            descriptors.push(CachedDescriptor {
                kind,
                pas: extractor.pas_stats(kind)?,
                texture: extractor.texture_stats(kind)?,
            });
        }

        if descriptors.is_empty() {
            let first = extractor
                .config()
                .descriptors
                .first()
                .copied()
                .unwrap_or(DescriptorType::Pulse);
            return Err(ExtractorError::NotInitialized {
                descriptor: first.code(),
            });
        }

        let (noof_scales, max_delay) = extractor.dimensions();
        Ok(Self {
            threshold: extractor.threshold(),
            max_delay,
            normalize: extractor.config().normalize,
            noof_scales,
            descriptors,
        })
    }

    pub fn descriptor(&self, kind: DescriptorType) -> Option<&CachedDescriptor> {
        self.descriptors.iter().find(|entry| entry.kind == kind)
    }

    pub fn kinds(&self) -> Vec<DescriptorType> {
        self.descriptors.iter().map(|entry| entry.kind).collect()
    }

    /// Write the cache as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), StatsError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)?;
        log::info!(
            "[StructureCache] Saved {} descriptor(s) to {:?}",
            self.descriptors.len(),
            path.as_ref()
        );
        Ok(())
    }

    /// Read a cache written by [`StructureCache::save`]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, StatsError> {
        let cache: Self = fs::read_to_string(&path)
            .map_err(StatsError::from)
            .and_then(|contents| Ok(serde_json::from_str(&contents)?))
            .inspect_err(|err| log_stats_error(err, "StructureCache::load"))?;
        log::info!(
            "[StructureCache] Loaded {} descriptor(s) over {} scales from {:?}",
            cache.descriptors.len(),
            cache.noof_scales,
            path.as_ref()
        );
        Ok(cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractorConfig;
    use crate::error::ErrorCode;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn calibrated(descriptors: Vec<DescriptorType>) -> StructureExtractor {
        let mut rng = StdRng::seed_from_u64(21);
        let (ns, nf) = (6, 300);
        let raw: Vec<f64> = (0..ns * nf).map(|_| rng.gen_range(-1.0..1.0)).collect();
        // two-tap frame smoothing keeps crossings within a few frames
        let noise: Vec<f64> = (0..ns * nf)
            .map(|i| if i % nf == 0 { raw[i] } else { raw[i] + raw[i - 1] })
            .collect();

        let config = ExtractorConfig {
            descriptors,
            max_delay: 8,
            ..ExtractorConfig::default()
        };
        let mut extractor = StructureExtractor::new(config).unwrap();
        extractor.init(&noise, ns, nf).unwrap();
        extractor
    }

    #[test]
    fn test_capture_keeps_fitted_descriptors() {
        let extractor = calibrated(vec![DescriptorType::Tone, DescriptorType::ChirpUp]);
        let cache = StructureCache::capture(&extractor).unwrap();

        assert_eq!(cache.kinds(), vec![DescriptorType::Tone, DescriptorType::ChirpUp]);
        assert_eq!(cache.noof_scales, 6);
        assert_eq!(cache.max_delay, 8);
        assert!(cache.descriptor(DescriptorType::Pulse).is_none());
        assert_eq!(
            cache.descriptor(DescriptorType::Tone).unwrap().pas,
            extractor.pas_stats(DescriptorType::Tone).unwrap()
        );
    }

    #[test]
    fn test_capture_of_uncalibrated_extractor_fails() {
        let extractor = StructureExtractor::new(ExtractorConfig::default()).unwrap();
        let err = StructureCache::capture(&extractor).unwrap_err();
        assert_eq!(err, ExtractorError::NotInitialized { descriptor: 'f' });
    }

    #[test]
    fn test_save_and_load() {
        let extractor = calibrated(DescriptorType::ALL.to_vec());
        let cache = StructureCache::capture(&extractor).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("structure_cache.json");
        cache.save(&path).unwrap();
        let loaded = StructureCache::load(&path).unwrap();

        assert_eq!(loaded.kinds(), cache.kinds());
        assert_eq!(loaded.threshold, cache.threshold);
        for (a, b) in loaded.descriptors.iter().zip(&cache.descriptors) {
            assert_eq!(a.pas.sample_points, b.pas.sample_points);
            assert_eq!(a.texture.context_areas, b.texture.context_areas);
            assert_eq!(a.pas.margin, b.pas.margin);
        }
    }

    #[test]
    fn test_load_errors() {
        let err = StructureCache::load("/nonexistent/cache.json").unwrap_err();
        assert_eq!(err.code(), 4004);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{\"threshold\": 0.2").unwrap();
        let err = StructureCache::load(&path).unwrap_err();
        assert!(matches!(err, StatsError::Parse { .. }));
    }
}
