// Calibration module - persisted extractor calibration
//
// The workflow:
// 1. Calibrate a StructureExtractor on a noise representation
// 2. Capture its per-descriptor stats into a StructureCache and save it
// 3. Later, load the cache and rebuild the extractor with
//    StructureExtractor::from_cache, skipping the correlator scans

pub mod cache;

pub use cache::{CachedDescriptor, StructureCache};
