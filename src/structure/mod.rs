// Structure descriptors - pulse, tone and chirp activation and texture
//
// Pipeline per descriptor type:
//   calibration grid -> Correlator -> threshold crossings
//   crossings + calibration grid -> PasCalculator (margins, moments)
//   crossings + PAS -> TextureCalculator (context areas, moments)
// After calibration, any grid with the same scale count can be pushed
// through calc_pas / calc_texture.

pub mod correlator;
pub mod crossing;
pub mod extractor;
pub mod moments;
pub mod pas;
pub mod texture;


pub use correlator::{CorrelationCache, CorrelationSource, Correlator};
pub use crossing::{CrossingPoint, CrossingStatus, ThresholdCrossing, ThresholdPair};
pub use extractor::{DescriptorTable, DescriptorType, StructureExtractor};
pub use moments::ScaleMoments;
pub use pas::{PasCalculator, PasStats};
pub use texture::{ContextArea, ContextInterval, TextureCalculator, TextureStats};
