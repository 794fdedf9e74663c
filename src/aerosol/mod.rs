pub mod kernel;
pub mod parabola;
pub mod pixel;
pub mod processor;
pub mod retrieval;

pub use kernel::{CorrectionKernel, LegacyCorrection};
pub use pixel::{Geometry, PixelInputs, RetrievalResult};
pub use processor::TileProcessor;
pub use retrieval::AerosolRetriever;
