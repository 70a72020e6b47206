//! In-memory rasters and their georeferencing

pub mod dataset;
pub mod grid;
pub mod resample;

pub use dataset::{PixelBuffer, RasterDataset};
pub use grid::{GridSpec, GridTransform};
pub use resample::Resampling;
