//! Raster processing stages
//!
//! Each stage borrows its input and returns a new
//! [`RasterDataset`](crate::raster::RasterDataset); nothing is modified in
//! place.

pub mod align;
pub mod clip;
pub mod mosaic;
pub mod normalize;
pub mod rasterize;
pub mod reproject;

pub use align::{resample_to_grid, resample_to_match};
pub use clip::clip;
pub use mosaic::merge;
pub use normalize::{quantize, BitDepth, PercentileClip, StretchRange};
pub use rasterize::{burn, burn_layers, DEFAULT_BURN_VALUE};
pub use reproject::{reproject, warp};
