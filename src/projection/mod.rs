//! Coordinate reference systems and coordinate transformation
//!
//! CRS handling is delegated to PROJ through the `proj` crate. Everything
//! above this module only deals with [`Crs`] identifiers and [`Transformer`]s.

pub mod crs;
pub mod transformer;
pub mod warp;

pub use crs::{Crs, CrsKind};
pub use transformer::Transformer;
pub use warp::default_transform;

/// Common EPSG codes
pub mod epsg {
    /// WGS84 geographic (longitude/latitude)
    pub const WGS84: u32 = 4326;
    /// Korea 2000 / Unified CS
    pub const KOREA_UNIFIED: u32 = 5179;
}
