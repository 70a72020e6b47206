//! GeoTIFF support on top of the `tiff` crate

pub mod decode;
pub mod encode;
pub mod geotiff;
pub mod tags;

pub use decode::{read_geo_info, read_geotiff};
pub use encode::write_geotiff;
pub use geotiff::{GeoInfo, TiePoint};
