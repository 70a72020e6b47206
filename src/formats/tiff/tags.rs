//! GeoTIFF tag and GeoKey constants

/// Model pixel scale (ScaleX, ScaleY, ScaleZ)
pub const MODEL_PIXEL_SCALE: u16 = 33550;

/// Model tiepoint (I, J, K, X, Y, Z)*
pub const MODEL_TIEPOINT: u16 = 33922;

/// Model transformation, 4x4 row-major matrix
pub const MODEL_TRANSFORMATION: u16 = 34264;

/// GeoKey directory
pub const GEO_KEY_DIRECTORY: u16 = 34735;

/// GeoKey ASCII parameters
pub const GEO_ASCII_PARAMS: u16 = 34737;

/// GDAL no-data value, stored as ASCII
pub const GDAL_NODATA: u16 = 42113;

/// GeoKey identifiers and values
pub mod geo_keys {
    pub const MODEL_TYPE: u16 = 1024;
    pub const RASTER_TYPE: u16 = 1025;
    pub const GEOGRAPHIC_TYPE: u16 = 2048;
    pub const PROJECTED_CS_TYPE: u16 = 3072;

    pub const MODEL_TYPE_PROJECTED: u16 = 1;
    pub const MODEL_TYPE_GEOGRAPHIC: u16 = 2;

    pub const RASTER_PIXEL_IS_AREA: u16 = 1;
    pub const RASTER_PIXEL_IS_POINT: u16 = 2;

    /// Marks a user-defined (non-EPSG) CRS
    pub const USER_DEFINED: u16 = 32767;
}
