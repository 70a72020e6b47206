//! GeoTIFF georeferencing

use std::io::{Read, Seek};

use tiff::decoder::Decoder;
use tiff::tags::Tag;

use crate::error::{Error, Result};
use crate::projection::{Crs, CrsKind};
use crate::raster::GridTransform;

use super::tags::{self, geo_keys};

/// Georeferencing found in a GeoTIFF's tags
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoInfo {
    /// Model pixel scale (ScaleX, ScaleY, ScaleZ)
    pub pixel_scale: Option<(f64, f64, f64)>,
    /// Model tiepoints (pixel coord -> geo coord mapping)
    pub tiepoints: Vec<TiePoint>,
    /// Model transformation matrix, row-major
    pub transformation: Option<[f64; 16]>,
    /// EPSG code from the geographic or projected CS key
    pub epsg_code: Option<u32>,
    /// Raster type key; 2 means pixel-is-point
    pub raster_type: Option<u16>,
    /// GDAL no-data marker
    pub nodata: Option<f64>,
    /// Citation from the GeoKey ASCII parameters
    pub citation: Option<String>,
}

/// A GeoTIFF tiepoint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TiePoint {
    pub pixel_x: f64,
    pub pixel_y: f64,
    pub pixel_z: f64,
    pub geo_x: f64,
    pub geo_y: f64,
    pub geo_z: f64,
}

pub(crate) fn tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

impl GeoInfo {
    /// Extracts GeoTIFF information from the decoder's current image.
    /// Missing tags leave the corresponding fields empty.
    pub fn from_decoder<R: Read + Seek>(decoder: &mut Decoder<R>) -> Self {
        let mut info = GeoInfo::default();

        if let Ok(values) = decoder.get_tag_f64_vec(tag(tags::MODEL_PIXEL_SCALE)) {
            if values.len() >= 2 {
                info.pixel_scale = Some((values[0], values[1], values.get(2).copied().unwrap_or(0.0)));
            }
        }

        if let Ok(values) = decoder.get_tag_f64_vec(tag(tags::MODEL_TIEPOINT)) {
            info.tiepoints = values
                .chunks_exact(6)
                .map(|c| TiePoint {
                    pixel_x: c[0],
                    pixel_y: c[1],
                    pixel_z: c[2],
                    geo_x: c[3],
                    geo_y: c[4],
                    geo_z: c[5],
                })
                .collect();
        }

        if let Ok(values) = decoder.get_tag_f64_vec(tag(tags::MODEL_TRANSFORMATION)) {
            if values.len() == 16 {
                let mut matrix = [0.0; 16];
                matrix.copy_from_slice(&values);
                info.transformation = Some(matrix);
            }
        }

        if let Ok(keys) = decoder.get_tag_u16_vec(tag(tags::GEO_KEY_DIRECTORY)) {
            info.apply_geo_keys(&keys);
        }

        if let Ok(ascii) = decoder.get_tag_ascii_string(tag(tags::GEO_ASCII_PARAMS)) {
            let ascii = ascii.trim_end_matches(['|', '\0']).to_string();
            if !ascii.is_empty() {
                info.citation = Some(ascii);
            }
        }

        if let Ok(text) = decoder.get_tag_ascii_string(tag(tags::GDAL_NODATA)) {
            info.nodata = text.trim_matches(|c: char| c.is_whitespace() || c == '\0').parse().ok();
        }

        info
    }

    fn apply_geo_keys(&mut self, keys: &[u16]) {
        if keys.len() < 4 {
            return;
        }
        let count = keys[3] as usize;
        for entry in keys[4..].chunks_exact(4).take(count) {
            let (key_id, location, value) = (entry[0], entry[1], entry[3]);
            // Only keys stored inline in the directory carry plain values
            if location != 0 {
                continue;
            }
            match key_id {
                geo_keys::GEOGRAPHIC_TYPE | geo_keys::PROJECTED_CS_TYPE
                    if value != geo_keys::USER_DEFINED && value != 0 =>
                {
                    // A projected code wins over the geographic base CRS
                    if key_id == geo_keys::PROJECTED_CS_TYPE || self.epsg_code.is_none() {
                        self.epsg_code = Some(value as u32);
                    }
                }
                geo_keys::RASTER_TYPE => self.raster_type = Some(value),
                _ => {}
            }
        }
    }

    /// Computes the affine transform from pixel to geo coordinates
    ///
    /// Returns [a, b, c, d, e, f] where:
    /// geo_x = a + b * pixel_x + c * pixel_y
    /// geo_y = d + e * pixel_x + f * pixel_y
    pub fn affine_transform(&self) -> Option<[f64; 6]> {
        let mut coeffs = if let Some(m) = &self.transformation {
            [m[3], m[0], m[1], m[7], m[4], m[5]]
        } else if let (Some((scale_x, scale_y, _)), Some(tp)) = (&self.pixel_scale, self.tiepoints.first()) {
            [
                tp.geo_x - scale_x * tp.pixel_x,
                *scale_x,
                0.0,
                tp.geo_y + scale_y * tp.pixel_y,
                0.0,
                -scale_y,
            ]
        } else {
            return None;
        };

        // Pixel-is-point rasters tie the pixel center; move to the corner
        if self.raster_type == Some(geo_keys::RASTER_PIXEL_IS_POINT) {
            coeffs[0] -= 0.5 * (coeffs[1] + coeffs[2]);
            coeffs[3] -= 0.5 * (coeffs[4] + coeffs[5]);
        }
        Some(coeffs)
    }

    pub fn crs(&self) -> Option<Crs> {
        self.epsg_code.map(Crs::epsg)
    }

    /// Grid transform of the raster, requiring both an affine mapping and
    /// an EPSG code
    pub fn grid_transform(&self) -> Result<GridTransform> {
        let coeffs = self
            .affine_transform()
            .ok_or_else(|| Error::InvalidRaster("no GeoTIFF georeferencing tags".to_string()))?;
        let crs = self.crs().ok_or_else(|| Error::UnsupportedCrs {
            crs: self.citation.clone().unwrap_or_else(|| "unknown".to_string()),
            reason: "no EPSG code in GeoKey directory".to_string(),
        })?;
        GridTransform::new(coeffs, crs)
    }
}

/// GeoKey directory for an EPSG-coded CRS, pixel-is-area
pub fn geo_key_directory(crs: Crs) -> Result<Vec<u16>> {
    let code = u16::try_from(crs.code())
        .ok()
        .filter(|&c| c != geo_keys::USER_DEFINED)
        .ok_or_else(|| Error::Unsupported(format!("{} cannot be stored as a GeoKey", crs)))?;

    let (model_type, crs_key) = match crs.kind()? {
        CrsKind::Geographic => (geo_keys::MODEL_TYPE_GEOGRAPHIC, geo_keys::GEOGRAPHIC_TYPE),
        CrsKind::Projected => (geo_keys::MODEL_TYPE_PROJECTED, geo_keys::PROJECTED_CS_TYPE),
    };

    // Header: version, revision, minor revision, key count
    let mut keys = vec![1, 1, 0, 3];
    keys.extend_from_slice(&[geo_keys::MODEL_TYPE, 0, 1, model_type]);
    keys.extend_from_slice(&[geo_keys::RASTER_TYPE, 0, 1, geo_keys::RASTER_PIXEL_IS_AREA]);
    keys.extend_from_slice(&[crs_key, 0, 1, code]);
    Ok(keys)
}

impl std::fmt::Display for GeoInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "GeoTIFF Information:")?;

        if let Some(epsg) = self.epsg_code {
            writeln!(f, "  EPSG Code: {}", epsg)?;
        }

        if let Some(ref name) = self.citation {
            writeln!(f, "  Citation: {}", name)?;
        }

        if let Some((sx, sy, _sz)) = self.pixel_scale {
            writeln!(f, "  Pixel Size: {} x {}", sx, sy)?;
        }

        if let Some(tp) = self.tiepoints.first() {
            writeln!(f, "  Origin (geo): ({}, {})", tp.geo_x, tp.geo_y)?;
        }

        if let Some(nodata) = self.nodata {
            writeln!(f, "  No-data: {}", nodata)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn north_up_info() -> GeoInfo {
        GeoInfo {
            pixel_scale: Some((30.0, 30.0, 0.0)),
            tiepoints: vec![TiePoint {
                pixel_x: 0.0,
                pixel_y: 0.0,
                pixel_z: 0.0,
                geo_x: 900_000.0,
                geo_y: 2_000_000.0,
                geo_z: 0.0,
            }],
            epsg_code: Some(5179),
            ..GeoInfo::default()
        }
    }

    #[test]
    fn test_affine_from_scale_and_tiepoint() {
        let info = north_up_info();
        assert_eq!(
            info.affine_transform(),
            Some([900_000.0, 30.0, 0.0, 2_000_000.0, 0.0, -30.0])
        );
        let transform = info.grid_transform().unwrap();
        assert_eq!(transform.crs(), Crs::epsg(5179));
    }

    #[test]
    fn test_pixel_is_point_shift() {
        let info = GeoInfo { raster_type: Some(geo_keys::RASTER_PIXEL_IS_POINT), ..north_up_info() };
        assert_eq!(
            info.affine_transform(),
            Some([899_985.0, 30.0, 0.0, 2_000_015.0, 0.0, -30.0])
        );
    }

    #[test]
    fn test_model_transformation() {
        let mut matrix = [0.0; 16];
        matrix[0] = 2.0;
        matrix[1] = 0.5;
        matrix[3] = 100.0;
        matrix[4] = 0.25;
        matrix[5] = -2.0;
        matrix[7] = 50.0;
        matrix[15] = 1.0;
        let info = GeoInfo { transformation: Some(matrix), epsg_code: Some(3857), ..GeoInfo::default() };
        assert_eq!(info.affine_transform(), Some([100.0, 2.0, 0.5, 50.0, 0.25, -2.0]));
    }

    #[test]
    fn test_geo_keys_parsed() {
        let mut info = GeoInfo::default();
        let keys = [1, 1, 0, 4, 1024, 0, 1, 1, 1025, 0, 1, 1, 2048, 0, 1, 4326, 3072, 0, 1, 5179];
        info.apply_geo_keys(&keys);
        assert_eq!(info.epsg_code, Some(5179));
        assert_eq!(info.raster_type, Some(1));
    }

    #[test]
    fn test_geo_key_directory() {
        let keys = geo_key_directory(Crs::WGS84).unwrap();
        assert_eq!(keys, vec![1, 1, 0, 3, 1024, 0, 1, 2, 1025, 0, 1, 1, 2048, 0, 1, 4326]);

        let keys = geo_key_directory(Crs::epsg(5179)).unwrap();
        assert_eq!(&keys[12..], &[3072, 0, 1, 5179]);

        assert!(geo_key_directory(Crs::epsg(100_000)).is_err());
    }

    #[test]
    fn test_geo_key_directory_outside_4000_block() {
        let keys = geo_key_directory(Crs::epsg(7844)).unwrap();
        assert_eq!(&keys[4..8], &[1024, 0, 1, 2]);
        assert_eq!(&keys[12..], &[2048, 0, 1, 7844]);

        let err = geo_key_directory(Crs::epsg(4978)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedCrs { .. }));
    }

    #[test]
    fn test_missing_crs_is_error() {
        let info = GeoInfo { epsg_code: None, ..north_up_info() };
        assert!(matches!(info.grid_transform(), Err(Error::UnsupportedCrs { .. })));
    }
}
