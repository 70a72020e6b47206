//! Affine georeferencing of pixel grids

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::projection::Crs;
use crate::types::{BoundingBox, Dimensions};

/// Affine mapping from pixel space to world space, bound to a CRS.
///
/// Coefficients use the GDAL geotransform order `[a, b, c, d, e, f]`:
///
/// ```text
/// world_x = a + b * col + c * row
/// world_y = d + e * col + f * row
/// ```
///
/// Pixel `(col, row)` addresses the pixel's top-left corner; its center is
/// at `(col + 0.5, row + 0.5)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridTransform {
    coeffs: [f64; 6],
    crs: Crs,
}

const MIN_DETERMINANT: f64 = 1e-12;

impl GridTransform {
    /// Creates a transform, rejecting non-invertible coefficients
    pub fn new(coeffs: [f64; 6], crs: Crs) -> Result<Self> {
        let transform = Self { coeffs, crs };
        if !coeffs.iter().all(|c| c.is_finite()) || transform.determinant().abs() < MIN_DETERMINANT {
            return Err(Error::InvalidRaster(format!(
                "affine transform {:?} is not invertible",
                coeffs
            )));
        }
        Ok(transform)
    }

    /// North-up transform from the top-left corner and pixel size.
    /// `pixel_height` is negative for the usual top-down row order.
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64, crs: Crs) -> Result<Self> {
        Self::new([origin_x, pixel_width, 0.0, origin_y, 0.0, pixel_height], crs)
    }

    pub fn coeffs(&self) -> [f64; 6] {
        self.coeffs
    }

    pub fn crs(&self) -> Crs {
        self.crs
    }

    pub fn determinant(&self) -> f64 {
        let [_, b, c, _, e, f] = self.coeffs;
        b * f - c * e
    }

    /// No rotation or shear terms
    pub fn is_north_up(&self) -> bool {
        self.coeffs[2] == 0.0 && self.coeffs[4] == 0.0
    }

    /// Absolute pixel size along x and y for north-up grids
    pub fn pixel_size(&self) -> (f64, f64) {
        (self.coeffs[1].abs(), self.coeffs[5].abs())
    }

    /// Converts pixel coordinates to world coordinates
    pub fn pixel_to_world(&self, col: f64, row: f64) -> (f64, f64) {
        let [a, b, c, d, e, f] = self.coeffs;
        (a + b * col + c * row, d + e * col + f * row)
    }

    /// Converts world coordinates to (fractional) pixel coordinates
    pub fn world_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let [a, b, c, d, e, f] = self.coeffs;
        let det = self.determinant();
        let dx = x - a;
        let dy = y - d;
        ((f * dx - c * dy) / det, (-e * dx + b * dy) / det)
    }

    /// Same transform with its origin moved to pixel `(col, row)`
    pub fn offset(&self, col: f64, row: f64) -> Self {
        let (x, y) = self.pixel_to_world(col, row);
        let mut coeffs = self.coeffs;
        coeffs[0] = x;
        coeffs[3] = y;
        Self { coeffs, crs: self.crs }
    }

    /// World extent of a `width` x `height` pixel block
    pub fn bounds(&self, width: u32, height: u32) -> BoundingBox {
        let (w, h) = (width as f64, height as f64);
        let corners = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)]
            .map(|(col, row)| self.pixel_to_world(col, row));
        // Corners of an invertible finite transform are always finite
        BoundingBox::from_points(corners).unwrap_or(BoundingBox::new(0.0, 0.0, 0.0, 0.0))
    }
}

/// A pixel grid: georeferencing plus dimensions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub transform: GridTransform,
    pub width: u32,
    pub height: u32,
}

impl GridSpec {
    pub fn new(transform: GridTransform, width: u32, height: u32) -> Self {
        Self { transform, width, height }
    }

    pub fn crs(&self) -> Crs {
        self.transform.crs()
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn bounds(&self) -> BoundingBox {
        self.transform.bounds(self.width, self.height)
    }

    /// World coordinates of the center of pixel `(col, row)`
    pub fn pixel_center(&self, col: u32, row: u32) -> (f64, f64) {
        self.transform.pixel_to_world(col as f64 + 0.5, row as f64 + 0.5)
    }
}
