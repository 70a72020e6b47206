//! Cropping rasters to an area of interest

use tracing::info;

use crate::error::{Error, Result};
use crate::geometry::GeometrySet;
use crate::raster::{GridSpec, RasterDataset};
use crate::types::BoundingBox;

use super::rasterize::coverage;

/// Pixel coordinates are rounded to this many decimals before taking the
/// window, so float noise does not add a sliver row or column
const WINDOW_PRECISION: f64 = 1e6;

/// Crops `src` to the pixel window around `shapes` and masks pixels whose
/// centers fall outside every polygon.
///
/// Shapes are reprojected to the raster CRS when needed; line geometries
/// are ignored. Fails with `EmptyIntersection` when the polygons miss the
/// raster entirely.
pub fn clip(src: &RasterDataset, shapes: &GeometrySet) -> Result<RasterDataset> {
    let reprojected;
    let shapes = if shapes.crs == src.crs() {
        shapes
    } else {
        reprojected = shapes.to_crs(src.crs())?;
        &reprojected
    };

    let polygons = GeometrySet::new(shapes.crs, shapes.polygons().cloned().collect());
    let bounds = polygons
        .bounds()
        .ok_or_else(|| Error::InvalidGeometry("no polygon to clip with".to_string()))?;
    let overlap = bounds.intersection(&src.bounds()).ok_or(Error::EmptyIntersection)?;

    let (col_off, row_off, width, height) = window(src, &overlap)?;
    let grid = GridSpec::new(src.transform().offset(col_off as f64, row_off as f64), width, height);
    let inside = coverage(&grid, polygons.geometries.iter());

    let fill = src.fill_value();
    let mut bands = Vec::with_capacity(src.band_count());
    for band in 0..src.band_count() {
        let mut out = Vec::with_capacity(grid.pixel_count());
        for row in 0..height {
            for col in 0..width {
                let index = row as usize * width as usize + col as usize;
                let value = if inside[index] {
                    src.value(band, col_off + col, row_off + row)
                } else {
                    fill
                };
                out.push(value);
            }
        }
        bands.push(out);
    }

    info!(
        width,
        height,
        col_off,
        row_off,
        inside = inside.iter().filter(|&&c| c).count(),
        "clipped raster to AOI"
    );
    RasterDataset::from_bands(grid, src.data_type(), bands, src.output_nodata())
}

/// Pixel window `(col, row, width, height)` of a world box, clamped to the raster
fn window(src: &RasterDataset, bbox: &BoundingBox) -> Result<(u32, u32, u32, u32)> {
    let snap = |v: f64| (v * WINDOW_PRECISION).round() / WINDOW_PRECISION;
    let pixels: Vec<(f64, f64)> = bbox
        .corners()
        .iter()
        .map(|&(x, y)| {
            let (c, r) = src.transform().world_to_pixel(x, y);
            (snap(c), snap(r))
        })
        .collect();

    let min_col = pixels.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let max_col = pixels.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    let min_row = pixels.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let max_row = pixels.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);

    let col0 = min_col.floor().clamp(0.0, src.width() as f64) as u32;
    let col1 = max_col.ceil().clamp(0.0, src.width() as f64) as u32;
    let row0 = min_row.floor().clamp(0.0, src.height() as f64) as u32;
    let row1 = max_row.ceil().clamp(0.0, src.height() as f64) as u32;

    if col1 <= col0 || row1 <= row0 {
        return Err(Error::EmptyIntersection);
    }
    Ok((col0, row0, col1 - col0, row1 - row0))
}
