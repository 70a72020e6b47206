//! Burning vector geometries into grid-aligned masks
//!
//! Polygons cover a pixel when the pixel center lies inside them (even-odd
//! across the polygon's rings). Lines cover every pixel their segments pass
//! through.

use tracing::debug;

use crate::error::Result;
use crate::geometry::{Geometry, GeometrySet};
use crate::raster::{GridSpec, PixelBuffer, RasterDataset};

/// Alpha value for covered pixels unless configured otherwise
pub const DEFAULT_BURN_VALUE: u8 = 255;

/// Burns `shapes` into an RGBA mask on exactly `grid`
pub fn burn(grid: &GridSpec, shapes: &GeometrySet, burn_value: u8) -> Result<RasterDataset> {
    burn_layers(grid, std::slice::from_ref(shapes), burn_value)
}

/// Burns the union of several layers in one pass.
///
/// The result has four U8 bands: R, G and B are zero, alpha carries
/// `burn_value` where any geometry covers the pixel and 0 elsewhere.
pub fn burn_layers(grid: &GridSpec, layers: &[GeometrySet], burn_value: u8) -> Result<RasterDataset> {
    let mut mask = vec![false; grid.pixel_count()];

    for layer in layers {
        let reprojected;
        let layer = if layer.crs == grid.crs() {
            layer
        } else {
            reprojected = layer.to_crs(grid.crs())?;
            &reprojected
        };
        mark_coverage(grid, &layer.geometries, &mut mask);
    }

    let covered = mask.iter().filter(|&&c| c).count();
    debug!(covered, total = mask.len(), "burned mask");

    let mut data = vec![0u8; grid.pixel_count() * 3];
    data.extend(mask.iter().map(|&c| if c { burn_value } else { 0 }));
    RasterDataset::new(*grid, 4, PixelBuffer::U8(data), None)
}

/// Coverage of `geometries` (already in the grid's CRS) as a row-major mask
pub fn coverage<'a, I>(grid: &GridSpec, geometries: I) -> Vec<bool>
where
    I: IntoIterator<Item = &'a Geometry>,
{
    let mut mask = vec![false; grid.pixel_count()];
    mark_coverage(grid, geometries, &mut mask);
    mask
}

fn mark_coverage<'a, I>(grid: &GridSpec, geometries: I, mask: &mut [bool])
where
    I: IntoIterator<Item = &'a Geometry>,
{
    for geometry in geometries {
        match geometry {
            Geometry::Polygon { rings } => {
                let rings: Vec<Vec<(f64, f64)>> = rings.iter().map(|ring| to_pixels(grid, ring)).collect();
                fill_polygon(grid.width, grid.height, &rings, mask);
            }
            Geometry::LineString { points } => {
                let points = to_pixels(grid, points);
                for segment in points.windows(2) {
                    trace_segment(grid.width, grid.height, segment[0], segment[1], mask);
                }
            }
        }
    }
}

fn to_pixels(grid: &GridSpec, points: &[(f64, f64)]) -> Vec<(f64, f64)> {
    points
        .iter()
        .map(|&(x, y)| grid.transform.world_to_pixel(x, y))
        .collect()
}

/// Scanline fill at pixel-center rows
fn fill_polygon(width: u32, height: u32, rings: &[Vec<(f64, f64)>], mask: &mut [bool]) {
    let mut edges = Vec::new();
    for ring in rings {
        let n = ring.len();
        if n < 3 {
            continue;
        }
        for i in 0..n {
            let a = ring[i];
            let b = ring[(i + 1) % n];
            if a != b && a.0.is_finite() && a.1.is_finite() && b.0.is_finite() && b.1.is_finite() {
                edges.push((a, b));
            }
        }
    }
    if edges.is_empty() {
        return;
    }

    let (min_y, max_y) = edges.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (a, b)| {
        (lo.min(a.1).min(b.1), hi.max(a.1).max(b.1))
    });
    let first_row = min_y.floor().max(0.0) as u32;
    let last_row = (max_y.ceil().min(height as f64)).max(0.0) as u32;

    let mut crossings = Vec::new();
    for row in first_row..last_row {
        let yc = row as f64 + 0.5;
        crossings.clear();
        for &((x0, y0), (x1, y1)) in &edges {
            if (y0 <= yc) != (y1 <= yc) {
                crossings.push(x0 + (yc - y0) * (x1 - x0) / (y1 - y0));
            }
        }
        crossings.sort_by(|a, b| a.total_cmp(b));

        let row_start = row as usize * width as usize;
        for span in crossings.chunks_exact(2) {
            let first = (span[0] - 0.5).ceil().max(0.0);
            let end = (span[1] - 0.5).ceil().min(width as f64);
            if end <= first {
                continue;
            }
            for col in first as usize..end as usize {
                mask[row_start + col] = true;
            }
        }
    }
}

/// Marks every cell a segment passes through (grid traversal after
/// clipping the segment to the raster)
fn trace_segment(width: u32, height: u32, a: (f64, f64), b: (f64, f64), mask: &mut [bool]) {
    let Some((a, b)) = clip_segment(a, b, width as f64, height as f64) else {
        return;
    };
    let cell = |v: f64, limit: u32| (v.floor() as i64).clamp(0, limit as i64 - 1);

    let (mut col, mut row) = (cell(a.0, width), cell(a.1, height));
    let (end_col, end_row) = (cell(b.0, width), cell(b.1, height));
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);

    let step_col = if dx > 0.0 { 1 } else { -1 };
    let step_row = if dy > 0.0 { 1 } else { -1 };
    let boundary = |pos: i64, step: i64| if step > 0 { (pos + 1) as f64 } else { pos as f64 };

    let mut t_max_x = if dx != 0.0 { (boundary(col, step_col) - a.0) / dx } else { f64::INFINITY };
    let mut t_max_y = if dy != 0.0 { (boundary(row, step_row) - a.1) / dy } else { f64::INFINITY };
    let t_delta_x = if dx != 0.0 { (1.0 / dx).abs() } else { f64::INFINITY };
    let t_delta_y = if dy != 0.0 { (1.0 / dy).abs() } else { f64::INFINITY };

    let steps = (end_col - col).abs() + (end_row - row).abs();
    mask[row as usize * width as usize + col as usize] = true;
    for _ in 0..steps {
        if t_max_x < t_max_y {
            col += step_col;
            t_max_x += t_delta_x;
        } else {
            row += step_row;
            t_max_y += t_delta_y;
        }
        if col < 0 || row < 0 || col >= width as i64 || row >= height as i64 {
            break;
        }
        mask[row as usize * width as usize + col as usize] = true;
    }
}

/// Liang-Barsky clip of a segment to `[0, w] x [0, h]`
fn clip_segment(a: (f64, f64), b: (f64, f64), w: f64, h: f64) -> Option<((f64, f64), (f64, f64))> {
    if !(a.0.is_finite() && a.1.is_finite() && b.0.is_finite() && b.1.is_finite()) {
        return None;
    }
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let mut t0 = 0.0f64;
    let mut t1 = 1.0f64;

    for (p, q) in [(-dx, a.0), (dx, w - a.0), (-dy, a.1), (dy, h - a.1)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else {
            let r = q / p;
            if p < 0.0 {
                t0 = t0.max(r);
            } else {
                t1 = t1.min(r);
            }
        }
    }
    if t0 > t1 {
        return None;
    }
    Some((
        (a.0 + t0 * dx, a.1 + t0 * dy),
        (a.0 + t1 * dx, a.1 + t1 * dy),
    ))
}
