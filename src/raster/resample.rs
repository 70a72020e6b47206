//! Resampling kernels
//!
//! Kernels sample a single band at continuous pixel coordinates, where
//! `(0, 0)` is the top-left corner of the top-left pixel.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resampling {
    Nearest,
    #[default]
    Bilinear,
}

impl Resampling {
    /// Samples `band` (row-major, `width` x `height`) at `(x, y)`.
    ///
    /// Returns `None` outside the raster or where no valid source pixel
    /// contributes.
    pub fn sample<F>(&self, band: &[f32], width: u32, height: u32, x: f64, y: f64, is_nodata: F) -> Option<f32>
    where
        F: Fn(f32) -> bool,
    {
        let (w, h) = (width as f64, height as f64);
        if !(x >= 0.0 && y >= 0.0 && x <= w && y <= h) {
            return None;
        }
        match self {
            Resampling::Nearest => nearest(band, width, height, x, y, is_nodata),
            Resampling::Bilinear => bilinear(band, width, height, x, y, is_nodata),
        }
    }
}

fn nearest<F>(band: &[f32], width: u32, height: u32, x: f64, y: f64, is_nodata: F) -> Option<f32>
where
    F: Fn(f32) -> bool,
{
    let col = (x.floor() as u32).min(width - 1);
    let row = (y.floor() as u32).min(height - 1);
    let value = band[row as usize * width as usize + col as usize];
    if is_nodata(value) {
        None
    } else {
        Some(value)
    }
}

/// Bilinear interpolation between the four surrounding pixel centers.
/// Missing neighbours drop out and the remaining weights are renormalized.
fn bilinear<F>(band: &[f32], width: u32, height: u32, x: f64, y: f64, is_nodata: F) -> Option<f32>
where
    F: Fn(f32) -> bool,
{
    let sx = x - 0.5;
    let sy = y - 0.5;
    let x0 = sx.floor();
    let y0 = sy.floor();
    let fx = sx - x0;
    let fy = sy - y0;

    let mut sum = 0.0f64;
    let mut weight_sum = 0.0f64;

    for (dx, dy, weight) in [
        (0, 0, (1.0 - fx) * (1.0 - fy)),
        (1, 0, fx * (1.0 - fy)),
        (0, 1, (1.0 - fx) * fy),
        (1, 1, fx * fy),
    ] {
        if weight <= 0.0 {
            continue;
        }
        let col = x0 as i64 + dx;
        let row = y0 as i64 + dy;
        if col < 0 || row < 0 || col >= width as i64 || row >= height as i64 {
            continue;
        }
        let value = band[row as usize * width as usize + col as usize];
        if is_nodata(value) {
            continue;
        }
        sum += value as f64 * weight;
        weight_sum += weight;
    }

    if weight_sum > 1e-9 {
        Some((sum / weight_sum) as f32)
    } else {
        None
    }
}
