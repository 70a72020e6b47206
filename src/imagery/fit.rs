//! Request size fitting for imagery providers

use crate::types::Dimensions;

/// Scales `width` x `height` down to respect both provider limits while
/// keeping the aspect ratio.
///
/// Both sides are first brought under `max_dim` (never scaled up), then the
/// pixel count is brought under `max_pixels`. Results are floored and never
/// smaller than one pixel.
pub fn fit(width: u32, height: u32, max_pixels: u64, max_dim: u32) -> Dimensions {
    let (w, h) = (width.max(1) as f64, height.max(1) as f64);
    let max_dim = max_dim.max(1) as f64;

    // Scale as (side * limit) / longest so the limiting side lands exactly on max_dim
    let longest = w.max(h);
    let (mut fw, mut fh) = if longest > max_dim {
        ((w * max_dim / longest).floor(), (h * max_dim / longest).floor())
    } else {
        (w, h)
    };
    fw = fw.max(1.0);
    fh = fh.max(1.0);

    let pixels = fw * fh;
    let max_pixels = max_pixels.max(1) as f64;
    if pixels > max_pixels {
        let shrink = (max_pixels / pixels).sqrt();
        fw = (fw * shrink).floor().max(1.0);
        fh = (fh * shrink).floor().max(1.0);
    }

    Dimensions::new(fw as u32, fh as u32)
}
