//! Output grid selection for reprojection

use tracing::debug;

use crate::error::{Error, Result};
use crate::raster::{GridSpec, GridTransform};
use crate::types::BoundingBox;

use super::transformer::Transformer;

/// Samples taken along each edge of the source grid
const EDGE_SAMPLES: u32 = 21;
/// Interior lattice samples per axis
const INTERIOR_SAMPLES: u32 = 10;

/// Computes the north-up grid a raster lands on after transformation to
/// the transformer's target CRS.
///
/// The extent is the bounding box of the projected source edges and an
/// interior lattice. The pixel size is chosen so the output keeps the
/// source's pixel count along the extent diagonal, with square pixels.
/// A north-up grid transformed to its own CRS is returned unchanged.
pub fn default_transform(src: &GridSpec, transformer: &Transformer) -> Result<GridSpec> {
    if transformer.is_identity() && src.transform.is_north_up() {
        return Ok(*src);
    }

    let extent = projected_extent(src, transformer)?;
    let dst_crs = transformer.to_crs();

    let src_diagonal = (src.width as f64).hypot(src.height as f64);
    let dst_diagonal = extent.width().hypot(extent.height());
    let resolution = dst_diagonal / src_diagonal;
    if !(resolution.is_finite() && resolution > 0.0) {
        return Err(Error::InvalidGeometry(format!(
            "source grid collapses to a degenerate extent in {}",
            dst_crs
        )));
    }

    let width = ((extent.width() / resolution).round() as u32).max(1);
    let height = ((extent.height() / resolution).round() as u32).max(1);

    let transform = GridTransform::north_up(extent.min_x, extent.max_y, resolution, -resolution, dst_crs)?;
    debug!(width, height, resolution, crs = %dst_crs, "selected output grid");
    Ok(GridSpec::new(transform, width, height))
}

fn projected_extent(src: &GridSpec, transformer: &Transformer) -> Result<BoundingBox> {
    let (w, h) = (src.width as f64, src.height as f64);
    let mut points = Vec::with_capacity((EDGE_SAMPLES * 4 + INTERIOR_SAMPLES * INTERIOR_SAMPLES) as usize);

    for i in 0..EDGE_SAMPLES {
        let t = i as f64 / (EDGE_SAMPLES - 1) as f64;
        points.push((t * w, 0.0));
        points.push((t * w, h));
        points.push((0.0, t * h));
        points.push((w, t * h));
    }
    for i in 0..INTERIOR_SAMPLES {
        for j in 0..INTERIOR_SAMPLES {
            let col = (i as f64 + 0.5) / INTERIOR_SAMPLES as f64 * w;
            let row = (j as f64 + 0.5) / INTERIOR_SAMPLES as f64 * h;
            points.push((col, row));
        }
    }

    for point in points.iter_mut() {
        *point = src.transform.pixel_to_world(point.0, point.1);
    }
    transformer.transform_in_place(&mut points);

    BoundingBox::from_points(points).ok_or_else(|| {
        Error::InvalidGeometry(format!(
            "no part of the source grid can be transformed to {}",
            transformer.to_crs()
        ))
    })
}
