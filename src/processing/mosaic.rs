//! Merging overlapping tiles into one raster

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::raster::dataset::nodata_matches;
use crate::raster::{GridSpec, GridTransform, RasterDataset};
use crate::types::BoundingBox;

/// Tolerance, in output pixels, for snapping tile edges onto the output grid
const EDGE_EPSILON: f64 = 1e-6;

/// Merges datasets into one raster covering their union.
///
/// Inputs must share CRS, band count, pixel type and no-data marker, and
/// must be north-up. The output uses the finest pixel size among them.
/// Where inputs overlap, later inputs overwrite earlier ones for every
/// valid sample; pixels no input covers hold the no-data value.
pub fn merge(datasets: &[RasterDataset]) -> Result<RasterDataset> {
    let first = datasets
        .first()
        .ok_or_else(|| Error::EmptyInput("no rasters to merge".to_string()))?;
    check_compatible(first, datasets)?;

    let grid = union_grid(datasets)?;
    let band_len = grid.pixel_count();
    let fill = first.fill_value();
    let mut bands = vec![vec![fill; band_len]; first.band_count()];

    for dataset in datasets {
        paste(dataset, &grid, &mut bands);
    }

    info!(
        inputs = datasets.len(),
        width = grid.width,
        height = grid.height,
        "merged tiles"
    );
    RasterDataset::from_bands(grid, first.data_type(), bands, first.output_nodata())
}

fn check_compatible(first: &RasterDataset, datasets: &[RasterDataset]) -> Result<()> {
    for (index, dataset) in datasets.iter().enumerate() {
        if dataset.crs() != first.crs() {
            return Err(Error::IncompatibleInput(format!(
                "raster {} is in {}, expected {}",
                index,
                dataset.crs(),
                first.crs()
            )));
        }
        if dataset.band_count() != first.band_count() {
            return Err(Error::IncompatibleInput(format!(
                "raster {} has {} bands, expected {}",
                index,
                dataset.band_count(),
                first.band_count()
            )));
        }
        if dataset.data_type() != first.data_type() {
            return Err(Error::IncompatibleInput(format!(
                "raster {} is {}, expected {}",
                index,
                dataset.data_type().name(),
                first.data_type().name()
            )));
        }
        if !nodata_matches(dataset.nodata(), first.nodata()) {
            return Err(Error::IncompatibleInput(format!(
                "raster {} has no-data {:?}, expected {:?}",
                index,
                dataset.nodata(),
                first.nodata()
            )));
        }
        if !dataset.transform().is_north_up() {
            return Err(Error::IncompatibleInput(format!("raster {} is rotated", index)));
        }
    }
    Ok(())
}

fn union_grid(datasets: &[RasterDataset]) -> Result<GridSpec> {
    let mut bounds: Option<BoundingBox> = None;
    let mut res_x = f64::INFINITY;
    let mut res_y = f64::INFINITY;

    for dataset in datasets {
        let (px, py) = dataset.transform().pixel_size();
        res_x = res_x.min(px);
        res_y = res_y.min(py);
        let b = dataset.bounds();
        bounds = Some(match bounds {
            Some(acc) => acc.union(&b),
            None => b,
        });
    }
    let bounds = bounds.ok_or_else(|| Error::EmptyInput("no rasters to merge".to_string()))?;

    let width = ((bounds.width() / res_x).round() as u32).max(1);
    let height = ((bounds.height() / res_y).round() as u32).max(1);
    let crs = datasets[0].crs();
    let transform = GridTransform::north_up(bounds.min_x, bounds.max_y, res_x, -res_y, crs)?;
    debug!(?bounds, res_x, res_y, "mosaic union grid");
    Ok(GridSpec::new(transform, width, height))
}

/// Copies valid samples of `dataset` into the output bands, sampling the
/// source pixel under each output pixel center
fn paste(dataset: &RasterDataset, grid: &GridSpec, bands: &mut [Vec<f32>]) {
    let b = dataset.bounds();
    let (c0, r0) = grid.transform.world_to_pixel(b.min_x, b.max_y);
    let (c1, r1) = grid.transform.world_to_pixel(b.max_x, b.min_y);

    let col_start = (c0.min(c1) - EDGE_EPSILON).floor().max(0.0) as u32;
    let col_end = ((c0.max(c1) + EDGE_EPSILON).ceil() as u32).min(grid.width);
    let row_start = (r0.min(r1) - EDGE_EPSILON).floor().max(0.0) as u32;
    let row_end = ((r0.max(r1) + EDGE_EPSILON).ceil() as u32).min(grid.height);

    let source = dataset.bands_f32();
    let (src_w, src_h) = (dataset.width() as i64, dataset.height() as i64);
    let out_w = grid.width as usize;

    for row in row_start..row_end {
        for col in col_start..col_end {
            let (x, y) = grid.pixel_center(col, row);
            let (sx, sy) = dataset.transform().world_to_pixel(x, y);
            let (sc, sr) = (sx.floor() as i64, sy.floor() as i64);
            if sc < 0 || sr < 0 || sc >= src_w || sr >= src_h {
                continue;
            }
            let src_index = sr as usize * src_w as usize + sc as usize;
            let dst_index = row as usize * out_w + col as usize;
            for (band, out) in source.iter().zip(bands.iter_mut()) {
                let value = band[src_index];
                if !dataset.is_nodata(value) {
                    out[dst_index] = value;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::Crs;
    use crate::raster::PixelBuffer;
    use crate::types::DataType;

    fn tile(origin_x: f64, origin_y: f64, width: u32, height: u32, value: f32) -> RasterDataset {
        let transform = GridTransform::north_up(origin_x, origin_y, 1.0, -1.0, Crs::epsg(5179)).unwrap();
        let grid = GridSpec::new(transform, width, height);
        RasterDataset::filled(grid, 1, DataType::F32, value, Some(-9999.0)).unwrap()
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(merge(&[]), Err(Error::EmptyInput(_))));
    }

    #[test]
    fn test_disjoint_union_leaves_gap() {
        let a = tile(0.0, 2.0, 2, 2, 1.0);
        let b = tile(4.0, 2.0, 2, 2, 2.0);
        let merged = merge(&[a, b]).unwrap();

        assert_eq!(merged.width(), 6);
        assert_eq!(merged.height(), 2);
        assert_eq!(merged.bounds(), BoundingBox::new(0.0, 0.0, 6.0, 2.0));
        assert_eq!(
            merged.band_f32(0)[..6].to_vec(),
            vec![1.0, 1.0, -9999.0, -9999.0, 2.0, 2.0]
        );
        assert_eq!(merged.nodata(), Some(-9999.0));
    }

    #[test]
    fn test_last_writer_wins() {
        let a = tile(0.0, 1.0, 3, 1, 1.0);
        let b = tile(1.0, 1.0, 3, 1, 2.0);
        let merged = merge(&[a.clone(), b.clone()]).unwrap();
        assert_eq!(merged.band_f32(0), vec![1.0, 2.0, 2.0, 2.0]);

        let merged = merge(&[b, a]).unwrap();
        assert_eq!(merged.band_f32(0), vec![1.0, 1.0, 1.0, 2.0]);
    }

    #[test]
    fn test_nodata_does_not_overwrite() {
        let a = tile(0.0, 1.0, 2, 1, 5.0);
        let transform = GridTransform::north_up(0.0, 1.0, 1.0, -1.0, Crs::epsg(5179)).unwrap();
        let b = RasterDataset::new(
            GridSpec::new(transform, 2, 1),
            1,
            PixelBuffer::F32(vec![-9999.0, 7.0]),
            Some(-9999.0),
        )
        .unwrap();
        let merged = merge(&[a, b]).unwrap();
        assert_eq!(merged.band_f32(0), vec![5.0, 7.0]);
    }

    #[test]
    fn test_finest_resolution_used() {
        let coarse = {
            let t = GridTransform::north_up(0.0, 2.0, 2.0, -2.0, Crs::epsg(5179)).unwrap();
            RasterDataset::filled(GridSpec::new(t, 1, 1), 1, DataType::F32, 3.0, Some(-9999.0)).unwrap()
        };
        let fine = tile(2.0, 2.0, 2, 2, 4.0);
        let merged = merge(&[coarse, fine]).unwrap();
        assert_eq!((merged.width(), merged.height()), (4, 2));
        assert_eq!(merged.band_f32(0), vec![3.0, 3.0, 4.0, 4.0, 3.0, 3.0, 4.0, 4.0]);
    }

    #[test]
    fn test_incompatible_inputs() {
        let a = tile(0.0, 1.0, 1, 1, 1.0);

        let other_crs = {
            let t = GridTransform::north_up(0.0, 1.0, 1.0, -1.0, Crs::WGS84).unwrap();
            RasterDataset::filled(GridSpec::new(t, 1, 1), 1, DataType::F32, 1.0, Some(-9999.0)).unwrap()
        };
        assert!(matches!(merge(&[a.clone(), other_crs]), Err(Error::IncompatibleInput(_))));

        let other_nodata = {
            let t = GridTransform::north_up(0.0, 1.0, 1.0, -1.0, Crs::epsg(5179)).unwrap();
            RasterDataset::filled(GridSpec::new(t, 1, 1), 1, DataType::F32, 1.0, Some(0.0)).unwrap()
        };
        assert!(matches!(merge(&[a.clone(), other_nodata]), Err(Error::IncompatibleInput(_))));

        let other_bands = {
            let t = GridTransform::north_up(0.0, 1.0, 1.0, -1.0, Crs::epsg(5179)).unwrap();
            RasterDataset::filled(GridSpec::new(t, 1, 1), 2, DataType::F32, 1.0, Some(-9999.0)).unwrap()
        };
        assert!(matches!(merge(&[a, other_bands]), Err(Error::IncompatibleInput(_))));
    }
}
