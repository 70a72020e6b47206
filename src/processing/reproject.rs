//! Reprojection of rasters into another CRS

use tracing::{debug, info};

use crate::error::Result;
use crate::projection::{default_transform, Crs, Transformer};
use crate::raster::{GridSpec, RasterDataset, Resampling};

/// Reprojects `src` into `dst_crs` on a grid covering its whole extent.
///
/// Destination pixels without source coverage hold no-data.
pub fn reproject(src: &RasterDataset, dst_crs: Crs, resampling: Resampling) -> Result<RasterDataset> {
    let forward = Transformer::new(src.crs(), dst_crs)?;
    let grid = default_transform(src.grid(), &forward)?;
    info!(
        from = %src.crs(),
        to = %dst_crs,
        width = grid.width,
        height = grid.height,
        "reprojecting raster"
    );
    warp(src, &grid, resampling)
}

/// Resamples `src` onto `grid`, which may be in any CRS.
///
/// Each destination pixel center is transformed into the source CRS and
/// sampled with `resampling`. The output keeps the source pixel type and
/// band count, and its grid is exactly `grid`.
///
/// Uncovered pixels hold the source no-data marker. An integer source
/// without one has nothing to mark them with, so they are written as 0 and
/// the output declares 0 as no-data whenever any pixel was left uncovered.
pub fn warp(src: &RasterDataset, grid: &GridSpec, resampling: Resampling) -> Result<RasterDataset> {
    let inverse = Transformer::new(grid.crs(), src.crs())?;
    let source = src.bands_f32();
    let fill = src.fill_value();
    let (width, height) = (grid.width as usize, grid.height as usize);
    let mut bands = vec![vec![fill; grid.pixel_count()]; src.band_count()];
    let mut centers = Vec::with_capacity(width);
    let mut filled = 0usize;

    for row in 0..grid.height {
        centers.clear();
        centers.extend((0..grid.width).map(|col| grid.pixel_center(col, row)));
        inverse.transform_in_place(&mut centers);

        let row_start = row as usize * width;
        for (col, &(x, y)) in centers.iter().enumerate() {
            if !(x.is_finite() && y.is_finite()) {
                continue;
            }
            let (sx, sy) = src.transform().world_to_pixel(x, y);
            let mut any = false;
            for (band, out) in source.iter().zip(bands.iter_mut()) {
                if let Some(value) = resampling.sample(band, src.width(), src.height(), sx, sy, |v| src.is_nodata(v)) {
                    out[row_start + col] = value;
                    any = true;
                }
            }
            if any {
                filled += 1;
            }
        }
    }

    let total = width * height;
    debug!(filled, total, "warped raster");
    let nodata = match src.output_nodata() {
        None if filled < total => Some(f64::from(fill)),
        marker => marker,
    };
    RasterDataset::from_bands(*grid, src.data_type(), bands, nodata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{GridTransform, PixelBuffer};
    use crate::types::DataType;
    use approx::assert_relative_eq;

    fn ramp(width: u32, height: u32, crs: Crs, origin: (f64, f64), size: f64) -> RasterDataset {
        let transform = GridTransform::north_up(origin.0, origin.1, size, -size, crs).unwrap();
        let values = (0..width * height).map(|i| (i % width) as f32).collect();
        RasterDataset::new(GridSpec::new(transform, width, height), 1, PixelBuffer::F32(values), Some(-9999.0))
            .unwrap()
    }

    #[test]
    fn test_same_crs_is_identity() {
        let src = ramp(6, 4, Crs::WGS84, (120.0, 40.0), 0.5);
        let out = reproject(&src, Crs::WGS84, Resampling::Bilinear).unwrap();
        assert_eq!(out.grid(), src.grid());
        assert_eq!(out.band_f32(0), src.band_f32(0));
    }

    #[test]
    fn test_to_mercator_covers_source() {
        let src = ramp(40, 30, Crs::WGS84, (126.0, 38.0), 0.05);
        let out = reproject(&src, Crs::epsg(3857), Resampling::Nearest).unwrap();

        assert_eq!(out.crs(), Crs::epsg(3857));
        assert_eq!(out.data_type(), DataType::F32);
        let values = out.band_f32(0);
        let valid = values.iter().filter(|v| !out.is_nodata(**v)).count();
        // An axis-aligned box stays axis-aligned in Mercator, so nearly everything is covered
        assert!(valid as f64 > 0.95 * values.len() as f64);
        assert!(values.iter().filter(|v| !out.is_nodata(**v)).all(|&v| (0.0..40.0).contains(&v)));
    }

    #[test]
    fn test_warp_uncovered_is_nodata() {
        let src = ramp(4, 4, Crs::epsg(5179), (0.0, 4.0), 1.0);
        let transform = GridTransform::north_up(2.0, 4.0, 1.0, -1.0, Crs::epsg(5179)).unwrap();
        let grid = GridSpec::new(transform, 4, 1);
        let out = warp(&src, &grid, Resampling::Nearest).unwrap();
        assert_eq!(out.band_f32(0), vec![2.0, 3.0, -9999.0, -9999.0]);
        assert_eq!(*out.grid(), grid);
    }

    #[test]
    fn test_integer_output_is_rounded() {
        let transform = GridTransform::north_up(0.0, 1.0, 1.0, -1.0, Crs::epsg(5179)).unwrap();
        let src = RasterDataset::new(
            GridSpec::new(transform, 2, 1),
            1,
            PixelBuffer::U16(vec![10, 13]),
            None,
        )
        .unwrap();
        let half = GridTransform::north_up(0.0, 1.0, 0.5, -1.0, Crs::epsg(5179)).unwrap();
        let out = warp(&src, &GridSpec::new(half, 4, 1), Resampling::Bilinear).unwrap();
        assert_eq!(out.data_type(), DataType::U16);
        let values = out.band_f32(0);
        assert_eq!(values[0], 10.0);
        assert_relative_eq!(values[1], 11.0); // 10.75 rounds up
        assert_eq!(values[3], 13.0);
    }

    #[test]
    fn test_integer_without_nodata_marks_uncovered() {
        let transform = GridTransform::north_up(0.0, 2.0, 1.0, -1.0, Crs::epsg(5179)).unwrap();
        let src = RasterDataset::new(GridSpec::new(transform, 2, 2), 1, PixelBuffer::U8(vec![7; 4]), None).unwrap();
        let out = warp(&src, &GridSpec::new(transform, 4, 2), Resampling::Nearest).unwrap();
        assert_eq!(out.band_f32(0), vec![7.0, 7.0, 0.0, 0.0, 7.0, 7.0, 0.0, 0.0]);
        assert_eq!(out.nodata(), Some(0.0));
        assert!(out.is_nodata(out.value(0, 3, 1)));

        let same = warp(&src, src.grid(), Resampling::Nearest).unwrap();
        assert_eq!(same.nodata(), None);
    }
}
