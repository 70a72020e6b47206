//! Co-registration of a raster onto an existing grid

use tracing::info;

use crate::error::Result;
use crate::raster::{GridSpec, RasterDataset, Resampling};

use super::reproject::warp;

/// Resamples `src` onto `target` exactly: the result's CRS, transform and
/// dimensions are `target`'s, bit for bit.
pub fn resample_to_grid(src: &RasterDataset, target: &GridSpec, resampling: Resampling) -> Result<RasterDataset> {
    info!(
        from = %src.crs(),
        to = %target.crs(),
        width = target.width,
        height = target.height,
        "aligning raster to target grid"
    );
    warp(src, target, resampling)
}

/// Resamples `src` onto the grid of another raster
pub fn resample_to_match(src: &RasterDataset, target: &RasterDataset, resampling: Resampling) -> Result<RasterDataset> {
    resample_to_grid(src, target.grid(), resampling)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Geometry, GeometrySet};
    use crate::processing::clip::clip;
    use crate::projection::Crs;
    use crate::raster::GridTransform;
    use crate::types::{BoundingBox, DataType};

    #[test]
    fn test_clip_then_align_share_grid() {
        let dem_transform = GridTransform::north_up(500.0, 900.0, 30.0, -30.0, Crs::epsg(5179)).unwrap();
        let dem = RasterDataset::filled(GridSpec::new(dem_transform, 40, 30), 1, DataType::F32, 12.0, None).unwrap();
        let aoi = GeometrySet::new(
            Crs::epsg(5179),
            vec![Geometry::rectangle(&BoundingBox::new(610.0, 220.0, 1111.0, 777.0))],
        );
        let clipped = clip(&dem, &aoi).unwrap();

        let imagery_transform = GridTransform::north_up(0.0, 2000.0, 10.0, -10.0, Crs::epsg(5179)).unwrap();
        let imagery =
            RasterDataset::filled(GridSpec::new(imagery_transform, 200, 200), 3, DataType::U8, 90.0, None).unwrap();
        let aligned = resample_to_match(&imagery, &clipped, Resampling::Bilinear).unwrap();

        assert_eq!(aligned.grid(), clipped.grid());
        assert_eq!(aligned.band_count(), 3);
        assert_eq!(aligned.data_type(), DataType::U8);
        assert!(aligned.band_f32(2).iter().all(|&v| v == 90.0));
    }

    #[test]
    fn test_align_across_crs() {
        let target_transform = GridTransform::north_up(14_000_000.0, 4_300_000.0, 1000.0, -1000.0, Crs::epsg(3857)).unwrap();
        let target = GridSpec::new(target_transform, 20, 10);

        let src_transform = GridTransform::north_up(125.0, 37.0, 0.01, -0.01, Crs::WGS84).unwrap();
        let src = RasterDataset::filled(GridSpec::new(src_transform, 500, 300), 1, DataType::F32, 1.0, None).unwrap();

        let out = resample_to_grid(&src, &target, Resampling::Nearest).unwrap();
        assert_eq!(*out.grid(), target);
        assert_eq!(out.crs(), Crs::epsg(3857));
    }
}
