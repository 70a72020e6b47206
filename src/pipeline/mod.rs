//! Pipeline driver
//!
//! Runs the stages in order, each one finishing (and writing its artifact)
//! before the next starts:
//!
//! 1. mosaic the elevation tiles
//! 2. reproject the mosaic to the target CRS
//! 3. clip to the AOI
//! 4. stretch and quantize (plus an optional preview PNG)
//! 5. burn the AOI mask, then the optional water mask
//! 6. fetch imagery for the AOI and align it to the clipped grid
//!
//! Any failure aborts the run. Artifacts of completed stages stay on disk;
//! the failing stage leaves nothing behind.

pub mod observer;
pub mod sources;

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use tracing::info;

use crate::config::{ImageryConfig, PipelineConfig};
use crate::error::{Error, Result};
use crate::formats::{read_geotiff, write_atomically, write_geotiff, write_png};
use crate::geometry::GeometrySet;
use crate::imagery::{client_from_config, fit, ImageryClient, ImageryRequest};
use crate::processing::{burn, burn_layers, clip, merge, quantize, reproject, resample_to_match, BitDepth, StretchRange};
use crate::projection::Crs;
use crate::raster::GridSpec;
use crate::types::Dimensions;

pub use observer::{ProgressObserver, Stage, TracingObserver};
pub use sources::{DirectoryTileSource, GeoJsonVectorSource, TileSource, VectorSource};

/// Summary of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    /// Every artifact written, in order
    pub artifacts: Vec<PathBuf>,
    /// Elevation values mapped to the lowest and highest output code
    pub stretch: StretchRange,
    /// Size of the clipped elevation raster
    pub dimensions: Dimensions,
    /// Suggested plane scale for 3D tools, one unit per thousand pixels
    pub plane_scale: (f64, f64),
    /// Requested imagery size, when imagery was fetched
    pub imagery_size: Option<Dimensions>,
}

/// Imagery fetched outside a full run
#[derive(Debug, Clone, Serialize)]
pub struct ImageryReport {
    pub path: PathBuf,
    pub size: Dimensions,
    pub bytes: u64,
}

/// The DEM preparation pipeline
pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    tiles: Box<dyn TileSource + 'a>,
    vectors: Box<dyn VectorSource + 'a>,
    imagery: Option<Box<dyn ImageryClient + 'a>>,
}

impl<'a> Pipeline<'a> {
    /// Pipeline reading tiles from `tiles_dir` and GeoJSON layers, with no
    /// imagery client
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self {
            config,
            tiles: Box::new(DirectoryTileSource::new(&config.tiles_dir)),
            vectors: Box::new(GeoJsonVectorSource),
            imagery: None,
        }
    }

    /// Pipeline with the imagery client the configuration selects
    pub fn from_config(config: &'a PipelineConfig) -> Result<Self> {
        let mut pipeline = Self::new(config);
        if let Some(imagery) = &config.imagery {
            pipeline.imagery = Some(client_from_config(imagery)?);
        }
        Ok(pipeline)
    }

    pub fn with_tile_source(mut self, tiles: impl TileSource + 'a) -> Self {
        self.tiles = Box::new(tiles);
        self
    }

    pub fn with_vector_source(mut self, vectors: impl VectorSource + 'a) -> Self {
        self.vectors = Box::new(vectors);
        self
    }

    pub fn with_imagery_client(mut self, client: impl ImageryClient + 'a) -> Self {
        self.imagery = Some(Box::new(client));
        self
    }

    /// Runs every stage, reporting progress through `tracing`
    pub fn run(&self) -> Result<PipelineReport> {
        self.run_with(&mut TracingObserver)
    }

    pub fn run_with(&self, observer: &mut dyn ProgressObserver) -> Result<PipelineReport> {
        let config = self.config;
        let names = &config.artifacts;
        let mut artifacts = Vec::new();

        let merged = timed(observer, Stage::Mosaic, || {
            let tiles = self
                .tiles
                .tile_paths()?
                .iter()
                .map(|path| read_geotiff(path))
                .collect::<Result<Vec<_>>>()?;
            merge(&tiles)
        })?;
        self.emit(observer, Stage::Mosaic, &names.merged, &mut artifacts, |p| write_geotiff(p, &merged))?;

        let reprojected = timed(observer, Stage::Reproject, || {
            reproject(&merged, config.target_crs, config.resampling)
        })?;
        drop(merged);
        let reprojected_name = names.reprojected_name(config.target_crs);
        self.emit(observer, Stage::Reproject, &reprojected_name, &mut artifacts, |p| {
            write_geotiff(p, &reprojected)
        })?;

        let aoi = self.vectors.load(&config.aoi)?;
        let clipped = timed(observer, Stage::Clip, || clip(&reprojected, &aoi))?;
        drop(reprojected);
        self.emit(observer, Stage::Clip, &names.clipped, &mut artifacts, |p| write_geotiff(p, &clipped))?;

        let (rendered, stretch) = timed(observer, Stage::Normalize, || {
            quantize(&clipped, config.percentile_clip, config.bit_depth)
        })?;
        self.emit(observer, Stage::Normalize, &names.rendered, &mut artifacts, |p| {
            write_geotiff(p, &rendered)
        })?;
        if config.preview {
            let preview = match config.bit_depth {
                BitDepth::Eight => rendered.clone(),
                BitDepth::Sixteen => quantize(&clipped, config.percentile_clip, BitDepth::Eight)?.0,
            };
            self.emit(observer, Stage::Normalize, &names.preview, &mut artifacts, |p| write_png(p, &preview))?;
        }

        let grid = *rendered.grid();
        let mask = timed(observer, Stage::AoiMask, || burn(&grid, &aoi, config.burn_value))?;
        self.emit(observer, Stage::AoiMask, &names.aoi_mask, &mut artifacts, |p| write_png(p, &mask))?;

        if !config.water.is_empty() {
            let water = timed(observer, Stage::WaterMask, || {
                let layers = config
                    .water
                    .iter()
                    .map(|layer| self.vectors.load(layer))
                    .collect::<Result<Vec<_>>>()?;
                burn_layers(&grid, &layers, config.burn_value)
            })?;
            self.emit(observer, Stage::WaterMask, &names.water_mask, &mut artifacts, |p| write_png(p, &water))?;
        }

        let mut imagery_size = None;
        if let (Some(client), Some(imagery)) = (&self.imagery, &config.imagery) {
            let size = imagery.size.unwrap_or_else(|| fit_grid(&grid, imagery));
            let request = imagery_request(&aoi, size, imagery)?;
            self.fetch(observer, client.as_ref(), &request, &mut artifacts)?;

            let aligned = timed(observer, Stage::Align, || {
                let raw = read_geotiff(&config.artifact_path(&names.imagery_raw))?;
                resample_to_match(&raw, &clipped, config.resampling)
            })?;
            self.emit(observer, Stage::Align, &names.imagery_aligned, &mut artifacts, |p| {
                write_geotiff(p, &aligned)
            })?;
            imagery_size = Some(size);
        }

        let dimensions = grid.dimensions();
        let plane_scale = (dimensions.width as f64 / 1000.0, dimensions.height as f64 / 1000.0);
        info!(
            width = dimensions.width,
            height = dimensions.height,
            vmin = stretch.vmin,
            vmax = stretch.vmax,
            plane_scale_x = plane_scale.0,
            plane_scale_y = plane_scale.1,
            "pipeline finished"
        );

        Ok(PipelineReport { artifacts, stretch, dimensions, plane_scale, imagery_size })
    }

    /// Fetches only the imagery for the configured AOI.
    ///
    /// The request size is `size`, else the configured size, else the size
    /// fitted to an existing clipped elevation artifact.
    pub fn fetch_imagery(&self, size: Option<Dimensions>, observer: &mut dyn ProgressObserver) -> Result<ImageryReport> {
        let config = self.config;
        let imagery = config
            .imagery
            .as_ref()
            .ok_or_else(|| Error::Config("no `imagery` section configured".to_string()))?;
        let client = self
            .imagery
            .as_ref()
            .ok_or_else(|| Error::Config("no imagery client available".to_string()))?;

        let size = match size.or(imagery.size) {
            Some(size) => size,
            None => {
                let clipped_path = config.artifact_path(&config.artifacts.clipped);
                let clipped = read_geotiff(&clipped_path)?;
                fit_grid(clipped.grid(), imagery)
            }
        };

        let aoi = self.vectors.load(&config.aoi)?;
        let request = imagery_request(&aoi, size, imagery)?;
        let mut artifacts = Vec::new();
        let bytes = self.fetch(observer, client.as_ref(), &request, &mut artifacts)?;
        Ok(ImageryReport { path: config.artifact_path(&config.artifacts.imagery_raw), size, bytes })
    }

    fn fetch(
        &self,
        observer: &mut dyn ProgressObserver,
        client: &dyn ImageryClient,
        request: &ImageryRequest,
        artifacts: &mut Vec<PathBuf>,
    ) -> Result<u64> {
        observer.stage_started(Stage::Imagery);
        let start = Instant::now();
        info!(provider = client.name(), "fetching imagery");

        let mut bytes = 0;
        self.emit(observer, Stage::Imagery, &self.config.artifacts.imagery_raw, artifacts, |path| {
            write_atomically(path, |w| {
                bytes = client.fetch_rgb(request, w)?;
                Ok(())
            })
        })?;
        observer.stage_finished(Stage::Imagery, start.elapsed());
        Ok(bytes)
    }

    fn emit<F>(
        &self,
        observer: &mut dyn ProgressObserver,
        stage: Stage,
        name: &str,
        artifacts: &mut Vec<PathBuf>,
        write: F,
    ) -> Result<()>
    where
        F: FnOnce(&Path) -> Result<()>,
    {
        let path = self.config.artifact_path(name);
        write(&path)?;
        observer.artifact_written(stage, &path);
        artifacts.push(path);
        Ok(())
    }
}

fn timed<T, F>(observer: &mut dyn ProgressObserver, stage: Stage, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    observer.stage_started(stage);
    let start = Instant::now();
    let result = f()?;
    observer.stage_finished(stage, start.elapsed());
    Ok(result)
}

fn fit_grid(grid: &GridSpec, imagery: &ImageryConfig) -> Dimensions {
    fit(grid.width, grid.height, imagery.max_pixels, imagery.max_dim)
}

/// Imagery request covering the AOI bounds in geographic coordinates
pub fn imagery_request(aoi: &GeometrySet, size: Dimensions, imagery: &ImageryConfig) -> Result<ImageryRequest> {
    let bbox = aoi
        .to_crs(Crs::WGS84)?
        .bounds()
        .ok_or_else(|| Error::InvalidGeometry("AOI layer has no geometry".to_string()))?;
    Ok(ImageryRequest {
        bbox,
        crs: Crs::WGS84,
        size,
        time_range: imagery.time_range,
        max_cloud: imagery.max_cloud,
    })
}
