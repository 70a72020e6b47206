//! demprep - DEM preparation pipeline
//!
//! demprep turns a set of elevation tiles into terrain-ready artifacts: a
//! mosaic reprojected to a target CRS, clipped to an area of interest and
//! stretched into 8 or 16-bit codes, plus alpha masks for the AOI and water
//! bodies and satellite imagery resampled onto the exact same pixel grid.
//!
//! # Examples
//!
//! ## Running the pipeline
//!
//! ```no_run
//! use std::path::Path;
//! use demprep::{Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig::load(Path::new("demprep.yaml"))?;
//! let report = Pipeline::from_config(&config)?.run()?;
//! println!("stretch: {} .. {}", report.stretch.vmin, report.stretch.vmax);
//! # Ok::<(), demprep::Error>(())
//! ```
//!
//! ## Using the stages directly
//!
//! ```no_run
//! use std::path::Path;
//! use demprep::processing::{clip, merge, quantize, BitDepth, PercentileClip};
//! use demprep::formats::{read_geotiff, write_geotiff};
//! use demprep::geometry::load_layer;
//!
//! let tiles = vec![read_geotiff(Path::new("a.tif"))?, read_geotiff(Path::new("b.tif"))?];
//! let mosaic = merge(&tiles)?;
//! let aoi = load_layer(Path::new("aoi.geojson"), None)?;
//! let clipped = clip(&mosaic, &aoi)?;
//! let (rendered, _) = quantize(&clipped, Some(PercentileClip::new(0.1, 99.9)?), BitDepth::Sixteen)?;
//! write_geotiff(Path::new("rendered.tif"), &rendered)?;
//! # Ok::<(), demprep::Error>(())
//! ```

pub mod error;
pub mod types;
pub mod config;
pub mod projection;
pub mod raster;
pub mod geometry;
pub mod processing;
pub mod formats;
pub mod imagery;
pub mod pipeline;

pub use error::{Error, ErrorKind, RemoteProcessingError, Result};
pub use types::{BoundingBox, DataType, Dimensions};
pub use config::{ImageryConfig, ImageryProvider, LayerSpec, PipelineConfig};
pub use projection::{epsg, Crs, Transformer};
pub use raster::{GridSpec, GridTransform, PixelBuffer, RasterDataset, Resampling};
pub use geometry::{FeatureFilter, Geometry, GeometrySet};
pub use imagery::{fit, ImageryClient, ImageryRequest, LocalImagery, ProcessApiClient, TimeRange};
pub use pipeline::{Pipeline, PipelineReport, ProgressObserver, Stage};
