//! Pipeline configuration
//!
//! Loaded once from YAML and passed by reference into the pipeline; nothing
//! in the crate reads process-wide settings except the imagery credentials,
//! which come from environment variables named here.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::geometry::FeatureFilter;
use crate::imagery::{MosaickingOrder, TimeRange};
use crate::processing::{BitDepth, PercentileClip, DEFAULT_BURN_VALUE};
use crate::projection::{epsg, Crs};
use crate::raster::Resampling;
use crate::types::Dimensions;

/// Copernicus Data Space OAuth2 token endpoint
pub const DEFAULT_TOKEN_URL: &str =
    "https://identity.dataspace.copernicus.eu/auth/realms/CDSE/protocol/openid-connect/token";
/// Copernicus Data Space processing endpoint
pub const DEFAULT_PROCESS_URL: &str = "https://sh.dataspace.copernicus.eu/api/v1/process";

/// Root configuration for one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// CRS every output is expressed in
    #[serde(default = "default_target_crs", alias = "target_epsg")]
    pub target_crs: Crs,
    /// Directory receiving every artifact
    pub output_dir: PathBuf,
    /// Directory holding the extracted elevation tiles
    pub tiles_dir: PathBuf,
    /// Area of interest layer
    pub aoi: LayerSpec,
    /// Layers merged into the water mask; empty skips the mask
    #[serde(default)]
    pub water: Vec<LayerSpec>,
    /// Percentile stretch; `null` stretches over the full value range
    #[serde(default = "default_percentile_clip")]
    pub percentile_clip: Option<PercentileClip>,
    #[serde(default = "default_bit_depth")]
    pub bit_depth: BitDepth,
    /// Alpha value burned inside mask geometries
    #[serde(default = "default_burn_value")]
    pub burn_value: u8,
    /// Also write an 8-bit grayscale PNG of the stretched elevation
    #[serde(default)]
    pub preview: bool,
    #[serde(default)]
    pub resampling: Resampling,
    #[serde(default)]
    pub artifacts: ArtifactNames,
    #[serde(default)]
    pub imagery: Option<ImageryConfig>,
}

fn default_target_crs() -> Crs {
    Crs::epsg(epsg::KOREA_UNIFIED)
}

fn default_percentile_clip() -> Option<PercentileClip> {
    Some(PercentileClip { low: 0.1, high: 99.9 })
}

fn default_bit_depth() -> BitDepth {
    BitDepth::Sixteen
}

fn default_burn_value() -> u8 {
    DEFAULT_BURN_VALUE
}

impl PipelineConfig {
    /// Configuration with every optional setting at its default
    pub fn new(tiles_dir: impl Into<PathBuf>, aoi: LayerSpec, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            target_crs: default_target_crs(),
            output_dir: output_dir.into(),
            tiles_dir: tiles_dir.into(),
            aoi,
            water: Vec::new(),
            percentile_clip: default_percentile_clip(),
            bit_depth: default_bit_depth(),
            burn_value: default_burn_value(),
            preview: false,
            resampling: Resampling::default(),
            artifacts: ArtifactNames::default(),
            imagery: None,
        }
    }

    /// Reads and validates a YAML configuration file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::MissingInput(path.to_path_buf()));
        }
        let text = fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&text)?;
        config.validate()?;
        debug!(path = %path.display(), crs = %config.target_crs, "loaded configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(Error::Config("output_dir must not be empty".to_string()));
        }
        if let Some(clip) = &self.percentile_clip {
            clip.validate()?;
        }
        if self.burn_value == 0 {
            return Err(Error::Config("burn_value must be in 1..=255".to_string()));
        }
        if let Some(imagery) = &self.imagery {
            imagery.validate()?;
        }
        Ok(())
    }

    /// Location of an artifact inside the output directory
    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }
}

/// A vector layer plus an optional feature selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub path: PathBuf,
    #[serde(default)]
    pub filter: Option<FeatureFilter>,
}

impl LayerSpec {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), filter: None }
    }

    pub fn with_filter(mut self, filter: FeatureFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// File names of the pipeline artifacts, relative to the output directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactNames {
    pub merged: String,
    /// Full-extent elevation in the target CRS; `None` derives it from the EPSG code
    pub reprojected: Option<String>,
    pub clipped: String,
    pub rendered: String,
    pub preview: String,
    pub aoi_mask: String,
    pub water_mask: String,
    pub imagery_raw: String,
    pub imagery_aligned: String,
}

impl Default for ArtifactNames {
    fn default() -> Self {
        Self {
            merged: "dem_merged.tif".to_string(),
            reprojected: None,
            clipped: "dem_clipped.tif".to_string(),
            rendered: "dem_rendered.tif".to_string(),
            preview: "dem_preview.png".to_string(),
            aoi_mask: "aoi_mask.png".to_string(),
            water_mask: "water_mask.png".to_string(),
            imagery_raw: "sentinel/sentinel_rgb.tif".to_string(),
            imagery_aligned: "sentinel/sentinel_draped.tif".to_string(),
        }
    }
}

impl ArtifactNames {
    pub fn reprojected_name(&self, crs: Crs) -> String {
        match &self.reprojected {
            Some(name) => name.clone(),
            None => format!("dem_epsg{}.tif", crs.code()),
        }
    }
}

/// Which [`ImageryClient`](crate::imagery::ImageryClient) to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageryProvider {
    #[default]
    ProcessApi,
    Local,
}

/// Imagery acquisition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageryConfig {
    pub provider: ImageryProvider,
    pub token_url: String,
    pub process_url: String,
    /// Environment variable holding the OAuth2 client id
    pub client_id_env: String,
    /// Environment variable holding the OAuth2 client secret
    pub client_secret_env: String,
    /// Maximum scene cloud cover, in percent
    pub max_cloud: f64,
    pub time_range: TimeRange,
    pub mosaicking_order: Option<MosaickingOrder>,
    pub max_pixels: u64,
    pub max_dim: u32,
    pub auth_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
    /// Raster served by the `local` provider
    pub local_path: Option<PathBuf>,
    /// Explicit request size; fitted from the elevation grid when absent
    pub size: Option<Dimensions>,
}

impl Default for ImageryConfig {
    fn default() -> Self {
        let day = |m, d| NaiveDate::from_ymd_opt(2023, m, d).unwrap_or(NaiveDate::MIN);
        Self {
            provider: ImageryProvider::ProcessApi,
            token_url: DEFAULT_TOKEN_URL.to_string(),
            process_url: DEFAULT_PROCESS_URL.to_string(),
            client_id_env: "SH_CLIENT_ID".to_string(),
            client_secret_env: "SH_CLIENT_SECRET".to_string(),
            max_cloud: 5.0,
            time_range: TimeRange { from: day(7, 1), to: day(9, 15) },
            mosaicking_order: Some(MosaickingOrder::LeastCloudCover),
            max_pixels: 10_000_000,
            max_dim: 2500,
            auth_timeout_secs: 30,
            fetch_timeout_secs: 180,
            local_path: None,
            size: None,
        }
    }
}

impl ImageryConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.max_cloud) {
            return Err(Error::Config(format!("max_cloud must be within 0..=100, got {}", self.max_cloud)));
        }
        if self.max_pixels == 0 || self.max_dim == 0 {
            return Err(Error::Config("max_pixels and max_dim must be positive".to_string()));
        }
        if self.auth_timeout_secs == 0 || self.fetch_timeout_secs == 0 {
            return Err(Error::Config("network timeouts must be positive".to_string()));
        }
        if let Some(size) = self.size {
            if size.width == 0 || size.height == 0 {
                return Err(Error::Config("imagery size must be non-empty".to_string()));
            }
        }
        if self.provider == ImageryProvider::Local && self.local_path.is_none() {
            return Err(Error::Config("imagery provider `local` requires `local_path`".to_string()));
        }
        self.time_range.validate()
    }
}
