//! Satellite imagery acquisition
//!
//! The pipeline only needs one capability from an imagery provider: an RGB
//! raster for a bounding box at a given pixel size. [`ImageryClient`] is that
//! seam; [`ProcessApiClient`] talks to a remote processing API and
//! [`LocalImagery`] replays a raster that was fetched earlier.

pub mod fit;
pub mod local;
pub mod process_api;

use std::io::Write;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::{ImageryConfig, ImageryProvider};
use crate::error::{Error, Result};
use crate::projection::Crs;
use crate::types::{BoundingBox, Dimensions};

pub use fit::fit;
pub use local::LocalImagery;
pub use process_api::{Credentials, MosaickingOrder, ProcessApiClient};

/// Inclusive acquisition window, in whole days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl TimeRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self> {
        let range = Self { from, to };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<()> {
        if self.from > self.to {
            return Err(Error::Config(format!(
                "time range starts after it ends ({} > {})",
                self.from, self.to
            )));
        }
        Ok(())
    }

    /// Start of the first day, RFC 3339 in UTC
    pub fn start_timestamp(&self) -> String {
        format!("{}T00:00:00Z", self.from.format("%Y-%m-%d"))
    }

    /// Last second of the final day, RFC 3339 in UTC
    pub fn end_timestamp(&self) -> String {
        format!("{}T23:59:59Z", self.to.format("%Y-%m-%d"))
    }
}

/// Everything a provider needs to produce one RGB raster
#[derive(Debug, Clone, PartialEq)]
pub struct ImageryRequest {
    /// Requested extent, expressed in `crs`
    pub bbox: BoundingBox,
    pub crs: Crs,
    /// Output raster size
    pub size: Dimensions,
    pub time_range: TimeRange,
    /// Maximum scene cloud cover, in percent
    pub max_cloud: f64,
}

/// Source of RGB imagery for a bounding box
pub trait ImageryClient {
    /// Short provider name for logs
    fn name(&self) -> &str;

    /// Writes the raster for `request` into `sink`, returning the byte count.
    fn fetch_rgb(&self, request: &ImageryRequest, sink: &mut dyn Write) -> Result<u64>;
}

impl<T: ImageryClient + ?Sized> ImageryClient for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch_rgb(&self, request: &ImageryRequest, sink: &mut dyn Write) -> Result<u64> {
        (**self).fetch_rgb(request, sink)
    }
}

/// Builds the provider selected in the configuration
pub fn client_from_config(config: &ImageryConfig) -> Result<Box<dyn ImageryClient>> {
    match config.provider {
        ImageryProvider::ProcessApi => Ok(Box::new(ProcessApiClient::from_config(config)?)),
        ImageryProvider::Local => {
            let path = config.local_path.as_ref().ok_or_else(|| {
                Error::Config("imagery provider `local` requires `local_path`".to_string())
            })?;
            Ok(Box::new(LocalImagery::new(path)))
        }
    }
}
