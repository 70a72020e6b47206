//! Imagery replayed from a file on disk

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};

use super::{ImageryClient, ImageryRequest};

/// Serves a previously downloaded raster for every request.
///
/// The request is only logged; the file is expected to already cover the
/// requested extent at the requested size.
#[derive(Debug, Clone)]
pub struct LocalImagery {
    path: PathBuf,
}

impl LocalImagery {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ImageryClient for LocalImagery {
    fn name(&self) -> &str {
        "local"
    }

    fn fetch_rgb(&self, request: &ImageryRequest, sink: &mut dyn Write) -> Result<u64> {
        if !self.path.exists() {
            return Err(Error::MissingInput(self.path.clone()));
        }
        info!(
            path = %self.path.display(),
            width = request.size.width,
            height = request.size.height,
            "replaying local imagery"
        );
        let mut reader = BufReader::new(File::open(&self.path)?);
        Ok(io::copy(&mut reader, sink)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imagery::TimeRange;
    use crate::projection::Crs;
    use crate::types::{BoundingBox, Dimensions};
    use chrono::NaiveDate;

    fn request() -> ImageryRequest {
        let day = NaiveDate::from_ymd_opt(2023, 7, 1).unwrap();
        ImageryRequest {
            bbox: BoundingBox::new(0.0, 0.0, 1.0, 1.0),
            crs: Crs::WGS84,
            size: Dimensions::new(10, 10),
            time_range: TimeRange::new(day, day).unwrap(),
            max_cloud: 5.0,
        }
    }

    #[test]
    fn test_local_copies_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.tif");
        std::fs::write(&path, b"raster bytes").unwrap();

        let client = LocalImagery::new(&path);
        let mut sink = Vec::new();
        let written = client.fetch_rgb(&request(), &mut sink).unwrap();
        assert_eq!(written, 12);
        assert_eq!(sink, b"raster bytes");
    }

    #[test]
    fn test_local_missing_file() {
        let client = LocalImagery::new("/nonexistent/rgb.tif");
        let mut sink = Vec::new();
        let err = client.fetch_rgb(&request(), &mut sink).unwrap_err();
        assert!(matches!(err, Error::MissingInput(_)));
    }
}
