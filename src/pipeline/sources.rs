//! Input collaborators: elevation tiles and vector layers

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::config::LayerSpec;
use crate::error::{Error, Result};
use crate::geometry::{load_layer, GeometrySet};

/// Supplies the elevation tile files to mosaic
pub trait TileSource {
    /// Tile paths in mosaic order; later tiles win where they overlap
    fn tile_paths(&self) -> Result<Vec<PathBuf>>;
}

/// Every `.tif`/`.tiff` file below a directory, sorted by path
#[derive(Debug, Clone)]
pub struct DirectoryTileSource {
    root: PathBuf,
}

impl DirectoryTileSource {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
}

fn is_tiff(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"))
        .unwrap_or(false)
}

impl TileSource for DirectoryTileSource {
    fn tile_paths(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Err(Error::MissingInput(self.root.clone()));
        }

        let mut paths = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(true) {
            let entry = entry.map_err(|e| Error::Io(e.into()))?;
            if entry.file_type().is_file() && is_tiff(entry.path()) {
                paths.push(entry.into_path());
            }
        }
        paths.sort();

        if paths.is_empty() {
            return Err(Error::EmptyInput(format!(
                "no GeoTIFF tiles found under {}",
                self.root.display()
            )));
        }
        debug!(count = paths.len(), root = %self.root.display(), "found elevation tiles");
        Ok(paths)
    }
}

/// Fixed list of tile paths, used as given
impl TileSource for Vec<PathBuf> {
    fn tile_paths(&self) -> Result<Vec<PathBuf>> {
        if self.is_empty() {
            return Err(Error::EmptyInput("no elevation tiles given".to_string()));
        }
        Ok(self.clone())
    }
}

/// Loads vector layers
pub trait VectorSource {
    fn load(&self, layer: &LayerSpec) -> Result<GeometrySet>;
}

/// Reads layers from GeoJSON files
#[derive(Debug, Default, Clone, Copy)]
pub struct GeoJsonVectorSource;

impl VectorSource for GeoJsonVectorSource {
    fn load(&self, layer: &LayerSpec) -> Result<GeometrySet> {
        let set = load_layer(&layer.path, layer.filter.as_ref())?;
        debug!(path = %layer.path.display(), features = set.len(), crs = %set.crs, "loaded vector layer");
        Ok(set)
    }
}
