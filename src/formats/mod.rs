//! Raster file formats

pub mod png;
pub mod tiff;

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;

pub use self::png::{write_png, write_world_file};
pub use self::tiff::{read_geo_info, read_geotiff, write_geotiff, GeoInfo};

/// Sibling path an artifact is written to before it is renamed into place
pub fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

/// Writes `path` through a `.part` sibling that is renamed on success and
/// removed on failure, so readers never see a half-written artifact
pub fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let part = part_path(path);
    match write_part(&part, write) {
        Ok(()) => {
            fs::rename(&part, path)?;
            Ok(())
        }
        Err(err) => {
            let _ = fs::remove_file(&part);
            Err(err)
        }
    }
}

fn write_part<F>(part: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let mut writer = BufWriter::new(File::create(part)?);
    write(&mut writer)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_part_path() {
        assert_eq!(part_path(Path::new("out/dem.tif")), PathBuf::from("out/dem.tif.part"));
    }

    #[test]
    fn test_write_atomically_commits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/artifact.bin");
        write_atomically(&path, |w| {
            w.write_all(b"payload")?;
            Ok(())
        })
        .unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"payload");
        assert!(!part_path(&path).exists());
    }

    #[test]
    fn test_write_atomically_cleans_up_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.bin");
        let result = write_atomically(&path, |w| {
            w.write_all(b"partial")?;
            Err(Error::Unsupported("stop".to_string()))
        });
        assert!(result.is_err());
        assert!(!path.exists());
        assert!(!part_path(&path).exists());
    }
}
