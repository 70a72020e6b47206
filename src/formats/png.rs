//! PNG encoding for 8-bit rasters, with an ESRI world file sidecar
//!
//! Masks and previews are written as PNG so image tools can open them
//! directly; the `.pgw` world file keeps them georeferenced.

use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::ZlibEncoder;
use flate2::Compression;
use tracing::debug;

use crate::error::{Error, Result};
use crate::raster::{PixelBuffer, RasterDataset};

use super::write_atomically;

const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// PNG color type for a band count: gray, RGB or RGBA
fn color_type(bands: usize) -> Option<u8> {
    match bands {
        1 => Some(0),
        3 => Some(2),
        4 => Some(6),
        _ => None,
    }
}

/// Writes a U8 raster with 1, 3 or 4 bands as PNG plus its world file
pub fn write_png(path: &Path, dataset: &RasterDataset) -> Result<()> {
    let bytes = encode_png(dataset)?;
    write_atomically(path, |w| {
        w.write_all(&bytes)?;
        Ok(())
    })?;
    write_world_file(&world_file_path(path), dataset)?;
    debug!(path = %path.display(), bytes = bytes.len(), "wrote PNG");
    Ok(())
}

/// Encodes a U8 raster as PNG bytes
pub fn encode_png(dataset: &RasterDataset) -> Result<Vec<u8>> {
    let PixelBuffer::U8(data) = dataset.buffer() else {
        return Err(Error::Unsupported(format!(
            "PNG output needs U8 samples, got {}",
            dataset.data_type().name()
        )));
    };
    let bands = dataset.band_count();
    let color = color_type(bands)
        .ok_or_else(|| Error::Unsupported(format!("PNG output with {} bands", bands)))?;

    let (width, height) = (dataset.width(), dataset.height());
    let mut png = Vec::new();
    png.extend_from_slice(&PNG_SIGNATURE);

    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&height.to_be_bytes());
    ihdr.push(8); // bit depth
    ihdr.push(color);
    ihdr.push(0); // compression method
    ihdr.push(0); // filter method
    ihdr.push(0); // interlace method
    write_chunk(&mut png, b"IHDR", &ihdr);

    let idat = deflate_scanlines(data, bands, width as usize, height as usize)?;
    write_chunk(&mut png, b"IDAT", &idat);
    write_chunk(&mut png, b"IEND", &[]);
    Ok(png)
}

/// Interleaves the bands into filter-0 scanlines and compresses them
fn deflate_scanlines(data: &[u8], bands: usize, width: usize, height: usize) -> Result<Vec<u8>> {
    let band_len = width * height;
    let mut raw = Vec::with_capacity(height * (1 + width * bands));
    for row in 0..height {
        raw.push(0); // filter type: none
        for col in 0..width {
            let pixel = row * width + col;
            raw.extend((0..bands).map(|band| data[band * band_len + pixel]));
        }
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&raw)?;
    Ok(encoder.finish()?)
}

fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}

/// `mask.png` -> `mask.pgw`
pub fn world_file_path(path: &Path) -> PathBuf {
    path.with_extension("pgw")
}

/// Writes the six-line ESRI world file for a dataset's grid. The origin
/// lines address the center of the top-left pixel.
pub fn write_world_file(path: &Path, dataset: &RasterDataset) -> Result<()> {
    let [_, b, c, _, e, f] = dataset.transform().coeffs();
    let (center_x, center_y) = dataset.transform().pixel_to_world(0.5, 0.5);
    let text = format!("{}\n{}\n{}\n{}\n{}\n{}\n", b, e, c, f, center_x, center_y);
    write_atomically(path, |w| {
        w.write_all(text.as_bytes())?;
        Ok(())
    })
}
