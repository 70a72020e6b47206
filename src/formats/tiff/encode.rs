//! GeoTIFF writing

use std::io::{Seek, Write};
use std::path::Path;

use tiff::encoder::colortype::{self, ColorType};
use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKind, TiffValue};
use tracing::debug;

use crate::error::{Error, Result};
use crate::formats::write_atomically;
use crate::raster::{PixelBuffer, RasterDataset};

use super::geotiff::{geo_key_directory, tag};
use super::tags;

/// Writes a dataset as an uncompressed GeoTIFF.
///
/// Supports 1 (gray), 3 (RGB) and 4 (RGBA) bands of U8, U16 or F32.
/// North-up grids get pixel scale and tiepoint tags, others a model
/// transformation. The file appears at `path` only once fully written.
pub fn write_geotiff(path: &Path, dataset: &RasterDataset) -> Result<()> {
    write_atomically(path, |writer| encode(writer, dataset))?;
    debug!(
        path = %path.display(),
        width = dataset.width(),
        height = dataset.height(),
        bands = dataset.band_count(),
        "wrote GeoTIFF"
    );
    Ok(())
}

/// Encodes a dataset into any seekable writer
pub fn encode<W: Write + Seek>(writer: W, dataset: &RasterDataset) -> Result<()> {
    let mut encoder = TiffEncoder::new(writer)?;
    let bands = dataset.band_count();

    match (dataset.buffer(), bands) {
        (PixelBuffer::U8(data), 1) => write_image::<colortype::Gray8, _>(&mut encoder, dataset, data),
        (PixelBuffer::U8(data), 3) => write_image::<colortype::RGB8, _>(&mut encoder, dataset, &interleave(data, 3)),
        (PixelBuffer::U8(data), 4) => write_image::<colortype::RGBA8, _>(&mut encoder, dataset, &interleave(data, 4)),
        (PixelBuffer::U16(data), 1) => write_image::<colortype::Gray16, _>(&mut encoder, dataset, data),
        (PixelBuffer::U16(data), 3) => write_image::<colortype::RGB16, _>(&mut encoder, dataset, &interleave(data, 3)),
        (PixelBuffer::U16(data), 4) => write_image::<colortype::RGBA16, _>(&mut encoder, dataset, &interleave(data, 4)),
        (PixelBuffer::F32(data), 1) => write_image::<colortype::Gray32Float, _>(&mut encoder, dataset, data),
        (PixelBuffer::F32(data), 3) => {
            write_image::<colortype::RGB32Float, _>(&mut encoder, dataset, &interleave(data, 3))
        }
        (PixelBuffer::F32(data), 4) => {
            write_image::<colortype::RGBA32Float, _>(&mut encoder, dataset, &interleave(data, 4))
        }
        (buffer, n) => Err(Error::Unsupported(format!(
            "GeoTIFF output with {} bands of {}",
            n,
            buffer.data_type().name()
        ))),
    }
}

fn write_image<C, W>(encoder: &mut TiffEncoder<W>, dataset: &RasterDataset, data: &[C::Inner]) -> Result<()>
where
    C: ColorType,
    W: Write + Seek,
    [C::Inner]: TiffValue,
{
    let mut image = encoder.new_image::<C>(dataset.width(), dataset.height())?;
    write_geo_tags(image.encoder(), dataset)?;
    image.write_data(data)?;
    Ok(())
}

fn write_geo_tags<W: Write + Seek, K: TiffKind>(
    dir: &mut DirectoryEncoder<W, K>,
    dataset: &RasterDataset,
) -> Result<()> {
    let transform = dataset.transform();
    let [a, b, c, d, e, f] = transform.coeffs();

    if transform.is_north_up() && b > 0.0 && f < 0.0 {
        // Ties pixel (0, 0) to the top-left corner
        let pixel_scale = [b, -f, 0.0];
        dir.write_tag(tag(tags::MODEL_PIXEL_SCALE), &pixel_scale[..])?;
        let tiepoint = [0.0, 0.0, 0.0, a, d, 0.0];
        dir.write_tag(tag(tags::MODEL_TIEPOINT), &tiepoint[..])?;
    } else {
        let matrix = [
            b, c, 0.0, a, //
            e, f, 0.0, d, //
            0.0, 0.0, 0.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ];
        dir.write_tag(tag(tags::MODEL_TRANSFORMATION), &matrix[..])?;
    }

    let keys = geo_key_directory(dataset.crs())?;
    dir.write_tag(tag(tags::GEO_KEY_DIRECTORY), &keys[..])?;

    if let Some(nodata) = dataset.nodata() {
        dir.write_tag(tag(tags::GDAL_NODATA), format_nodata(nodata).as_str())?;
    }
    Ok(())
}

/// GDAL writes no-data as plain decimal text, `nan` for NaN
fn format_nodata(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else {
        value.to_string()
    }
}

/// Band-sequential to pixel-interleaved
fn interleave<T: Copy>(data: &[T], bands: usize) -> Vec<T> {
    let pixels = data.len() / bands;
    let mut out = Vec::with_capacity(data.len());
    for p in 0..pixels {
        out.extend((0..bands).map(|band| data[band * pixels + p]));
    }
    out
}
