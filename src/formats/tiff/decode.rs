//! GeoTIFF reading

use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use memmap2::Mmap;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tracing::debug;

use crate::error::{Error, Result};
use crate::raster::{GridSpec, PixelBuffer, RasterDataset};

use super::geotiff::GeoInfo;

/// Decoding buffers may grow to 1 GiB; DEM tiles are large single images
const DECODING_LIMIT: usize = 1024 * 1024 * 1024;

/// Reads the first image of a GeoTIFF into a dataset.
///
/// U8, U16 and F32 samples are kept as they are; other sample types are
/// widened to F32. Interleaved bands are split into band-sequential order.
pub fn read_geotiff(path: &Path) -> Result<RasterDataset> {
    let mmap = map_file(path)?;
    let mut decoder = Decoder::new(Cursor::new(&mmap[..]))?;
    let mut limits = Limits::default();
    limits.decoding_buffer_size = DECODING_LIMIT;
    limits.intermediate_buffer_size = DECODING_LIMIT;
    limits.ifd_value_size = DECODING_LIMIT;
    decoder = decoder.with_limits(limits);

    let (width, height) = decoder.dimensions()?;
    let info = GeoInfo::from_decoder(&mut decoder);
    let transform = info.grid_transform()?;
    let grid = GridSpec::new(transform, width, height);

    let (interleaved, samples) = decode_samples(&mut decoder, grid.pixel_count())?;
    let buffer = deinterleave(interleaved, samples);

    debug!(
        path = %path.display(),
        width,
        height,
        bands = samples,
        data_type = buffer.data_type().name(),
        crs = %grid.crs(),
        "read GeoTIFF"
    );

    let nodata = checked_nodata(info.nodata, &buffer);
    RasterDataset::new(grid, samples, buffer, nodata)
}

/// Reads only the georeferencing tags of a GeoTIFF
pub fn read_geo_info(path: &Path) -> Result<GeoInfo> {
    let mmap = map_file(path)?;
    let mut decoder = Decoder::new(Cursor::new(&mmap[..]))?;
    Ok(GeoInfo::from_decoder(&mut decoder))
}

fn map_file(path: &Path) -> Result<Mmap> {
    if !path.exists() {
        return Err(Error::MissingInput(path.to_path_buf()));
    }
    let file = File::open(path)?;
    // The file is only read while the map is alive
    let mmap = unsafe { Mmap::map(&file)? };
    #[cfg(unix)]
    {
        let _ = mmap.advise(memmap2::Advice::Sequential);
    }
    Ok(mmap)
}

/// Decodes the image and reports the number of samples per pixel
fn decode_samples(decoder: &mut Decoder<Cursor<&[u8]>>, pixels: usize) -> Result<(PixelBuffer, usize)> {
    let buffer = match decoder.read_image()? {
        DecodingResult::U8(data) => PixelBuffer::U8(data),
        DecodingResult::U16(data) => PixelBuffer::U16(data),
        DecodingResult::F32(data) => PixelBuffer::F32(data),
        DecodingResult::F64(data) => PixelBuffer::F32(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::I8(data) => PixelBuffer::F32(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::I16(data) => PixelBuffer::F32(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::I32(data) => PixelBuffer::F32(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::U32(data) => PixelBuffer::F32(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::I64(data) => PixelBuffer::F32(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::U64(data) => PixelBuffer::F32(data.into_iter().map(|v| v as f32).collect()),
        #[allow(unreachable_patterns)]
        _ => return Err(Error::Unsupported("GeoTIFF sample format".to_string())),
    };

    if pixels == 0 || buffer.len() % pixels != 0 {
        return Err(Error::InvalidRaster(format!(
            "decoded {} samples for {} pixels",
            buffer.len(),
            pixels
        )));
    }
    let samples = buffer.len() / pixels;
    Ok((buffer, samples))
}

/// Converts pixel-interleaved samples into band-sequential order
fn deinterleave(buffer: PixelBuffer, samples: usize) -> PixelBuffer {
    fn split<T: Copy>(data: Vec<T>, samples: usize) -> Vec<T> {
        if samples == 1 {
            return data;
        }
        let pixels = data.len() / samples;
        let mut out = Vec::with_capacity(data.len());
        for band in 0..samples {
            out.extend((0..pixels).map(|p| data[p * samples + band]));
        }
        out
    }

    match buffer {
        PixelBuffer::U8(data) => PixelBuffer::U8(split(data, samples)),
        PixelBuffer::U16(data) => PixelBuffer::U16(split(data, samples)),
        PixelBuffer::F32(data) => PixelBuffer::F32(split(data, samples)),
    }
}

/// Drops a no-data marker the pixel type cannot hold (e.g. -9999 on U16)
fn checked_nodata(nodata: Option<f64>, buffer: &PixelBuffer) -> Option<f64> {
    let data_type = buffer.data_type();
    nodata.filter(|&v| {
        data_type.is_float() || (v.fract() == 0.0 && v >= 0.0 && v <= data_type.max_value())
    })
}
