//! Multi-band raster held in memory

use crate::error::{Error, Result};
use crate::projection::Crs;
use crate::types::{BoundingBox, DataType};

use super::grid::{GridSpec, GridTransform};

/// Band-sequential pixel storage: band 0 rows first, then band 1, ...
#[derive(Debug, Clone, PartialEq)]
pub enum PixelBuffer {
    U8(Vec<u8>),
    U16(Vec<u16>),
    F32(Vec<f32>),
}

impl PixelBuffer {
    /// Buffer of `len` samples all set to `value`, saturated to the type
    pub fn filled(data_type: DataType, len: usize, value: f32) -> Self {
        match data_type {
            DataType::U8 => PixelBuffer::U8(vec![saturate_u8(value); len]),
            DataType::U16 => PixelBuffer::U16(vec![saturate_u16(value); len]),
            DataType::F32 => PixelBuffer::F32(vec![value; len]),
        }
    }

    /// Converts working values back to `data_type`. Integer targets are
    /// rounded and saturated; NaN becomes 0.
    pub fn from_f32(data_type: DataType, values: Vec<f32>) -> Self {
        match data_type {
            DataType::U8 => PixelBuffer::U8(values.into_iter().map(saturate_u8).collect()),
            DataType::U16 => PixelBuffer::U16(values.into_iter().map(saturate_u16).collect()),
            DataType::F32 => PixelBuffer::F32(values),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            PixelBuffer::U8(_) => DataType::U8,
            PixelBuffer::U16(_) => DataType::U16,
            PixelBuffer::F32(_) => DataType::F32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PixelBuffer::U8(v) => v.len(),
            PixelBuffer::U16(v) => v.len(),
            PixelBuffer::F32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample at a flat index. All supported types convert to f32 exactly.
    pub fn get(&self, index: usize) -> f32 {
        match self {
            PixelBuffer::U8(v) => v[index] as f32,
            PixelBuffer::U16(v) => v[index] as f32,
            PixelBuffer::F32(v) => v[index],
        }
    }

    /// Copies a range of samples out as f32
    pub fn slice_f32(&self, start: usize, len: usize) -> Vec<f32> {
        let range = start..start + len;
        match self {
            PixelBuffer::U8(v) => v[range].iter().map(|&x| x as f32).collect(),
            PixelBuffer::U16(v) => v[range].iter().map(|&x| x as f32).collect(),
            PixelBuffer::F32(v) => v[range].to_vec(),
        }
    }
}

fn saturate_u8(value: f32) -> u8 {
    // `as` saturates and maps NaN to 0
    value.round() as u8
}

fn saturate_u16(value: f32) -> u16 {
    value.round() as u16
}

/// Two no-data markers are the same marker; NaN equals NaN here
pub fn nodata_matches(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => x == y || (x.is_nan() && y.is_nan()),
        _ => false,
    }
}

/// A georeferenced raster: grid, bands, pixel data and an optional no-data
/// marker. Every processing stage returns a fresh dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterDataset {
    grid: GridSpec,
    band_count: usize,
    buffer: PixelBuffer,
    nodata: Option<f64>,
}

impl RasterDataset {
    /// Creates a dataset, checking that the buffer covers every band and
    /// that the no-data marker is representable in the pixel type
    pub fn new(grid: GridSpec, band_count: usize, buffer: PixelBuffer, nodata: Option<f64>) -> Result<Self> {
        if band_count == 0 {
            return Err(Error::InvalidRaster("raster needs at least one band".to_string()));
        }
        if grid.width == 0 || grid.height == 0 {
            return Err(Error::InvalidRaster(format!(
                "raster dimensions {}x{} are empty",
                grid.width, grid.height
            )));
        }
        let expected = grid.pixel_count() * band_count;
        if buffer.len() != expected {
            return Err(Error::InvalidRaster(format!(
                "buffer holds {} samples, {}x{}x{} needs {}",
                buffer.len(),
                grid.width,
                grid.height,
                band_count,
                expected
            )));
        }
        if let Some(value) = nodata {
            let data_type = buffer.data_type();
            let fits = if data_type.is_float() {
                true
            } else {
                value.fract() == 0.0 && value >= 0.0 && value <= data_type.max_value()
            };
            if !fits {
                return Err(Error::InvalidRaster(format!(
                    "no-data value {} is not representable as {}",
                    value,
                    data_type.name()
                )));
            }
        }
        Ok(Self { grid, band_count, buffer, nodata })
    }

    /// Builds a dataset from per-band working values
    pub fn from_bands(grid: GridSpec, data_type: DataType, bands: Vec<Vec<f32>>, nodata: Option<f64>) -> Result<Self> {
        let band_count = bands.len();
        let values: Vec<f32> = bands.into_iter().flatten().collect();
        Self::new(grid, band_count, PixelBuffer::from_f32(data_type, values), nodata)
    }

    /// Dataset with every sample set to `value`
    pub fn filled(grid: GridSpec, band_count: usize, data_type: DataType, value: f32, nodata: Option<f64>) -> Result<Self> {
        let buffer = PixelBuffer::filled(data_type, grid.pixel_count() * band_count, value);
        Self::new(grid, band_count, buffer, nodata)
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn transform(&self) -> &GridTransform {
        &self.grid.transform
    }

    pub fn crs(&self) -> Crs {
        self.grid.crs()
    }

    pub fn width(&self) -> u32 {
        self.grid.width
    }

    pub fn height(&self) -> u32 {
        self.grid.height
    }

    pub fn band_count(&self) -> usize {
        self.band_count
    }

    pub fn data_type(&self) -> DataType {
        self.buffer.data_type()
    }

    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    pub fn bounds(&self) -> BoundingBox {
        self.grid.bounds()
    }

    /// Samples per band
    pub fn band_len(&self) -> usize {
        self.grid.pixel_count()
    }

    /// Sample at `(band, col, row)`
    pub fn value(&self, band: usize, col: u32, row: u32) -> f32 {
        let index = band * self.band_len() + row as usize * self.grid.width as usize + col as usize;
        self.buffer.get(index)
    }

    /// One band as working values
    pub fn band_f32(&self, band: usize) -> Vec<f32> {
        self.buffer.slice_f32(band * self.band_len(), self.band_len())
    }

    /// Every band as working values
    pub fn bands_f32(&self) -> Vec<Vec<f32>> {
        (0..self.band_count).map(|b| self.band_f32(b)).collect()
    }

    /// Whether a sample counts as missing. NaN is always missing.
    pub fn is_nodata(&self, value: f32) -> bool {
        value.is_nan() || self.nodata.map_or(false, |nd| value == nd as f32)
    }

    /// Marker that derived rasters carry: the source marker, NaN for float
    /// rasters without one, nothing for integer rasters without one
    pub fn output_nodata(&self) -> Option<f64> {
        match self.nodata {
            Some(value) => Some(value),
            None if self.data_type().is_float() => Some(f64::NAN),
            None => None,
        }
    }

    /// Value written where a derived raster has no source data
    pub fn fill_value(&self) -> f32 {
        match self.output_nodata() {
            Some(value) => value as f32,
            None => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(width: u32, height: u32) -> GridSpec {
        let transform = GridTransform::north_up(0.0, height as f64, 1.0, -1.0, Crs::WGS84).unwrap();
        GridSpec::new(transform, width, height)
    }

    #[test]
    fn test_buffer_length_checked() {
        let err = RasterDataset::new(grid(3, 2), 1, PixelBuffer::U8(vec![0; 5]), None).unwrap_err();
        assert!(matches!(err, Error::InvalidRaster(_)));

        let ok = RasterDataset::new(grid(3, 2), 2, PixelBuffer::U8(vec![0; 12]), None).unwrap();
        assert_eq!(ok.band_count(), 2);
        assert_eq!(ok.band_len(), 6);
    }

    #[test]
    fn test_nodata_must_fit_type() {
        let err = RasterDataset::new(grid(1, 1), 1, PixelBuffer::U8(vec![0]), Some(-9999.0)).unwrap_err();
        assert!(matches!(err, Error::InvalidRaster(_)));

        let ok = RasterDataset::new(grid(1, 1), 1, PixelBuffer::F32(vec![0.0]), Some(-9999.0));
        assert!(ok.is_ok());
    }

    #[test]
    fn test_band_access_and_nodata() {
        let data = PixelBuffer::F32(vec![1.0, 2.0, -9999.0, f32::NAN, 5.0, 6.0, 7.0, 8.0]);
        let ds = RasterDataset::new(grid(2, 2), 2, data, Some(-9999.0)).unwrap();

        assert_eq!(ds.band_f32(1), vec![5.0, 6.0, 7.0, 8.0]);
        assert_eq!(ds.value(0, 0, 1), -9999.0);
        assert!(ds.is_nodata(ds.value(0, 0, 1)));
        assert!(ds.is_nodata(ds.value(0, 1, 1)));
        assert!(!ds.is_nodata(ds.value(0, 1, 0)));
        assert_eq!(ds.fill_value(), -9999.0);
    }

    #[test]
    fn test_from_f32_saturates() {
        let buffer = PixelBuffer::from_f32(DataType::U8, vec![-3.0, 12.4, 12.6, 300.0, f32::NAN]);
        assert_eq!(buffer, PixelBuffer::U8(vec![0, 12, 13, 255, 0]));
    }

    #[test]
    fn test_output_nodata_defaults() {
        let float = RasterDataset::filled(grid(1, 1), 1, DataType::F32, 0.0, None).unwrap();
        assert!(float.output_nodata().unwrap().is_nan());
        assert!(float.fill_value().is_nan());

        let int = RasterDataset::filled(grid(1, 1), 1, DataType::U16, 0.0, None).unwrap();
        assert_eq!(int.output_nodata(), None);
        assert_eq!(int.fill_value(), 0.0);
    }

    #[test]
    fn test_nodata_matches() {
        assert!(nodata_matches(None, None));
        assert!(nodata_matches(Some(f64::NAN), Some(f64::NAN)));
        assert!(nodata_matches(Some(-9999.0), Some(-9999.0)));
        assert!(!nodata_matches(Some(0.0), None));
        assert!(!nodata_matches(Some(0.0), Some(1.0)));
    }
}
