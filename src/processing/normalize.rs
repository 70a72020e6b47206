//! Value-range stretch and quantization to unsigned integers

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::raster::{PixelBuffer, RasterDataset};

/// Output sample width of a quantized raster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum BitDepth {
    Eight,
    Sixteen,
}

impl BitDepth {
    pub fn bits(&self) -> u32 {
        match self {
            BitDepth::Eight => 8,
            BitDepth::Sixteen => 16,
        }
    }

    /// Largest output code, `2^bits - 1`
    pub fn max_code(&self) -> f64 {
        ((1u32 << self.bits()) - 1) as f64
    }
}

impl TryFrom<u8> for BitDepth {
    type Error = Error;

    fn try_from(bits: u8) -> Result<Self> {
        match bits {
            8 => Ok(BitDepth::Eight),
            16 => Ok(BitDepth::Sixteen),
            other => Err(Error::Config(format!("bit depth must be 8 or 16, got {}", other))),
        }
    }
}

impl From<BitDepth> for u8 {
    fn from(depth: BitDepth) -> Self {
        depth.bits() as u8
    }
}

/// Low and high percentiles used for the stretch, in `[0, 100]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileClip {
    pub low: f64,
    pub high: f64,
}

impl PercentileClip {
    pub fn new(low: f64, high: f64) -> Result<Self> {
        let clip = Self { low, high };
        clip.validate()?;
        Ok(clip)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.low) || !(0.0..=100.0).contains(&self.high) || self.low >= self.high {
            return Err(Error::Config(format!(
                "percentile clip ({}, {}) must satisfy 0 <= low < high <= 100",
                self.low, self.high
            )));
        }
        Ok(())
    }
}

/// Values mapped to the lowest and highest output code
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StretchRange {
    pub vmin: f64,
    pub vmax: f64,
}

/// Linearly stretches the first band of `src` into unsigned integers.
///
/// No-data and NaN samples are excluded from the statistics and map to
/// code 0, which becomes the output no-data marker. With `clip` the range
/// is taken from percentiles of the valid samples, otherwise from their
/// minimum and maximum.
pub fn quantize(src: &RasterDataset, clip: Option<PercentileClip>, depth: BitDepth) -> Result<(RasterDataset, StretchRange)> {
    let band = src.band_f32(0);
    let mut valid: Vec<f32> = band.iter().copied().filter(|&v| !src.is_nodata(v)).collect();
    if valid.is_empty() {
        return Err(Error::NoValidPixels);
    }
    valid.sort_unstable_by(|a, b| a.total_cmp(b));

    let range = stretch_range(&valid, clip);
    if range.vmin >= range.vmax {
        return Err(Error::DegenerateRange { vmin: range.vmin, vmax: range.vmax });
    }
    info!(
        vmin = range.vmin,
        vmax = range.vmax,
        valid = valid.len(),
        bits = depth.bits(),
        "elevation stretch"
    );

    let span = range.vmax - range.vmin;
    let max_code = depth.max_code();
    let codes = band.iter().map(|&v| {
        if src.is_nodata(v) {
            0.0
        } else {
            (((v as f64 - range.vmin) / span).clamp(0.0, 1.0) * max_code).round()
        }
    });

    let buffer = match depth {
        BitDepth::Eight => PixelBuffer::U8(codes.map(|c| c as u8).collect()),
        BitDepth::Sixteen => PixelBuffer::U16(codes.map(|c| c as u16).collect()),
    };
    let out = RasterDataset::new(*src.grid(), 1, buffer, Some(0.0))?;
    Ok((out, range))
}

/// Stretch range of already sorted, non-empty valid values
pub fn stretch_range(sorted: &[f32], clip: Option<PercentileClip>) -> StretchRange {
    match clip {
        Some(clip) => StretchRange {
            vmin: percentile(sorted, clip.low),
            vmax: percentile(sorted, clip.high),
        },
        None => StretchRange {
            vmin: sorted[0] as f64,
            vmax: sorted[sorted.len() - 1] as f64,
        },
    }
}

/// Percentile with linear interpolation between closest ranks
pub fn percentile(sorted: &[f32], p: f64) -> f64 {
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let lo = sorted[lower] as f64;
    let hi = sorted[upper.min(sorted.len() - 1)] as f64;
    lo + (hi - lo) * (rank - lower as f64)
}
