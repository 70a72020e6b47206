//! Core data types for demprep

use serde::{Deserialize, Serialize};

/// Represents pixel data types carried by a raster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Unsigned 8-bit integer
    U8,
    /// Unsigned 16-bit integer
    U16,
    /// 32-bit floating point
    F32,
}

impl DataType {
    /// Returns the size in bytes for this data type
    pub fn size(&self) -> usize {
        match self {
            DataType::U8 => 1,
            DataType::U16 => 2,
            DataType::F32 => 4,
        }
    }

    /// Returns the name of this data type
    pub fn name(&self) -> &'static str {
        match self {
            DataType::U8 => "U8",
            DataType::U16 => "U16",
            DataType::F32 => "F32",
        }
    }

    /// Whether this is a floating point type
    pub fn is_float(&self) -> bool {
        matches!(self, DataType::F32)
    }

    /// Largest representable value, as f64
    pub fn max_value(&self) -> f64 {
        match self {
            DataType::U8 => u8::MAX as f64,
            DataType::U16 => u16::MAX as f64,
            DataType::F32 => f32::MAX as f64,
        }
    }
}

/// Represents image dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Dimensions {
    /// Creates new dimensions
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns the total number of pixels
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Axis-aligned bounding box in world coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Creates a bounding box from its corners
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// Smallest box containing all given points, `None` for no points
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut iter = points.into_iter().filter(|(x, y)| x.is_finite() && y.is_finite());
        let (x0, y0) = iter.next()?;
        let mut bbox = Self::new(x0, y0, x0, y0);
        for (x, y) in iter {
            bbox.min_x = bbox.min_x.min(x);
            bbox.min_y = bbox.min_y.min(y);
            bbox.max_x = bbox.max_x.max(x);
            bbox.max_y = bbox.max_y.max(y);
        }
        Some(bbox)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Union of two boxes
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    /// Overlap of two boxes, `None` if they do not overlap with positive area
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        let bbox = BoundingBox::new(
            self.min_x.max(other.min_x),
            self.min_y.max(other.min_y),
            self.max_x.min(other.max_x),
            self.max_y.min(other.max_y),
        );
        if bbox.min_x < bbox.max_x && bbox.min_y < bbox.max_y {
            Some(bbox)
        } else {
            None
        }
    }

    /// Returns the corner points, clockwise from top-left
    pub fn corners(&self) -> [(f64, f64); 4] {
        [
            (self.min_x, self.max_y),
            (self.max_x, self.max_y),
            (self.max_x, self.min_y),
            (self.min_x, self.min_y),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_size() {
        assert_eq!(DataType::U8.size(), 1);
        assert_eq!(DataType::U16.size(), 2);
        assert_eq!(DataType::F32.size(), 4);
    }

    #[test]
    fn test_data_type_name() {
        assert_eq!(DataType::U8.name(), "U8");
        assert_eq!(DataType::F32.name(), "F32");
        assert!(DataType::F32.is_float());
        assert!(!DataType::U16.is_float());
    }

    #[test]
    fn test_dimensions() {
        let dims = Dimensions::new(100, 200);
        assert_eq!(dims.width, 100);
        assert_eq!(dims.height, 200);
        assert_eq!(dims.pixel_count(), 20000);
    }

    #[test]
    fn test_bbox_union_and_intersection() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, -5.0, 20.0, 5.0);

        assert_eq!(a.union(&b), BoundingBox::new(0.0, -5.0, 20.0, 10.0));
        assert_eq!(a.intersection(&b), Some(BoundingBox::new(5.0, 0.0, 10.0, 5.0)));

        let c = BoundingBox::new(10.0, 0.0, 12.0, 10.0);
        assert_eq!(a.intersection(&c), None);
    }

    #[test]
    fn test_bbox_from_points() {
        let bbox = BoundingBox::from_points(vec![(1.0, 2.0), (-1.0, 5.0), (3.0, f64::NAN)]).unwrap();
        assert_eq!(bbox, BoundingBox::new(-1.0, 2.0, 1.0, 5.0));
        assert!(BoundingBox::from_points(Vec::new()).is_none());
    }
}
