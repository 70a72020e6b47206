//! Vector geometries used for AOI clipping and mask burning

pub mod geojson;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::projection::{Crs, Transformer};
use crate::types::BoundingBox;

pub use self::geojson::{load_layer, parse_layer, FeatureFilter};

/// A single geometry, coordinates as `(x, y)` in the owning set's CRS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    /// First ring is the exterior, the rest are holes
    Polygon { rings: Vec<Vec<(f64, f64)>> },
    LineString { points: Vec<(f64, f64)> },
}

impl Geometry {
    /// Convenience constructor for a hole-free polygon
    pub fn polygon(exterior: Vec<(f64, f64)>) -> Self {
        Geometry::Polygon { rings: vec![exterior] }
    }

    pub fn line(points: Vec<(f64, f64)>) -> Self {
        Geometry::LineString { points }
    }

    /// Rectangle polygon covering `bbox`
    pub fn rectangle(bbox: &BoundingBox) -> Self {
        let mut ring = bbox.corners().to_vec();
        ring.push(ring[0]);
        Geometry::polygon(ring)
    }

    pub fn is_polygon(&self) -> bool {
        matches!(self, Geometry::Polygon { .. })
    }

    fn vertices(&self) -> Box<dyn Iterator<Item = &(f64, f64)> + '_> {
        match self {
            Geometry::Polygon { rings } => Box::new(rings.iter().flatten()),
            Geometry::LineString { points } => Box::new(points.iter()),
        }
    }

    fn vertices_mut(&mut self) -> Box<dyn Iterator<Item = &mut (f64, f64)> + '_> {
        match self {
            Geometry::Polygon { rings } => Box::new(rings.iter_mut().flatten()),
            Geometry::LineString { points } => Box::new(points.iter_mut()),
        }
    }
}

/// Geometries sharing one CRS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometrySet {
    pub crs: Crs,
    pub geometries: Vec<Geometry>,
}

impl GeometrySet {
    pub fn new(crs: Crs, geometries: Vec<Geometry>) -> Self {
        Self { crs, geometries }
    }

    pub fn empty(crs: Crs) -> Self {
        Self::new(crs, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.geometries.len()
    }

    pub fn polygons(&self) -> impl Iterator<Item = &Geometry> {
        self.geometries.iter().filter(|g| g.is_polygon())
    }

    /// Bounding box of every vertex, `None` for an empty set
    pub fn bounds(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.geometries.iter().flat_map(|g| g.vertices().copied()))
    }

    /// Copy of this set with every vertex transformed to `crs`
    pub fn to_crs(&self, crs: Crs) -> Result<GeometrySet> {
        if crs == self.crs {
            return Ok(self.clone());
        }
        let transformer = Transformer::new(self.crs, crs)?;
        let mut reprojected = self.clone();
        for geometry in reprojected.geometries.iter_mut() {
            let mut points: Vec<(f64, f64)> = geometry.vertices().copied().collect();
            transformer.transform_in_place(&mut points);
            for (vertex, point) in geometry.vertices_mut().zip(points) {
                *vertex = point;
            }
        }
        reprojected.crs = crs;
        Ok(reprojected)
    }

    /// Concatenates several sets after bringing them into `crs`
    pub fn merge(sets: &[GeometrySet], crs: Crs) -> Result<GeometrySet> {
        let mut merged = GeometrySet::empty(crs);
        for set in sets {
            merged.geometries.extend(set.to_crs(crs)?.geometries);
        }
        Ok(merged)
    }
}
