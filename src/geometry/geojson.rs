//! GeoJSON layer loading
//!
//! Supports FeatureCollection, Feature and bare geometry documents.
//! Polygon and line geometries are kept; points are skipped. The legacy
//! `crs` member is honoured, otherwise coordinates are EPSG:4326.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::projection::Crs;

use super::{Geometry, GeometrySet};

/// Keeps only features whose `property` equals `value`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFilter {
    pub property: String,
    pub value: String,
}

impl FeatureFilter {
    pub fn new(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self { property: property.into(), value: value.into() }
    }

    fn matches(&self, feature: &Value) -> bool {
        match feature.get("properties").and_then(|p| p.get(&self.property)) {
            Some(Value::String(s)) => *s == self.value,
            Some(Value::Null) | None => false,
            Some(other) => other.to_string() == self.value,
        }
    }
}

/// Reads a GeoJSON file into a geometry set
pub fn load_layer(path: &Path, filter: Option<&FeatureFilter>) -> Result<GeometrySet> {
    if !path.exists() {
        return Err(Error::MissingInput(path.to_path_buf()));
    }
    let reader = BufReader::new(File::open(path)?);
    let document: Value = serde_json::from_reader(reader)?;
    let set = parse_layer(&document, filter)?;
    debug!(path = %path.display(), geometries = set.len(), crs = %set.crs, "loaded vector layer");
    Ok(set)
}

/// Converts a parsed GeoJSON document into a geometry set
pub fn parse_layer(document: &Value, filter: Option<&FeatureFilter>) -> Result<GeometrySet> {
    let crs = document_crs(document)?;
    let mut geometries = Vec::new();

    match document.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => {
            let features = document
                .get("features")
                .and_then(Value::as_array)
                .ok_or_else(|| Error::InvalidGeometry("FeatureCollection without features".to_string()))?;
            for feature in features {
                collect_feature(feature, filter, &mut geometries)?;
            }
        }
        Some("Feature") => collect_feature(document, filter, &mut geometries)?,
        Some(_) => {
            if filter.is_some() {
                warn!("attribute filter ignored for a bare geometry document");
            }
            collect_geometry(document, &mut geometries)?;
        }
        None => return Err(Error::InvalidGeometry("document has no type member".to_string())),
    }

    Ok(GeometrySet::new(crs, geometries))
}

fn document_crs(document: &Value) -> Result<Crs> {
    match document.pointer("/crs/properties/name").and_then(Value::as_str) {
        Some(name) => name.parse(),
        None => Ok(Crs::WGS84),
    }
}

fn collect_feature(feature: &Value, filter: Option<&FeatureFilter>, out: &mut Vec<Geometry>) -> Result<()> {
    if let Some(filter) = filter {
        if !filter.matches(feature) {
            return Ok(());
        }
    }
    match feature.get("geometry") {
        Some(Value::Null) | None => Ok(()),
        Some(geometry) => collect_geometry(geometry, out),
    }
}

fn collect_geometry(geometry: &Value, out: &mut Vec<Geometry>) -> Result<()> {
    let kind = geometry
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidGeometry("geometry without type".to_string()))?;

    if kind == "GeometryCollection" {
        let members = geometry
            .get("geometries")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::InvalidGeometry("GeometryCollection without geometries".to_string()))?;
        for member in members {
            collect_geometry(member, out)?;
        }
        return Ok(());
    }

    let coords = geometry
        .get("coordinates")
        .ok_or_else(|| Error::InvalidGeometry(format!("{} without coordinates", kind)))?;

    match kind {
        "Polygon" => out.push(Geometry::Polygon { rings: rings(coords)? }),
        "MultiPolygon" => {
            for polygon in array(coords)? {
                out.push(Geometry::Polygon { rings: rings(polygon)? });
            }
        }
        "LineString" => out.push(Geometry::LineString { points: positions(coords)? }),
        "MultiLineString" => {
            for line in array(coords)? {
                out.push(Geometry::LineString { points: positions(line)? });
            }
        }
        "Point" | "MultiPoint" => {}
        other => return Err(Error::InvalidGeometry(format!("unknown geometry type {}", other))),
    }
    Ok(())
}

fn array(value: &Value) -> Result<&Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| Error::InvalidGeometry("expected a coordinate array".to_string()))
}

fn rings(value: &Value) -> Result<Vec<Vec<(f64, f64)>>> {
    array(value)?.iter().map(positions).collect()
}

fn positions(value: &Value) -> Result<Vec<(f64, f64)>> {
    array(value)?.iter().map(position).collect()
}

fn position(value: &Value) -> Result<(f64, f64)> {
    let pair = array(value)?;
    match (pair.first().and_then(Value::as_f64), pair.get(1).and_then(Value::as_f64)) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(Error::InvalidGeometry(format!("bad position {}", value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn countries() -> Value {
        json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": { "CNTR_ID": "KR" },
                    "geometry": {
                        "type": "MultiPolygon",
                        "coordinates": [
                            [[[126.0, 34.0], [129.0, 34.0], [129.0, 38.0], [126.0, 38.0], [126.0, 34.0]]],
                            [[[126.1, 33.2], [126.9, 33.2], [126.9, 33.6], [126.1, 33.2]]]
                        ]
                    }
                },
                {
                    "type": "Feature",
                    "properties": { "CNTR_ID": "JP" },
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[130.0, 31.0], [140.0, 31.0], [140.0, 41.0], [130.0, 31.0]]]
                    }
                }
            ]
        })
    }

    #[test]
    fn test_filter_selects_feature() {
        let filter = FeatureFilter::new("CNTR_ID", "KR");
        let set = parse_layer(&countries(), Some(&filter)).unwrap();
        assert_eq!(set.crs, Crs::WGS84);
        assert_eq!(set.len(), 2);

        let all = parse_layer(&countries(), None).unwrap();
        assert_eq!(all.len(), 3);

        let none = parse_layer(&countries(), Some(&FeatureFilter::new("CNTR_ID", "XX"))).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_legacy_crs_member() {
        let doc = json!({
            "type": "FeatureCollection",
            "crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:EPSG::5179" } },
            "features": [{
                "type": "Feature",
                "properties": {},
                "geometry": { "type": "MultiLineString", "coordinates": [[[0.0, 0.0], [10.0, 10.0]], [[5.0, 5.0], [6.0, 6.0]]] }
            }]
        });
        let set = parse_layer(&doc, None).unwrap();
        assert_eq!(set.crs, Crs::epsg(5179));
        assert_eq!(set.geometries[1], Geometry::line(vec![(5.0, 5.0), (6.0, 6.0)]));
    }

    #[test]
    fn test_bare_geometry_and_points() {
        let doc = json!({
            "type": "GeometryCollection",
            "geometries": [
                { "type": "Point", "coordinates": [1.0, 2.0] },
                { "type": "LineString", "coordinates": [[1.0, 2.0], [3.0, 4.0]] }
            ]
        });
        let set = parse_layer(&doc, None).unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_malformed_coordinates() {
        let doc = json!({ "type": "Polygon", "coordinates": [[[1.0], [2.0, 3.0]]] });
        assert!(matches!(parse_layer(&doc, None), Err(Error::InvalidGeometry(_))));
    }

    #[test]
    fn test_load_layer_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", countries()).unwrap();
        let set = load_layer(file.path(), Some(&FeatureFilter::new("CNTR_ID", "JP"))).unwrap();
        assert_eq!(set.len(), 1);

        let missing = load_layer(Path::new("/nonexistent/boundaries.geojson"), None);
        assert!(matches!(missing, Err(Error::MissingInput(_))));
    }
}
