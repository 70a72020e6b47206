//! CRS identifiers

use std::fmt;
use std::str::FromStr;

use proj::Proj;
use serde::{Deserialize, Serialize};

use crate::error::Error;

use super::epsg;

/// A coordinate reference system, identified by its EPSG code.
///
/// Parses from `EPSG:5179`, a bare `5179`, the OGC URN and URL forms and
/// `CRS84` (which maps to EPSG:4326 with longitude first, the only axis
/// order used in this crate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "CrsRepr", into = "String")]
pub struct Crs(u32);

impl Crs {
    pub const WGS84: Crs = Crs(epsg::WGS84);

    pub fn epsg(code: u32) -> Self {
        Self(code)
    }

    pub fn code(&self) -> u32 {
        self.0
    }

    /// Authority string as understood by PROJ
    pub fn authority(&self) -> String {
        format!("EPSG:{}", self.0)
    }

    /// OGC URL form, used by HTTP APIs
    pub fn ogc_url(&self) -> String {
        format!("http://www.opengis.net/def/crs/EPSG/0/{}", self.0)
    }

    /// Looks the CRS up in the PROJ database and classifies it.
    ///
    /// Geocentric, compound and vertical CRSs are rejected.
    pub fn kind(&self) -> Result<CrsKind, Error> {
        let unsupported = |reason: String| Error::UnsupportedCrs { crs: self.to_string(), reason };

        let proj = Proj::new(&self.authority()).map_err(|e| unsupported(e.to_string()))?;
        let projjson = proj.to_projjson(Some(false), None, None).map_err(|e| unsupported(e.to_string()))?;
        let definition: serde_json::Value = serde_json::from_str(&projjson).map_err(|e| unsupported(e.to_string()))?;

        match definition["type"].as_str() {
            Some("GeographicCRS") => Ok(CrsKind::Geographic),
            Some("ProjectedCRS") => Ok(CrsKind::Projected),
            Some(other) => Err(unsupported(format!("{} is neither geographic nor projected", other))),
            None => Err(unsupported("PROJ definition has no type".to_string())),
        }
    }
}

/// Coordinate space of a CRS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrsKind {
    /// Longitude and latitude in degrees
    Geographic,
    /// Planar coordinates from a map projection
    Projected,
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

impl FromStr for Crs {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let upper = trimmed.to_ascii_uppercase();

        if upper == "CRS84" || upper.ends_with(":CRS84") || upper.ends_with("/CRS84") {
            return Ok(Crs::WGS84);
        }

        let code = if let Some(rest) = upper.strip_prefix("EPSG:") {
            rest.trim_start_matches(':')
        } else if upper.starts_with("URN:OGC:DEF:CRS:EPSG:") || upper.contains("/EPSG/") {
            upper.rsplit(|c| c == ':' || c == '/').next().unwrap_or("")
        } else {
            upper.as_str()
        };

        code.parse::<u32>().map(Crs).map_err(|_| Error::UnsupportedCrs {
            crs: trimmed.to_string(),
            reason: "not an EPSG identifier".to_string(),
        })
    }
}

impl From<Crs> for String {
    fn from(crs: Crs) -> Self {
        crs.to_string()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CrsRepr {
    Code(u32),
    Text(String),
}

impl TryFrom<CrsRepr> for Crs {
    type Error = Error;

    fn try_from(repr: CrsRepr) -> Result<Self, Self::Error> {
        match repr {
            CrsRepr::Code(code) => Ok(Crs(code)),
            CrsRepr::Text(text) => text.parse(),
        }
    }
}
