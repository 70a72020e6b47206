use proj::Proj;
use tracing::debug;

use crate::error::{Error, Result};
use crate::projection::crs::Crs;

/// Transforms coordinates between two coordinate reference systems
pub struct Transformer {
    proj: Proj,
    from: Crs,
    to: Crs,
}

impl Transformer {
    /// Creates a transformer from source to target CRS.
    ///
    /// Both CRSs are resolved by PROJ even when they are identical, so an
    /// unknown code fails here rather than on first use.
    pub fn new(from: Crs, to: Crs) -> Result<Self> {
        let proj = Proj::new_known_crs(&from.authority(), &to.authority(), None).map_err(|e| {
            Error::UnsupportedCrs {
                crs: format!("{} -> {}", from, to),
                reason: e.to_string(),
            }
        })?;

        debug!(%from, %to, "created coordinate transformer");
        Ok(Self { proj, from, to })
    }

    pub fn to_crs(&self) -> Crs {
        self.to
    }

    /// Source and target are the same CRS; coordinates pass through untouched
    pub fn is_identity(&self) -> bool {
        self.from == self.to
    }

    /// Transforms points in place.
    ///
    /// Points PROJ cannot transform (outside the projection's domain) come
    /// back as NaN instead of failing the whole batch.
    pub fn transform_in_place(&self, points: &mut [(f64, f64)]) {
        if self.is_identity() || points.is_empty() {
            return;
        }
        let originals = points.to_vec();
        if self.proj.convert_array(points).is_ok() {
            return;
        }
        for (point, original) in points.iter_mut().zip(originals) {
            *point = self.proj.convert(original).unwrap_or((f64::NAN, f64::NAN));
        }
    }
}
