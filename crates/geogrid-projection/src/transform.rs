//! Composite transform from an input CRS into a model's local frame.

use geogrid_common::{Result, NODATA_F64};

use crate::crs::CrsTransform;
use crate::frame::LocalFrame;

/// Projects points from an input CRS into the model CRS, then into the
/// model's rotated local frame.
pub struct ModelTransform {
    crs: Option<CrsTransform>,
    frame: LocalFrame,
}

impl ModelTransform {
    /// Create a transform for a model.
    ///
    /// `input_crs` and `model_crs` may be equal, in which case the
    /// projection step is skipped.
    pub fn new(
        input_crs: &str,
        model_crs: &str,
        origin_x: f64,
        origin_y: f64,
        y_azimuth: f64,
    ) -> Result<Self> {
        let crs = if input_crs.trim() == model_crs.trim() {
            None
        } else {
            Some(CrsTransform::new(input_crs, model_crs)?)
        };
        Ok(Self {
            crs,
            frame: LocalFrame::new(origin_x, origin_y, y_azimuth),
        })
    }

    /// Transform a point to the local frame.
    ///
    /// A per-point projection failure yields NODATA coordinates, which the
    /// query pipeline treats as out of domain.
    pub fn to_local(&self, u: f64, v: f64, w: f64) -> (f64, f64, f64) {
        let (x_crs, y_crs, z) = match &self.crs {
            Some(crs) => match crs.transform(u, v, w) {
                Some(projected) => projected,
                None => return (NODATA_F64, NODATA_F64, NODATA_F64),
            },
            None => (u, v, w),
        };
        let (x, y) = self.frame.to_local(x_crs, y_crs);
        (x, y, z)
    }

    /// The model's local frame (used by point generators).
    pub fn frame(&self) -> &LocalFrame {
        &self.frame
    }
}
