//! CRS parsing and point projection.
//!
//! Accepts `EPSG:nnnn` authority codes for the systems that appear in
//! shipped models, or raw PROJ strings. Geographic EPSG codes use
//! latitude-first axis order, matching the authority definition; PROJ
//! strings use longitude-first.

use proj4rs::proj::Proj;
use proj4rs::transform::transform;

use geogrid_common::{GeogridError, Result};

/// Resolve a CRS string to a PROJ string plus axis-order flag.
///
/// Returns `(proj_string, latitude_first)`.
fn resolve_crs(crs: &str) -> Result<(String, bool)> {
    let trimmed = crs.trim();
    if trimmed.starts_with('+') {
        return Ok((trimmed.to_string(), false));
    }
    let code = trimmed
        .strip_prefix("EPSG:")
        .or_else(|| trimmed.strip_prefix("epsg:"))
        .ok_or_else(|| {
            GeogridError::crs(format!(
                "unsupported CRS '{trimmed}'; expected 'EPSG:nnnn' or a '+proj=' string"
            ))
        })?;
    let code: u32 = code
        .parse()
        .map_err(|_| GeogridError::crs(format!("malformed EPSG code in '{trimmed}'")))?;

    let proj_string = match code {
        // Geographic systems. EPSG axis order is latitude, longitude.
        4326 => return Ok(("+proj=longlat +datum=WGS84 +no_defs".to_string(), true)),
        4269 => return Ok(("+proj=longlat +datum=NAD83 +no_defs".to_string(), true)),
        // California Albers (NAD83).
        3311 => "+proj=aea +lat_1=34 +lat_2=40.5 +lat_0=0 +lon_0=-120 \
                 +x_0=0 +y_0=-4000000 +datum=NAD83 +units=m +no_defs"
            .to_string(),
        // UTM northern zones: NAD83 (269zz) and WGS84 (326zz/327zz south).
        26901..=26923 => format!(
            "+proj=utm +zone={} +datum=NAD83 +units=m +no_defs",
            code - 26900
        ),
        32601..=32660 => format!(
            "+proj=utm +zone={} +datum=WGS84 +units=m +no_defs",
            code - 32600
        ),
        32701..=32760 => format!(
            "+proj=utm +zone={} +south +datum=WGS84 +units=m +no_defs",
            code - 32700
        ),
        other => {
            return Err(GeogridError::crs(format!(
                "EPSG:{other} is not in the built-in registry; pass a '+proj=' string"
            )))
        }
    };
    Ok((proj_string, false))
}

/// Reusable transform between two coordinate reference systems.
///
/// Built once per model and applied to millions of points. Per-point
/// projection failures surface as `None` so the caller can mark the
/// coordinate NODATA instead of aborting the batch.
pub struct CrsTransform {
    src: Proj,
    dst: Proj,
    src_geographic: bool,
    dst_geographic: bool,
    src_lat_first: bool,
    dst_lat_first: bool,
}

impl CrsTransform {
    /// Create a transform from a source CRS to a destination CRS.
    pub fn new(src_crs: &str, dst_crs: &str) -> Result<Self> {
        let (src_string, src_lat_first) = resolve_crs(src_crs)?;
        let (dst_string, dst_lat_first) = resolve_crs(dst_crs)?;
        let src = Proj::from_proj_string(&src_string)
            .map_err(|err| GeogridError::crs(format!("cannot parse CRS '{src_crs}': {err}")))?;
        let dst = Proj::from_proj_string(&dst_string)
            .map_err(|err| GeogridError::crs(format!("cannot parse CRS '{dst_crs}': {err}")))?;
        tracing::debug!(src = %src_crs, dst = %dst_crs, "created CRS transform");
        Ok(Self {
            src,
            dst,
            src_geographic: src_string.contains("+proj=longlat"),
            dst_geographic: dst_string.contains("+proj=longlat"),
            src_lat_first,
            dst_lat_first,
        })
    }

    /// Transform one point; `None` when the projection fails for it.
    ///
    /// Input axis order follows the source CRS (latitude first for
    /// geographic EPSG codes); output order follows the destination CRS.
    /// Geographic coordinates are degrees at the boundary; proj4rs works
    /// in radians internally.
    pub fn transform(&self, u: f64, v: f64, w: f64) -> Option<(f64, f64, f64)> {
        let (mut x, mut y) = if self.src_lat_first { (v, u) } else { (u, v) };
        if self.src_geographic {
            x = x.to_radians();
            y = y.to_radians();
        }
        let mut point = (x, y, w);
        transform(&self.src, &self.dst, &mut point).ok()?;
        let (mut out_x, mut out_y, out_z) = point;
        if self.dst_geographic {
            out_x = out_x.to_degrees();
            out_y = out_y.to_degrees();
        }
        if !out_x.is_finite() || !out_y.is_finite() {
            return None;
        }
        if self.dst_lat_first {
            Some((out_y, out_x, out_z))
        } else {
            Some((out_x, out_y, out_z))
        }
    }
}
