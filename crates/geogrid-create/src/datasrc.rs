//! Contract between the builder and a data source.
//!
//! A data source produces surface elevations and block values at
//! physical-frame model coordinates. Sources are registered by name; the
//! configuration selects one via `geomodelgrids.data_source`.

use geogrid_common::{Config, GeogridError, Result};
use geogrid_model::Block;

use crate::analytic::AnalyticDataSource;

/// Producer of surface elevations and block values.
///
/// All point arrays are physical-frame model coordinates, ordered to
/// match the batch window that generated them (y fastest for surfaces;
/// z fastest, then y, then x for blocks). Returned arrays align
/// one-to-one with the input points.
pub trait DataSource {
    /// One-time setup before any batch is requested.
    fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    /// Extra producer-defined metadata merged into the model's
    /// `auxiliary` attribute before the domain is written.
    fn auxiliary(&self) -> Option<serde_json::Value> {
        None
    }

    /// Elevation of the model top at the given points.
    ///
    /// `None` means the source does not define this surface; the builder
    /// skips its construction entirely.
    fn top_surface(&self, points: &[[f64; 3]]) -> Result<Option<Vec<f32>>>;

    /// Elevation of topography/bathymetry at the given points.
    fn topography_bathymetry(&self, points: &[[f64; 3]]) -> Result<Option<Vec<f32>>>;

    /// Model values at the given block points.
    ///
    /// `depth_elevation`, when present, holds the elevation of the
    /// depth-defining surface for each xy column of the batch window so
    /// sources keyed by depth below ground can convert. The result holds
    /// `points.len() * block.num_values()` values, value index fastest.
    fn values(
        &self,
        block: &Block,
        points: &[[f64; 3]],
        depth_elevation: Option<&[f64]>,
    ) -> Result<Vec<f32>>;
}

/// Instantiate the data source named by the configuration.
pub fn resolve_data_source(config: &Config) -> Result<Box<dyn DataSource>> {
    let name = config.get_str("geomodelgrids", "data_source")?;
    match name {
        "analytic" => Ok(Box::new(AnalyticDataSource::new())),
        other => Err(GeogridError::bad_config(format!(
            "unknown data source '{other}' (registered: analytic)"
        ))),
    }
}
