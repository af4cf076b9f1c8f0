//! The query driver.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use geogrid_common::reporter::{report_error, shared_reporter};
use geogrid_common::{is_nodata_f64, GeogridError, Result, SharedReporter, NODATA};
use geogrid_model::{Model, SquashSurface};

/// Vertical remap used for squashing: the reference surface maps to 0
/// while `min_elev` stays fixed.
fn squash(z_in: f64, surface_elev: f64, min_elev: f64) -> f64 {
    z_in - surface_elev * (z_in - min_elev) / (0.0 - min_elev)
}

/// Ordered collection of models answering point queries.
pub struct QueryDriver {
    models: Vec<Model>,
    value_names: Vec<String>,
    columns: Vec<Vec<Option<usize>>>,
    squash_min_elev: Option<f64>,
    squash_surface: SquashSurface,
    reporter: SharedReporter,
    cancel: Arc<AtomicBool>,
    initialized: bool,
}

impl QueryDriver {
    /// Create an idle driver.
    pub fn new() -> Self {
        Self {
            models: Vec::new(),
            value_names: Vec::new(),
            columns: Vec::new(),
            squash_min_elev: None,
            squash_surface: SquashSurface::default(),
            reporter: shared_reporter(),
            cancel: Arc::new(AtomicBool::new(false)),
            initialized: false,
        }
    }

    /// The reporter shared with the models.
    pub fn reporter(&self) -> SharedReporter {
        self.reporter.clone()
    }

    /// Flag checked between points; set it to cancel a running query.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Open the models and compute the per-model value columns.
    ///
    /// Every requested value must exist in at least one model; a model
    /// missing a value yields NODATA in that channel for points it wins.
    pub fn initialize<P: AsRef<Path>>(
        &mut self,
        filenames: &[P],
        value_names: &[String],
        input_crs: &str,
    ) -> Result<()> {
        if filenames.is_empty() {
            let err = GeogridError::bad_config("no model files given");
            report_error(&self.reporter, err.to_string());
            return Err(err);
        }
        self.models.clear();
        self.columns.clear();
        for filename in filenames {
            let model = Model::open(filename.as_ref(), input_crs).map_err(|err| {
                report_error(&self.reporter, err.to_string());
                err
            })?;
            self.columns.push(
                value_names
                    .iter()
                    .map(|name| model.metadata().value_index(name))
                    .collect(),
            );
            self.models.push(model);
        }
        for (slot, name) in value_names.iter().enumerate() {
            if self.columns.iter().all(|cols| cols[slot].is_none()) {
                let err = GeogridError::bad_config(format!(
                    "value '{name}' is not present in any model"
                ));
                report_error(&self.reporter, err.to_string());
                self.models.clear();
                self.columns.clear();
                return Err(err);
            }
        }
        self.value_names = value_names.to_vec();
        self.initialized = true;
        self.cancel.store(false, Ordering::Relaxed);
        tracing::info!(
            models = self.models.len(),
            values = ?self.value_names,
            "query driver initialized"
        );
        Ok(())
    }

    /// Enable squashing above the given elevation.
    pub fn set_squash_min_elev(&mut self, min_elev: f64) {
        self.squash_min_elev = Some(min_elev);
    }

    /// Choose the surface that squashing references.
    pub fn set_squash_surface(&mut self, surface: SquashSurface) {
        self.squash_surface = surface;
    }

    /// Requested value names, in caller order.
    pub fn value_names(&self) -> &[String] {
        &self.value_names
    }

    /// Number of output columns per point.
    pub fn num_values(&self) -> usize {
        self.value_names.len()
    }

    fn check_ready(&self) -> Result<()> {
        if !self.initialized {
            let err = GeogridError::invalid_handle("query driver is not initialized");
            report_error(&self.reporter, err.to_string());
            return Err(err);
        }
        Ok(())
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.load(Ordering::Relaxed) {
            let err = GeogridError::io("query cancelled");
            report_error(&self.reporter, err.to_string());
            return Err(err);
        }
        Ok(())
    }

    /// Interpolate the requested values at each point.
    ///
    /// Points are in the input CRS handed to `initialize`. Returns a
    /// row-major `points x values` array and a per-point error flag; rows
    /// no model contains hold NODATA with their flag set.
    pub fn query(&self, points: &[[f64; 3]]) -> Result<(Vec<f32>, Vec<u8>)> {
        self.check_ready()?;
        let num_values = self.num_values();
        let mut values = vec![NODATA; points.len() * num_values];
        let mut errors = vec![0u8; points.len()];

        for (row, point) in points.iter().enumerate() {
            self.check_cancelled()?;
            let out = &mut values[row * num_values..(row + 1) * num_values];
            let mut hit = false;
            for (model, columns) in self.models.iter().zip(self.columns.iter()) {
                let (x, y, z) = model.to_local(point[0], point[1], point[2]);
                let z = self.squash_adjust(model, x, y, z);
                if model.contains_local(x, y, z) {
                    errors[row] = model.query_local(x, y, z, columns, out);
                    hit = true;
                    break;
                }
            }
            if !hit {
                errors[row] = 1;
            }
        }
        Ok((values, errors))
    }

    /// Apply squashing to a local-frame elevation when enabled.
    fn squash_adjust(&self, model: &Model, x: f64, y: f64, z: f64) -> f64 {
        let Some(min_elev) = self.squash_min_elev else {
            return z;
        };
        if z < min_elev {
            return z;
        }
        match model.squash_elevation_local(x, y, self.squash_surface) {
            Some(surface_elev) => squash(z, surface_elev, min_elev),
            None => z,
        }
    }

    /// Top-surface elevation at each point (no squashing).
    pub fn query_top_elevation(&self, points: &[[f64; 3]]) -> Result<(Vec<f64>, Vec<u8>)> {
        self.elevation_query(points, |model, u, v| model.query_top_elevation(u, v))
    }

    /// Topography/bathymetry elevation at each point (no squashing).
    pub fn query_topobathy_elevation(&self, points: &[[f64; 3]]) -> Result<(Vec<f64>, Vec<u8>)> {
        self.elevation_query(points, |model, u, v| model.query_topobathy_elevation(u, v))
    }

    fn elevation_query<F>(&self, points: &[[f64; 3]], get: F) -> Result<(Vec<f64>, Vec<u8>)>
    where
        F: Fn(&Model, f64, f64) -> f64,
    {
        self.check_ready()?;
        let mut elevations = vec![NODATA as f64; points.len()];
        let mut errors = vec![0u8; points.len()];
        for (row, point) in points.iter().enumerate() {
            self.check_cancelled()?;
            let mut hit = false;
            for model in &self.models {
                let elevation = get(model, point[0], point[1]);
                if !is_nodata_f64(elevation) {
                    elevations[row] = elevation;
                    hit = true;
                    break;
                }
            }
            if !hit {
                errors[row] = 1;
            }
        }
        Ok((elevations, errors))
    }

    /// Release the models; further queries fail with `InvalidHandle`.
    pub fn finalize(&mut self) {
        self.models.clear();
        self.columns.clear();
        self.value_names.clear();
        self.initialized = false;
        if let Ok(mut reporter) = self.reporter.lock() {
            reporter.reset_status();
        }
        tracing::debug!("query driver finalized");
    }
}

impl Default for QueryDriver {
    fn default() -> Self {
        Self::new()
    }
}
