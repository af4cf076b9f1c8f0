//! Model surfaces: the model top and topography/bathymetry.
//!
//! A surface is an elevation field over the model's xy footprint with an
//! independent discretization per axis. It warps block grids vertically
//! and answers elevation queries.

use geogrid_common::{Batch2D, Config, GeogridError, Result};
use geogrid_projection::LocalFrame;
use geogrid_store::attrs::AttrMap;
use geogrid_store::SURFACES_GROUP;

use crate::axis::AxisSpec;
use crate::metadata::ModelMetadata;

/// Default dataset chunking when the configuration does not set one.
const DEFAULT_CHUNK: [u64; 3] = [64, 64, 1];

/// Geometry of one surface.
#[derive(Debug, Clone)]
pub struct Surface {
    name: String,
    x_axis: AxisSpec,
    y_axis: AxisSpec,
    dim_x: f64,
    dim_y: f64,
    chunk_shape: Vec<u64>,
}

impl Surface {
    /// Read a surface from its config section, if the model declares it.
    ///
    /// Returns `Ok(None)` when the section is absent or disabled via
    /// `use_surface = False`.
    pub fn from_config(
        name: &str,
        config: &Config,
        metadata: &ModelMetadata,
    ) -> Result<Option<Self>> {
        if !config.has_section(name) {
            return Ok(None);
        }
        if let Some(enabled) = config.get_opt(name, "use_surface") {
            if !enabled.eq_ignore_ascii_case("true") {
                return Ok(None);
            }
        }
        let chunk_shape = match config.get_opt(name, "chunk_size") {
            Some(_) => {
                let chunk = config.get_f64_list(name, "chunk_size")?;
                if chunk.len() != 3 {
                    return Err(GeogridError::bad_config(format!(
                        "[{name}] chunk_size must have 3 entries"
                    )));
                }
                chunk.iter().map(|&c| c.max(1.0) as u64).collect()
            }
            None => DEFAULT_CHUNK.to_vec(),
        };
        let surface = Self {
            name: name.to_string(),
            x_axis: AxisSpec::from_config(config, name, "x")?,
            y_axis: AxisSpec::from_config(config, name, "y")?,
            dim_x: metadata.dim_x,
            dim_y: metadata.dim_y,
            chunk_shape,
        };
        surface.validate()?;
        Ok(Some(surface))
    }

    /// Rebuild a surface from stored dataset attributes (read side).
    pub fn from_attrs(name: &str, metadata: &ModelMetadata, stored: &AttrMap) -> Result<Self> {
        let surface = Self {
            name: name.to_string(),
            x_axis: AxisSpec::from_attrs(stored, "x")?,
            y_axis: AxisSpec::from_attrs(stored, "y")?,
            dim_x: metadata.dim_x,
            dim_y: metadata.dim_y,
            chunk_shape: DEFAULT_CHUNK.to_vec(),
        };
        surface.validate()?;
        Ok(surface)
    }

    /// Check the geometry invariants.
    pub fn validate(&self) -> Result<()> {
        let context = format!("surface '{}'", self.name);
        self.x_axis.validate(self.dim_x, &context)?;
        self.y_axis.validate(self.dim_y, &context)?;
        Ok(())
    }

    /// Surface name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// X axis discretization.
    pub fn x_axis(&self) -> &AxisSpec {
        &self.x_axis
    }

    /// Y axis discretization.
    pub fn y_axis(&self) -> &AxisSpec {
        &self.y_axis
    }

    /// Footprint the surface spans.
    pub fn dims_xy(&self) -> (f64, f64) {
        (self.dim_x, self.dim_y)
    }

    /// Grid shape `(num_x, num_y, 1)`.
    pub fn dims(&self) -> (usize, usize, usize) {
        (
            self.x_axis.num_points(self.dim_x),
            self.y_axis.num_points(self.dim_y),
            1,
        )
    }

    /// Dataset shape for storage.
    pub fn shape(&self) -> Vec<u64> {
        let (num_x, num_y, _) = self.dims();
        vec![num_x as u64, num_y as u64, 1]
    }

    /// Chunk shape for storage.
    pub fn chunk_shape(&self) -> &[u64] {
        &self.chunk_shape
    }

    /// Path of the dataset inside the model store.
    pub fn dataset_path(&self) -> String {
        format!("{SURFACES_GROUP}/{}", self.name)
    }

    /// Geometry attributes written next to the dataset.
    pub fn attrs(&self) -> AttrMap {
        let mut out = AttrMap::new();
        self.x_axis.to_attrs("x", &mut out);
        self.y_axis.to_attrs("y", &mut out);
        out
    }

    /// Validate stored attributes against this surface.
    pub fn check_attrs(&self, stored: &AttrMap) -> Result<()> {
        let x_stored = AxisSpec::from_attrs(stored, "x")?;
        let y_stored = AxisSpec::from_attrs(stored, "y")?;
        if !self.x_axis.matches(&x_stored) || !self.y_axis.matches(&y_stored) {
            return Err(GeogridError::inconsistent_geometry(format!(
                "stored discretization of surface '{}' does not match the configuration",
                self.name
            )));
        }
        Ok(())
    }

    /// Both surfaces of a model must share one xy discretization.
    pub fn check_same_grid(&self, other: &Surface) -> Result<()> {
        if !self.x_axis.matches(other.x_axis()) || !self.y_axis.matches(other.y_axis()) {
            return Err(GeogridError::inconsistent_geometry(format!(
                "surfaces '{}' and '{}' have different xy discretizations",
                self.name,
                other.name()
            )));
        }
        Ok(())
    }

    /// Generate physical-frame points for the surface grid.
    ///
    /// Points are ordered x-major (y varies fastest) to match dataset
    /// layout; local z is 0 for every point.
    pub fn generate_points(&self, frame: &LocalFrame, batch: Option<&Batch2D>) -> Vec<[f64; 3]> {
        let (num_x, num_y, _) = self.dims();
        let (x_range, y_range) = match batch {
            Some(batch) => (batch.x_range.clone(), batch.y_range.clone()),
            None => (0..num_x, 0..num_y),
        };
        tracing::debug!(
            surface = %self.name,
            points = x_range.len() * y_range.len(),
            "generating surface points"
        );
        let mut points = Vec::with_capacity(x_range.len() * y_range.len());
        for i in x_range {
            let x_local = self.x_axis.coordinate(i);
            for j in y_range.clone() {
                let y_local = self.y_axis.coordinate(j);
                let (x, y) = frame.to_physical(x_local, y_local);
                points.push([x, y, 0.0]);
            }
        }
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tests::sample_config;

    fn sample_metadata() -> ModelMetadata {
        ModelMetadata::from_config(&sample_config()).unwrap()
    }

    fn surface_config() -> Config {
        let mut config = sample_config();
        config.set("top_surface", "x_resolution", "8000.0");
        config.set("top_surface", "y_resolution", "10000.0");
        config.set("top_surface", "chunk_size", "[4, 4, 1]");
        config
    }

    #[test]
    fn test_absent_section() {
        let config = sample_config();
        let surface = Surface::from_config("top_surface", &config, &sample_metadata()).unwrap();
        assert!(surface.is_none());
    }

    #[test]
    fn test_disabled_surface() {
        let mut config = surface_config();
        config.set("top_surface", "use_surface", "False");
        let surface = Surface::from_config("top_surface", &config, &sample_metadata()).unwrap();
        assert!(surface.is_none());
    }

    #[test]
    fn test_dims_uniform() {
        let surface = Surface::from_config("top_surface", &surface_config(), &sample_metadata())
            .unwrap()
            .unwrap();
        // 32 km / 8 km and 40 km / 10 km.
        assert_eq!(surface.dims(), (5, 5, 1));
        assert_eq!(surface.shape(), vec![5, 5, 1]);
        assert_eq!(surface.chunk_shape(), &[4, 4, 1]);
        assert_eq!(surface.dataset_path(), "surfaces/top_surface");
    }

    #[test]
    fn test_generate_points_unrotated() {
        let mut config = surface_config();
        config.set("coordsys", "y_azimuth", "0.0");
        let metadata = ModelMetadata::from_config(&config).unwrap();
        let surface = Surface::from_config("top_surface", &config, &metadata)
            .unwrap()
            .unwrap();
        let frame = LocalFrame::new(metadata.origin_x, metadata.origin_y, metadata.y_azimuth);
        let points = surface.generate_points(&frame, None);
        assert_eq!(points.len(), 25);
        // First point sits on the origin; y varies fastest.
        assert_eq!(points[0], [metadata.origin_x, metadata.origin_y, 0.0]);
        assert_eq!(points[1][1], metadata.origin_y + 10000.0);
        assert_eq!(points[5][0], metadata.origin_x + 8000.0);
    }

    #[test]
    fn test_generate_points_batch() {
        let surface = Surface::from_config("top_surface", &surface_config(), &sample_metadata())
            .unwrap()
            .unwrap();
        let frame = LocalFrame::new(0.0, 0.0, 0.0);
        let batch = Batch2D {
            x_range: 1..3,
            y_range: 0..2,
        };
        let points = surface.generate_points(&frame, Some(&batch));
        assert_eq!(points.len(), 4);
        assert_eq!(points[0][0], 8000.0);
        assert_eq!(points[0][1], 0.0);
        assert_eq!(points[3][0], 16000.0);
        assert_eq!(points[3][1], 10000.0);
    }

    #[test]
    fn test_check_attrs_mismatch() {
        let surface = Surface::from_config("top_surface", &surface_config(), &sample_metadata())
            .unwrap()
            .unwrap();
        let mut stored = surface.attrs();
        stored.insert("x_resolution".into(), serde_json::json!(4000.0));
        assert!(matches!(
            surface.check_attrs(&stored),
            Err(GeogridError::InconsistentGeometry(_))
        ));
        assert!(surface.check_attrs(&surface.attrs()).is_ok());
    }

    #[test]
    fn test_variable_axis_surface() {
        let mut config = sample_config();
        config.set(
            "top_surface",
            "x_coordinates",
            "[0.0, 8000.0, 16000.0, 24000.0, 32000.0]",
        );
        config.set("top_surface", "y_resolution", "10000.0");
        let surface = Surface::from_config("top_surface", &config, &sample_metadata())
            .unwrap()
            .unwrap();
        assert_eq!(surface.dims(), (5, 5, 1));
        let restored =
            Surface::from_attrs("top_surface", &sample_metadata(), &surface.attrs()).unwrap();
        assert_eq!(restored.dims(), (5, 5, 1));
    }
}
