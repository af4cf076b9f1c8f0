//! Analytic data source.
//!
//! Produces smoothly varying fields from closed-form expressions. Used to
//! build self-contained models without an external data set and to
//! exercise the full build pipeline.

use std::f64::consts::TAU;

use serde_json::json;

use geogrid_common::{GeogridError, Result};
use geogrid_model::Block;

use crate::datasrc::DataSource;

/// Number of values the analytic fields produce.
const NUM_VALUES: usize = 2;

/// Data source computing elevations and values analytically.
#[derive(Debug, Default)]
pub struct AnalyticDataSource;

impl AnalyticDataSource {
    /// Create the source.
    pub fn new() -> Self {
        Self
    }

    fn surface_elevation(x: f64, y: f64) -> f64 {
        let lx = 25.0e+3;
        let ly = 30.0e+3;
        let amplitude = 20.0;
        amplitude * (TAU * x / lx).sin() * (TAU * y / ly).cos()
    }

    fn value_one(point: &[f64; 3]) -> f64 {
        let (lx, ly, lz) = (40.0e+3, 20.0e+3, 50.0e+3);
        let amplitude = 400.0;
        amplitude
            * (TAU * point[0] / lx).cos()
            * (TAU * point[1] / ly).sin()
            * (TAU * point[2] / lz).sin()
    }

    fn value_two(point: &[f64; 3]) -> f64 {
        let (lx, ly, lz) = (30.0e+3, 50.0e+3, 80.0e+3);
        let amplitude = 200.0;
        150.0
            + amplitude
                * (TAU * point[0] / lx).cos()
                * (TAU * point[1] / ly).sin()
                * (TAU * point[2] / lz).sin()
    }
}

impl DataSource for AnalyticDataSource {
    fn auxiliary(&self) -> Option<serde_json::Value> {
        Some(json!({
            "int_value": 1,
            "float_value": 2.0,
            "str_value": "abc",
        }))
    }

    fn top_surface(&self, points: &[[f64; 3]]) -> Result<Option<Vec<f32>>> {
        Ok(Some(
            points
                .iter()
                .map(|p| Self::surface_elevation(p[0], p[1]) as f32)
                .collect(),
        ))
    }

    fn topography_bathymetry(&self, points: &[[f64; 3]]) -> Result<Option<Vec<f32>>> {
        // Ground surface lowered to the sea floor.
        Ok(Some(
            points
                .iter()
                .map(|p| (Self::surface_elevation(p[0], p[1]) - 30.0) as f32)
                .collect(),
        ))
    }

    fn values(
        &self,
        block: &Block,
        points: &[[f64; 3]],
        _depth_elevation: Option<&[f64]>,
    ) -> Result<Vec<f32>> {
        if block.num_values() != NUM_VALUES {
            return Err(GeogridError::data_source(format!(
                "analytic source produces {NUM_VALUES} values but block '{}' stores {}",
                block.name(),
                block.num_values()
            )));
        }
        let mut values = Vec::with_capacity(points.len() * NUM_VALUES);
        for point in points {
            values.push(Self::value_one(point) as f32);
            values.push(Self::value_two(point) as f32);
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surfaces_align_with_points() {
        let source = AnalyticDataSource::new();
        let points = vec![[0.0, 0.0, 0.0], [6250.0, 0.0, 0.0]];
        let top = source.top_surface(&points).unwrap().unwrap();
        assert_eq!(top.len(), 2);
        assert!(top[0].abs() < 1.0e-6);
        // Quarter wavelength in x peaks the sine.
        assert!((top[1] - 20.0).abs() < 1.0e-4);

        let bathy = source.topography_bathymetry(&points).unwrap().unwrap();
        assert!((bathy[0] - (top[0] - 30.0)).abs() < 1.0e-6);
    }

    #[test]
    fn test_auxiliary_payload() {
        let source = AnalyticDataSource::new();
        let auxiliary = source.auxiliary().unwrap();
        assert_eq!(auxiliary["int_value"], 1);
        assert_eq!(auxiliary["str_value"], "abc");
    }
}
