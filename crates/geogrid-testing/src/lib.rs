//! Shared fixtures: analytic models whose values trilinear interpolation
//! reproduces exactly.
//!
//! The fields are affine in each coordinate, so any interior query must
//! return the closed-form value to float precision. Fixture models use an
//! origin at (0, 0) with no rotation, making local and physical frames
//! coincide.

use std::path::{Path, PathBuf};

use geogrid_common::{Config, GeogridError, Result};
use geogrid_create::{BuildSteps, Builder, DataSource};
use geogrid_model::Block;

/// `one` field of the fixtures.
pub fn field_one(x: f64, y: f64, z: f64) -> f64 {
    2000.0 + 0.3 * x + 0.4 * y - 4.0 * z
}

/// `two` field of the fixtures.
pub fn field_two(x: f64, y: f64, z: f64) -> f64 {
    -1200.0 + 0.1 * x - 0.2 * y - 4.8 * z
}

/// Top-surface elevation of the topography fixtures (bilinear in xy).
pub fn fixture_elevation(x: f64, y: f64) -> f64 {
    150.0 + 2.0e-5 * x - 1.2e-5 * y + 5.0e-10 * x * y
}

/// Data source producing the linear fixture fields.
///
/// `value_offset` shifts both fields so two models built from the same
/// source are distinguishable in fallback tests.
#[derive(Debug, Default)]
pub struct LinearDataSource {
    pub with_surfaces: bool,
    pub value_offset: f64,
}

impl LinearDataSource {
    /// Flat-topped source.
    pub fn flat() -> Self {
        Self {
            with_surfaces: false,
            value_offset: 0.0,
        }
    }

    /// Source with the bilinear top surface.
    pub fn with_topography() -> Self {
        Self {
            with_surfaces: true,
            value_offset: 0.0,
        }
    }
}

impl DataSource for LinearDataSource {
    fn top_surface(&self, points: &[[f64; 3]]) -> Result<Option<Vec<f32>>> {
        if !self.with_surfaces {
            return Ok(None);
        }
        Ok(Some(
            points
                .iter()
                .map(|p| fixture_elevation(p[0], p[1]) as f32)
                .collect(),
        ))
    }

    fn topography_bathymetry(&self, points: &[[f64; 3]]) -> Result<Option<Vec<f32>>> {
        self.top_surface(points)
    }

    fn values(
        &self,
        block: &Block,
        points: &[[f64; 3]],
        _depth_elevation: Option<&[f64]>,
    ) -> Result<Vec<f32>> {
        if block.num_values() != 2 {
            return Err(GeogridError::data_source("fixture source stores 2 values"));
        }
        let mut values = Vec::with_capacity(points.len() * 2);
        for p in points {
            values.push((self.value_offset + field_one(p[0], p[1], p[2])) as f32);
            values.push((self.value_offset + field_two(p[0], p[1], p[2])) as f32);
        }
        Ok(values)
    }
}

/// Shared descriptive sections of a fixture model configuration.
pub fn base_config(model_path: &Path, dim_x: f64, dim_y: f64, dim_z: f64) -> Config {
    let mut config = Config::new();
    let section = "geomodelgrids";
    config.set(section, "filename", model_path.to_string_lossy().to_string());
    config.set(section, "title", "Fixture model");
    config.set(section, "id", "fixture");
    config.set(section, "description", "Linear fields for interpolation tests");
    config.set(section, "keywords", "[test]");
    config.set(section, "version", "1.0.0");
    config.set(section, "creator_name", "Fixture");
    config.set(section, "creator_email", "fixture@example.org");
    config.set(section, "creator_institution", "Example Institution");
    config.set(section, "acknowledgement", "None");
    config.set(section, "authors", "[Fixture Author]");
    config.set(section, "references", "[None]");
    config.set(section, "license", "CC0");
    config.set(section, "data_source", "analytic");
    config.set("coordsys", "crs", "EPSG:26910");
    config.set("coordsys", "origin_x", "0.0");
    config.set("coordsys", "origin_y", "0.0");
    config.set("coordsys", "y_azimuth", "0.0");
    config.set("data", "values", "[one, two]");
    config.set("data", "units", "[m, m/s]");
    config.set("data", "layout", "vertex");
    config.set("domain", "dim_x", format!("{dim_x}"));
    config.set("domain", "dim_y", format!("{dim_y}"));
    config.set("domain", "dim_z", format!("{dim_z}"));
    config
}

fn set_block(
    config: &mut Config,
    name: &str,
    xy_res: (f64, f64),
    z_res: f64,
    z_top: f64,
    z_bot: f64,
) {
    config.set(name, "x_resolution", format!("{}", xy_res.0));
    config.set(name, "y_resolution", format!("{}", xy_res.1));
    config.set(name, "z_resolution", format!("{z_res}"));
    config.set(name, "z_top", format!("{z_top}"));
    config.set(name, "z_bot", format!("{z_bot}"));
    config.set(name, "z_top_offset", "0.0");
    config.set(name, "chunk_size", "[4, 4, 2, 2]");
}

fn add_surfaces(config: &mut Config) {
    for surface in ["top_surface", "topography_bathymetry"] {
        config.set(surface, "x_resolution", "8000.0");
        config.set(surface, "y_resolution", "10000.0");
        config.set(surface, "chunk_size", "[4, 4, 1]");
    }
}

fn build(config: &Config, source: &mut dyn DataSource) -> Result<()> {
    Builder::new(config)?.run(BuildSteps::all(), source)
}

/// One flat block, 32 x 40 x 5 km: the `one-block-flat` scenario.
pub fn build_one_block_flat(dir: &Path) -> Result<PathBuf> {
    let model_path = dir.join("one-block-flat.geogrid");
    let mut config = base_config(&model_path, 32000.0, 40000.0, 5000.0);
    config.set("domain", "blocks", "[block]");
    set_block(&mut config, "block", (8000.0, 10000.0), 5000.0, 0.0, -5000.0);
    build(&config, &mut LinearDataSource::flat())?;
    Ok(model_path)
}

/// One block warped by the bilinear top surface: `one-block-topo`.
pub fn build_one_block_topo(dir: &Path) -> Result<PathBuf> {
    let model_path = dir.join("one-block-topo.geogrid");
    let mut config = base_config(&model_path, 32000.0, 40000.0, 5000.0);
    config.set("domain", "blocks", "[block]");
    set_block(&mut config, "block", (8000.0, 10000.0), 1250.0, 0.0, -5000.0);
    add_surfaces(&mut config);
    build(&config, &mut LinearDataSource::with_topography())?;
    Ok(model_path)
}

/// Three stacked blocks under the top surface: `three-blocks-topo`.
pub fn build_three_blocks_topo(dir: &Path) -> Result<PathBuf> {
    let model_path = dir.join("three-blocks-topo.geogrid");
    let mut config = base_config(&model_path, 32000.0, 40000.0, 45000.0);
    config.set("domain", "blocks", "[top, middle, bottom]");
    set_block(&mut config, "top", (8000.0, 10000.0), 2500.0, 0.0, -5000.0);
    set_block(&mut config, "middle", (8000.0, 10000.0), 10000.0, -5000.0, -25000.0);
    set_block(&mut config, "bottom", (16000.0, 20000.0), 10000.0, -25000.0, -45000.0);
    add_surfaces(&mut config);
    build(&config, &mut LinearDataSource::with_topography())?;
    Ok(model_path)
}

/// A flat model with a small footprint whose values are offset by 10000:
/// the first model of the fallback scenario.
pub fn build_small_footprint(dir: &Path) -> Result<PathBuf> {
    let model_path = dir.join("small-footprint.geogrid");
    let mut config = base_config(&model_path, 16000.0, 20000.0, 5000.0);
    config.set("domain", "blocks", "[block]");
    set_block(&mut config, "block", (8000.0, 10000.0), 5000.0, 0.0, -5000.0);
    let mut source = LinearDataSource {
        with_surfaces: false,
        value_offset: 10000.0,
    };
    build(&config, &mut source)?;
    Ok(model_path)
}
