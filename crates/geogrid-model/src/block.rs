//! Blocks: logically regular grids over depth slabs of the model.
//!
//! Each block pairs an xy grid with a vertical axis and stores one f32
//! value per declared model value at every vertex. When the model has a
//! top surface, the builder warps each column's z samples so the logical
//! top follows the real surface while the domain bottom stays fixed.

use geogrid_common::{Batch3D, Config, GeogridError, Result};
use geogrid_projection::LocalFrame;
use geogrid_store::attrs::{self, AttrMap};
use geogrid_store::BLOCKS_GROUP;

use crate::axis::{AxisSpec, ZAxis, RESOLUTION_TOLERANCE};
use crate::metadata::ModelMetadata;
use crate::surface::Surface;

/// Default dataset chunking when the configuration does not set one.
const DEFAULT_CHUNK: [u64; 4] = [16, 16, 16, 2];

/// Geometry of one block.
#[derive(Debug, Clone)]
pub struct Block {
    name: String,
    x_axis: AxisSpec,
    y_axis: AxisSpec,
    z_axis: ZAxis,
    z_top_offset: f64,
    dim_x: f64,
    dim_y: f64,
    dim_z: f64,
    num_values: usize,
    chunk_shape: Vec<u64>,
}

impl Block {
    /// Read a block from its config section.
    pub fn from_config(name: &str, config: &Config, metadata: &ModelMetadata) -> Result<Self> {
        if !config.has_section(name) {
            return Err(GeogridError::bad_config(format!(
                "missing section [{name}] for block declared in domain.blocks"
            )));
        }
        let chunk_shape = match config.get_opt(name, "chunk_size") {
            Some(_) => {
                let chunk = config.get_f64_list(name, "chunk_size")?;
                if chunk.len() != 4 {
                    return Err(GeogridError::bad_config(format!(
                        "[{name}] chunk_size must have 4 entries"
                    )));
                }
                chunk.iter().map(|&c| c.max(1.0) as u64).collect()
            }
            None => DEFAULT_CHUNK.to_vec(),
        };
        let z_top_offset = match config.get_opt(name, "z_top_offset") {
            Some(_) => config.get_f64(name, "z_top_offset")?,
            None => 0.0,
        };
        let block = Self {
            name: name.to_string(),
            x_axis: AxisSpec::from_config(config, name, "x")?,
            y_axis: AxisSpec::from_config(config, name, "y")?,
            z_axis: ZAxis::from_config(config, name)?,
            z_top_offset,
            dim_x: metadata.dim_x,
            dim_y: metadata.dim_y,
            dim_z: metadata.dim_z,
            num_values: metadata.num_values(),
            chunk_shape,
        };
        block.validate()?;
        Ok(block)
    }

    /// Rebuild a block from stored dataset attributes (read side).
    pub fn from_attrs(name: &str, metadata: &ModelMetadata, stored: &AttrMap) -> Result<Self> {
        let block = Self {
            name: name.to_string(),
            x_axis: AxisSpec::from_attrs(stored, "x")?,
            y_axis: AxisSpec::from_attrs(stored, "y")?,
            z_axis: ZAxis::from_attrs(stored)?,
            z_top_offset: attrs::get_f64_opt(stored, "z_top_offset").unwrap_or(0.0),
            dim_x: metadata.dim_x,
            dim_y: metadata.dim_y,
            dim_z: metadata.dim_z,
            num_values: metadata.num_values(),
            chunk_shape: DEFAULT_CHUNK.to_vec(),
        };
        block.validate()?;
        Ok(block)
    }

    /// Check the geometry invariants.
    pub fn validate(&self) -> Result<()> {
        let context = format!("block '{}'", self.name);
        self.x_axis.validate(self.dim_x, &context)?;
        self.y_axis.validate(self.dim_y, &context)?;
        self.z_axis.validate(&context)?;
        if self.z_top_offset > 0.0 {
            return Err(GeogridError::inconsistent_geometry(format!(
                "{context}: z_top_offset must be non-positive, got {}",
                self.z_top_offset
            )));
        }
        Ok(())
    }

    /// Block name.
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

    /// Vertical axis.
    pub fn z_axis(&self) -> &ZAxis {
        &self.z_axis
    }

    /// Elevation of the top of the block.
    pub fn z_top(&self) -> f64 {
        self.z_axis.z_top()
    }

    /// Elevation of the bottom of the block.
    pub fn z_bot(&self) -> f64 {
        self.z_axis.z_bot()
    }

    /// Offset nudging the top plane of samples below the block top.
    pub fn z_top_offset(&self) -> f64 {
        self.z_top_offset
    }

    /// Values stored per vertex.
    pub fn num_values(&self) -> usize {
        self.num_values
    }

    /// Grid shape `(num_x, num_y, num_z)`.
    pub fn dims(&self) -> (usize, usize, usize) {
        (
            self.x_axis.num_points(self.dim_x),
            self.y_axis.num_points(self.dim_y),
            self.z_axis.num_points(),
        )
    }

    /// Dataset shape `(num_x, num_y, num_z, num_values)` for storage.
    pub fn shape(&self) -> Vec<u64> {
        let (num_x, num_y, num_z) = self.dims();
        vec![
            num_x as u64,
            num_y as u64,
            num_z as u64,
            self.num_values as u64,
        ]
    }

    /// Chunk shape for storage.
    pub fn chunk_shape(&self) -> &[u64] {
        &self.chunk_shape
    }

    /// Path of the dataset inside the model store.
    pub fn dataset_path(&self) -> String {
        format!("{BLOCKS_GROUP}/{}", self.name)
    }

    /// Geometry attributes written next to the dataset.
    pub fn attrs(&self) -> AttrMap {
        let mut out = AttrMap::new();
        self.x_axis.to_attrs("x", &mut out);
        self.y_axis.to_attrs("y", &mut out);
        self.z_axis.to_attrs(&mut out);
        out.insert("z_top_offset".into(), serde_json::json!(self.z_top_offset));
        out
    }

    /// Validate stored attributes against this block.
    pub fn check_attrs(&self, stored: &AttrMap) -> Result<()> {
        let x_stored = AxisSpec::from_attrs(stored, "x")?;
        let y_stored = AxisSpec::from_attrs(stored, "y")?;
        if !self.x_axis.matches(&x_stored) || !self.y_axis.matches(&y_stored) {
            return Err(GeogridError::inconsistent_geometry(format!(
                "stored discretization of block '{}' does not match the configuration",
                self.name
            )));
        }
        Ok(())
    }

    /// Check that every block grid column lands on a surface grid column.
    ///
    /// Uniform pairs must have an integer resolution ratio; otherwise
    /// every block coordinate must appear among the surface coordinates.
    pub fn check_surface_alignment(&self, surface: &Surface) -> Result<()> {
        let pairs = [
            ("x", &self.x_axis, surface.x_axis(), self.dim_x),
            ("y", &self.y_axis, surface.y_axis(), self.dim_y),
        ];
        for (axis, block_axis, surface_axis, dim) in pairs {
            if let (
                AxisSpec::Uniform {
                    resolution: block_res,
                },
                AxisSpec::Uniform {
                    resolution: surface_res,
                },
            ) = (block_axis, surface_axis)
            {
                let skip = (RESOLUTION_TOLERANCE + block_res / surface_res) as i64;
                if (skip as f64 * surface_res - block_res).abs() > RESOLUTION_TOLERANCE {
                    return Err(GeogridError::inconsistent_geometry(format!(
                        "block '{}' {axis} resolution {block_res} is not an integer multiple \
                         of surface '{}' resolution {surface_res}",
                        self.name,
                        surface.name()
                    )));
                }
                continue;
            }
            for index in 0..block_axis.num_points(dim) {
                let coord = block_axis.coordinate(index);
                if surface_axis.index_of(coord, dim).is_none() {
                    return Err(GeogridError::inconsistent_geometry(format!(
                        "block '{}' {axis} coordinate {coord} is missing from surface '{}'",
                        self.name,
                        surface.name()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Surface grid indices of the block columns inside a batch window.
    ///
    /// Returns `(x_indices, y_indices)` into the surface grid.
    pub fn surface_indices(
        &self,
        surface: &Surface,
        batch: Option<&Batch3D>,
    ) -> Result<(Vec<usize>, Vec<usize>)> {
        self.check_surface_alignment(surface)?;
        let (num_x, num_y, _) = self.dims();
        let (x_range, y_range) = match batch {
            Some(batch) => (batch.x_range.clone(), batch.y_range.clone()),
            None => (0..num_x, 0..num_y),
        };
        let map_axis = |range: std::ops::Range<usize>,
                        block_axis: &AxisSpec,
                        surface_axis: &AxisSpec,
                        dim: f64|
         -> Result<Vec<usize>> {
            range
                .map(|index| {
                    let coord = block_axis.coordinate(index);
                    surface_axis.index_of(coord, dim).ok_or_else(|| {
                        GeogridError::inconsistent_geometry(format!(
                            "block '{}' coordinate {coord} is missing from surface '{}'",
                            self.name,
                            surface.name()
                        ))
                    })
                })
                .collect()
        };
        let x_indices = map_axis(x_range, &self.x_axis, surface.x_axis(), self.dim_x)?;
        let y_indices = map_axis(y_range, &self.y_axis, surface.y_axis(), self.dim_y)?;
        Ok((x_indices, y_indices))
    }

    /// Generate physical-frame points for the block grid.
    ///
    /// `top_elev`, when present, holds the surface elevation per column of
    /// the batch window (y fastest) and warps each column so the logical
    /// `[domain_bot, 0]` span maps onto `[domain_bot, top_elev]`. The
    /// global top plane of samples is nudged down by `z_top_offset` after
    /// warping. Point order is x-major, z fastest, matching dataset
    /// layout.
    pub fn generate_points(
        &self,
        frame: &LocalFrame,
        top_elev: Option<&[f64]>,
        batch: Option<&Batch3D>,
    ) -> Vec<[f64; 3]> {
        let (num_x, num_y, num_z) = self.dims();
        let (x_range, y_range, z_range) = match batch {
            Some(batch) => (
                batch.x_range.clone(),
                batch.y_range.clone(),
                batch.z_range.clone(),
            ),
            None => (0..num_x, 0..num_y, 0..num_z),
        };
        tracing::debug!(
            block = %self.name,
            points = x_range.len() * y_range.len() * z_range.len(),
            "generating block points"
        );

        let domain_top = 0.0;
        let domain_bot = -self.dim_z;
        let num_y_window = y_range.len();

        let mut points = Vec::with_capacity(x_range.len() * y_range.len() * z_range.len());
        for (iw, i) in x_range.enumerate() {
            let x_local = self.x_axis.coordinate(i);
            for (jw, j) in y_range.clone().enumerate() {
                let y_local = self.y_axis.coordinate(j);
                let (x, y) = frame.to_physical(x_local, y_local);
                let column_top = top_elev.map(|elev| elev[iw * num_y_window + jw]);
                for k in z_range.clone() {
                    let z_logical = self.z_axis.coordinate(k);
                    let mut z = match column_top {
                        Some(top) => {
                            domain_bot
                                + (top - domain_bot) * (z_logical - domain_bot)
                                    / (domain_top - domain_bot)
                        }
                        None => z_logical,
                    };
                    if k == 0 {
                        z += self.z_top_offset;
                    }
                    points.push([x, y, z]);
                }
            }
        }
        points
    }
}
