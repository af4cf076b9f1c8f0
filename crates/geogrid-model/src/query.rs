//! Read side of a model: point location and trilinear interpolation.
//!
//! A query transforms the point into the model's local frame, warps its
//! elevation through the top surface, picks the block whose slab contains
//! the warped elevation, and trilinearly interpolates the eight cell
//! corners read through the chunk cache. Out-of-domain points yield the
//! NODATA sentinel and a per-point error flag; they never abort a batch.

use std::path::{Path, PathBuf};

use geogrid_common::{is_nodata, GeogridError, Result, NODATA};
use geogrid_projection::ModelTransform;
use geogrid_store::GridReader;

use crate::axis::RESOLUTION_TOLERANCE;
use crate::block::Block;
use crate::metadata::ModelMetadata;
use crate::storage::ModelIo;
use crate::surface::Surface;
use crate::{TOPOGRAPHY_BATHYMETRY, TOP_SURFACE};

/// Chunk cache budget per open dataset.
const CACHE_BYTES: usize = 16 * 1024 * 1024;

/// Which surface defines elevations for squashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SquashSurface {
    #[default]
    TopSurface,
    TopographyBathymetry,
}

/// A surface opened for queries.
struct QuerySurface {
    surface: Surface,
    reader: GridReader,
}

impl QuerySurface {
    /// Bilinear elevation at a local-frame point; `None` outside the
    /// footprint or when a corner is NODATA.
    fn elevation_at(&self, x: f64, y: f64) -> Option<f64> {
        let (dim_x, dim_y) = self.surface.dims_xy();
        let (i, xi) = self.surface.x_axis().cell_of(x, dim_x)?;
        let (j, eta) = self.surface.y_axis().cell_of(y, dim_y)?;
        let mut corners = [0.0f64; 4];
        for (slot, (di, dj)) in [(0, 0), (0, 1), (1, 0), (1, 1)].iter().enumerate() {
            let value = self
                .reader
                .value_at(&[(i + di) as u64, (j + dj) as u64, 0])
                .ok()?;
            if is_nodata(value) {
                return None;
            }
            corners[slot] = value as f64;
        }
        let lower = corners[0] * (1.0 - eta) + corners[1] * eta;
        let upper = corners[2] * (1.0 - eta) + corners[3] * eta;
        Some(lower * (1.0 - xi) + upper * xi)
    }
}

/// A block opened for queries.
struct QueryBlock {
    block: Block,
    reader: GridReader,
}

/// One model opened read-only for queries.
pub struct Model {
    path: PathBuf,
    metadata: ModelMetadata,
    transform: ModelTransform,
    top_surface: Option<QuerySurface>,
    topo_bathy: Option<QuerySurface>,
    blocks: Vec<QueryBlock>,
    snap_tolerance: f64,
}

impl Model {
    /// Open a model and prepare it to answer queries for points given in
    /// `input_crs`.
    pub fn open(path: &Path, input_crs: &str) -> Result<Self> {
        let io = ModelIo::open(path)?;
        let metadata = io.load_metadata()?;
        let transform = ModelTransform::new(
            input_crs,
            &metadata.crs,
            metadata.origin_x,
            metadata.origin_y,
            metadata.y_azimuth,
        )?;

        let mut surfaces = [None, None];
        for (slot, name) in [TOP_SURFACE, TOPOGRAPHY_BATHYMETRY].iter().enumerate() {
            if io.has_surface(name) {
                let stored = io.store().dataset_attrs(&format!("surfaces/{name}"))?;
                let surface = Surface::from_attrs(name, &metadata, &stored)?;
                let reader = io.store().reader(&surface.dataset_path(), CACHE_BYTES)?;
                surfaces[slot] = Some(QuerySurface { surface, reader });
            }
        }
        let [top_surface, topo_bathy] = surfaces;
        if let (Some(top), Some(bathy)) = (&top_surface, &topo_bathy) {
            top.surface.check_same_grid(&bathy.surface)?;
        }

        let mut blocks = Vec::new();
        for name in io.list_blocks()? {
            let stored = io.store().dataset_attrs(&format!("blocks/{name}"))?;
            let block = Block::from_attrs(&name, &metadata, &stored)?;
            let reader = io.store().reader(&block.dataset_path(), CACHE_BYTES)?;
            blocks.push(QueryBlock { block, reader });
        }
        blocks.sort_by(|a, b| b.block.z_top().partial_cmp(&a.block.z_top()).unwrap());
        Self::check_block_stack(&blocks, metadata.dim_z)?;

        let snap_tolerance = blocks[0]
            .block
            .z_top_offset()
            .abs()
            .max(RESOLUTION_TOLERANCE);

        tracing::info!(
            path = %path.display(),
            title = %metadata.title,
            blocks = blocks.len(),
            has_top_surface = top_surface.is_some(),
            has_topo_bathy = topo_bathy.is_some(),
            "opened model"
        );
        Ok(Self {
            path: path.to_path_buf(),
            metadata,
            transform,
            top_surface,
            topo_bathy,
            blocks,
            snap_tolerance,
        })
    }

    /// Blocks must stack contiguously from 0 down to -dim_z.
    fn check_block_stack(blocks: &[QueryBlock], dim_z: f64) -> Result<()> {
        let mut expected_top = 0.0;
        for entry in blocks {
            if (entry.block.z_top() - expected_top).abs() > RESOLUTION_TOLERANCE {
                return Err(GeogridError::inconsistent_geometry(format!(
                    "block '{}' starts at {} but the stack reaches {expected_top}",
                    entry.block.name(),
                    entry.block.z_top()
                )));
            }
            expected_top = entry.block.z_bot();
        }
        if (expected_top + dim_z).abs() > RESOLUTION_TOLERANCE {
            return Err(GeogridError::inconsistent_geometry(format!(
                "blocks end at {expected_top} but the domain bottom is {}",
                -dim_z
            )));
        }
        Ok(())
    }

    /// Model metadata.
    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    /// Filesystem location of the model.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Transform an input-CRS point into the local frame.
    pub fn to_local(&self, u: f64, v: f64, w: f64) -> (f64, f64, f64) {
        self.transform.to_local(u, v, w)
    }

    fn in_footprint(&self, x: f64, y: f64) -> bool {
        x >= -RESOLUTION_TOLERANCE
            && x <= self.metadata.dim_x + RESOLUTION_TOLERANCE
            && y >= -RESOLUTION_TOLERANCE
            && y <= self.metadata.dim_y + RESOLUTION_TOLERANCE
    }

    /// Elevation of the model top at a local-frame point, if defined.
    fn top_elevation_local(&self, x: f64, y: f64) -> Option<f64> {
        match &self.top_surface {
            Some(surface) => surface.elevation_at(x, y),
            None => Some(0.0),
        }
    }

    /// Elevation of the squashing reference surface at a local point.
    pub fn squash_elevation_local(&self, x: f64, y: f64, reference: SquashSurface) -> Option<f64> {
        let surface = match reference {
            SquashSurface::TopSurface => self.top_surface.as_ref(),
            SquashSurface::TopographyBathymetry => {
                self.topo_bathy.as_ref().or(self.top_surface.as_ref())
            }
        };
        match surface {
            Some(surface) => surface.elevation_at(x, y),
            None => Some(0.0),
        }
    }

    /// True when a local-frame point lies inside the model's support.
    pub fn contains_local(&self, x: f64, y: f64, z: f64) -> bool {
        if !self.in_footprint(x, y) {
            return false;
        }
        let Some(top) = self.top_elevation_local(x, y) else {
            return false;
        };
        z <= top + self.snap_tolerance && z >= -self.metadata.dim_z - RESOLUTION_TOLERANCE
    }

    /// True when an input-CRS point lies inside the model.
    pub fn contains(&self, u: f64, v: f64, w: f64) -> bool {
        let (x, y, z) = self.to_local(u, v, w);
        self.contains_local(x, y, z)
    }

    /// Top-surface elevation at an input-CRS point; NODATA outside.
    pub fn query_top_elevation(&self, u: f64, v: f64) -> f64 {
        let (x, y, _) = self.to_local(u, v, 0.0);
        if !self.in_footprint(x, y) {
            return NODATA as f64;
        }
        self.top_elevation_local(x, y).unwrap_or(NODATA as f64)
    }

    /// Topography/bathymetry elevation at an input-CRS point, falling
    /// back to the top surface; NODATA outside.
    pub fn query_topobathy_elevation(&self, u: f64, v: f64) -> f64 {
        let (x, y, _) = self.to_local(u, v, 0.0);
        if !self.in_footprint(x, y) {
            return NODATA as f64;
        }
        self.squash_elevation_local(x, y, SquashSurface::TopographyBathymetry)
            .unwrap_or(NODATA as f64)
    }

    /// Map a query elevation into the logical grid through the top
    /// surface: `[domain_bot, top(x, y)]` onto `[domain_bot, 0]`.
    fn warp_elevation(&self, x: f64, y: f64, z_in: f64) -> Option<f64> {
        let Some(surface) = &self.top_surface else {
            return Some(z_in);
        };
        let top = surface.elevation_at(x, y)?;
        let domain_bot = -self.metadata.dim_z;
        let span = top - domain_bot;
        if span <= 0.0 {
            return None;
        }
        // Snap points hovering within tolerance above the surface onto it.
        let z_in = if z_in > top && z_in <= top + self.snap_tolerance {
            top
        } else {
            z_in
        };
        Some(domain_bot + (z_in - domain_bot) * (0.0 - domain_bot) / span)
    }

    /// Interpolate the model's values at a local-frame point.
    ///
    /// `columns[c]` selects the stored value column feeding output slot
    /// `c`; `None` slots receive NODATA. Returns the per-point error flag
    /// (0 inside, 1 outside the domain).
    pub fn query_local(&self, x: f64, y: f64, z_in: f64, columns: &[Option<usize>], out: &mut [f32]) -> u8 {
        debug_assert_eq!(columns.len(), out.len());
        out.fill(NODATA);
        if !self.in_footprint(x, y) {
            return 1;
        }
        let Some(mut z) = self.warp_elevation(x, y, z_in) else {
            return 1;
        };
        // No top surface: the same snap applies to the flat top at 0.
        if self.top_surface.is_none() && z > 0.0 && z <= self.snap_tolerance {
            z = 0.0;
        }

        let Some(entry) = self.find_block(z) else {
            return 1;
        };
        let block = &entry.block;
        let z = z.clamp(block.z_bot(), block.z_top());

        let Some((i, xi)) = block.x_axis().cell_of(x, self.metadata.dim_x) else {
            return 1;
        };
        let Some((j, eta)) = block.y_axis().cell_of(y, self.metadata.dim_y) else {
            return 1;
        };
        let Some((k, zeta)) = block.z_axis().cell_of(z) else {
            return 1;
        };

        for (slot, column) in columns.iter().enumerate() {
            let Some(column) = column else {
                continue;
            };
            out[slot] = self.interpolate(entry, i, j, k, xi, eta, zeta, *column);
        }
        0
    }

    /// Pick the block whose slab contains the warped elevation, preferring
    /// the upper block on shared boundaries.
    fn find_block(&self, z: f64) -> Option<&QueryBlock> {
        let top_block = &self.blocks[0];
        let z = if z > top_block.block.z_top()
            && z <= top_block.block.z_top() + self.snap_tolerance
        {
            top_block.block.z_top()
        } else {
            z
        };
        self.blocks.iter().find(|entry| {
            z <= entry.block.z_top() + RESOLUTION_TOLERANCE
                && z >= entry.block.z_bot() - RESOLUTION_TOLERANCE
        })
    }

    /// Trilinear interpolation of one value column; NODATA corners poison
    /// the result.
    #[allow(clippy::too_many_arguments)]
    fn interpolate(
        &self,
        entry: &QueryBlock,
        i: usize,
        j: usize,
        k: usize,
        xi: f64,
        eta: f64,
        zeta: f64,
        column: usize,
    ) -> f32 {
        let mut result = 0.0f64;
        for corner in 0..8 {
            let di = (corner >> 2) & 1;
            let dj = (corner >> 1) & 1;
            let dk = corner & 1;
            let value = match entry.reader.value_at(&[
                (i + di) as u64,
                (j + dj) as u64,
                (k + dk) as u64,
                column as u64,
            ]) {
                Ok(value) => value,
                Err(_) => return NODATA,
            };
            if is_nodata(value) {
                return NODATA;
            }
            let weight = (if di == 1 { xi } else { 1.0 - xi })
                * (if dj == 1 { eta } else { 1.0 - eta })
                * (if dk == 1 { zeta } else { 1.0 - zeta });
            result += weight * value as f64;
        }
        result as f32
    }

    /// Interpolate at an input-CRS point.
    pub fn query(&self, u: f64, v: f64, w: f64, columns: &[Option<usize>], out: &mut [f32]) -> u8 {
        let (x, y, z) = self.to_local(u, v, w);
        self.query_local(x, y, z, columns, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tests::sample_config;

    /// Linear field: exactly reproduced by trilinear interpolation.
    fn field_one(x: f64, y: f64, z: f64) -> f64 {
        2000.0 + 0.3 * x + 0.4 * y - 4.0 * z
    }

    fn field_two(x: f64, y: f64, z: f64) -> f64 {
        -1200.0 + 0.1 * x - 0.2 * y - 4.8 * z
    }

    fn build_flat_model(dir: &Path) -> ModelMetadata {
        let mut config = sample_config();
        config.set("coordsys", "y_azimuth", "0.0");
        config.set("main", "x_resolution", "8000.0");
        config.set("main", "y_resolution", "10000.0");
        config.set("main", "z_resolution", "5000.0");
        config.set("main", "z_top", "0.0");
        config.set("main", "z_bot", "-5000.0");
        let metadata = ModelMetadata::from_config(&config).unwrap();
        let block = Block::from_config("main", &config, &metadata).unwrap();

        let io = ModelIo::create(dir).unwrap();
        io.save_domain(&metadata).unwrap();
        io.create_block(&block).unwrap();

        let frame = geogrid_projection::LocalFrame::new(
            metadata.origin_x,
            metadata.origin_y,
            metadata.y_azimuth,
        );
        let points = block.generate_points(&frame, None, None);
        let mut values = Vec::with_capacity(points.len() * 2);
        for point in &points {
            let x_local = point[0] - metadata.origin_x;
            let y_local = point[1] - metadata.origin_y;
            values.push(field_one(x_local, y_local, point[2]) as f32);
            values.push(field_two(x_local, y_local, point[2]) as f32);
        }
        io.save_block(&block, &values, None).unwrap();
        metadata
    }

    #[test]
    fn test_query_center_matches_linear_field() {
        let dir = tempfile::tempdir().unwrap();
        let metadata = build_flat_model(dir.path());
        let model = Model::open(dir.path(), &metadata.crs).unwrap();

        let u = metadata.origin_x + 16000.0;
        let v = metadata.origin_y + 20000.0;
        let columns = [Some(0), Some(1)];
        let mut out = [0.0f32; 2];
        let err = model.query(u, v, -2500.0, &columns, &mut out);
        assert_eq!(err, 0);
        assert!((out[0] - 24800.0).abs() < 0.05, "one = {}", out[0]);
        assert!((out[1] - 8400.0).abs() < 0.05, "two = {}", out[1]);
    }

    #[test]
    fn test_query_outside_footprint() {
        let dir = tempfile::tempdir().unwrap();
        let metadata = build_flat_model(dir.path());
        let model = Model::open(dir.path(), &metadata.crs).unwrap();

        let columns = [Some(0), Some(1)];
        let mut out = [0.0f32; 2];
        // 1 m west of the footprint.
        let err = model.query(metadata.origin_x - 1.0, metadata.origin_y, -100.0, &columns, &mut out);
        assert_eq!(err, 1);
        assert!(out.iter().all(|&value| is_nodata(value)));

        // Far above the model.
        let err = model.query(
            metadata.origin_x + 100.0,
            metadata.origin_y + 100.0,
            5.0e+6,
            &columns,
            &mut out,
        );
        assert_eq!(err, 1);
        assert!(out.iter().all(|&value| is_nodata(value)));
    }

    #[test]
    fn test_query_on_domain_base() {
        let dir = tempfile::tempdir().unwrap();
        let metadata = build_flat_model(dir.path());
        let model = Model::open(dir.path(), &metadata.crs).unwrap();

        let columns = [Some(0)];
        let mut out = [0.0f32];
        let err = model.query(
            metadata.origin_x + 8000.0,
            metadata.origin_y + 10000.0,
            -5000.0,
            &columns,
            &mut out,
        );
        assert_eq!(err, 0);
        let expected = field_one(8000.0, 10000.0, -5000.0) as f32;
        assert!((out[0] - expected).abs() < 0.05);
    }

    #[test]
    fn test_contains_and_elevations_flat() {
        let dir = tempfile::tempdir().unwrap();
        let metadata = build_flat_model(dir.path());
        let model = Model::open(dir.path(), &metadata.crs).unwrap();

        let u = metadata.origin_x + 1000.0;
        let v = metadata.origin_y + 1000.0;
        assert!(model.contains(u, v, -10.0));
        assert!(!model.contains(u, v, 10.0));
        assert!(!model.contains(u, v, -6000.0));
        // Flat model: top elevation is 0 inside, NODATA outside.
        assert_eq!(model.query_top_elevation(u, v), 0.0);
        assert!(model.query_top_elevation(metadata.origin_x - 100.0, v) < -1.0e19);
        assert_eq!(model.query_topobathy_elevation(u, v), 0.0);
    }

    #[test]
    fn test_unselected_columns_stay_nodata() {
        let dir = tempfile::tempdir().unwrap();
        let metadata = build_flat_model(dir.path());
        let model = Model::open(dir.path(), &metadata.crs).unwrap();

        let columns = [None, Some(1)];
        let mut out = [0.0f32; 2];
        let err = model.query(
            metadata.origin_x + 16000.0,
            metadata.origin_y + 20000.0,
            -2500.0,
            &columns,
            &mut out,
        );
        assert_eq!(err, 0);
        assert!(is_nodata(out[0]));
        assert!((out[1] - 8400.0).abs() < 0.05);
    }
}
