//! Build orchestrator.
//!
//! Walks the requested steps in order: domain attributes, surfaces,
//! blocks, metadata refresh. Grids are filled one batch window at a time
//! so arbitrarily large models build in bounded memory. Any data-source
//! failure aborts the run; rerunning a step is safe because dataset
//! creation replaces prior content.

use std::path::PathBuf;

use geogrid_common::{BatchGenerator2D, BatchGenerator3D, Config, GeogridError, Result};
use geogrid_model::{Block, ModelIo, ModelMetadata, Surface, TOPOGRAPHY_BATHYMETRY, TOP_SURFACE};
use geogrid_projection::LocalFrame;

use crate::datasrc::DataSource;

/// Which build steps to run.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildSteps {
    pub domain: bool,
    pub surfaces: bool,
    pub blocks: bool,
    pub update_metadata: bool,
}

impl BuildSteps {
    /// Every step.
    pub fn all() -> Self {
        Self {
            domain: true,
            surfaces: true,
            blocks: true,
            update_metadata: false,
        }
    }
}

/// Drives a data source through batches to populate a model store.
pub struct Builder {
    metadata: ModelMetadata,
    top_surface: Option<Surface>,
    topo_bathy: Option<Surface>,
    blocks: Vec<Block>,
    batch_size: Option<usize>,
    filename: PathBuf,
    frame: LocalFrame,
}

impl Builder {
    /// Parse the model definition out of a configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let metadata = ModelMetadata::from_config(config)?;
        let filename = PathBuf::from(config.get_str("geomodelgrids", "filename")?);

        let top_surface = Surface::from_config(TOP_SURFACE, config, &metadata)?;
        let topo_bathy = Surface::from_config(TOPOGRAPHY_BATHYMETRY, config, &metadata)?;
        if let (Some(top), Some(bathy)) = (&top_surface, &topo_bathy) {
            top.check_same_grid(bathy)?;
        }

        let mut blocks = Vec::new();
        for name in config.get_list("domain", "blocks")? {
            blocks.push(Block::from_config(&name, config, &metadata)?);
        }
        if blocks.is_empty() {
            return Err(GeogridError::bad_config("domain.blocks declares no blocks"));
        }
        Self::check_block_stack(&blocks, metadata.dim_z)?;
        if let Some(surface) = &top_surface {
            for block in &blocks {
                block.check_surface_alignment(surface)?;
            }
        }

        let batch_size = match config.get_opt("domain", "batch_size") {
            Some(_) => Some(config.get_usize("domain", "batch_size")?),
            None => None,
        };

        let frame = LocalFrame::new(metadata.origin_x, metadata.origin_y, metadata.y_azimuth);
        Ok(Self {
            metadata,
            top_surface,
            topo_bathy,
            blocks,
            batch_size,
            filename,
            frame,
        })
    }

    /// Blocks must be declared top-down, contiguous, and span dim_z.
    fn check_block_stack(blocks: &[Block], dim_z: f64) -> Result<()> {
        let mut expected_top = 0.0;
        for block in blocks {
            if (block.z_top() - expected_top).abs() > geogrid_model::RESOLUTION_TOLERANCE {
                return Err(GeogridError::inconsistent_geometry(format!(
                    "block '{}' starts at {} but the stack reaches {expected_top}",
                    block.name(),
                    block.z_top()
                )));
            }
            expected_top = block.z_bot();
        }
        if (expected_top + dim_z).abs() > geogrid_model::RESOLUTION_TOLERANCE {
            return Err(GeogridError::inconsistent_geometry(format!(
                "blocks end at {expected_top} but the domain bottom is {}",
                -dim_z
            )));
        }
        Ok(())
    }

    /// Where the model is written.
    pub fn filename(&self) -> &PathBuf {
        &self.filename
    }

    /// The parsed metadata.
    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    /// Run the requested steps against a data source.
    pub fn run(&mut self, steps: BuildSteps, source: &mut dyn DataSource) -> Result<()> {
        source.initialize()?;
        if let Some(extra) = source.auxiliary() {
            self.merge_auxiliary(extra);
        }

        let io = ModelIo::create(&self.filename)?;

        if steps.domain {
            self.metadata.stamp_history("created model");
            io.save_domain(&self.metadata)?;
        }
        if steps.surfaces {
            self.build_surfaces(&io, source)?;
        }
        if steps.blocks {
            self.build_blocks(&io, source)?;
        }
        if steps.update_metadata {
            self.refresh_metadata(&io)?;
        }
        tracing::info!(model = %self.filename.display(), "build finished");
        Ok(())
    }

    /// Fold producer metadata into the auxiliary attribute.
    fn merge_auxiliary(&mut self, extra: serde_json::Value) {
        match (&mut self.metadata.auxiliary, extra) {
            (Some(serde_json::Value::Object(existing)), serde_json::Value::Object(incoming)) => {
                for (key, value) in incoming {
                    existing.insert(key, value);
                }
            }
            (slot @ None, incoming) => *slot = Some(incoming),
            (Some(_), incoming) => self.metadata.auxiliary = Some(incoming),
        }
    }

    fn build_surfaces(&self, io: &ModelIo, source: &mut dyn DataSource) -> Result<()> {
        let surfaces: [(&Option<Surface>, bool); 2] =
            [(&self.top_surface, true), (&self.topo_bathy, false)];
        for (surface, is_top) in surfaces {
            let Some(surface) = surface else {
                continue;
            };
            let (num_x, num_y, _) = surface.dims();
            let mut created = false;
            for batch in BatchGenerator2D::new(num_x, num_y, self.batch_size) {
                let points = surface.generate_points(&self.frame, Some(&batch));
                let elevation = if is_top {
                    source.top_surface(&points)?
                } else {
                    source.topography_bathymetry(&points)?
                };
                let Some(elevation) = elevation else {
                    tracing::warn!(
                        surface = %surface.name(),
                        "data source does not define this surface; skipping"
                    );
                    break;
                };
                if elevation.len() != points.len() {
                    return Err(GeogridError::data_source(format!(
                        "surface '{}' batch holds {} points but the source returned {} values",
                        surface.name(),
                        points.len(),
                        elevation.len()
                    )));
                }
                if !created {
                    io.create_surface(surface)?;
                    created = true;
                }
                io.save_surface(surface, &elevation, Some(&batch))?;
            }
            if created {
                tracing::info!(surface = %surface.name(), "surface written");
            }
        }
        Ok(())
    }

    fn build_blocks(&self, io: &ModelIo, source: &mut dyn DataSource) -> Result<()> {
        // The top surface warps the grids; the depth surface feeds
        // depth-keyed data sources.
        let warp_surface = self
            .top_surface
            .as_ref()
            .filter(|s| io.has_surface(s.name()));
        let depth_surface = self
            .topo_bathy
            .as_ref()
            .filter(|s| io.has_surface(s.name()))
            .or(warp_surface);

        for block in &self.blocks {
            io.create_block(block)?;
            let (num_x, num_y, num_z) = block.dims();
            for batch in BatchGenerator3D::new(num_x, num_y, num_z, self.batch_size) {
                let top_elevation = match warp_surface {
                    Some(surface) => {
                        Some(io.sample_surface_for_block(block, surface, Some(&batch))?)
                    }
                    None => None,
                };
                let depth_elevation = match depth_surface {
                    Some(surface) => {
                        let same = warp_surface
                            .map(|warp| warp.name() == surface.name())
                            .unwrap_or(false);
                        if same {
                            top_elevation.clone()
                        } else {
                            Some(io.sample_surface_for_block(block, surface, Some(&batch))?)
                        }
                    }
                    None => None,
                };
                let points =
                    block.generate_points(&self.frame, top_elevation.as_deref(), Some(&batch));
                let values = source.values(block, &points, depth_elevation.as_deref())?;
                if values.len() != points.len() * block.num_values() {
                    return Err(GeogridError::data_source(format!(
                        "block '{}' batch holds {} points but the source returned {} values",
                        block.name(),
                        points.len(),
                        values.len()
                    )));
                }
                io.save_block(block, &values, Some(&batch))?;
            }
            tracing::info!(block = %block.name(), "block written");
        }
        Ok(())
    }

    /// Rewrite root and per-dataset attributes without touching grids.
    fn refresh_metadata(&mut self, io: &ModelIo) -> Result<()> {
        self.metadata.stamp_history("updated metadata");
        io.save_domain(&self.metadata)?;
        for surface in [&self.top_surface, &self.topo_bathy].into_iter().flatten() {
            if io.has_surface(surface.name()) {
                io.save_surface_metadata(surface)?;
            }
        }
        for block in &self.blocks {
            if io.store().has_dataset(&block.dataset_path()) {
                io.save_block_metadata(block)?;
            }
        }
        tracing::info!("metadata refreshed");
        Ok(())
    }
}
