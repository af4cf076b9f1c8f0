//! Storage operations for a model: domain attributes, surfaces, blocks.
//!
//! Thin layer over [`geogrid_store::Store`] that knows the model layout.
//! Dataset creation replaces prior content, so any build step can be
//! rerun safely; metadata-only saves rewrite attributes without touching
//! the grids.

use std::path::Path;

use geogrid_common::{Batch2D, Batch3D, GeogridError, Result};
use geogrid_store::{Store, BLOCKS_GROUP, SURFACES_GROUP};

use crate::block::Block;
use crate::metadata::ModelMetadata;
use crate::surface::Surface;

/// Model-aware handle on a store.
pub struct ModelIo {
    store: Store,
}

impl ModelIo {
    /// Open a model store for writing, creating it if needed.
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self {
            store: Store::create(path)?,
        })
    }

    /// Open an existing model store read-only.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            store: Store::open(path)?,
        })
    }

    /// Underlying store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Write every model attribute to the root group.
    pub fn save_domain(&self, metadata: &ModelMetadata) -> Result<()> {
        metadata.validate()?;
        tracing::info!(title = %metadata.title, "saving domain attributes");
        self.store.save_root_attrs(metadata.to_attrs())
    }

    /// Load the model metadata from the root group.
    pub fn load_metadata(&self) -> Result<ModelMetadata> {
        ModelMetadata::from_attrs(&self.store.load_root_attrs()?)
    }

    /// Create or replace a surface dataset with its geometry attributes.
    pub fn create_surface(&self, surface: &Surface) -> Result<()> {
        surface.validate()?;
        self.store.create_dataset(
            &surface.dataset_path(),
            &surface.shape(),
            surface.chunk_shape(),
            surface.attrs(),
        )
    }

    /// Rewrite a surface's attributes without touching its data.
    pub fn save_surface_metadata(&self, surface: &Surface) -> Result<()> {
        self.store
            .update_dataset_attrs(&surface.dataset_path(), surface.attrs())
    }

    /// Write surface elevations, whole or one batch window.
    pub fn save_surface(
        &self,
        surface: &Surface,
        elevation: &[f32],
        batch: Option<&Batch2D>,
    ) -> Result<()> {
        let (start, shape) = match batch {
            Some(batch) => (
                vec![batch.x_range.start as u64, batch.y_range.start as u64, 0],
                vec![batch.x_range.len() as u64, batch.y_range.len() as u64, 1],
            ),
            None => (vec![0, 0, 0], surface.shape()),
        };
        self.store
            .write_subset(&surface.dataset_path(), &start, &shape, elevation)
    }

    /// Load surface elevations, validating the stored geometry first.
    pub fn load_surface(&self, surface: &Surface, batch: Option<&Batch2D>) -> Result<Vec<f32>> {
        let stored = self.store.dataset_attrs(&surface.dataset_path())?;
        surface.check_attrs(&stored)?;
        let (start, shape) = match batch {
            Some(batch) => (
                vec![batch.x_range.start as u64, batch.y_range.start as u64, 0],
                vec![batch.x_range.len() as u64, batch.y_range.len() as u64, 1],
            ),
            None => (vec![0, 0, 0], surface.shape()),
        };
        self.store
            .read_subset(&surface.dataset_path(), &start, &shape)
    }

    /// Create or replace a block dataset with its geometry attributes.
    pub fn create_block(&self, block: &Block) -> Result<()> {
        block.validate()?;
        self.store.create_dataset(
            &block.dataset_path(),
            &block.shape(),
            block.chunk_shape(),
            block.attrs(),
        )
    }

    /// Rewrite a block's attributes without touching its data.
    pub fn save_block_metadata(&self, block: &Block) -> Result<()> {
        self.store
            .update_dataset_attrs(&block.dataset_path(), block.attrs())
    }

    /// Write block values, whole or one batch window.
    pub fn save_block(&self, block: &Block, values: &[f32], batch: Option<&Batch3D>) -> Result<()> {
        let num_values = block.num_values() as u64;
        let (start, shape) = match batch {
            Some(batch) => (
                vec![
                    batch.x_range.start as u64,
                    batch.y_range.start as u64,
                    batch.z_range.start as u64,
                    0,
                ],
                vec![
                    batch.x_range.len() as u64,
                    batch.y_range.len() as u64,
                    batch.z_range.len() as u64,
                    num_values,
                ],
            ),
            None => (vec![0, 0, 0, 0], block.shape()),
        };
        self.store
            .write_subset(&block.dataset_path(), &start, &shape, values)
    }

    /// Sample a surface on the block grid columns of a batch window.
    ///
    /// Returns elevations ordered to match the block's point generation
    /// (y fastest).
    pub fn sample_surface_for_block(
        &self,
        block: &Block,
        surface: &Surface,
        batch: Option<&Batch3D>,
    ) -> Result<Vec<f64>> {
        let (x_indices, y_indices) = block.surface_indices(surface, batch)?;
        let (x_min, x_max) = (x_indices[0], *x_indices.last().unwrap());
        let (y_min, y_max) = (y_indices[0], *y_indices.last().unwrap());
        let window = self.store.read_subset(
            &surface.dataset_path(),
            &[x_min as u64, y_min as u64, 0],
            &[(x_max - x_min + 1) as u64, (y_max - y_min + 1) as u64, 1],
        )?;
        let window_ny = y_max - y_min + 1;
        let mut elevation = Vec::with_capacity(x_indices.len() * y_indices.len());
        for &si in &x_indices {
            for &sj in &y_indices {
                elevation.push(window[(si - x_min) * window_ny + (sj - y_min)] as f64);
            }
        }
        Ok(elevation)
    }

    /// True when the model declares the named surface dataset.
    pub fn has_surface(&self, name: &str) -> bool {
        self.store.has_dataset(&format!("{SURFACES_GROUP}/{name}"))
    }

    /// Names of the stored blocks.
    pub fn list_blocks(&self) -> Result<Vec<String>> {
        let names = self.store.list_datasets(BLOCKS_GROUP)?;
        if names.is_empty() {
            return Err(GeogridError::io("model has no blocks"));
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tests::sample_config;
    use geogrid_common::Config;

    fn fixture() -> (Config, ModelMetadata) {
        let mut config = sample_config();
        config.set("top_surface", "x_resolution", "8000.0");
        config.set("top_surface", "y_resolution", "10000.0");
        config.set("main", "x_resolution", "8000.0");
        config.set("main", "y_resolution", "10000.0");
        config.set("main", "z_resolution", "5000.0");
        config.set("main", "z_top", "0.0");
        config.set("main", "z_bot", "-5000.0");
        let metadata = ModelMetadata::from_config(&config).unwrap();
        (config, metadata)
    }

    #[test]
    fn test_domain_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let (_, metadata) = fixture();
        let io = ModelIo::create(dir.path()).unwrap();
        io.save_domain(&metadata).unwrap();
        assert_eq!(io.load_metadata().unwrap(), metadata);
    }

    #[test]
    fn test_surface_roundtrip_and_validation() {
        let dir = tempfile::tempdir().unwrap();
        let (config, metadata) = fixture();
        let surface = Surface::from_config("top_surface", &config, &metadata)
            .unwrap()
            .unwrap();
        let io = ModelIo::create(dir.path()).unwrap();
        io.create_surface(&surface).unwrap();

        let elevation: Vec<f32> = (0..25).map(|i| 100.0 + i as f32).collect();
        io.save_surface(&surface, &elevation, None).unwrap();
        assert_eq!(io.load_surface(&surface, None).unwrap(), elevation);

        // A surface object with different geometry is rejected on load.
        let mut other_config = config.clone();
        other_config.set("top_surface", "x_resolution", "4000.0");
        let other = Surface::from_config("top_surface", &other_config, &metadata)
            .unwrap()
            .unwrap();
        assert!(matches!(
            io.load_surface(&other, None),
            Err(GeogridError::InconsistentGeometry(_))
        ));
    }

    #[test]
    fn test_block_batched_writes() {
        let dir = tempfile::tempdir().unwrap();
        let (config, metadata) = fixture();
        let block = Block::from_config("main", &config, &metadata).unwrap();
        let io = ModelIo::create(dir.path()).unwrap();
        io.create_block(&block).unwrap();

        // Fill by two z-slabs and read back the assembled grid.
        let (num_x, num_y, num_z) = block.dims();
        let num_values = block.num_values();
        for z_start in 0..num_z {
            let batch = Batch3D {
                x_range: 0..num_x,
                y_range: 0..num_y,
                z_range: z_start..z_start + 1,
            };
            let values: Vec<f32> = (0..num_x * num_y * num_values)
                .map(|i| (z_start * 1000 + i) as f32)
                .collect();
            io.save_block(&block, &values, Some(&batch)).unwrap();
        }
        let all = io.store().read_all(&block.dataset_path()).unwrap();
        assert_eq!(all.len(), num_x * num_y * num_z * num_values);
        // Vertex (0,0,1,0) carries the second slab's first value.
        assert_eq!(all[num_values], 1000.0);
    }

    #[test]
    fn test_sample_surface_for_block() {
        let dir = tempfile::tempdir().unwrap();
        let (mut config, metadata) = fixture();
        // Surface twice as fine as the block.
        config.set("top_surface", "x_resolution", "4000.0");
        config.set("top_surface", "y_resolution", "5000.0");
        let surface = Surface::from_config("top_surface", &config, &metadata)
            .unwrap()
            .unwrap();
        let block = Block::from_config("main", &config, &metadata).unwrap();

        let io = ModelIo::create(dir.path()).unwrap();
        io.create_surface(&surface).unwrap();
        let (surface_nx, surface_ny, _) = surface.dims();
        let elevation: Vec<f32> = (0..surface_nx * surface_ny).map(|i| i as f32).collect();
        io.save_surface(&surface, &elevation, None).unwrap();

        let sampled = io.sample_surface_for_block(&block, &surface, None).unwrap();
        let (block_nx, block_ny, _) = block.dims();
        assert_eq!(sampled.len(), block_nx * block_ny);
        // Block column (i, j) lands on surface vertex (2i, 2j).
        for i in 0..block_nx {
            for j in 0..block_ny {
                let expected = (2 * i * surface_ny + 2 * j) as f64;
                assert_eq!(sampled[i * block_ny + j], expected);
            }
        }
    }

    #[test]
    fn test_metadata_refresh_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let (config, metadata) = fixture();
        let block = Block::from_config("main", &config, &metadata).unwrap();
        let io = ModelIo::create(dir.path()).unwrap();
        io.create_block(&block).unwrap();
        let values = vec![3.25f32; block.shape().iter().product::<u64>() as usize];
        io.save_block(&block, &values, None).unwrap();

        io.save_block_metadata(&block).unwrap();
        assert_eq!(io.store().read_all(&block.dataset_path()).unwrap(), values);
    }

    #[test]
    fn test_list_blocks_empty() {
        let dir = tempfile::tempdir().unwrap();
        let io = ModelIo::create(dir.path()).unwrap();
        assert!(io.list_blocks().is_err());
    }
}
