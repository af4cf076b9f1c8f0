//! Zarr-backed model store.
//!
//! One model occupies one store rooted at a directory: root group
//! attributes carry the model metadata, arrays under `surfaces/` and
//! `blocks/` carry the grids. Creating a dataset erases any prior dataset
//! of the same name, so a rerun of a build step replaces content cleanly.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use zarrs::array::codec::bytes_to_bytes::gzip::GzipCodec;
use zarrs::array::{Array, ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs::group::{Group, GroupBuilder};
use zarrs_filesystem::FilesystemStore;
use zarrs_storage::{ListableStorageTraits, StorePrefix, WritableStorageTraits};

use geogrid_common::{GeogridError, Result, NODATA};

use crate::attrs::AttrMap;
use crate::reader::GridReader;

/// Gzip level used for all datasets.
const GZIP_LEVEL: u32 = 4;

/// Handle to one model store.
pub struct Store {
    storage: Arc<FilesystemStore>,
    path: PathBuf,
}

impl Store {
    /// Open a store for writing, creating the directory if needed.
    pub fn create(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path).map_err(|err| {
            GeogridError::io(format!("cannot create model '{}': {}", path.display(), err))
        })?;
        let storage = FilesystemStore::new(path)
            .map_err(|err| GeogridError::io(format!("cannot open model store: {err}")))?;
        tracing::info!(path = %path.display(), "opened model store for writing");
        Ok(Self {
            storage: Arc::new(storage),
            path: path.to_path_buf(),
        })
    }

    /// Open an existing store read-only.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            return Err(GeogridError::io(format!(
                "model '{}' does not exist",
                path.display()
            )));
        }
        let storage = FilesystemStore::new(path)
            .map_err(|err| GeogridError::io(format!("cannot open model store: {err}")))?;
        Ok(Self {
            storage: Arc::new(storage),
            path: path.to_path_buf(),
        })
    }

    /// Filesystem location of this store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the root group attributes, replacing any previous set.
    pub fn save_root_attrs(&self, attrs: AttrMap) -> Result<()> {
        let group = GroupBuilder::new()
            .attributes(attrs)
            .build(self.storage.clone(), "/")
            .map_err(|err| GeogridError::io(format!("cannot create root group: {err}")))?;
        group
            .store_metadata()
            .map_err(|err| GeogridError::io(format!("cannot write root attributes: {err}")))?;
        Ok(())
    }

    /// Read the root group attributes.
    pub fn load_root_attrs(&self) -> Result<AttrMap> {
        let group = Group::open(self.storage.clone(), "/").map_err(|err| {
            GeogridError::io(format!(
                "cannot open model '{}': {}",
                self.path.display(),
                err
            ))
        })?;
        Ok(group.attributes().clone())
    }

    /// Make sure a child group (e.g. `surfaces`, `blocks`) has metadata.
    fn ensure_group(&self, name: &str) -> Result<()> {
        let path = format!("/{name}");
        if Group::open(self.storage.clone(), &path).is_ok() {
            return Ok(());
        }
        let group = GroupBuilder::new()
            .build(self.storage.clone(), &path)
            .map_err(|err| GeogridError::io(format!("cannot create group '{name}': {err}")))?;
        group
            .store_metadata()
            .map_err(|err| GeogridError::io(format!("cannot write group '{name}': {err}")))?;
        Ok(())
    }

    /// Create or replace a float32 dataset.
    ///
    /// Erases anything stored under the dataset path first so stale chunks
    /// from a previous, differently-shaped grid cannot survive.
    pub fn create_dataset(
        &self,
        dataset: &str,
        shape: &[u64],
        chunk_shape: &[u64],
        attrs: AttrMap,
    ) -> Result<()> {
        if shape.len() != chunk_shape.len() {
            return Err(GeogridError::bad_config(format!(
                "chunk rank {} does not match dataset rank {} for '{dataset}'",
                chunk_shape.len(),
                shape.len()
            )));
        }
        if let Some((parent, _)) = dataset.rsplit_once('/') {
            self.ensure_group(parent)?;
        }

        let prefix_path = format!("{dataset}/");
        let prefix = StorePrefix::new(prefix_path.as_str())
            .map_err(|err| GeogridError::io(format!("bad dataset path '{dataset}': {err}")))?;
        self.storage
            .erase_prefix(&prefix)
            .map_err(|err| GeogridError::io(format!("cannot erase '{dataset}': {err}")))?;

        let chunk_grid: zarrs::array::ChunkGrid = chunk_shape
            .iter()
            .zip(shape.iter())
            .map(|(&chunk, &dim)| chunk.clamp(1, dim.max(1)))
            .collect::<Vec<u64>>()
            .try_into()
            .map_err(|err| {
                GeogridError::bad_config(format!("bad chunk shape for '{dataset}': {err:?}"))
            })?;

        let codec = Arc::new(
            GzipCodec::new(GZIP_LEVEL)
                .map_err(|_| GeogridError::bad_config("invalid gzip compression level"))?,
        );

        let mut binding = ArrayBuilder::new(
            shape.to_vec(),
            DataType::Float32,
            chunk_grid,
            FillValue::from(NODATA),
        );
        let array = binding
            .attributes(attrs)
            .bytes_to_bytes_codecs(vec![codec])
            .build(self.storage.clone(), &format!("/{dataset}"))
            .map_err(|err| GeogridError::io(format!("cannot create '{dataset}': {err}")))?;
        array
            .store_metadata()
            .map_err(|err| GeogridError::io(format!("cannot write '{dataset}' metadata: {err}")))?;

        tracing::info!(
            dataset = %dataset,
            shape = ?shape,
            chunks = ?chunk_shape,
            "created dataset"
        );
        Ok(())
    }

    fn open_array(&self, dataset: &str) -> Result<Array<FilesystemStore>> {
        Array::open(self.storage.clone(), &format!("/{dataset}")).map_err(|err| {
            GeogridError::io(format!(
                "cannot open dataset '{dataset}' in '{}': {}",
                self.path.display(),
                err
            ))
        })
    }

    /// True when the dataset exists in the store.
    pub fn has_dataset(&self, dataset: &str) -> bool {
        Array::open(self.storage.clone(), &format!("/{dataset}")).is_ok()
    }

    /// Shape of an existing dataset.
    pub fn dataset_shape(&self, dataset: &str) -> Result<Vec<u64>> {
        Ok(self.open_array(dataset)?.shape().to_vec())
    }

    /// Attributes of an existing dataset.
    pub fn dataset_attrs(&self, dataset: &str) -> Result<AttrMap> {
        Ok(self.open_array(dataset)?.attributes().clone())
    }

    /// Rewrite the attributes of an existing dataset, leaving data alone.
    pub fn update_dataset_attrs(&self, dataset: &str, attrs: AttrMap) -> Result<()> {
        let mut array = self.open_array(dataset)?;
        *array.attributes_mut() = attrs;
        array
            .store_metadata()
            .map_err(|err| GeogridError::io(format!("cannot update '{dataset}' metadata: {err}")))?;
        Ok(())
    }

    /// Write a sub-rectangle of a dataset.
    pub fn write_subset(
        &self,
        dataset: &str,
        start: &[u64],
        shape: &[u64],
        data: &[f32],
    ) -> Result<()> {
        let expected: u64 = shape.iter().product();
        if expected != data.len() as u64 {
            return Err(GeogridError::io(format!(
                "subset of '{dataset}' holds {expected} values but {} were supplied",
                data.len()
            )));
        }
        let array = self.open_array(dataset)?;
        let subset = ArraySubset::new_with_start_shape(start.to_vec(), shape.to_vec())
            .map_err(|err| GeogridError::io(format!("bad subset for '{dataset}': {err}")))?;
        array
            .store_array_subset_elements(&subset, data)
            .map_err(|err| GeogridError::io(format!("cannot write '{dataset}': {err}")))?;
        Ok(())
    }

    /// Read a sub-rectangle of a dataset.
    pub fn read_subset(&self, dataset: &str, start: &[u64], shape: &[u64]) -> Result<Vec<f32>> {
        let array = self.open_array(dataset)?;
        let subset = ArraySubset::new_with_start_shape(start.to_vec(), shape.to_vec())
            .map_err(|err| GeogridError::io(format!("bad subset for '{dataset}': {err}")))?;
        array
            .retrieve_array_subset_elements::<f32>(&subset)
            .map_err(|err| GeogridError::io(format!("cannot read '{dataset}': {err}")))
    }

    /// Read an entire dataset.
    pub fn read_all(&self, dataset: &str) -> Result<Vec<f32>> {
        let shape = self.dataset_shape(dataset)?;
        let start = vec![0u64; shape.len()];
        self.read_subset(dataset, &start, &shape)
    }

    /// Open a vertex reader over a dataset with a bounded chunk cache.
    pub fn reader(&self, dataset: &str, cache_bytes: usize) -> Result<GridReader> {
        GridReader::new(self.open_array(dataset)?, cache_bytes)
    }

    /// Names of the datasets directly under a group (e.g. `blocks`).
    pub fn list_datasets(&self, group: &str) -> Result<Vec<String>> {
        let prefix_path = format!("{group}/");
        let prefix = StorePrefix::new(prefix_path.as_str())
            .map_err(|err| GeogridError::io(format!("bad group path '{group}': {err}")))?;
        let listing = self
            .storage
            .list_dir(&prefix)
            .map_err(|err| GeogridError::io(format!("cannot list group '{group}': {err}")))?;
        let mut names: Vec<String> = listing
            .prefixes()
            .iter()
            .filter_map(|child| {
                child
                    .as_str()
                    .strip_prefix(prefix_path.as_str())
                    .map(|rest| rest.trim_end_matches('/').to_string())
            })
            .filter(|name| !name.is_empty())
            .collect();
        names.sort();
        Ok(names)
    }
}
