//! Vertex-level reads over a chunked dataset.
//!
//! Queries touch eight corner vertices per interpolation; fetching whole
//! sub-rectangles for that would decompress the same chunks over and
//! over. The reader pulls chunks on demand and keeps the decompressed
//! data in a memory-bounded LRU cache.

use std::cell::RefCell;
use std::sync::Arc;

use zarrs::array::Array;
use zarrs_filesystem::FilesystemStore;

use geogrid_common::{GeogridError, Result};

use crate::cache::{CacheStats, ChunkCache};

/// Chunk-cached reader over one dataset.
pub struct GridReader {
    array: Array<FilesystemStore>,
    shape: Vec<u64>,
    chunk_shape: Vec<u64>,
    cache: RefCell<ChunkCache>,
}

impl GridReader {
    /// Wrap an open array with a cache bounded by `cache_bytes`.
    pub fn new(array: Array<FilesystemStore>, cache_bytes: usize) -> Result<Self> {
        let shape = array.shape().to_vec();
        let origin = vec![0u64; shape.len()];
        let chunk_shape = array
            .chunk_grid()
            .chunk_shape(&origin, &shape)
            .map_err(|err| GeogridError::io(format!("cannot read chunk grid: {err}")))?
            .ok_or_else(|| GeogridError::io("dataset has no chunk shape"))?;
        let chunk_shape: Vec<u64> = chunk_shape.iter().map(|dim| dim.get()).collect();
        Ok(Self {
            array,
            shape,
            chunk_shape,
            cache: RefCell::new(ChunkCache::new(cache_bytes)),
        })
    }

    /// Dataset shape.
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Fetch one chunk, decompressing on a cache miss.
    fn chunk(&self, chunk_indices: &[u64]) -> Result<Arc<Vec<f32>>> {
        let key = chunk_indices.to_vec();
        if let Some(data) = self.cache.borrow_mut().get(&key) {
            return Ok(data);
        }
        let data: Vec<f32> = self
            .array
            .retrieve_chunk_elements(chunk_indices)
            .map_err(|err| {
                GeogridError::io(format!("cannot read chunk {chunk_indices:?}: {err}"))
            })?;
        let data = Arc::new(data);
        self.cache.borrow_mut().insert(key, data.clone());
        Ok(data)
    }

    /// Read the value at one vertex.
    ///
    /// `indices` must have the dataset's rank and lie inside its shape.
    pub fn value_at(&self, indices: &[u64]) -> Result<f32> {
        if indices.len() != self.shape.len() {
            return Err(GeogridError::io(format!(
                "vertex rank {} does not match dataset rank {}",
                indices.len(),
                self.shape.len()
            )));
        }
        for (axis, (&index, &dim)) in indices.iter().zip(self.shape.iter()).enumerate() {
            if index >= dim {
                return Err(GeogridError::io(format!(
                    "vertex index {index} out of bounds on axis {axis} (size {dim})"
                )));
            }
        }

        let chunk_indices: Vec<u64> = indices
            .iter()
            .zip(self.chunk_shape.iter())
            .map(|(&index, &chunk_dim)| index / chunk_dim)
            .collect();
        let data = self.chunk(&chunk_indices)?;

        // Stored chunks are always full-size; edge chunks carry fill
        // values past the array bounds, so intra-chunk strides are uniform.
        let mut offset = 0u64;
        for ((&index, &chunk_dim), _) in indices
            .iter()
            .zip(self.chunk_shape.iter())
            .zip(self.shape.iter())
        {
            offset = offset * chunk_dim + (index % chunk_dim);
        }
        data.get(offset as usize).copied().ok_or_else(|| {
            GeogridError::io(format!("vertex {indices:?} missing from chunk payload"))
        })
    }

    /// Cache statistics for this reader.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.borrow().stats()
    }
}
