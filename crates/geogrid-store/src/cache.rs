//! LRU cache for decompressed dataset chunks.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

/// Cache key: chunk indices within one dataset.
pub type ChunkKey = Vec<u64>;

/// Statistics about a chunk cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub memory_bytes: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Cache hit rate in [0, 1].
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Memory-bounded LRU cache for decompressed chunks of one dataset.
pub struct ChunkCache {
    cache: LruCache<ChunkKey, Arc<Vec<f32>>>,
    memory_limit: usize,
    current_memory: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl ChunkCache {
    /// Create a cache bounded by `memory_limit` bytes.
    pub fn new(memory_limit: usize) -> Self {
        // Entry bound assumes chunks near the nominal upper size (1 MiB);
        // the byte bound below is the real limit.
        let chunk_size_estimate = 256 * 1024;
        let max_entries = (memory_limit / chunk_size_estimate).max(8);
        Self {
            cache: LruCache::new(NonZeroUsize::new(max_entries).unwrap()),
            memory_limit,
            current_memory: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Fetch a chunk, updating LRU order and hit statistics.
    pub fn get(&mut self, key: &ChunkKey) -> Option<Arc<Vec<f32>>> {
        if let Some(data) = self.cache.get(key) {
            self.hits += 1;
            Some(data.clone())
        } else {
            self.misses += 1;
            None
        }
    }

    /// Insert a chunk, evicting least-recently-used entries as needed.
    pub fn insert(&mut self, key: ChunkKey, data: Arc<Vec<f32>>) {
        let data_size = data.len() * std::mem::size_of::<f32>();
        while self.current_memory + data_size > self.memory_limit && !self.cache.is_empty() {
            if let Some((_, evicted)) = self.cache.pop_lru() {
                let evicted_size = evicted.len() * std::mem::size_of::<f32>();
                self.current_memory = self.current_memory.saturating_sub(evicted_size);
                self.evictions += 1;
            }
        }
        if data_size <= self.memory_limit {
            self.cache.put(key, data);
            self.current_memory += data_size;
        }
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.cache.clear();
        self.current_memory = 0;
    }

    /// Current statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.cache.len(),
            memory_bytes: self.current_memory as u64,
            evictions: self.evictions,
        }
    }
}
