//! Storage back end for georeferenced grid models.
//!
//! A model is one hierarchical store: root attributes describe the model,
//! `surfaces/<name>` holds elevation fields, `blocks/<name>` holds the
//! gridded values. Datasets are float32, chunked, and gzip-compressed;
//! reads and writes address arbitrary sub-rectangles so builds can stream
//! batches and queries can fetch single vertices through a bounded chunk
//! cache.

pub mod attrs;
pub mod cache;
pub mod reader;
pub mod store;

pub use cache::{CacheStats, ChunkCache};
pub use reader::GridReader;
pub use store::Store;

/// Group path for surface datasets.
pub const SURFACES_GROUP: &str = "surfaces";

/// Group path for block datasets.
pub const BLOCKS_GROUP: &str = "blocks";
