//! Georeferenced block-structured grid models.
//!
//! A model is a rotated rectangular volume discretized into one or more
//! logically regular blocks, optionally warped vertically by a top
//! surface. This crate holds the typed metadata, the grid geometry
//! (axes, surfaces, blocks), the storage operations that lay a model out
//! on disk, and the read side: locating query points and trilinearly
//! interpolating stored values.

pub mod axis;
pub mod block;
pub mod metadata;
pub mod query;
pub mod storage;
pub mod surface;

pub use axis::{AxisSpec, ZAxis, RESOLUTION_TOLERANCE};
pub use block::Block;
pub use metadata::ModelMetadata;
pub use query::{Model, SquashSurface};
pub use storage::ModelIo;
pub use surface::Surface;

/// Dataset name of the model-top surface.
pub const TOP_SURFACE: &str = "top_surface";

/// Dataset name of the topography/bathymetry surface.
pub const TOPOGRAPHY_BATHYMETRY: &str = "topography_bathymetry";
