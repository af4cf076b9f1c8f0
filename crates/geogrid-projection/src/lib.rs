//! Coordinate reference system transformations.
//!
//! Converts query points between a caller's CRS and a model's local
//! rotated frame: project between CRS, translate to the model origin,
//! rotate by the y-axis azimuth.

pub mod crs;
pub mod frame;
pub mod transform;

pub use crs::CrsTransform;
pub use frame::LocalFrame;
pub use transform::ModelTransform;
