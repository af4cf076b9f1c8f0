//! Shared building blocks for the geogrid workspace.
//!
//! Holds the pieces every other crate leans on: the common error type,
//! the flat INI-style configuration map, unit conversions, batch
//! generators for iterating large grids in bounded windows, the NODATA
//! sentinel, and the error reporter shared by the query driver and its
//! models.

pub mod batch;
pub mod config;
pub mod error;
pub mod reporter;
pub mod units;

pub use batch::{Batch2D, Batch3D, BatchGenerator2D, BatchGenerator3D};
pub use config::{string_to_list, Config};
pub use error::{GeogridError, Result};
pub use reporter::{ErrorReporter, SharedReporter, Status};

/// Sentinel returned for out-of-domain queries (f32 value channels).
pub const NODATA: f32 = -1.0e20;

/// Sentinel for coordinates that failed to transform (f64 point data).
pub const NODATA_F64: f64 = -1.0e20;

/// True when a stored value is the NODATA sentinel.
///
/// Values that went through a float round trip may not compare equal, so
/// anything at or below half the sentinel counts.
pub fn is_nodata(value: f32) -> bool {
    value <= 0.5 * NODATA
}

/// True when a coordinate is the NODATA sentinel.
pub fn is_nodata_f64(value: f64) -> bool {
    value <= 0.5 * NODATA_F64
}
