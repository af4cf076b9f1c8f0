//! Multi-model queries.
//!
//! A driver owns an ordered list of open models. Each point goes to the
//! first model that contains it; optional squashing remaps shallow
//! elevations so the ground surface lines up with z = 0. Per-point
//! failures set a flag and the NODATA sentinel without disturbing other
//! rows.

pub mod driver;

pub use driver::QueryDriver;
pub use geogrid_model::SquashSurface;
