//! Model construction.
//!
//! The builder drives a [`DataSource`] through batches of grid points and
//! streams the returned elevations and values into the model store. Data
//! sources are registered by name and selected through the configuration.

pub mod analytic;
pub mod builder;
pub mod datasrc;

pub use analytic::AnalyticDataSource;
pub use builder::{BuildSteps, Builder};
pub use datasrc::{resolve_data_source, DataSource};
