//! Error type shared across the geogrid crates.

use thiserror::Error;

/// Errors produced while building or querying a model.
#[derive(Error, Debug)]
pub enum GeogridError {
    /// Unreadable or inconsistent configuration.
    #[error("bad configuration: {0}")]
    BadConfig(String),

    /// Block/surface axis mismatch, non-divisible resolutions, or missing
    /// coordinates.
    #[error("inconsistent geometry: {0}")]
    InconsistentGeometry(String),

    /// File open/read/write failure, including the storage back end.
    #[error("i/o error: {0}")]
    Io(String),

    /// Use of a driver or model after finalize.
    #[error("invalid handle: {0}")]
    InvalidHandle(String),

    /// Unparseable CRS or coordinate transform failure.
    #[error("CRS error: {0}")]
    Crs(String),

    /// Point outside the model domain. Per-point; never fatal.
    #[error("point outside domain: {0}")]
    OutOfDomain(String),

    /// Anything raised by a data source.
    #[error("data source error: {0}")]
    DataSource(String),
}

impl GeogridError {
    /// Create a BadConfig error.
    pub fn bad_config(msg: impl Into<String>) -> Self {
        Self::BadConfig(msg.into())
    }

    /// Create an InconsistentGeometry error.
    pub fn inconsistent_geometry(msg: impl Into<String>) -> Self {
        Self::InconsistentGeometry(msg.into())
    }

    /// Create an Io error.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Create an InvalidHandle error.
    pub fn invalid_handle(msg: impl Into<String>) -> Self {
        Self::InvalidHandle(msg.into())
    }

    /// Create a Crs error.
    pub fn crs(msg: impl Into<String>) -> Self {
        Self::Crs(msg.into())
    }

    /// Create a DataSource error.
    pub fn data_source(msg: impl Into<String>) -> Self {
        Self::DataSource(msg.into())
    }
}

impl From<std::io::Error> for GeogridError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for GeogridError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadConfig(err.to_string())
    }
}

/// Result type for geogrid operations.
pub type Result<T> = std::result::Result<T, GeogridError>;
