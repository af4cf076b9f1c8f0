//! Conversion factors from length units to meters.

use crate::error::{GeogridError, Result};

/// Get the length of a unit in meters.
///
/// Recognizes meters, kilometers, and feet under their common spellings.
pub fn length_scale(name: &str) -> Result<f64> {
    match name {
        "m" | "meter" | "meters" => Ok(1.0),
        "km" | "kilometer" | "kilometers" => Ok(1000.0),
        "ft" | "foot" | "feet" => Ok(0.3048),
        other => Err(GeogridError::bad_config(format!(
            "unknown length units '{other}'"
        ))),
    }
}
