//! Typed access to JSON attribute maps.
//!
//! Dataset and root attributes are stored as JSON objects. These helpers
//! read them back with type checks, naming the offending attribute in the
//! error message.

use serde_json::{Map, Value};

use geogrid_common::{GeogridError, Result};

/// Attribute map type used throughout the store.
pub type AttrMap = Map<String, Value>;

/// Read a required string attribute.
pub fn get_str(attrs: &AttrMap, name: &str) -> Result<String> {
    attrs
        .get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| missing(name, "string"))
}

/// Read an optional string attribute.
pub fn get_str_opt(attrs: &AttrMap, name: &str) -> Option<String> {
    attrs.get(name).and_then(Value::as_str).map(str::to_string)
}

/// Read a required 64-bit float attribute.
pub fn get_f64(attrs: &AttrMap, name: &str) -> Result<f64> {
    attrs
        .get(name)
        .and_then(Value::as_f64)
        .ok_or_else(|| missing(name, "number"))
}

/// Read an optional 64-bit float attribute.
pub fn get_f64_opt(attrs: &AttrMap, name: &str) -> Option<f64> {
    attrs.get(name).and_then(Value::as_f64)
}

/// Read a required list of strings.
pub fn get_str_list(attrs: &AttrMap, name: &str) -> Result<Vec<String>> {
    let values = attrs
        .get(name)
        .and_then(Value::as_array)
        .ok_or_else(|| missing(name, "list of strings"))?;
    values
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| missing(name, "list of strings"))
        })
        .collect()
}

/// Read an optional list of floats.
pub fn get_f64_list_opt(attrs: &AttrMap, name: &str) -> Option<Vec<f64>> {
    let values = attrs.get(name).and_then(Value::as_array)?;
    values.iter().map(Value::as_f64).collect()
}

fn missing(name: &str, expected: &str) -> GeogridError {
    GeogridError::inconsistent_geometry(format!(
        "missing or mistyped attribute '{name}' (expected {expected})"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> AttrMap {
        let value = json!({
            "title": "Test model",
            "dim_x": 32000.0,
            "keywords": ["seismic", "velocity"],
            "x_coordinates": [0.0, 10.0, 30.0],
        });
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_typed_reads() {
        let attrs = sample();
        assert_eq!(get_str(&attrs, "title").unwrap(), "Test model");
        assert_eq!(get_f64(&attrs, "dim_x").unwrap(), 32000.0);
        assert_eq!(
            get_str_list(&attrs, "keywords").unwrap(),
            vec!["seismic", "velocity"]
        );
        assert_eq!(
            get_f64_list_opt(&attrs, "x_coordinates").unwrap(),
            vec![0.0, 10.0, 30.0]
        );
    }

    #[test]
    fn test_missing_attribute() {
        let attrs = sample();
        assert!(matches!(
            get_str(&attrs, "absent"),
            Err(GeogridError::InconsistentGeometry(_))
        ));
        assert!(get_str_opt(&attrs, "absent").is_none());
        assert!(get_f64_list_opt(&attrs, "absent").is_none());
    }

    #[test]
    fn test_mistyped_attribute() {
        let attrs = sample();
        assert!(get_f64(&attrs, "title").is_err());
        assert!(get_str_list(&attrs, "dim_x").is_err());
    }
}
