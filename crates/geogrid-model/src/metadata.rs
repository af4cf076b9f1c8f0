//! Typed model metadata.
//!
//! A flat immutable record built once from the configuration at build
//! time and once from the root attributes at load time. Authors and
//! references are `|`-delimited lists in configuration; all other list
//! fields use commas.

use serde_json::{json, Value};

use geogrid_common::config::string_to_list;
use geogrid_common::{Config, GeogridError, Result};
use geogrid_store::attrs::{self, AttrMap};

/// Configuration section holding the descriptive metadata.
pub const METADATA_SECTION: &str = "geomodelgrids";

/// The only supported data layout.
pub const LAYOUT_VERTEX: &str = "vertex";

/// Descriptive, data, and coordinate metadata of one model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelMetadata {
    // Description
    pub title: String,
    pub id: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub history: String,
    pub comment: String,
    pub version: String,

    // Attribution
    pub creator_name: String,
    pub creator_institution: String,
    pub creator_email: String,
    pub acknowledgement: String,
    pub authors: Vec<String>,
    pub references: Vec<String>,
    pub repository_name: String,
    pub repository_url: String,
    pub repository_doi: String,
    pub license: String,

    // Data
    pub data_values: Vec<String>,
    pub data_units: Vec<String>,
    pub data_layout: String,

    // Coordinate system
    pub crs: String,
    pub origin_x: f64,
    pub origin_y: f64,
    pub y_azimuth: f64,

    // Domain dimensions
    pub dim_x: f64,
    pub dim_y: f64,
    pub dim_z: f64,

    // Free-form producer-defined payload
    pub auxiliary: Option<Value>,
}

impl ModelMetadata {
    /// Build metadata from a configuration map.
    pub fn from_config(config: &Config) -> Result<Self> {
        let section = METADATA_SECTION;
        let get = |key: &str| config.get_str(section, key).map(str::to_string);
        let get_opt = |key: &str| config.get_opt(section, key).unwrap_or("").to_string();

        let auxiliary = match config.get_opt("data", "auxiliary") {
            Some(raw) => Some(serde_json::from_str(raw).map_err(|err| {
                GeogridError::bad_config(format!("auxiliary is not valid JSON: {err}"))
            })?),
            None => None,
        };

        let metadata = Self {
            title: get("title")?,
            id: get("id")?,
            description: get("description")?,
            keywords: string_to_list(config.get_str(section, "keywords")?, ','),
            history: get_opt("history"),
            comment: get_opt("comment"),
            version: get("version")?,
            creator_name: get("creator_name")?,
            creator_institution: get("creator_institution")?,
            creator_email: get("creator_email")?,
            acknowledgement: get("acknowledgement")?,
            authors: string_to_list(config.get_str(section, "authors")?, '|'),
            references: string_to_list(config.get_str(section, "references")?, '|'),
            repository_name: get_opt("repository_name"),
            repository_url: get_opt("repository_url"),
            repository_doi: get_opt("repository_doi"),
            license: get("license")?,
            data_values: config.get_list("data", "values")?,
            data_units: config.get_list("data", "units")?,
            data_layout: config
                .get_opt("data", "layout")
                .unwrap_or(LAYOUT_VERTEX)
                .to_string(),
            crs: config.get_str("coordsys", "crs")?.to_string(),
            origin_x: config.get_f64("coordsys", "origin_x")?,
            origin_y: config.get_f64("coordsys", "origin_y")?,
            y_azimuth: config.get_f64("coordsys", "y_azimuth")?,
            dim_x: config.get_f64("domain", "dim_x")?,
            dim_y: config.get_f64("domain", "dim_y")?,
            dim_z: config.get_f64("domain", "dim_z")?,
            auxiliary,
        };
        metadata.validate()?;
        Ok(metadata)
    }

    /// Check the structural invariants.
    pub fn validate(&self) -> Result<()> {
        if self.data_values.len() != self.data_units.len() {
            return Err(GeogridError::bad_config(format!(
                "{} data values but {} units",
                self.data_values.len(),
                self.data_units.len()
            )));
        }
        if self.data_values.is_empty() {
            return Err(GeogridError::bad_config("no data values declared"));
        }
        if self.data_layout != LAYOUT_VERTEX {
            return Err(GeogridError::bad_config(format!(
                "unsupported data layout '{}'",
                self.data_layout
            )));
        }
        if !(self.dim_x > 0.0 && self.dim_y > 0.0 && self.dim_z > 0.0) {
            return Err(GeogridError::bad_config(format!(
                "domain dimensions must be positive, got ({}, {}, {})",
                self.dim_x, self.dim_y, self.dim_z
            )));
        }
        if !(0.0..360.0).contains(&self.y_azimuth) {
            return Err(GeogridError::bad_config(format!(
                "y_azimuth must lie in [0, 360), got {}",
                self.y_azimuth
            )));
        }
        Ok(())
    }

    /// Prepend a timestamped line to the history.
    pub fn stamp_history(&mut self, action: &str) {
        let stamp = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
        let line = format!("{stamp} {action}");
        if self.history.is_empty() {
            self.history = line;
        } else {
            self.history = format!("{line}\n{}", self.history);
        }
    }

    /// Number of stored values per vertex.
    pub fn num_values(&self) -> usize {
        self.data_values.len()
    }

    /// Column index of a named value (case-insensitive).
    pub fn value_index(&self, name: &str) -> Option<usize> {
        self.data_values
            .iter()
            .position(|value| value.eq_ignore_ascii_case(name))
    }

    /// Serialize every field as root attributes.
    pub fn to_attrs(&self) -> AttrMap {
        let mut out = AttrMap::new();
        out.insert("title".into(), json!(self.title));
        out.insert("id".into(), json!(self.id));
        out.insert("description".into(), json!(self.description));
        out.insert("keywords".into(), json!(self.keywords));
        out.insert("history".into(), json!(self.history));
        out.insert("comment".into(), json!(self.comment));
        out.insert("version".into(), json!(self.version));
        out.insert("creator_name".into(), json!(self.creator_name));
        out.insert("creator_institution".into(), json!(self.creator_institution));
        out.insert("creator_email".into(), json!(self.creator_email));
        out.insert("acknowledgement".into(), json!(self.acknowledgement));
        out.insert("authors".into(), json!(self.authors));
        out.insert("references".into(), json!(self.references));
        out.insert("repository_name".into(), json!(self.repository_name));
        out.insert("repository_url".into(), json!(self.repository_url));
        out.insert("repository_doi".into(), json!(self.repository_doi));
        out.insert("license".into(), json!(self.license));
        out.insert("data_values".into(), json!(self.data_values));
        out.insert("data_units".into(), json!(self.data_units));
        out.insert("data_layout".into(), json!(self.data_layout));
        out.insert("crs".into(), json!(self.crs));
        out.insert("origin_x".into(), json!(self.origin_x));
        out.insert("origin_y".into(), json!(self.origin_y));
        out.insert("y_azimuth".into(), json!(self.y_azimuth));
        out.insert("dim_x".into(), json!(self.dim_x));
        out.insert("dim_y".into(), json!(self.dim_y));
        out.insert("dim_z".into(), json!(self.dim_z));
        if let Some(auxiliary) = &self.auxiliary {
            // Canonical JSON text, parsed back on load.
            out.insert("auxiliary".into(), json!(auxiliary.to_string()));
        }
        out
    }

    /// Reconstruct metadata from root attributes.
    pub fn from_attrs(root: &AttrMap) -> Result<Self> {
        let auxiliary = match attrs::get_str_opt(root, "auxiliary") {
            Some(raw) => Some(serde_json::from_str(&raw).map_err(|err| {
                GeogridError::io(format!("stored auxiliary attribute is not JSON: {err}"))
            })?),
            None => None,
        };
        let metadata = Self {
            title: attrs::get_str(root, "title")?,
            id: attrs::get_str(root, "id")?,
            description: attrs::get_str(root, "description")?,
            keywords: attrs::get_str_list(root, "keywords")?,
            history: attrs::get_str_opt(root, "history").unwrap_or_default(),
            comment: attrs::get_str_opt(root, "comment").unwrap_or_default(),
            version: attrs::get_str(root, "version")?,
            creator_name: attrs::get_str(root, "creator_name")?,
            creator_institution: attrs::get_str(root, "creator_institution")?,
            creator_email: attrs::get_str(root, "creator_email")?,
            acknowledgement: attrs::get_str(root, "acknowledgement")?,
            authors: attrs::get_str_list(root, "authors")?,
            references: attrs::get_str_list(root, "references")?,
            repository_name: attrs::get_str_opt(root, "repository_name").unwrap_or_default(),
            repository_url: attrs::get_str_opt(root, "repository_url").unwrap_or_default(),
            repository_doi: attrs::get_str_opt(root, "repository_doi").unwrap_or_default(),
            license: attrs::get_str(root, "license")?,
            data_values: attrs::get_str_list(root, "data_values")?,
            data_units: attrs::get_str_list(root, "data_units")?,
            data_layout: attrs::get_str_opt(root, "data_layout")
                .unwrap_or_else(|| LAYOUT_VERTEX.to_string()),
            crs: attrs::get_str(root, "crs")?,
            origin_x: attrs::get_f64(root, "origin_x")?,
            origin_y: attrs::get_f64(root, "origin_y")?,
            y_azimuth: attrs::get_f64(root, "y_azimuth")?,
            dim_x: attrs::get_f64(root, "dim_x")?,
            dim_y: attrs::get_f64(root, "dim_y")?,
            dim_z: attrs::get_f64(root, "dim_z")?,
            auxiliary,
        };
        metadata.validate()?;
        Ok(metadata)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_config() -> Config {
        let mut config = Config::new();
        config
            .merge_text(
                r#"
[geomodelgrids]
filename = model.geogrid
title = Test model
id = test-model
description = One-block test model
keywords = [seismic, velocity]
version = 1.0.0
creator_name = Test Author
creator_email = author@example.org
creator_institution = Example Institution
acknowledgement = Funded by tests
authors = [First Author | Second Author]
references = [Reference one | Reference two]
repository_name = Example Repo
repository_url = https://example.org/repo
repository_doi = 10.0000/example
license = CC0

[coordsys]
crs = EPSG:26910
origin_x = 590000.0
origin_y = 4150000.0
y_azimuth = 90.0

[data]
values = [one, two]
units = [m, m/s]
layout = vertex

[domain]
dim_x = 32000.0
dim_y = 40000.0
dim_z = 5000.0
"#,
                "test",
            )
            .unwrap();
        config
    }

    #[test]
    fn test_from_config() {
        let metadata = ModelMetadata::from_config(&sample_config()).unwrap();
        assert_eq!(metadata.title, "Test model");
        assert_eq!(metadata.keywords, vec!["seismic", "velocity"]);
        assert_eq!(metadata.authors, vec!["First Author", "Second Author"]);
        assert_eq!(metadata.references, vec!["Reference one", "Reference two"]);
        assert_eq!(metadata.data_values, vec!["one", "two"]);
        assert_eq!(metadata.data_units, vec!["m", "m/s"]);
        assert_eq!(metadata.y_azimuth, 90.0);
        assert_eq!(metadata.dim_z, 5000.0);
        assert!(metadata.auxiliary.is_none());
    }

    #[test]
    fn test_values_units_mismatch() {
        let mut config = sample_config();
        config.set("data", "units", "[m]");
        assert!(matches!(
            ModelMetadata::from_config(&config),
            Err(GeogridError::BadConfig(_))
        ));
    }

    #[test]
    fn test_azimuth_range() {
        let mut config = sample_config();
        config.set("coordsys", "y_azimuth", "360.0");
        assert!(ModelMetadata::from_config(&config).is_err());
        config.set("coordsys", "y_azimuth", "-10.0");
        assert!(ModelMetadata::from_config(&config).is_err());
        config.set("coordsys", "y_azimuth", "0.0");
        assert!(ModelMetadata::from_config(&config).is_ok());
    }

    #[test]
    fn test_attrs_roundtrip() {
        let mut metadata = ModelMetadata::from_config(&sample_config()).unwrap();
        metadata.auxiliary = Some(serde_json::json!({"zone_ids": [1, 2, 3]}));
        let restored = ModelMetadata::from_attrs(&metadata.to_attrs()).unwrap();
        assert_eq!(restored, metadata);
    }

    #[test]
    fn test_value_index() {
        let metadata = ModelMetadata::from_config(&sample_config()).unwrap();
        assert_eq!(metadata.value_index("one"), Some(0));
        assert_eq!(metadata.value_index("TWO"), Some(1));
        assert_eq!(metadata.value_index("three"), None);
    }

    #[test]
    fn test_stamp_history() {
        let mut metadata = ModelMetadata::from_config(&sample_config()).unwrap();
        metadata.stamp_history("created model");
        assert!(metadata.history.contains("created model"));
        metadata.stamp_history("updated metadata");
        let mut lines = metadata.history.lines();
        assert!(lines.next().unwrap().contains("updated metadata"));
        assert!(lines.next().unwrap().contains("created model"));
    }

    #[test]
    fn test_auxiliary_from_config() {
        let mut config = sample_config();
        config.set("data", "auxiliary", r#"{"fault_block_ids": {"1": "north"}}"#);
        let metadata = ModelMetadata::from_config(&config).unwrap();
        let auxiliary = metadata.auxiliary.unwrap();
        assert_eq!(auxiliary["fault_block_ids"]["1"], "north");
    }
}
