//! INI-style configuration for model construction.
//!
//! A configuration is a flat `section -> key -> value` string map merged
//! from one or more files. Later files override earlier ones. Section
//! headings keep their case.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{GeogridError, Result};

/// Convert a bracketed list string into trimmed tokens.
///
/// Accepts `"[a, b, c]"`, `"(a, b, c)"`, or a bare `"a, b, c"`. Empty
/// tokens are dropped, so `"[]"` yields an empty list.
pub fn string_to_list(list_string: &str, delimiter: char) -> Vec<String> {
    let trimmed = list_string.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .or_else(|| trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')))
        .unwrap_or(trimmed);
    inner
        .split(delimiter)
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Flat keyed configuration map.
#[derive(Debug, Clone, Default)]
pub struct Config {
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl Config {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from files, in order; later files override
    /// earlier ones. A missing file is a `BadConfig` error.
    pub fn load<P: AsRef<Path>>(filenames: &[P]) -> Result<Self> {
        let mut config = Self::new();
        for filename in filenames {
            let path = filename.as_ref();
            let text = std::fs::read_to_string(path).map_err(|err| {
                GeogridError::bad_config(format!(
                    "could not read configuration file '{}': {}",
                    path.display(),
                    err
                ))
            })?;
            tracing::debug!(file = %path.display(), "merging configuration");
            config.merge_text(&text, &path.display().to_string())?;
        }
        Ok(config)
    }

    /// Parse INI text into this configuration, overriding existing keys.
    pub fn merge_text(&mut self, text: &str, origin: &str) -> Result<()> {
        let mut section: Option<String> = None;
        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(heading) = line.strip_prefix('[') {
                let name = heading.strip_suffix(']').ok_or_else(|| {
                    GeogridError::bad_config(format!(
                        "{origin}:{}: malformed section heading '{raw}'",
                        lineno + 1
                    ))
                })?;
                section = Some(name.trim().to_string());
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                GeogridError::bad_config(format!(
                    "{origin}:{}: expected 'key = value', got '{raw}'",
                    lineno + 1
                ))
            })?;
            let section = section.as_ref().ok_or_else(|| {
                GeogridError::bad_config(format!(
                    "{origin}:{}: key outside of any section",
                    lineno + 1
                ))
            })?;
            self.sections
                .entry(section.clone())
                .or_default()
                .insert(key.trim().to_string(), value.trim().to_string());
        }
        Ok(())
    }

    /// Set a single value, creating the section if needed.
    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) {
        self.sections
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
    }

    /// True when the section exists.
    pub fn has_section(&self, section: &str) -> bool {
        self.sections.contains_key(section)
    }

    /// All keys of a section, if present.
    pub fn section(&self, section: &str) -> Option<&BTreeMap<String, String>> {
        self.sections.get(section)
    }

    /// Iterate over sections in sorted order.
    pub fn sections(&self) -> impl Iterator<Item = (&String, &BTreeMap<String, String>)> {
        self.sections.iter()
    }

    /// Look up a value without failing.
    pub fn get_opt(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|keys| keys.get(key))
            .map(String::as_str)
    }

    /// Look up a required value.
    pub fn get_str(&self, section: &str, key: &str) -> Result<&str> {
        self.get_opt(section, key).ok_or_else(|| {
            GeogridError::bad_config(format!("missing configuration value [{section}] {key}"))
        })
    }

    /// Look up a required 64-bit float.
    pub fn get_f64(&self, section: &str, key: &str) -> Result<f64> {
        let raw = self.get_str(section, key)?;
        raw.parse::<f64>().map_err(|_| {
            GeogridError::bad_config(format!(
                "expected number for [{section}] {key}, got '{raw}'"
            ))
        })
    }

    /// Look up a required unsigned integer.
    pub fn get_usize(&self, section: &str, key: &str) -> Result<usize> {
        let raw = self.get_str(section, key)?;
        raw.parse::<usize>().map_err(|_| {
            GeogridError::bad_config(format!(
                "expected integer for [{section}] {key}, got '{raw}'"
            ))
        })
    }

    /// Look up a required comma-separated list.
    pub fn get_list(&self, section: &str, key: &str) -> Result<Vec<String>> {
        Ok(string_to_list(self.get_str(section, key)?, ','))
    }

    /// Look up a required list of floats.
    pub fn get_f64_list(&self, section: &str, key: &str) -> Result<Vec<f64>> {
        let raw = self.get_str(section, key)?;
        string_to_list(raw, ',')
            .iter()
            .map(|token| {
                token.parse::<f64>().map_err(|_| {
                    GeogridError::bad_config(format!(
                        "expected list of numbers for [{section}] {key}, got '{raw}'"
                    ))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_string_to_list() {
        assert_eq!(string_to_list("[a, b, c]", ','), vec!["a", "b", "c"]);
        assert_eq!(string_to_list("(a, b)", ','), vec!["a", "b"]);
        assert_eq!(string_to_list("a, b", ','), vec!["a", "b"]);
        assert_eq!(string_to_list("[one | two]", '|'), vec!["one", "two"]);
        assert!(string_to_list("[]", ',').is_empty());
    }

    #[test]
    fn test_merge_and_override() {
        let mut config = Config::new();
        config
            .merge_text("[Domain]\ndim_x = 1000\ndim_y = 2000\n", "first")
            .unwrap();
        config
            .merge_text("[Domain]\ndim_y = 3000\n", "second")
            .unwrap();
        assert_eq!(config.get_f64("Domain", "dim_x").unwrap(), 1000.0);
        assert_eq!(config.get_f64("Domain", "dim_y").unwrap(), 3000.0);
    }

    #[test]
    fn test_section_case_kept() {
        let mut config = Config::new();
        config.merge_text("[MyBlock]\nz_top = 0.0\n", "test").unwrap();
        assert!(config.has_section("MyBlock"));
        assert!(!config.has_section("myblock"));
    }

    #[test]
    fn test_comments_and_blanks() {
        let mut config = Config::new();
        config
            .merge_text("# comment\n\n[data]\n; other comment\nvalues = [Vp, Vs]\n", "test")
            .unwrap();
        assert_eq!(config.get_list("data", "values").unwrap(), vec!["Vp", "Vs"]);
    }

    #[test]
    fn test_missing_file() {
        let result = Config::load(&["/no/such/file.cfg"]);
        assert!(matches!(result, Err(GeogridError::BadConfig(_))));
    }

    #[test]
    fn test_load_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.cfg");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[coordsys]\ncrs = EPSG:26910\norigin_x = 100.0").unwrap();
        let config = Config::load(&[&path]).unwrap();
        assert_eq!(config.get_str("coordsys", "crs").unwrap(), "EPSG:26910");
        assert_eq!(config.get_f64("coordsys", "origin_x").unwrap(), 100.0);
    }

    #[test]
    fn test_malformed_line() {
        let mut config = Config::new();
        let result = config.merge_text("[s]\nnot a pair\n", "test");
        assert!(matches!(result, Err(GeogridError::BadConfig(_))));
    }
}
