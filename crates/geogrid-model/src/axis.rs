//! Axis specifications for surface and block grids.
//!
//! A horizontal axis is either uniform (one resolution) or variable (a
//! strictly increasing coordinate vector spanning `[0, dim]`). The
//! vertical axis of a block runs downward: uniform between `z_top` and
//! `z_bot`, or a strictly decreasing coordinate vector.

use serde_json::json;

use geogrid_common::{Config, GeogridError, Result};
use geogrid_store::attrs::{self, AttrMap};

/// Tolerance (meters) for resolution divisibility and coordinate matching.
pub const RESOLUTION_TOLERANCE: f64 = 0.01;

/// Horizontal axis discretization.
#[derive(Debug, Clone, PartialEq)]
pub enum AxisSpec {
    Uniform { resolution: f64 },
    Variable { coordinates: Vec<f64> },
}

impl AxisSpec {
    /// Read an axis from a config section.
    ///
    /// Accepts `<axis>_coordinates`, `<axis>_resolution`, or the shared
    /// `resolution_horiz` fallback.
    pub fn from_config(config: &Config, section: &str, axis: &str) -> Result<Self> {
        let coords_key = format!("{axis}_coordinates");
        if config.get_opt(section, &coords_key).is_some() {
            return Ok(Self::Variable {
                coordinates: config.get_f64_list(section, &coords_key)?,
            });
        }
        let resolution_key = format!("{axis}_resolution");
        if config.get_opt(section, &resolution_key).is_some() {
            return Ok(Self::Uniform {
                resolution: config.get_f64(section, &resolution_key)?,
            });
        }
        if config.get_opt(section, "resolution_horiz").is_some() {
            return Ok(Self::Uniform {
                resolution: config.get_f64(section, "resolution_horiz")?,
            });
        }
        Err(GeogridError::bad_config(format!(
            "section [{section}] declares neither {axis}_resolution nor {coords_key}"
        )))
    }

    /// Check the axis against the domain dimension it spans.
    pub fn validate(&self, dim: f64, context: &str) -> Result<()> {
        match self {
            Self::Uniform { resolution } => {
                if *resolution <= 0.0 {
                    return Err(GeogridError::inconsistent_geometry(format!(
                        "{context}: resolution must be positive, got {resolution}"
                    )));
                }
                let cells = (dim / resolution).round();
                if cells < 1.0 || (cells * resolution - dim).abs() > RESOLUTION_TOLERANCE {
                    return Err(GeogridError::inconsistent_geometry(format!(
                        "{context}: resolution {resolution} does not divide dimension {dim}"
                    )));
                }
            }
            Self::Variable { coordinates } => {
                if coordinates.len() < 2 {
                    return Err(GeogridError::inconsistent_geometry(format!(
                        "{context}: need at least two coordinates"
                    )));
                }
                if coordinates[0].abs() > RESOLUTION_TOLERANCE {
                    return Err(GeogridError::inconsistent_geometry(format!(
                        "{context}: coordinates must start at 0, got {}",
                        coordinates[0]
                    )));
                }
                if (coordinates[coordinates.len() - 1] - dim).abs() > RESOLUTION_TOLERANCE {
                    return Err(GeogridError::inconsistent_geometry(format!(
                        "{context}: coordinates must end at {dim}, got {}",
                        coordinates[coordinates.len() - 1]
                    )));
                }
                for pair in coordinates.windows(2) {
                    if pair[1] <= pair[0] {
                        return Err(GeogridError::inconsistent_geometry(format!(
                            "{context}: coordinates must be strictly increasing"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Number of grid points along the axis.
    pub fn num_points(&self, dim: f64) -> usize {
        match self {
            Self::Uniform { resolution } => 1 + (dim / resolution).round() as usize,
            Self::Variable { coordinates } => coordinates.len(),
        }
    }

    /// Local coordinate of a grid point.
    pub fn coordinate(&self, index: usize) -> f64 {
        match self {
            Self::Uniform { resolution } => index as f64 * resolution,
            Self::Variable { coordinates } => coordinates[index],
        }
    }

    /// Grid index of an exact grid coordinate, within tolerance.
    pub fn index_of(&self, coord: f64, dim: f64) -> Option<usize> {
        match self {
            Self::Uniform { resolution } => {
                let index = (coord / resolution).round();
                if index < 0.0 || index as usize >= self.num_points(dim) {
                    return None;
                }
                if (index * resolution - coord).abs() > RESOLUTION_TOLERANCE {
                    return None;
                }
                Some(index as usize)
            }
            Self::Variable { coordinates } => coordinates
                .iter()
                .position(|&c| (c - coord).abs() <= RESOLUTION_TOLERANCE),
        }
    }

    /// Cell containing a coordinate plus the fractional offset inside it.
    ///
    /// Coordinates within tolerance outside `[0, dim]` clamp onto the
    /// boundary; anything further out is `None`.
    pub fn cell_of(&self, x: f64, dim: f64) -> Option<(usize, f64)> {
        if x < -RESOLUTION_TOLERANCE || x > dim + RESOLUTION_TOLERANCE {
            return None;
        }
        let num_points = self.num_points(dim);
        match self {
            Self::Uniform { resolution } => {
                let t = (x / resolution).max(0.0);
                let mut cell = t.floor() as usize;
                if cell + 1 >= num_points {
                    cell = num_points - 2;
                }
                Some((cell, (t - cell as f64).clamp(0.0, 1.0)))
            }
            Self::Variable { coordinates } => {
                let mut cell = match coordinates
                    .binary_search_by(|c| c.partial_cmp(&x).unwrap())
                {
                    Ok(exact) => exact,
                    Err(insertion) => insertion.saturating_sub(1),
                };
                if cell + 1 >= num_points {
                    cell = num_points - 2;
                }
                let width = coordinates[cell + 1] - coordinates[cell];
                Some((cell, ((x - coordinates[cell]) / width).clamp(0.0, 1.0)))
            }
        }
    }

    /// Write the axis attributes (`<prefix>_resolution` or
    /// `<prefix>_coordinates`).
    pub fn to_attrs(&self, prefix: &str, out: &mut AttrMap) {
        match self {
            Self::Uniform { resolution } => {
                out.insert(format!("{prefix}_resolution"), json!(resolution));
            }
            Self::Variable { coordinates } => {
                out.insert(format!("{prefix}_coordinates"), json!(coordinates));
            }
        }
    }

    /// Read the axis back from dataset attributes.
    pub fn from_attrs(stored: &AttrMap, prefix: &str) -> Result<Self> {
        if let Some(coordinates) = attrs::get_f64_list_opt(stored, &format!("{prefix}_coordinates"))
        {
            return Ok(Self::Variable { coordinates });
        }
        if let Some(resolution) = attrs::get_f64_opt(stored, &format!("{prefix}_resolution")) {
            return Ok(Self::Uniform { resolution });
        }
        Err(GeogridError::inconsistent_geometry(format!(
            "dataset has neither {prefix}_resolution nor {prefix}_coordinates"
        )))
    }

    /// Compare against another axis within tolerance.
    pub fn matches(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Uniform { resolution: a }, Self::Uniform { resolution: b }) => {
                (a - b).abs() <= RESOLUTION_TOLERANCE
            }
            (Self::Variable { coordinates: a }, Self::Variable { coordinates: b }) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|(p, q)| (p - q).abs() <= RESOLUTION_TOLERANCE)
            }
            _ => false,
        }
    }
}

/// Vertical axis of a block; z decreases downward.
#[derive(Debug, Clone, PartialEq)]
pub enum ZAxis {
    Uniform {
        resolution: f64,
        z_top: f64,
        z_bot: f64,
    },
    Variable {
        coordinates: Vec<f64>,
    },
}

impl ZAxis {
    /// Read the vertical axis from a block config section.
    pub fn from_config(config: &Config, section: &str) -> Result<Self> {
        if config.get_opt(section, "z_coordinates").is_some() {
            return Ok(Self::Variable {
                coordinates: config.get_f64_list(section, "z_coordinates")?,
            });
        }
        let resolution = if config.get_opt(section, "z_resolution").is_some() {
            config.get_f64(section, "z_resolution")?
        } else if config.get_opt(section, "resolution_vert").is_some() {
            config.get_f64(section, "resolution_vert")?
        } else {
            return Err(GeogridError::bad_config(format!(
                "section [{section}] declares neither z_resolution nor z_coordinates"
            )));
        };
        Ok(Self::Uniform {
            resolution,
            z_top: config.get_f64(section, "z_top")?,
            z_bot: config.get_f64(section, "z_bot")?,
        })
    }

    /// Elevation of the top of the block.
    pub fn z_top(&self) -> f64 {
        match self {
            Self::Uniform { z_top, .. } => *z_top,
            Self::Variable { coordinates } => coordinates[0],
        }
    }

    /// Elevation of the bottom of the block.
    pub fn z_bot(&self) -> f64 {
        match self {
            Self::Uniform { z_bot, .. } => *z_bot,
            Self::Variable { coordinates } => coordinates[coordinates.len() - 1],
        }
    }

    /// Vertical extent of the block.
    pub fn thickness(&self) -> f64 {
        self.z_top() - self.z_bot()
    }

    /// Check the axis invariants.
    pub fn validate(&self, context: &str) -> Result<()> {
        match self {
            Self::Uniform {
                resolution,
                z_top,
                z_bot,
            } => {
                if *resolution <= 0.0 {
                    return Err(GeogridError::inconsistent_geometry(format!(
                        "{context}: z_resolution must be positive, got {resolution}"
                    )));
                }
                if z_top <= z_bot {
                    return Err(GeogridError::inconsistent_geometry(format!(
                        "{context}: z_top {z_top} must be above z_bot {z_bot}"
                    )));
                }
                let cells = ((z_top - z_bot) / resolution).round();
                if (cells * resolution - (z_top - z_bot)).abs() > RESOLUTION_TOLERANCE {
                    return Err(GeogridError::inconsistent_geometry(format!(
                        "{context}: z_resolution {resolution} does not divide thickness {}",
                        z_top - z_bot
                    )));
                }
            }
            Self::Variable { coordinates } => {
                if coordinates.len() < 2 {
                    return Err(GeogridError::inconsistent_geometry(format!(
                        "{context}: need at least two z coordinates"
                    )));
                }
                for pair in coordinates.windows(2) {
                    if pair[1] >= pair[0] {
                        return Err(GeogridError::inconsistent_geometry(format!(
                            "{context}: z coordinates must be strictly decreasing"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Number of grid points downward.
    pub fn num_points(&self) -> usize {
        match self {
            Self::Uniform {
                resolution,
                z_top,
                z_bot,
            } => 1 + ((z_top - z_bot) / resolution).round() as usize,
            Self::Variable { coordinates } => coordinates.len(),
        }
    }

    /// Elevation of grid plane `k` (0 = top).
    pub fn coordinate(&self, k: usize) -> f64 {
        match self {
            Self::Uniform {
                resolution, z_top, ..
            } => z_top - k as f64 * resolution,
            Self::Variable { coordinates } => coordinates[k],
        }
    }

    /// Cell containing an elevation plus the fractional offset measured
    /// downward from the upper plane.
    pub fn cell_of(&self, z: f64) -> Option<(usize, f64)> {
        if z > self.z_top() + RESOLUTION_TOLERANCE || z < self.z_bot() - RESOLUTION_TOLERANCE {
            return None;
        }
        let num_points = self.num_points();
        match self {
            Self::Uniform {
                resolution, z_top, ..
            } => {
                let t = ((z_top - z) / resolution).max(0.0);
                let mut cell = t.floor() as usize;
                if cell + 1 >= num_points {
                    cell = num_points - 2;
                }
                Some((cell, (t - cell as f64).clamp(0.0, 1.0)))
            }
            Self::Variable { coordinates } => {
                let mut cell = coordinates
                    .iter()
                    .position(|&plane| plane <= z)
                    .unwrap_or(num_points)
                    .saturating_sub(1);
                if cell + 1 >= num_points {
                    cell = num_points - 2;
                }
                let span = coordinates[cell] - coordinates[cell + 1];
                Some((cell, ((coordinates[cell] - z) / span).clamp(0.0, 1.0)))
            }
        }
    }

    /// Write the vertical axis attributes.
    pub fn to_attrs(&self, out: &mut AttrMap) {
        match self {
            Self::Uniform {
                resolution,
                z_top,
                z_bot,
            } => {
                out.insert("z_resolution".into(), json!(resolution));
                out.insert("z_top".into(), json!(z_top));
                out.insert("z_bot".into(), json!(z_bot));
            }
            Self::Variable { coordinates } => {
                out.insert("z_coordinates".into(), json!(coordinates));
            }
        }
    }

    /// Read the vertical axis back from dataset attributes.
    pub fn from_attrs(stored: &AttrMap) -> Result<Self> {
        if let Some(coordinates) = attrs::get_f64_list_opt(stored, "z_coordinates") {
            return Ok(Self::Variable { coordinates });
        }
        match (
            attrs::get_f64_opt(stored, "z_resolution"),
            attrs::get_f64_opt(stored, "z_top"),
            attrs::get_f64_opt(stored, "z_bot"),
        ) {
            (Some(resolution), Some(z_top), Some(z_bot)) => Ok(Self::Uniform {
                resolution,
                z_top,
                z_bot,
            }),
            _ => Err(GeogridError::inconsistent_geometry(
                "dataset has neither z_resolution/z_top/z_bot nor z_coordinates",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_axis_points() {
        let axis = AxisSpec::Uniform { resolution: 8000.0 };
        axis.validate(32000.0, "x").unwrap();
        assert_eq!(axis.num_points(32000.0), 5);
        assert_eq!(axis.coordinate(3), 24000.0);
    }

    #[test]
    fn test_uniform_axis_divisibility() {
        let axis = AxisSpec::Uniform { resolution: 7000.0 };
        assert!(matches!(
            axis.validate(32000.0, "x"),
            Err(GeogridError::InconsistentGeometry(_))
        ));
    }

    #[test]
    fn test_variable_axis_validation() {
        let axis = AxisSpec::Variable {
            coordinates: vec![0.0, 5000.0, 12000.0, 32000.0],
        };
        axis.validate(32000.0, "x").unwrap();
        assert_eq!(axis.num_points(32000.0), 4);

        let bad_span = AxisSpec::Variable {
            coordinates: vec![0.0, 5000.0, 20000.0],
        };
        assert!(bad_span.validate(32000.0, "x").is_err());

        let not_monotonic = AxisSpec::Variable {
            coordinates: vec![0.0, 12000.0, 5000.0, 32000.0],
        };
        assert!(not_monotonic.validate(32000.0, "x").is_err());
    }

    #[test]
    fn test_uniform_cell_of() {
        let axis = AxisSpec::Uniform { resolution: 100.0 };
        let (cell, frac) = axis.cell_of(250.0, 1000.0).unwrap();
        assert_eq!(cell, 2);
        assert!((frac - 0.5).abs() < 1.0e-12);

        // On the upper boundary, the last cell is used with frac 1.
        let (cell, frac) = axis.cell_of(1000.0, 1000.0).unwrap();
        assert_eq!(cell, 9);
        assert!((frac - 1.0).abs() < 1.0e-12);

        assert!(axis.cell_of(-1.0, 1000.0).is_none());
        assert!(axis.cell_of(1000.5, 1000.0).is_none());
        // Within tolerance of the boundary clamps on.
        assert!(axis.cell_of(-0.005, 1000.0).is_some());
    }

    #[test]
    fn test_variable_cell_of() {
        let axis = AxisSpec::Variable {
            coordinates: vec![0.0, 100.0, 400.0, 1000.0],
        };
        let (cell, frac) = axis.cell_of(250.0, 1000.0).unwrap();
        assert_eq!(cell, 1);
        assert!((frac - 0.5).abs() < 1.0e-12);

        let (cell, frac) = axis.cell_of(100.0, 1000.0).unwrap();
        assert_eq!(cell, 1);
        assert!(frac.abs() < 1.0e-12);

        let (cell, _) = axis.cell_of(1000.0, 1000.0).unwrap();
        assert_eq!(cell, 2);
    }

    #[test]
    fn test_index_of() {
        let uniform = AxisSpec::Uniform { resolution: 100.0 };
        assert_eq!(uniform.index_of(300.0, 1000.0), Some(3));
        assert_eq!(uniform.index_of(250.0, 1000.0), None);
        assert_eq!(uniform.index_of(1100.0, 1000.0), None);

        let variable = AxisSpec::Variable {
            coordinates: vec![0.0, 100.0, 400.0, 1000.0],
        };
        assert_eq!(variable.index_of(400.0, 1000.0), Some(2));
        assert_eq!(variable.index_of(200.0, 1000.0), None);
    }

    #[test]
    fn test_axis_attrs_roundtrip() {
        let mut stored = AttrMap::new();
        let uniform = AxisSpec::Uniform { resolution: 125.0 };
        uniform.to_attrs("x", &mut stored);
        assert_eq!(AxisSpec::from_attrs(&stored, "x").unwrap(), uniform);

        let mut stored = AttrMap::new();
        let variable = AxisSpec::Variable {
            coordinates: vec![0.0, 10.0, 100.0],
        };
        variable.to_attrs("y", &mut stored);
        assert_eq!(AxisSpec::from_attrs(&stored, "y").unwrap(), variable);
    }

    #[test]
    fn test_zaxis_uniform() {
        let axis = ZAxis::Uniform {
            resolution: 1000.0,
            z_top: 0.0,
            z_bot: -5000.0,
        };
        axis.validate("block").unwrap();
        assert_eq!(axis.num_points(), 6);
        assert_eq!(axis.coordinate(0), 0.0);
        assert_eq!(axis.coordinate(5), -5000.0);
        assert_eq!(axis.thickness(), 5000.0);

        let (cell, frac) = axis.cell_of(-2500.0).unwrap();
        assert_eq!(cell, 2);
        assert!((frac - 0.5).abs() < 1.0e-12);

        let (cell, frac) = axis.cell_of(-5000.0).unwrap();
        assert_eq!(cell, 4);
        assert!((frac - 1.0).abs() < 1.0e-12);

        assert!(axis.cell_of(1.0).is_none());
        assert!(axis.cell_of(-5001.0).is_none());
    }

    #[test]
    fn test_zaxis_variable() {
        let axis = ZAxis::Variable {
            coordinates: vec![0.0, -200.0, -1000.0, -5000.0],
        };
        axis.validate("block").unwrap();
        assert_eq!(axis.z_top(), 0.0);
        assert_eq!(axis.z_bot(), -5000.0);

        let (cell, frac) = axis.cell_of(-600.0).unwrap();
        assert_eq!(cell, 1);
        assert!((frac - 0.5).abs() < 1.0e-12);

        let (cell, frac) = axis.cell_of(0.0).unwrap();
        assert_eq!(cell, 0);
        assert!(frac.abs() < 1.0e-12);

        let not_decreasing = ZAxis::Variable {
            coordinates: vec![0.0, -200.0, -100.0],
        };
        assert!(not_decreasing.validate("block").is_err());
    }

    #[test]
    fn test_zaxis_attrs_roundtrip() {
        let mut stored = AttrMap::new();
        let axis = ZAxis::Uniform {
            resolution: 500.0,
            z_top: 0.0,
            z_bot: -5000.0,
        };
        axis.to_attrs(&mut stored);
        assert_eq!(ZAxis::from_attrs(&stored).unwrap(), axis);
    }
}
