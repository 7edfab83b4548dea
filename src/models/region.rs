use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Region geometry: a monitor location or an administrative boundary ring.
/// Coordinates are (longitude, latitude) in degrees.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Geometry {
    Point { longitude: f64, latitude: f64 },
    Polygon { ring: Vec<[f64; 2]> },
}

impl Geometry {
    /// Point-in-geometry test. Polygons use an even-odd ray cast against
    /// the exterior ring; the ring need not repeat its first vertex.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        match self {
            Geometry::Point { .. } => false,
            Geometry::Polygon { ring } => {
                let n = ring.len();
                let mut inside = false;
                let mut j = n - 1;
                for i in 0..n {
                    let (xi, yi) = (ring[i][0], ring[i][1]);
                    let (xj, yj) = (ring[j][0], ring[j][1]);
                    if ((yi > lat) != (yj > lat))
                        && (lon < (xj - xi) * (lat - yi) / (yj - yi) + xi)
                    {
                        inside = !inside;
                    }
                    j = i;
                }
                inside
            }
        }
    }

    /// (west, south, east, north) bounds
    pub fn bounding_box(&self) -> (f64, f64, f64, f64) {
        match self {
            Geometry::Point {
                longitude,
                latitude,
            } => (*longitude, *latitude, *longitude, *latitude),
            Geometry::Polygon { ring } => {
                let mut west = f64::INFINITY;
                let mut south = f64::INFINITY;
                let mut east = f64::NEG_INFINITY;
                let mut north = f64::NEG_INFINITY;
                for v in ring {
                    west = west.min(v[0]);
                    east = east.max(v[0]);
                    south = south.min(v[1]);
                    north = north.max(v[1]);
                }
                (west, south, east, north)
            }
        }
    }

    fn check(&self) -> std::result::Result<(), String> {
        match self {
            Geometry::Point {
                longitude,
                latitude,
            } => {
                if !longitude.is_finite() || !latitude.is_finite() {
                    return Err("non-finite point coordinates".to_string());
                }
                if !(-90.0..=90.0).contains(latitude) || !(-180.0..=180.0).contains(longitude) {
                    return Err(format!(
                        "coordinates ({}, {}) out of range",
                        longitude, latitude
                    ));
                }
                Ok(())
            }
            Geometry::Polygon { ring } => {
                if ring.len() < 3 {
                    return Err(format!("degenerate ring with {} vertices", ring.len()));
                }
                if ring.iter().any(|v| !v[0].is_finite() || !v[1].is_finite()) {
                    return Err("non-finite ring coordinates".to_string());
                }
                Ok(())
            }
        }
    }
}

/// An externally supplied target region: identifier, geometry, and any
/// per-region metadata copied verbatim onto every output record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    pub id: String,
    pub geometry: Geometry,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Region {
    pub fn point(id: impl Into<String>, longitude: f64, latitude: f64) -> Self {
        Self {
            id: id.into(),
            geometry: Geometry::Point {
                longitude,
                latitude,
            },
            metadata: BTreeMap::new(),
        }
    }

    pub fn polygon(id: impl Into<String>, ring: Vec<[f64; 2]>) -> Self {
        Self {
            id: id.into(),
            geometry: Geometry::Polygon { ring },
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn validate_geometry(&self) -> Result<()> {
        self.geometry
            .check()
            .map_err(|message| PipelineError::InvalidGeometry {
                region_id: self.id.clone(),
                message,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polygon_contains() {
        let square = Geometry::Polygon {
            ring: vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]],
        };
        assert!(square.contains(5.0, 5.0));
        assert!(!square.contains(15.0, 5.0));
        assert!(!square.contains(5.0, -1.0));
    }

    #[test]
    fn test_concave_polygon_contains() {
        // L-shape: the notch at the top right is outside
        let l_shape = Geometry::Polygon {
            ring: vec![
                [0.0, 0.0],
                [10.0, 0.0],
                [10.0, 5.0],
                [5.0, 5.0],
                [5.0, 10.0],
                [0.0, 10.0],
            ],
        };
        assert!(l_shape.contains(2.0, 8.0));
        assert!(!l_shape.contains(8.0, 8.0));
    }

    #[test]
    fn test_bounding_box() {
        let region = Region::polygon("r1", vec![[1.0, 2.0], [3.0, -1.0], [-2.0, 4.0]]);
        assert_eq!(region.geometry.bounding_box(), (-2.0, -1.0, 3.0, 4.0));
    }

    #[test]
    fn test_degenerate_geometry_rejected() {
        let degenerate = Region::polygon("bad", vec![[0.0, 0.0], [1.0, 1.0]]);
        assert!(degenerate.validate_geometry().is_err());

        let nan_point = Region::point("nan", f64::NAN, 0.0);
        assert!(nan_point.validate_geometry().is_err());

        let out_of_range = Region::point("oob", 0.0, 95.0);
        assert!(out_of_range.validate_geometry().is_err());
    }

    #[test]
    fn test_valid_geometry() {
        assert!(Region::point("ok", 9.19, 45.46).validate_geometry().is_ok());
    }
}
