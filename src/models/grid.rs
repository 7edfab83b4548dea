use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::utils::constants::METERS_PER_DEGREE;

/// Regular latitude/longitude grid shared by every frame in a pipeline run.
///
/// Rows run north to south, columns west to east. Coordinates refer to cell
/// centers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    /// Western edge of the grid in degrees longitude
    pub west: f64,
    /// Northern edge of the grid in degrees latitude
    pub north: f64,
    /// Cell width in degrees longitude
    pub lon_res: f64,
    /// Cell height in degrees latitude
    pub lat_res: f64,
    /// Number of columns
    pub width: usize,
    /// Number of rows
    pub height: usize,
}

impl GridSpec {
    pub fn new(
        west: f64,
        north: f64,
        lon_res: f64,
        lat_res: f64,
        width: usize,
        height: usize,
    ) -> Result<Self> {
        if lon_res <= 0.0 || lat_res <= 0.0 {
            return Err(PipelineError::Config(format!(
                "Grid resolution must be positive, got {} x {}",
                lon_res, lat_res
            )));
        }
        if width == 0 || height == 0 {
            return Err(PipelineError::Config(format!(
                "Grid dimensions must be non-zero, got {} x {}",
                width, height
            )));
        }
        Ok(Self {
            west,
            north,
            lon_res,
            lat_res,
            width,
            height,
        })
    }

    pub fn east(&self) -> f64 {
        self.west + self.lon_res * self.width as f64
    }

    pub fn south(&self) -> f64 {
        self.north - self.lat_res * self.height as f64
    }

    /// Center coordinates (longitude, latitude) of the cell at (row, col)
    pub fn center(&self, row: usize, col: usize) -> (f64, f64) {
        let lon = self.west + (col as f64 + 0.5) * self.lon_res;
        let lat = self.north - (row as f64 + 0.5) * self.lat_res;
        (lon, lat)
    }

    /// Cell containing the given coordinates, or None if outside the grid
    pub fn index_of(&self, lon: f64, lat: f64) -> Option<(usize, usize)> {
        if !lon.is_finite() || !lat.is_finite() {
            return None;
        }
        let col = (lon - self.west) / self.lon_res;
        let row = (self.north - lat) / self.lat_res;
        if col < 0.0 || row < 0.0 {
            return None;
        }
        let (row, col) = (row as usize, col as usize);
        if row >= self.height || col >= self.width {
            return None;
        }
        Some((row, col))
    }

    /// Relative cell area at the given row (latitude cosine weighting)
    pub fn area_weight(&self, row: usize) -> f64 {
        let (_, lat) = self.center(row, 0);
        lat.to_radians().cos().max(0.0)
    }

    /// Approximate cell height in meters, used to convert an extraction
    /// scale in meters to a sampling stride in cells
    pub fn cell_size_meters(&self) -> f64 {
        self.lat_res * METERS_PER_DEGREE
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> GridSpec {
        GridSpec::new(-10.0, 60.0, 0.5, 0.5, 20, 40).unwrap()
    }

    #[test]
    fn test_grid_bounds() {
        let g = grid();
        assert_eq!(g.east(), 0.0);
        assert_eq!(g.south(), 40.0);
        assert_eq!(g.shape(), (40, 20));
    }

    #[test]
    fn test_center_and_index_round_trip() {
        let g = grid();
        let (lon, lat) = g.center(3, 7);
        assert_eq!(g.index_of(lon, lat), Some((3, 7)));
    }

    #[test]
    fn test_index_outside_grid() {
        let g = grid();
        assert_eq!(g.index_of(-11.0, 50.0), None);
        assert_eq!(g.index_of(-5.0, 39.9), None);
        assert_eq!(g.index_of(f64::NAN, 50.0), None);
    }

    #[test]
    fn test_area_weight_decreases_toward_pole() {
        let g = grid();
        // row 0 is the northernmost row
        assert!(g.area_weight(0) < g.area_weight(39));
    }

    #[test]
    fn test_invalid_grid_rejected() {
        assert!(GridSpec::new(0.0, 0.0, -0.5, 0.5, 10, 10).is_err());
        assert!(GridSpec::new(0.0, 0.0, 0.5, 0.5, 0, 10).is_err());
    }
}
