use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;
use validator::Validate;

use crate::error::{PipelineError, Result};
use crate::models::Region;

/// Accepted header names for the identifier column, in priority order.
/// Air-quality monitor exports use the EoI station code.
const ID_HEADERS: [&str; 4] = ["region_id", "station_id", "AirQualityStationEoICode", "id"];
const LAT_HEADERS: [&str; 2] = ["latitude", "lat"];
const LON_HEADERS: [&str; 2] = ["longitude", "lon"];

#[derive(Debug, Validate)]
struct PointRow {
    #[validate(range(min = -90.0, max = 90.0))]
    latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    longitude: f64,
}

/// Reads fixed region lists: monitor locations from CSV, administrative
/// boundaries from JSON.
pub struct RegionReader;

impl RegionReader {
    pub fn new() -> Self {
        Self
    }

    /// Read point regions from a CSV file. The identifier, latitude and
    /// longitude columns are located by header name; every other column is
    /// carried as per-region metadata.
    pub fn read_points_csv(&self, path: &Path) -> Result<Vec<Region>> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;

        let headers = reader.headers()?.clone();
        let id_col = Self::find_column(&headers, &ID_HEADERS).ok_or_else(|| {
            PipelineError::InvalidFormat(format!(
                "No identifier column found in {} (expected one of {:?})",
                path.display(),
                ID_HEADERS
            ))
        })?;
        let lat_col = Self::find_column(&headers, &LAT_HEADERS).ok_or_else(|| {
            PipelineError::InvalidFormat(format!("No latitude column found in {}", path.display()))
        })?;
        let lon_col = Self::find_column(&headers, &LON_HEADERS).ok_or_else(|| {
            PipelineError::InvalidFormat(format!("No longitude column found in {}", path.display()))
        })?;

        let mut regions = Vec::new();
        for record in reader.records() {
            let record = record?;
            let id = record
                .get(id_col)
                .ok_or_else(|| {
                    PipelineError::InvalidFormat("Row is missing the identifier field".to_string())
                })?
                .to_string();

            let latitude = Self::parse_coordinate(record.get(lat_col), "latitude", &id)?;
            let longitude = Self::parse_coordinate(record.get(lon_col), "longitude", &id)?;

            let row = PointRow {
                latitude,
                longitude,
            };
            row.validate()?;

            let mut metadata = BTreeMap::new();
            for (col, value) in record.iter().enumerate() {
                if col == id_col || col == lat_col || col == lon_col {
                    continue;
                }
                if let Some(name) = headers.get(col) {
                    metadata.insert(name.to_string(), value.to_string());
                }
            }

            regions.push(Region {
                id,
                geometry: crate::models::Geometry::Point {
                    longitude,
                    latitude,
                },
                metadata,
            });
        }

        if regions.is_empty() {
            return Err(PipelineError::MissingData(format!(
                "No regions found in {}",
                path.display()
            )));
        }
        Ok(regions)
    }

    /// Read regions (points or polygon rings) from a JSON array of region
    /// objects.
    pub fn read_regions_json(&self, path: &Path) -> Result<Vec<Region>> {
        let file = File::open(path)?;
        let regions: Vec<Region> = serde_json::from_reader(BufReader::new(file))?;
        if regions.is_empty() {
            return Err(PipelineError::MissingData(format!(
                "No regions found in {}",
                path.display()
            )));
        }
        Ok(regions)
    }

    /// Dispatch on file extension
    pub fn read_regions(&self, path: &Path) -> Result<Vec<Region>> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("csv") => self.read_points_csv(path),
            Some("json") => self.read_regions_json(path),
            other => Err(PipelineError::InvalidFormat(format!(
                "Unsupported region file extension: {:?}",
                other
            ))),
        }
    }

    fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
        for name in names {
            if let Some(idx) = headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
            {
                return Some(idx);
            }
        }
        None
    }

    fn parse_coordinate(value: Option<&str>, what: &str, id: &str) -> Result<f64> {
        value
            .and_then(|v| v.parse::<f64>().ok())
            .ok_or_else(|| {
                PipelineError::InvalidFormat(format!("Invalid {} for region '{}'", what, id))
            })
    }
}

impl Default for RegionReader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_points_csv_with_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitors.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(
            file,
            "AirQualityStationEoICode,Latitude,Longitude,Countrycode\nIT1680A,45.44,9.19,IT\nDEBE010,52.49,13.43,DE"
        )
        .unwrap();

        let regions = RegionReader::new().read_points_csv(&path).unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].id, "IT1680A");
        assert_eq!(regions[0].metadata.get("Countrycode").unwrap(), "IT");
        match regions[1].geometry {
            crate::models::Geometry::Point {
                longitude,
                latitude,
            } => {
                assert!((longitude - 13.43).abs() < 1e-9);
                assert!((latitude - 52.49).abs() < 1e-9);
            }
            _ => panic!("expected point geometry"),
        }
    }

    #[test]
    fn test_out_of_range_coordinates_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitors.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "region_id,latitude,longitude\nbad,95.0,9.19").unwrap();

        assert!(RegionReader::new().read_points_csv(&path).is_err());
    }

    #[test]
    fn test_read_regions_json_polygons() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("municipalities.json");
        let mut file = File::create(&path).unwrap();
        write!(
            file,
            r#"[{{"id": "3550308", "geometry": {{"type": "polygon", "ring": [[-46.8, -24.0], [-46.4, -24.0], [-46.4, -23.4], [-46.8, -23.4]]}}, "metadata": {{"name": "Sao Paulo"}}}}]"#
        )
        .unwrap();

        let regions = RegionReader::new().read_regions(&path).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].id, "3550308");
        assert!(regions[0].geometry.contains(-46.6, -23.7));
    }

    #[test]
    fn test_missing_id_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitors.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "code,latitude,longitude\nX,45.0,9.0").unwrap();

        assert!(RegionReader::new().read_points_csv(&path).is_err());
    }
}
