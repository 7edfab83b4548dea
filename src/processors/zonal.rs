use tracing::warn;

use crate::models::{Frame, Geometry, GridSpec, Region, SeriesRecord};

/// Precomputed raster footprint of one region: the sampled cells and their
/// area weights. Computed once per (region, grid, scale) and reused for
/// every frame of a sequence.
#[derive(Debug, Clone)]
struct RegionMask {
    cells: Vec<(usize, usize, f64)>,
}

impl RegionMask {
    fn build(region: &Region, grid: &GridSpec, stride: usize) -> Self {
        let cells = match &region.geometry {
            Geometry::Point {
                longitude,
                latitude,
            } => grid
                .index_of(*longitude, *latitude)
                .map(|(row, col)| vec![(row, col, 1.0)])
                .unwrap_or_default(),
            Geometry::Polygon { .. } => {
                let (west, south, east, north) = region.geometry.bounding_box();
                let mut cells = Vec::new();

                // Clamp the bounding box to the grid; an empty overlap
                // leaves the mask empty
                let row_start = ((grid.north - north) / grid.lat_res).floor().max(0.0) as usize;
                let row_end = ((grid.north - south) / grid.lat_res).floor() as isize;
                let col_start = ((west - grid.west) / grid.lon_res).floor().max(0.0) as usize;
                let col_end = ((east - grid.west) / grid.lon_res).floor() as isize;
                if row_end < 0 || col_end < 0 {
                    return Self { cells };
                }
                let row_end = (row_end as usize).min(grid.height - 1);
                let col_end = (col_end as usize).min(grid.width - 1);

                let mut row = row_start;
                while row <= row_end {
                    let weight = grid.area_weight(row);
                    let mut col = col_start;
                    while col <= col_end {
                        let (lon, lat) = grid.center(row, col);
                        if region.geometry.contains(lon, lat) {
                            cells.push((row, col, weight));
                        }
                        col += stride;
                    }
                    row += stride;
                }
                cells
            }
        };
        Self { cells }
    }

    /// Area-weighted mean of one band over the mask, skipping no-data
    /// pixels. None when no valid pixel falls inside the region.
    fn weighted_mean(&self, band: &ndarray::Array2<f64>) -> Option<f64> {
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;
        for &(row, col, weight) in &self.cells {
            let value = band[(row, col)];
            if value.is_nan() {
                continue;
            }
            weighted_sum += value * weight;
            weight_total += weight;
        }
        if weight_total > 0.0 {
            Some(weighted_sum / weight_total)
        } else {
            None
        }
    }
}

/// Computes the area-weighted mean of every band of a frame within each
/// region, one record per region per frame.
///
/// Regions with invalid geometry are reported and skipped at construction;
/// they never abort the run and produce no records.
pub struct ZonalStatisticsExtractor {
    regions: Vec<Region>,
    masks: Vec<Option<RegionMask>>,
}

impl ZonalStatisticsExtractor {
    pub fn new(regions: Vec<Region>, grid: &GridSpec, scale: f64) -> Self {
        let stride = (scale / grid.cell_size_meters()).round().max(1.0) as usize;

        let masks = regions
            .iter()
            .map(|region| match region.validate_geometry() {
                Ok(()) => Some(RegionMask::build(region, grid, stride)),
                Err(e) => {
                    warn!(region_id = %region.id, error = %e, "Skipping region with invalid geometry");
                    None
                }
            })
            .collect();

        Self { regions, masks }
    }

    /// Number of regions that will actually produce records
    pub fn active_regions(&self) -> usize {
        self.masks.iter().filter(|m| m.is_some()).count()
    }

    /// Union of metadata keys across all regions, sorted
    pub fn metadata_fields(&self) -> Vec<String> {
        let mut keys = std::collections::BTreeSet::new();
        for region in &self.regions {
            keys.extend(region.metadata.keys().cloned());
        }
        keys.into_iter().collect()
    }

    /// One record per (valid) region, in the supplied region order
    pub fn extract(&self, frame: &Frame) -> Vec<SeriesRecord> {
        self.regions
            .iter()
            .zip(&self.masks)
            .filter_map(|(region, mask)| {
                let mask = mask.as_ref()?;
                let mut record = SeriesRecord::new(region.id.clone(), frame.date);
                record.metadata = region.metadata.clone();
                for (name, band) in &frame.bands {
                    record.set_value(name.clone(), mask.weighted_mean(band));
                }
                Some(record)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ndarray::Array2;
    use std::collections::BTreeMap;

    fn grid() -> GridSpec {
        // 10x10 one-degree grid centered on the equator
        GridSpec::new(0.0, 5.0, 1.0, 1.0, 10, 10).unwrap()
    }

    fn frame(values: Array2<f64>) -> Frame {
        let mut bands = BTreeMap::new();
        bands.insert("NO2_column_number_density".to_string(), values);
        Frame::new(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), grid(), bands)
    }

    #[test]
    fn test_point_region_samples_containing_cell() {
        let mut values = Array2::from_elem((10, 10), 1.0);
        values[(4, 2)] = 7.0;
        let f = frame(values);

        // (2.5, 0.5) sits in row 4, col 2
        let extractor =
            ZonalStatisticsExtractor::new(vec![Region::point("p", 2.5, 0.5)], &grid(), 9000.0);
        let records = extractor.extract(&f);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value("NO2_column_number_density"), Some(7.0));
    }

    #[test]
    fn test_polygon_region_mean() {
        let mut values = Array2::from_elem((10, 10), 2.0);
        values[(0, 0)] = 100.0; // outside the polygon
        let f = frame(values);

        let region = Region::polygon(
            "box",
            vec![[1.0, -3.0], [6.0, -3.0], [6.0, 1.0], [1.0, 1.0]],
        );
        let extractor = ZonalStatisticsExtractor::new(vec![region], &grid(), 9000.0);
        let records = extractor.extract(&f);
        let value = records[0].value("NO2_column_number_density").unwrap();
        assert!((value - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_region_outside_coverage_yields_null() {
        let f = frame(Array2::from_elem((10, 10), 3.0));
        let extractor =
            ZonalStatisticsExtractor::new(vec![Region::point("far", 120.0, 45.0)], &grid(), 9000.0);
        let records = extractor.extract(&f);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value("NO2_column_number_density"), None);
    }

    #[test]
    fn test_all_nan_band_yields_null() {
        let f = frame(Array2::from_elem((10, 10), f64::NAN));
        let extractor =
            ZonalStatisticsExtractor::new(vec![Region::point("p", 2.5, 0.5)], &grid(), 9000.0);
        let records = extractor.extract(&f);
        assert_eq!(records[0].value("NO2_column_number_density"), None);
    }

    #[test]
    fn test_invalid_geometry_skipped_without_aborting() {
        let f = frame(Array2::from_elem((10, 10), 1.0));
        let regions = vec![
            Region::point("ok", 2.5, 0.5),
            Region::polygon("bad", vec![[0.0, 0.0], [1.0, 1.0]]),
        ];
        let extractor = ZonalStatisticsExtractor::new(regions, &grid(), 9000.0);
        assert_eq!(extractor.active_regions(), 1);

        let records = extractor.extract(&f);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].region_id, "ok");
    }

    #[test]
    fn test_metadata_copied_onto_records() {
        let f = frame(Array2::from_elem((10, 10), 1.0));
        let region = Region::point("IT1680A", 2.5, 0.5).with_metadata("Countrycode", "IT");
        let extractor = ZonalStatisticsExtractor::new(vec![region], &grid(), 9000.0);
        let records = extractor.extract(&f);
        assert_eq!(records[0].metadata.get("Countrycode").unwrap(), "IT");
    }
}
