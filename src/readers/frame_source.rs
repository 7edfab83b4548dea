use chrono::NaiveDateTime;

use crate::error::{PipelineError, Result};
use crate::models::{GridSpec, SourceFrame};

/// Boundary to an external raster provider.
///
/// Implementations return the time-stamped snapshots whose timestamps fall
/// in the half-open window `[start, end)`, restricted to the requested
/// bands. A snapshot that lacks a requested band contributes nothing for
/// that band; the aggregation stage treats it as no-data.
pub trait FrameSource: Send + Sync {
    fn grid(&self) -> &GridSpec;

    fn fetch(
        &self,
        bands: &[String],
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<SourceFrame>>;
}

/// Frame source over a fully materialized snapshot list. Used by tests and
/// by the Parquet frame reader once files are loaded.
pub struct InMemoryFrameSource {
    grid: GridSpec,
    frames: Vec<SourceFrame>,
}

impl InMemoryFrameSource {
    pub fn new(grid: GridSpec, mut frames: Vec<SourceFrame>) -> Result<Self> {
        for frame in &frames {
            for (name, band) in &frame.bands {
                if band.dim() != grid.shape() {
                    return Err(PipelineError::GridMismatch(format!(
                        "band '{}' at {} has shape {:?}, grid is {:?}",
                        name,
                        frame.timestamp,
                        band.dim(),
                        grid.shape()
                    )));
                }
            }
        }
        frames.sort_by_key(|f| f.timestamp);
        Ok(Self { grid, frames })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for InMemoryFrameSource {
    fn grid(&self) -> &GridSpec {
        &self.grid
    }

    fn fetch(
        &self,
        bands: &[String],
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<SourceFrame>> {
        let selected = self
            .frames
            .iter()
            .filter(|f| f.timestamp >= start && f.timestamp < end)
            .map(|f| {
                let picked = f
                    .bands
                    .iter()
                    .filter(|(name, _)| bands.iter().any(|b| b == *name))
                    .map(|(name, data)| (name.clone(), data.clone()))
                    .collect();
                SourceFrame::new(f.timestamp, picked)
            })
            .collect();
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ndarray::Array2;
    use std::collections::BTreeMap;

    fn grid() -> GridSpec {
        GridSpec::new(0.0, 4.0, 1.0, 1.0, 4, 4).unwrap()
    }

    fn snapshot(hour: u32, value: f64) -> SourceFrame {
        let mut bands = BTreeMap::new();
        bands.insert("temperature_2m".to_string(), Array2::from_elem((4, 4), value));
        bands.insert("surface_pressure".to_string(), Array2::from_elem((4, 4), 1000.0));
        SourceFrame::new(
            NaiveDate::from_ymd_opt(2020, 1, 1)
                .unwrap()
                .and_hms_opt(hour, 0, 0)
                .unwrap(),
            bands,
        )
    }

    #[test]
    fn test_fetch_window_is_half_open() {
        let source =
            InMemoryFrameSource::new(grid(), vec![snapshot(0, 1.0), snapshot(12, 2.0), snapshot(23, 3.0)])
                .unwrap();

        let day = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let start = day.and_hms_opt(0, 0, 0).unwrap();
        let end = day.and_hms_opt(23, 0, 0).unwrap();

        let frames = source
            .fetch(&["temperature_2m".to_string()], start, end)
            .unwrap();
        // the 23:00 snapshot sits on the exclusive boundary
        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn test_fetch_selects_bands() {
        let source = InMemoryFrameSource::new(grid(), vec![snapshot(6, 5.0)]).unwrap();
        let day = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let frames = source
            .fetch(
                &["temperature_2m".to_string()],
                day.and_hms_opt(0, 0, 0).unwrap(),
                day.and_hms_opt(23, 59, 59).unwrap(),
            )
            .unwrap();
        assert_eq!(frames[0].bands.len(), 1);
        assert!(frames[0].band("surface_pressure").is_none());
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let mut bands = BTreeMap::new();
        bands.insert("temperature_2m".to_string(), Array2::<f64>::zeros((2, 2)));
        let bad = SourceFrame::new(
            NaiveDate::from_ymd_opt(2020, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            bands,
        );
        assert!(InMemoryFrameSource::new(grid(), vec![bad]).is_err());
    }
}
