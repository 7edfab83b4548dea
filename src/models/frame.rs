use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use ndarray::Array2;

use crate::error::{PipelineError, Result};
use crate::models::GridSpec;

/// One time-stamped multi-band snapshot as delivered by a frame source.
///
/// Bands are dense grids with NaN marking no-data pixels.
#[derive(Debug, Clone)]
pub struct SourceFrame {
    pub timestamp: NaiveDateTime,
    pub bands: BTreeMap<String, Array2<f64>>,
}

impl SourceFrame {
    pub fn new(timestamp: NaiveDateTime, bands: BTreeMap<String, Array2<f64>>) -> Self {
        Self { timestamp, bands }
    }

    pub fn band(&self, name: &str) -> Option<&Array2<f64>> {
        self.bands.get(name)
    }
}

/// One daily composite frame, tagged with its representative calendar date.
#[derive(Debug, Clone)]
pub struct Frame {
    pub date: NaiveDate,
    pub grid: GridSpec,
    pub bands: BTreeMap<String, Array2<f64>>,
}

impl Frame {
    pub fn new(date: NaiveDate, grid: GridSpec, bands: BTreeMap<String, Array2<f64>>) -> Self {
        Self { date, grid, bands }
    }

    /// Frame for a window with zero contributing source frames: every
    /// requested band present, every pixel no-data
    pub fn no_data(date: NaiveDate, grid: GridSpec, band_names: &[String]) -> Self {
        let bands = band_names
            .iter()
            .map(|name| {
                (
                    name.clone(),
                    Array2::from_elem(grid.shape(), f64::NAN),
                )
            })
            .collect();
        Self { date, grid, bands }
    }

    pub fn band(&self, name: &str) -> Option<&Array2<f64>> {
        self.bands.get(name)
    }

    pub fn band_names(&self) -> Vec<String> {
        self.bands.keys().cloned().collect()
    }

    /// Rename one band, preserving everything else. Fails if the new name
    /// is already taken or the old name is absent.
    pub fn rename_band(&mut self, old: &str, new: &str) -> Result<()> {
        if self.bands.contains_key(new) {
            return Err(PipelineError::BandCollision {
                band: new.to_string(),
            });
        }
        let data = self
            .bands
            .remove(old)
            .ok_or_else(|| PipelineError::UnknownBand {
                band: old.to_string(),
                context: format!("frame {}", self.date),
            })?;
        self.bands.insert(new.to_string(), data);
        Ok(())
    }
}

/// Date-ordered, gap-free sequence of daily frames with a uniform band
/// schema and grid.
///
/// The sequence may be empty (e.g. a degenerate join with no overlapping
/// dates); downstream stages must handle that without raising.
#[derive(Debug, Clone)]
pub struct FrameSequence {
    grid: GridSpec,
    frames: Vec<Frame>,
}

impl FrameSequence {
    /// Build a sequence, enforcing the ordering, contiguity, schema and
    /// grid invariants.
    pub fn new(grid: GridSpec, frames: Vec<Frame>) -> Result<Self> {
        if let Some(first) = frames.first() {
            let schema = first.band_names();
            for (i, frame) in frames.iter().enumerate() {
                if frame.grid != grid {
                    return Err(PipelineError::GridMismatch(format!(
                        "frame {} does not share the sequence grid",
                        frame.date
                    )));
                }
                if frame.band_names() != schema {
                    return Err(PipelineError::InvalidFormat(format!(
                        "frame {} does not match the sequence band schema {:?}",
                        frame.date, schema
                    )));
                }
                let expected = first.date + chrono::Duration::days(i as i64);
                if frame.date != expected {
                    return Err(PipelineError::InvalidFormat(format!(
                        "frame dates must be consecutive: expected {}, got {}",
                        expected, frame.date
                    )));
                }
            }
        }
        Ok(Self { grid, frames })
    }

    pub fn empty(grid: GridSpec) -> Self {
        Self {
            grid,
            frames: Vec::new(),
        }
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.frames.iter().map(|f| f.date).collect()
    }

    /// Band schema shared by every frame in the sequence
    pub fn band_names(&self) -> Vec<String> {
        self.frames
            .first()
            .map(|f| f.band_names())
            .unwrap_or_default()
    }

    /// Frame for an exact calendar date, if present. Contiguity makes this
    /// an O(1) offset lookup.
    pub fn get(&self, date: NaiveDate) -> Option<&Frame> {
        let first = self.frames.first()?.date;
        let offset = (date - first).num_days();
        if offset < 0 {
            return None;
        }
        self.frames.get(offset as usize)
    }

    /// Rename a band across every frame in the sequence
    pub fn rename_band(&mut self, old: &str, new: &str) -> Result<()> {
        for frame in &mut self.frames {
            frame.rename_band(old, new)?;
        }
        Ok(())
    }

    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> GridSpec {
        GridSpec::new(0.0, 10.0, 1.0, 1.0, 4, 4).unwrap()
    }

    fn frame(date: NaiveDate, value: f64) -> Frame {
        let mut bands = BTreeMap::new();
        bands.insert("temperature_2m".to_string(), Array2::from_elem((4, 4), value));
        Frame::new(date, grid(), bands)
    }

    #[test]
    fn test_sequence_accepts_consecutive_dates() {
        let d0 = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let frames = (0..3)
            .map(|i| frame(d0 + chrono::Duration::days(i), i as f64))
            .collect();
        let seq = FrameSequence::new(grid(), frames).unwrap();
        assert_eq!(seq.len(), 3);
        assert_eq!(seq.band_names(), vec!["temperature_2m".to_string()]);
    }

    #[test]
    fn test_sequence_rejects_gap() {
        let d0 = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let frames = vec![frame(d0, 1.0), frame(d0 + chrono::Duration::days(2), 2.0)];
        assert!(FrameSequence::new(grid(), frames).is_err());
    }

    #[test]
    fn test_get_by_date() {
        let d0 = NaiveDate::from_ymd_opt(2020, 6, 1).unwrap();
        let frames = (0..5)
            .map(|i| frame(d0 + chrono::Duration::days(i), i as f64))
            .collect();
        let seq = FrameSequence::new(grid(), frames).unwrap();

        let d3 = d0 + chrono::Duration::days(3);
        assert_eq!(seq.get(d3).unwrap().date, d3);
        assert!(seq.get(d0 - chrono::Duration::days(1)).is_none());
        assert!(seq.get(d0 + chrono::Duration::days(5)).is_none());
    }

    #[test]
    fn test_rename_band_collision() {
        let d0 = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let mut f = frame(d0, 1.0);
        f.bands
            .insert("min_temperature_2m".to_string(), Array2::zeros((4, 4)));

        assert!(matches!(
            f.rename_band("temperature_2m", "min_temperature_2m"),
            Err(PipelineError::BandCollision { .. })
        ));
        assert!(f.rename_band("temperature_2m", "mean_temperature_2m").is_ok());
        assert!(f.band("mean_temperature_2m").is_some());
        assert!(f.band("temperature_2m").is_none());
    }

    #[test]
    fn test_no_data_frame_has_all_bands() {
        let d0 = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let names = vec!["a".to_string(), "b".to_string()];
        let f = Frame::no_data(d0, grid(), &names);
        assert_eq!(f.band_names(), names);
        assert!(f.band("a").unwrap().iter().all(|v| v.is_nan()));
    }
}
