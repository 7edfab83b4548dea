use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{Duration, NaiveDate};
use ndarray::{Array2, Zip};
use rayon::prelude::*;

use crate::error::{PipelineError, Result};
use crate::models::{Frame, FrameSequence, GridSpec, Reducer, SourceFrame, VariableGroup};
use crate::readers::FrameSource;

/// Reduces the source frames of one time window to a single daily frame.
///
/// Reduction is per-pixel and per-band; a pixel with no valid contribution
/// across the window stays no-data. An empty window yields a frame whose
/// bands are entirely no-data, never an error.
pub struct TimeWindowAggregator {
    reducer: Reducer,
    bands: Vec<String>,
}

impl TimeWindowAggregator {
    pub fn new(reducer: Reducer, bands: Vec<String>) -> Self {
        Self { reducer, bands }
    }

    pub fn aggregate(&self, grid: &GridSpec, date: NaiveDate, frames: &[SourceFrame]) -> Frame {
        if frames.is_empty() {
            return Frame::no_data(date, grid.clone(), &self.bands);
        }

        let bands = self
            .bands
            .iter()
            .map(|name| (name.clone(), self.reduce_band(grid, name, frames)))
            .collect();
        Frame::new(date, grid.clone(), bands)
    }

    fn reduce_band(&self, grid: &GridSpec, name: &str, frames: &[SourceFrame]) -> Array2<f64> {
        let shape = grid.shape();
        let mut acc = Array2::from_elem(shape, f64::NAN);
        let mut count = Array2::<u32>::zeros(shape);
        let reducer = self.reducer;

        for frame in frames {
            let Some(band) = frame.band(name) else {
                continue;
            };
            Zip::from(&mut acc)
                .and(&mut count)
                .and(band)
                .for_each(|a, c, &v| {
                    if v.is_nan() {
                        return;
                    }
                    *a = if *c == 0 {
                        v
                    } else {
                        match reducer {
                            Reducer::Mean | Reducer::Sum => *a + v,
                            Reducer::Min => a.min(v),
                            Reducer::Max => a.max(v),
                        }
                    };
                    *c += 1;
                });
        }

        if reducer == Reducer::Mean {
            Zip::from(&mut acc).and(&count).for_each(|a, &c| {
                if c > 0 {
                    *a /= c as f64;
                }
            });
        }
        acc
    }
}

/// Drives the window aggregator across every day of `[start, end)`,
/// producing one frame per calendar day with the group's renames applied.
///
/// Days are independent and reduced in parallel. An optional cancellation
/// flag aborts the run between per-day tasks with `Cancelled`.
pub struct DailySeriesBuilder<'a> {
    source: &'a dyn FrameSource,
}

impl<'a> DailySeriesBuilder<'a> {
    pub fn new(source: &'a dyn FrameSource) -> Self {
        Self { source }
    }

    pub fn build(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        group: &VariableGroup,
    ) -> Result<FrameSequence> {
        self.build_with_cancel(start, end, group, None)
    }

    pub fn build_with_cancel(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        group: &VariableGroup,
        cancel: Option<&AtomicBool>,
    ) -> Result<FrameSequence> {
        if start >= end {
            return Err(PipelineError::InvalidDateRange { start, end });
        }

        let days = (end - start).num_days();
        let grid = self.source.grid().clone();
        let aggregator = TimeWindowAggregator::new(group.reducer, group.bands.clone());

        let mut frames: Vec<Frame> = (0..days)
            .into_par_iter()
            .map(|k| {
                if let Some(flag) = cancel {
                    if flag.load(Ordering::Relaxed) {
                        return Err(PipelineError::Cancelled);
                    }
                }
                let date = start + Duration::days(k);
                let window_start = date
                    .and_hms_opt(0, 0, 0)
                    .ok_or_else(|| PipelineError::InvalidFormat(format!("Invalid date {}", date)))?;
                let window_end = window_start + Duration::hours(24);

                let source_frames = self.source.fetch(&group.bands, window_start, window_end)?;
                Ok(aggregator.aggregate(&grid, date, &source_frames))
            })
            .collect::<Result<Vec<_>>>()?;

        for rename in &group.renames {
            for frame in &mut frames {
                frame.rename_band(&rename.from, &rename.to)?;
            }
        }

        FrameSequence::new(grid, frames)
    }
}
