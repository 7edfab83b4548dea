use crate::error::{PipelineError, Result};
use crate::models::{Frame, FrameSequence};

/// Strict inner join of date-indexed frame sequences.
///
/// The join key is exact calendar-date equality; matched frames' bands are
/// concatenated, unmatched dates are dropped. Band-name collisions between
/// the two schemas are detected before any frame is merged. A join with no
/// overlapping dates yields an empty sequence, which is valid.
pub struct InnerJoinEngine;

impl InnerJoinEngine {
    pub fn join(left: &FrameSequence, right: &FrameSequence) -> Result<FrameSequence> {
        if left.grid() != right.grid() {
            return Err(PipelineError::GridMismatch(
                "Joined sequences must share one grid".to_string(),
            ));
        }
        if left.is_empty() || right.is_empty() {
            return Ok(FrameSequence::empty(left.grid().clone()));
        }

        // Schema collision check up front, before touching any frame data
        let right_schema = right.band_names();
        for band in left.band_names() {
            if right_schema.contains(&band) {
                return Err(PipelineError::BandCollision { band });
            }
        }

        let joined = left
            .frames()
            .iter()
            .filter_map(|l| right.get(l.date).map(|r| Self::concat(l, r)))
            .collect();

        FrameSequence::new(left.grid().clone(), joined)
    }

    /// Fold a multi-way join pairwise left-to-right. The result's date
    /// range is the intersection of every input's range.
    pub fn join_all(sequences: Vec<FrameSequence>) -> Result<FrameSequence> {
        let mut iter = sequences.into_iter();
        let first = iter
            .next()
            .ok_or_else(|| PipelineError::MissingData("No sequences to join".to_string()))?;
        iter.try_fold(first, |acc, next| Self::join(&acc, &next))
    }

    fn concat(left: &Frame, right: &Frame) -> Frame {
        let mut bands = left.bands.clone();
        for (name, data) in &right.bands {
            bands.insert(name.clone(), data.clone());
        }
        Frame::new(left.date, left.grid.clone(), bands)
    }
}
