// SPDX-License-Identifier: GPL-3.0-only

//! Candidate points shown while the decoder is searching
//!
//! The decode worker adds points from its thread; the overlay takes them
//! on every repaint. A repaint that finds new points shows them and keeps
//! them as the previous batch, so each batch is visible for two repaints,
//! the second time faded.

use crate::constants::overlay::MAX_RESULT_POINTS;
use crate::pipelines::decode::{CandidatePoint, PointSink};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Batches {
    current: Vec<CandidatePoint>,
    last: Option<Vec<CandidatePoint>>,
}

/// What one repaint should draw
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointFrame {
    /// Drawn at full point opacity and size
    pub current: Vec<CandidatePoint>,
    /// Drawn at half opacity and half size
    pub last: Vec<CandidatePoint>,
}

#[derive(Debug, Default)]
pub struct CandidatePoints {
    batches: Mutex<Batches>,
}

impl CandidatePoints {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, Batches> {
        match self.batches.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Append points; past the cap only the most recent half is kept
    pub fn add(&self, points: &[CandidatePoint]) {
        let mut batches = self.lock();
        batches.current.extend_from_slice(points);
        let len = batches.current.len();
        if len > MAX_RESULT_POINTS {
            batches.current.drain(..len - MAX_RESULT_POINTS / 2);
        }
    }

    pub fn pending(&self) -> usize {
        self.lock().current.len()
    }

    /// Take the points for one repaint and rotate the batches
    pub fn take_frame(&self) -> PointFrame {
        let mut batches = self.lock();
        let last = batches.last.take().unwrap_or_default();
        if batches.current.is_empty() {
            PointFrame {
                current: Vec::new(),
                last,
            }
        } else {
            let current = std::mem::take(&mut batches.current);
            batches.last = Some(current.clone());
            PointFrame { current, last }
        }
    }

    pub fn clear(&self) {
        let mut batches = self.lock();
        batches.current.clear();
        batches.last = None;
    }

    /// Sink for the decode pipeline
    pub fn sink(self: &Arc<Self>) -> PointSink {
        let points = Arc::clone(self);
        Arc::new(move |batch: &[CandidatePoint]| points.add(batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(n: usize) -> Vec<CandidatePoint> {
        (0..n)
            .map(|i| CandidatePoint {
                x: i as f32,
                y: 0.0,
            })
            .collect()
    }

    #[test]
    fn test_trims_to_most_recent_half() {
        let points = CandidatePoints::new();
        points.add(&pts(MAX_RESULT_POINTS));
        assert_eq!(points.pending(), MAX_RESULT_POINTS);

        points.add(&pts(1));
        assert_eq!(points.pending(), MAX_RESULT_POINTS / 2);

        let frame = points.take_frame();
        // The newest point survives the trim
        assert_eq!(frame.current.last().map(|p| p.x), Some(0.0));
        assert_eq!(frame.current.first().map(|p| p.x), Some(11.0));
    }

    #[test]
    fn test_batch_fades_then_disappears() {
        let points = CandidatePoints::new();
        points.add(&pts(3));

        let first = points.take_frame();
        assert_eq!(first.current.len(), 3);
        assert!(first.last.is_empty());

        let second = points.take_frame();
        assert!(second.current.is_empty());
        assert_eq!(second.last.len(), 3);

        assert_eq!(points.take_frame(), PointFrame::default());
    }

    #[test]
    fn test_sink_feeds_points() {
        let points = CandidatePoints::new();
        let sink = points.sink();
        sink(&pts(2));
        sink(&pts(2));
        assert_eq!(points.pending(), 4);
        points.clear();
        assert_eq!(points.pending(), 0);
    }
}
