//! Tap tempo
//!
//! Rolling window of the most recent taps; once full, every tap yields a
//! tempo estimate.

use std::collections::VecDeque;

use crate::consts::TAP_HISTORY_LEN;

#[derive(Debug, Clone, Default)]
pub struct TapTempoEstimator {
    /// Oldest first
    history: VecDeque<f64>,
}

impl TapTempoEstimator {
    pub fn new() -> Self {
        Self {
            history: VecDeque::with_capacity(TAP_HISTORY_LEN),
        }
    }

    /// Record a tap. Returns the estimated BPM once the window is full;
    /// below that threshold nothing is emitted.
    pub fn add_tap(&mut self, timestamp_ms: f64) -> Option<f64> {
        self.history.push_back(timestamp_ms);
        while self.history.len() > TAP_HISTORY_LEN {
            self.history.pop_front();
        }

        if self.history.len() < TAP_HISTORY_LEN {
            return None;
        }

        let (first, last) = (self.history.front()?, self.history.back()?);
        // Mean of consecutive differences telescopes to the span over the gaps
        let avg_interval = (last - first) / (self.history.len() - 1) as f64;
        if !avg_interval.is_finite() || avg_interval <= 0.0 {
            return None;
        }

        let bpm = (60_000.0 / avg_interval).round();
        log::debug!("Tap tempo: avg interval {:.1}ms -> {} BPM", avg_interval, bpm);
        Some(bpm)
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub fn taps(&self) -> impl Iterator<Item = f64> + '_ {
        self.history.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
