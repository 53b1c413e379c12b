//! Progress sampling shared by every measurement routine

use crate::cancel::CancelToken;
use crate::constants::{LIVE_BUFFER_POINTS, MIN_RATE_ELAPSED};
use crate::error::MeasureError;
use crate::types::ProgressSample;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Rate in Mbps for `bytes` transferred over `elapsed`
pub fn rate_mbps(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.max(MIN_RATE_ELAPSED).as_secs_f64();
    (bytes as f64 * 8.0) / secs / 1_000_000.0
}

/// A time-bounded sequence of samples feeding a progress callback.
///
/// The stream owns the routine's start instant, so every sample is stamped
/// relative to it. Samples are handed to the callback in emission order and
/// only the most recent one is retained.
pub struct SampleStream<'a, F>
where
    F: FnMut(f64),
{
    started: Instant,
    budget: Option<Duration>,
    cancel: &'a CancelToken,
    on_sample: F,
    last: Option<ProgressSample>,
    emitted: usize,
}

impl<'a, F> SampleStream<'a, F>
where
    F: FnMut(f64),
{
    pub fn new(cancel: &'a CancelToken, on_sample: F) -> Self {
        Self {
            started: Instant::now(),
            budget: None,
            cancel,
            on_sample,
            last: None,
            emitted: 0,
        }
    }

    /// Bound the stream; after `budget` has elapsed it reports exhaustion
    pub fn with_budget(mut self, budget: Option<Duration>) -> Self {
        self.budget = budget;
        self
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn is_exhausted(&self) -> bool {
        self.budget.is_some_and(|budget| self.elapsed() >= budget)
    }

    pub fn cancel(&self) -> &'a CancelToken {
        self.cancel
    }

    /// Record a value and hand it to the callback
    pub fn emit(&mut self, value: f64) -> ProgressSample {
        let sample = ProgressSample {
            at_time_ms: self.elapsed().as_millis() as u64,
            value_mbps: value,
        };
        (self.on_sample)(value);
        self.last = Some(sample);
        self.emitted += 1;
        sample
    }

    /// Suspend for `interval`, aborting early on cancellation
    pub async fn pace(&self, interval: Duration) -> Result<(), MeasureError> {
        self.cancel.guard(tokio::time::sleep(interval)).await
    }

    pub fn last(&self) -> Option<ProgressSample> {
        self.last
    }

    pub fn emitted(&self) -> usize {
        self.emitted
    }
}

/// Rolling window of the most recent progress points for live display
#[derive(Debug, Clone)]
pub struct LiveBuffer {
    capacity: usize,
    points: VecDeque<ProgressSample>,
}

impl LiveBuffer {
    pub fn new() -> Self {
        Self::with_capacity(LIVE_BUFFER_POINTS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            points: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, sample: ProgressSample) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(sample);
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest(&self) -> Option<&ProgressSample> {
        self.points.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProgressSample> {
        self.points.iter()
    }

    /// Largest value currently in the window
    pub fn peak(&self) -> Option<f64> {
        self.points.iter().map(|p| p.value_mbps).reduce(f64::max)
    }
}

impl Default for LiveBuffer {
    fn default() -> Self {
        Self::new()
    }
}
