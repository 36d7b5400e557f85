use std::collections::VecDeque;
use std::time::Duration;

/// Sliding window of recent round-trip times; the oldest sample is evicted
/// once `capacity` is reached.
#[derive(Debug, Clone)]
pub struct RttHistory {
    samples: VecDeque<Duration>,
    capacity: usize,
}

impl RttHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            // avoid preallocating a week of samples up front
            samples: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn push(
        &mut self,
        rtt: Duration,
    ) {
        self.samples.push_back(rtt);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Mean of the newest `window` samples.
    ///
    /// The window is clamped to `1..=len`; an empty history reports zero.
    pub fn mean(
        &self,
        window: usize,
    ) -> Duration {
        let len = self.samples.len();
        if len == 0 {
            return Duration::ZERO;
        }
        let window = window.clamp(1, len);
        let sum: Duration = self.samples.iter().rev().take(window).sum();
        sum / window as u32
    }

    pub fn latest(&self) -> Option<Duration> {
        self.samples.back().copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Duration> {
        self.samples.iter()
    }
}
