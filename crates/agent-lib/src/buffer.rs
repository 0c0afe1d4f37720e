//! Sliding window of recent sensor samples
//!
//! Fixed-capacity ring with FIFO eviction. Insertion order is temporal
//! order; the buffer never re-sorts.

use crate::models::{Metric, Sample, SeriesPoint};
use std::collections::VecDeque;

/// Default window size (5 minutes at 10s polling)
pub const DEFAULT_CAPACITY: usize = 30;

/// Fixed-capacity, time-ordered window of samples
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl SampleBuffer {
    /// Create an empty buffer. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest entry if the window overflows
    pub fn append(&mut self, sample: Sample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Ordered copy of the current window
    pub fn snapshot(&self) -> Vec<Sample> {
        self.samples.iter().copied().collect()
    }

    /// One metric's column of the current window
    pub fn series(&self, metric: Metric) -> Vec<SeriesPoint> {
        self.samples
            .iter()
            .map(|s| SeriesPoint::new(s.timestamp, s.value(metric)))
            .collect()
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
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

    /// Most recently appended sample
    pub fn newest(&self) -> Option<&Sample> {
        self.samples.back()
    }
}
