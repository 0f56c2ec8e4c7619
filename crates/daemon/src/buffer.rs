use std::collections::VecDeque;

use emg_types::EmgSample;

/// Default number of conditioned samples held between flushes.
pub const DEFAULT_CAPACITY: usize = 50;

/// Bounded FIFO of conditioned samples; overflow drops the oldest entries.
#[derive(Debug)]
pub struct DistributionBuffer {
    samples: VecDeque<EmgSample>,
    capacity: usize,
    dropped: u64,
}

impl DistributionBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity + 1),
            capacity,
            dropped: 0,
        }
    }

    /// Appends at the tail. Returns how many old samples were evicted.
    pub fn append(&mut self, sample: EmgSample) -> usize {
        self.samples.push_back(sample);
        let mut evicted = 0;
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
            evicted += 1;
        }
        self.dropped += evicted as u64;
        evicted
    }

    /// Removes every buffered sample in arrival order.
    pub fn drain(&mut self) -> impl Iterator<Item = EmgSample> + '_ {
        self.samples.drain(..)
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

    /// Total samples evicted by overflow since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    #[cfg(test)]
    fn iter(&self) -> impl Iterator<Item = &EmgSample> {
        self.samples.iter()
    }
}

impl Default for DistributionBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
