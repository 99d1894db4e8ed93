//! Fixed-capacity ring buffer for numeric time series
//!
//! Storage is allocated once at construction and never grows. When the
//! buffer is full, each push overwrites the oldest value, so the series
//! always holds the most recent `capacity` samples in order.

use serde::{Deserialize, Serialize};

/// Rolling series of f64 samples with O(1) push and overwrite
///
/// # Example
/// ```
/// use auction_sim_core_rs::RingSeries;
///
/// let mut series = RingSeries::new(3);
/// series.push(1.0);
/// series.push(2.0);
/// series.push(3.0);
/// series.push(4.0); // overwrites 1.0
/// assert_eq!(series.to_vec(), vec![2.0, 3.0, 4.0]);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RingSeries {
    /// Pre-allocated slot storage
    slots: Vec<f64>,
    /// Next write position
    head: usize,
    /// Number of valid samples (≤ capacity)
    len: usize,
}

impl RingSeries {
    /// Create a series holding at most `capacity` samples
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RingSeries capacity must be positive");
        Self {
            slots: vec![0.0; capacity],
            head: 0,
            len: 0,
        }
    }

    /// Append a sample, overwriting the oldest when full
    pub fn push(&mut self, value: f64) {
        self.slots[self.head] = value;
        self.head = (self.head + 1) % self.slots.len();
        if self.len < self.slots.len() {
            self.len += 1;
        }
    }

    /// Number of valid samples currently held
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no samples have been pushed yet
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum number of samples the series can hold
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Most recently pushed sample, if any
    pub fn last(&self) -> Option<f64> {
        if self.len == 0 {
            return None;
        }
        let idx = (self.head + self.slots.len() - 1) % self.slots.len();
        Some(self.slots[idx])
    }

    /// Sum of the most recent `n` samples (fewer if the series is shorter)
    pub fn sum_last(&self, n: usize) -> f64 {
        self.iter_last(n).sum()
    }

    /// Mean of the most recent `n` samples, or 0.0 when the series is empty
    pub fn mean_last(&self, n: usize) -> f64 {
        let count = n.min(self.len);
        if count == 0 {
            return 0.0;
        }
        self.iter_last(count).sum::<f64>() / count as f64
    }

    /// Iterate over the most recent `n` samples, newest last
    fn iter_last(&self, n: usize) -> impl Iterator<Item = f64> + '_ {
        let count = n.min(self.len);
        let cap = self.slots.len();
        let start = (self.head + cap - count) % cap;
        (0..count).map(move |i| self.slots[(start + i) % cap])
    }

    /// Copy out all samples, oldest first
    pub fn to_vec(&self) -> Vec<f64> {
        self.iter_last(self.len).collect()
    }

    /// Discard all samples, keeping the allocation
    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_series_is_empty() {
        let series = RingSeries::new(4);
        assert!(series.is_empty());
        assert_eq!(series.len(), 0);
        assert_eq!(series.capacity(), 4);
        assert_eq!(series.last(), None);
    }

    #[test]
    #[should_panic(expected = "capacity must be positive")]
    fn test_zero_capacity_panics() {
        RingSeries::new(0);
    }

    #[test]
    fn test_push_below_capacity() {
        let mut series = RingSeries::new(4);
        series.push(1.0);
        series.push(2.0);
        assert_eq!(series.len(), 2);
        assert_eq!(series.last(), Some(2.0));
        assert_eq!(series.to_vec(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_overwrite_keeps_most_recent() {
        let mut series = RingSeries::new(3);
        for v in 1..=7 {
            series.push(v as f64);
        }
        assert_eq!(series.len(), 3);
        assert_eq!(series.to_vec(), vec![5.0, 6.0, 7.0]);
        assert_eq!(series.last(), Some(7.0));
    }

    #[test]
    fn test_sum_last_partial_window() {
        let mut series = RingSeries::new(5);
        series.push(1.0);
        series.push(2.0);
        series.push(3.0);
        // Window larger than the series sums everything available.
        assert_eq!(series.sum_last(10), 6.0);
        assert_eq!(series.sum_last(2), 5.0);
        assert_eq!(series.sum_last(0), 0.0);
    }

    #[test]
    fn test_sum_last_after_wraparound() {
        let mut series = RingSeries::new(3);
        for v in 1..=5 {
            series.push(v as f64);
        }
        // Holds [3, 4, 5] now.
        assert_eq!(series.sum_last(3), 12.0);
        assert_eq!(series.sum_last(2), 9.0);
    }

    #[test]
    fn test_mean_last() {
        let mut series = RingSeries::new(4);
        assert_eq!(series.mean_last(3), 0.0);
        series.push(2.0);
        series.push(4.0);
        assert_eq!(series.mean_last(2), 3.0);
        assert_eq!(series.mean_last(60), 3.0);
    }

    #[test]
    fn test_clear_resets_but_keeps_capacity() {
        let mut series = RingSeries::new(3);
        series.push(1.0);
        series.push(2.0);
        series.clear();
        assert!(series.is_empty());
        assert_eq!(series.capacity(), 3);
        series.push(9.0);
        assert_eq!(series.to_vec(), vec![9.0]);
    }
}
