//! Fixed-capacity FIFO window.
//!
//! Every buffer in the engine (smoothing, look-around, peak history,
//! calibration) is a `SlidingWindow`. Memory is allocated once at
//! construction; pushes never grow the buffer past its capacity.

use std::collections::VecDeque;

/// A fixed-capacity ordered sequence of the most recent values.
///
/// Index 0 is the oldest element. Pushing onto a full window evicts it.
#[derive(Debug, Clone, PartialEq)]
pub struct SlidingWindow<T> {
    values: VecDeque<T>,
    capacity: usize,
}

impl<T: Copy> SlidingWindow<T> {
    /// Create an empty window. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a value, returning the evicted oldest value if the window was full.
    pub fn push(&mut self, value: T) -> Option<T> {
        let evicted = if self.values.len() == self.capacity {
            self.values.pop_front()
        } else {
            None
        };
        self.values.push_back(value);
        evicted
    }

    /// Maximum number of values held.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of values currently held.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when no values are held.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True once the window holds `capacity` values.
    pub fn is_full(&self) -> bool {
        self.values.len() == self.capacity
    }

    /// Value at `index` (0 = oldest).
    pub fn get(&self, index: usize) -> Option<T> {
        self.values.get(index).copied()
    }

    /// Most recently pushed value.
    pub fn newest(&self) -> Option<T> {
        self.values.back().copied()
    }

    /// Oldest value still held.
    pub fn oldest(&self) -> Option<T> {
        self.values.front().copied()
    }

    /// Index of the middle element (`len / 2`).
    pub fn middle_index(&self) -> usize {
        self.values.len() / 2
    }

    /// The middle element, if any.
    pub fn middle(&self) -> Option<T> {
        self.get(self.middle_index())
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.values.iter().copied()
    }

    /// Drop all values, keeping the capacity.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Copy the contents out, oldest first.
    pub fn to_vec(&self) -> Vec<T> {
        self.values.iter().copied().collect()
    }
}

impl SlidingWindow<f64> {
    /// Arithmetic mean, or `None` when empty.
    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
    }

    /// Largest value, or `None` when empty.
    pub fn max(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::max)
    }

    /// Smallest value, or `None` when empty.
    pub fn min(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::min)
    }

    /// Whether the middle element is >= every other element.
    ///
    /// Ties count, so a flat plateau registers as a single maximum.
    pub fn middle_is_local_max(&self) -> bool {
        let mid = self.middle_index();
        match self.values.get(mid) {
            Some(&center) => self
                .values
                .iter()
                .enumerate()
                .all(|(i, &v)| i == mid || v <= center),
            None => false,
        }
    }

    /// Whether the middle element is <= every other element.
    pub fn middle_is_local_min(&self) -> bool {
        let mid = self.middle_index();
        match self.values.get(mid) {
            Some(&center) => self
                .values
                .iter()
                .enumerate()
                .all(|(i, &v)| i == mid || v >= center),
            None => false,
        }
    }
}

impl SlidingWindow<u64> {
    /// Differences between consecutive values, oldest first.
    pub fn intervals(&self) -> impl Iterator<Item = u64> + '_ {
        self.values
            .iter()
            .zip(self.values.iter().skip(1))
            .map(|(a, b)| b.saturating_sub(*a))
    }
}
