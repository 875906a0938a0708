//! Magnitude extraction and smoothing.
//!
//! This module provides the low-level sensor signal processing:
//! - Acceleration magnitude extraction (orientation-free motion signal)
//! - Moving-average smoothing to suppress single-sample sensor jitter
//! - Malformed sample rejection
//!
//! Design note: All filters use incremental updates (O(1) per sample, bounded
//! by the window size). No allocations in hot paths.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::types::Sample;
use crate::window::SlidingWindow;

/// Parameters for signal filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Number of raw magnitudes averaged by the smoothing filter.
    /// Typical: 5 (100ms at 50Hz). 1 disables smoothing.
    pub smoothing_window_size: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            smoothing_window_size: 5,
        }
    }
}

/// Moving-average FIR low-pass filter over raw magnitudes.
#[derive(Debug, Clone)]
pub struct SmoothingFilter {
    window: SlidingWindow<f64>,
}

impl SmoothingFilter {
    /// Create a filter averaging the last `size` magnitudes.
    pub fn new(size: usize) -> Self {
        Self {
            window: SlidingWindow::new(size),
        }
    }

    /// Push a magnitude and return the mean of the current window.
    pub fn update(&mut self, magnitude: f64) -> f64 {
        self.window.push(magnitude);
        self.window.mean().unwrap_or(magnitude)
    }

    /// Number of magnitudes currently averaged.
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// True before the first magnitude arrives.
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Forget all history.
    pub fn reset(&mut self) {
        self.window.clear();
    }
}

/// A sample after magnitude extraction and smoothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessedSample {
    /// Original timestamp.
    pub timestamp_ms: u64,
    /// Raw magnitude in m/s².
    pub magnitude: f64,
    /// Moving-average magnitude in m/s².
    pub smoothed: f64,
}

/// Signal front end: magnitude extraction followed by smoothing.
///
/// This is the hot-path component. Must be O(1) per sample with minimal overhead.
#[derive(Debug, Clone)]
pub struct SignalProcessor {
    filter: SmoothingFilter,
    config: FilterConfig,
    processed_count: u64,
    dropped_count: u64,
}

impl SignalProcessor {
    /// Create a new signal processor with default configuration.
    pub fn new() -> Self {
        Self::with_config(FilterConfig::default())
    }

    /// Create a new signal processor with custom configuration.
    pub fn with_config(config: FilterConfig) -> Self {
        Self {
            filter: SmoothingFilter::new(config.smoothing_window_size),
            config,
            processed_count: 0,
            dropped_count: 0,
        }
    }

    /// Process a single raw sample.
    ///
    /// Returns `None` for a malformed sample (missing or non-finite axis).
    /// Such a sample touches no window.
    pub fn process_sample(&mut self, sample: &Sample) -> Option<ProcessedSample> {
        let Some(magnitude) = sample.magnitude() else {
            self.dropped_count += 1;
            trace!(
                timestamp_ms = sample.timestamp_ms,
                dropped = self.dropped_count,
                "dropping malformed sample"
            );
            return None;
        };

        self.processed_count += 1;
        Some(ProcessedSample {
            timestamp_ms: sample.timestamp_ms,
            magnitude,
            smoothed: self.filter.update(magnitude),
        })
    }

    /// Number of samples that reached the smoothing filter.
    pub fn processed_count(&self) -> u64 {
        self.processed_count
    }

    /// Number of malformed samples dropped.
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count
    }

    /// The active configuration.
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Clear the smoothing history. Counters are kept for diagnostics.
    pub fn reset(&mut self) {
        self.filter.reset();
    }
}

impl Default for SignalProcessor {
    fn default() -> Self {
        Self::new()
    }
}
