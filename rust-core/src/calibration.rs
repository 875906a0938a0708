//! Startup calibration.
//!
//! Raw acceleration magnitude varies with device placement and gait strength,
//! so fixed thresholds either miss steps or count noise. At the start of each
//! tracking session the engine collects a short buffer of smoothed magnitudes
//! and derives thresholds from their distribution:
//!
//! - noise floor: 10th percentile of the buffer
//! - peak: `max(sensitivity, mean + 1.5 * std_dev)`
//! - valley: `2 * noise_floor`
//!
//! Calibration ends by elapsed time, measured on the sample clock from the
//! session start. The buffer keeps only the most recent `buffer_capacity`
//! values.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::{CalibrationReport, Thresholds};
use crate::window::SlidingWindow;

/// Parameters for the calibration phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Length of the calibration phase in milliseconds.
    pub duration_ms: u64,
    /// Maximum number of smoothed magnitudes kept for statistics.
    pub buffer_capacity: usize,
    /// Below this many samples the previous thresholds are kept.
    pub min_samples: usize,
    /// Percentile (0-1) of the sorted buffer used as noise floor.
    pub noise_floor_percentile: f64,
    /// Standard deviations above the mean for the adaptive peak threshold.
    pub peak_std_factor: f64,
    /// Valley threshold as a multiple of the noise floor.
    pub valley_noise_factor: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            duration_ms: 3000,
            buffer_capacity: 100,
            min_samples: 10,
            noise_floor_percentile: 0.1,
            peak_std_factor: 1.5,
            valley_noise_factor: 2.0,
        }
    }
}

/// Summary statistics over a calibration buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationStats {
    /// Arithmetic mean.
    pub mean: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    /// Percentile value used as noise floor.
    pub noise_floor: f64,
}

impl CalibrationStats {
    /// Compute statistics; `None` for an empty slice.
    pub fn from_values(values: &[f64], noise_floor_percentile: f64) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let rank = (sorted.len() as f64 * noise_floor_percentile.clamp(0.0, 1.0)).floor() as usize;
        let noise_floor = sorted[rank.min(sorted.len() - 1)];

        Some(Self {
            mean,
            std_dev: variance.sqrt(),
            noise_floor,
        })
    }
}

/// What happened to an observed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationProgress {
    /// The value was buffered; calibration continues.
    Collecting,
    /// The calibration window has elapsed; the value was not buffered.
    Elapsed,
}

/// Collects smoothed magnitudes and turns them into thresholds.
#[derive(Debug, Clone)]
pub struct CalibrationEstimator {
    config: CalibrationConfig,
    buffer: SlidingWindow<f64>,
    started_at_ms: Option<u64>,
}

impl CalibrationEstimator {
    /// Create an estimator.
    pub fn new(config: CalibrationConfig) -> Self {
        Self {
            buffer: SlidingWindow::new(config.buffer_capacity),
            config,
            started_at_ms: None,
        }
    }

    /// Start a fresh calibration. The clock starts at the next observed timestamp.
    pub fn begin(&mut self) {
        self.buffer.clear();
        self.started_at_ms = None;
    }

    /// Start a fresh calibration with the clock anchored at `now_ms`.
    pub fn begin_at(&mut self, now_ms: u64) {
        self.buffer.clear();
        self.started_at_ms = Some(now_ms);
    }

    /// Drop everything collected so far.
    pub fn abandon(&mut self) {
        if !self.buffer.is_empty() {
            debug!(collected = self.buffer.len(), "calibration abandoned");
        }
        self.begin();
    }

    /// Offer a smoothed magnitude observed at `timestamp_ms`.
    pub fn observe(&mut self, timestamp_ms: u64, smoothed: f64) -> CalibrationProgress {
        if self.is_elapsed(timestamp_ms) {
            return CalibrationProgress::Elapsed;
        }
        self.buffer.push(smoothed);
        CalibrationProgress::Collecting
    }

    /// Whether the calibration window has run out at `now_ms`.
    ///
    /// After [`begin`](Self::begin) the first call anchors the clock.
    pub fn is_elapsed(&mut self, now_ms: u64) -> bool {
        let started = *self.started_at_ms.get_or_insert(now_ms);
        now_ms.saturating_sub(started) >= self.config.duration_ms
    }

    /// Number of values collected so far.
    pub fn collected(&self) -> usize {
        self.buffer.len()
    }

    /// The active configuration.
    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Compute thresholds from the buffer and clear it.
    ///
    /// `current` is kept when fewer than `min_samples` values were collected.
    pub fn finish(&mut self, sensitivity: f64, current: Thresholds) -> CalibrationReport {
        let values = self.buffer.to_vec();
        self.begin();

        let stats = if values.len() >= self.config.min_samples.max(1) {
            CalibrationStats::from_values(&values, self.config.noise_floor_percentile)
        } else {
            None
        };

        let Some(stats) = stats else {
            warn!(
                collected = values.len(),
                required = self.config.min_samples,
                "too few calibration samples, keeping previous thresholds"
            );
            return CalibrationReport {
                sample_count: values.len(),
                mean: 0.0,
                std_dev: 0.0,
                thresholds: current,
                applied: false,
            };
        };

        let adaptive_peak = stats.mean + self.config.peak_std_factor * stats.std_dev;
        let thresholds = Thresholds::new(
            sensitivity.max(adaptive_peak),
            stats.noise_floor * self.config.valley_noise_factor,
            stats.noise_floor,
        );

        debug!(
            samples = values.len(),
            mean = stats.mean,
            std_dev = stats.std_dev,
            peak = thresholds.peak,
            valley = thresholds.valley,
            noise_floor = thresholds.noise_floor,
            "calibration statistics computed"
        );

        CalibrationReport {
            sample_count: values.len(),
            mean: stats.mean,
            std_dev: stats.std_dev,
            thresholds,
            applied: true,
        }
    }
}
