//! Step validation.
//!
//! Rejects peak candidates whose timing cannot belong to a human gait:
//! - too soon after the previous accepted peak (double counting)
//! - inconsistent with the recent step rhythm
//!
//! A gap longer than the maximum step interval is not an error; it starts a
//! new gait episode and the rhythm history is discarded.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::window::SlidingWindow;

/// Parameters for peak validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Minimum time between accepted peaks in milliseconds.
    pub min_step_interval_ms: u64,
    /// Gaps longer than this start a new gait episode.
    pub max_step_interval_ms: u64,
    /// Number of recorded peaks required before the rhythm check applies.
    pub pattern_min_peaks: usize,
    /// Allowed relative deviation from the average interval (0.5 = 50%).
    pub pattern_tolerance: f64,
    /// Number of accepted peak timestamps remembered.
    pub peak_history_size: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            min_step_interval_ms: 250,  // Max ~4 steps/sec (running)
            max_step_interval_ms: 2000, // Min ~0.5 steps/sec (slow shuffle)
            pattern_min_peaks: 3,
            pattern_tolerance: 0.5,
            peak_history_size: 5,
        }
    }
}

/// Why a peak candidate was turned down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Closer to the previous peak than any human cadence allows.
    TooSoon {
        /// Milliseconds since the previous accepted peak.
        interval_ms: u64,
    },
    /// Interval deviates too far from the recent rhythm.
    OffPattern {
        /// Milliseconds since the previous accepted peak.
        interval_ms: u64,
        /// Average of the recorded intervals.
        expected_ms: u64,
    },
}

/// Result of validating one peak candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeakVerdict {
    /// Accepted and recorded.
    Accepted,
    /// Accepted as the first peak of a new gait episode.
    NewEpisode,
    /// Rejected; the state machine keeps waiting for a peak.
    Rejected(Rejection),
}

impl PeakVerdict {
    /// Whether the peak may start a step cycle.
    pub fn is_accepted(&self) -> bool {
        !matches!(self, PeakVerdict::Rejected(_))
    }
}

/// Cadence and rhythm validator over recent peak timestamps.
#[derive(Debug, Clone)]
pub struct StepValidator {
    config: ValidatorConfig,
    peaks: SlidingWindow<u64>,
}

impl StepValidator {
    /// Create a validator.
    pub fn new(config: ValidatorConfig) -> Self {
        Self {
            peaks: SlidingWindow::new(config.peak_history_size),
            config,
        }
    }

    /// Validate a peak observed at `timestamp_ms`, recording it when accepted.
    pub fn validate(&mut self, timestamp_ms: u64) -> PeakVerdict {
        let Some(last_peak) = self.peaks.newest() else {
            self.record(timestamp_ms);
            return PeakVerdict::NewEpisode;
        };

        let interval_ms = timestamp_ms.saturating_sub(last_peak);

        if interval_ms < self.config.min_step_interval_ms {
            trace!(interval_ms, "peak rejected: too soon after previous peak");
            return PeakVerdict::Rejected(Rejection::TooSoon { interval_ms });
        }

        if interval_ms > self.config.max_step_interval_ms {
            debug!(interval_ms, "long gap between peaks, starting new gait episode");
            self.peaks.clear();
            self.record(timestamp_ms);
            return PeakVerdict::NewEpisode;
        }

        if let Some(expected_ms) = self.expected_interval() {
            let deviation = (interval_ms as f64 - expected_ms).abs();
            if deviation > expected_ms * self.config.pattern_tolerance {
                trace!(interval_ms, expected_ms, "peak rejected: off rhythm");
                return PeakVerdict::Rejected(Rejection::OffPattern {
                    interval_ms,
                    expected_ms: expected_ms.round() as u64,
                });
            }
        }

        self.record(timestamp_ms);
        PeakVerdict::Accepted
    }

    /// Average interval between recorded peaks, once enough are recorded.
    pub fn expected_interval(&self) -> Option<f64> {
        if self.peaks.len() < self.config.pattern_min_peaks.max(2) {
            return None;
        }
        let (total, count) = self
            .peaks
            .intervals()
            .fold((0_u64, 0_u32), |(total, count), interval| (total + interval, count + 1));
        Some(total as f64 / f64::from(count))
    }

    /// Timestamp of the most recent accepted peak.
    pub fn last_peak_ms(&self) -> Option<u64> {
        self.peaks.newest()
    }

    /// Number of peaks currently remembered.
    pub fn history_len(&self) -> usize {
        self.peaks.len()
    }

    /// Forget the rhythm history.
    pub fn reset(&mut self) {
        self.peaks.clear();
    }

    fn record(&mut self, timestamp_ms: u64) {
        self.peaks.push(timestamp_ms);
    }
}

impl Default for StepValidator {
    fn default() -> Self {
        Self::new(ValidatorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_peak_is_accepted() {
        let mut validator = StepValidator::default();
        assert_eq!(validator.validate(10_000), PeakVerdict::NewEpisode);
        assert_eq!(validator.last_peak_ms(), Some(10_000));
    }

    #[test]
    fn test_rejects_peaks_too_close_together() {
        let mut validator = StepValidator::default();
        validator.validate(1000);

        let verdict = validator.validate(1100);
        assert_eq!(
            verdict,
            PeakVerdict::Rejected(Rejection::TooSoon { interval_ms: 100 })
        );
        assert!(!verdict.is_accepted());
        // The rejected peak is not recorded.
        assert_eq!(validator.last_peak_ms(), Some(1000));
    }

    #[test]
    fn test_min_interval_boundary_is_accepted() {
        let mut validator = StepValidator::default();
        validator.validate(1000);
        assert_eq!(validator.validate(1250), PeakVerdict::Accepted);
    }

    #[test]
    fn test_long_gap_starts_new_episode() {
        let mut validator = StepValidator::default();
        for t in [0, 500, 1000, 1500] {
            validator.validate(t);
        }
        assert_eq!(validator.history_len(), 4);

        assert_eq!(validator.validate(5000), PeakVerdict::NewEpisode);
        assert_eq!(validator.history_len(), 1);
    }

    #[test]
    fn test_pattern_check_needs_three_peaks() {
        let mut validator = StepValidator::default();
        validator.validate(0);
        validator.validate(500);
        assert!(validator.expected_interval().is_none());

        // Wildly different interval is fine with only two recorded peaks.
        assert_eq!(validator.validate(1800), PeakVerdict::Accepted);
        assert!(validator.expected_interval().is_some());
    }

    #[test]
    fn test_expected_interval_is_mean_of_uneven_gaps() {
        let mut validator = StepValidator::default();
        for t in [0, 500, 1800, 2700] {
            validator.validate(t);
        }
        // Gaps of 500, 1300 and 900 ms.
        assert_eq!(validator.expected_interval(), Some(900.0));
    }

    #[test]
    fn test_rejects_off_rhythm_peak() {
        let mut validator = StepValidator::default();
        for t in [0, 500, 1000] {
            validator.validate(t);
        }
        assert_eq!(validator.expected_interval(), Some(500.0));

        // 1300ms is far off the 500ms rhythm.
        assert_eq!(
            validator.validate(2300),
            PeakVerdict::Rejected(Rejection::OffPattern {
                interval_ms: 1300,
                expected_ms: 500,
            })
        );
        // Within 50% is accepted.
        assert_eq!(validator.validate(1700), PeakVerdict::Accepted);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut validator = StepValidator::default();
        for i in 0..20 {
            validator.validate(i * 500);
        }
        assert_eq!(validator.history_len(), 5);
    }

    #[test]
    fn test_rejected_peak_does_not_shift_rhythm() {
        let mut validator = StepValidator::default();
        for t in [0, 800, 1600, 2400] {
            validator.validate(t);
        }

        assert!(!validator.validate(2700).is_accepted());
        // Measured from the last accepted peak (2400), not the rejected one.
        assert_eq!(validator.validate(3200), PeakVerdict::Accepted);
        assert_eq!(validator.expected_interval(), Some(800.0));
    }

    #[test]
    fn test_reset_clears_history() {
        let mut validator = StepValidator::default();
        validator.validate(100);
        validator.reset();
        assert_eq!(validator.history_len(), 0);
        assert_eq!(validator.validate(150), PeakVerdict::NewEpisode);
    }
}
