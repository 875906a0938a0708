//! Peak/valley step detection.
//!
//! Turns the smoothed magnitude stream into step boundaries with a two-state
//! machine:
//!
//! ```text
//! AwaitingPeak --(validated peak)--> AwaitingValley --(valley)--> AwaitingPeak
//! ```
//!
//! A peak or valley is the centre of a look-around window that is >= (or <=)
//! every other element and crosses the corresponding threshold. Only the
//! valley transition counts a step: one full peak-then-valley cycle is one
//! physical step. After each counted step the thresholds drift toward the
//! extremes of the current window so detection follows the user's gait.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::types::Thresholds;
use crate::validation::{PeakVerdict, StepValidator, ValidatorConfig};
use crate::window::SlidingWindow;

/// Configuration for step detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepDetectorConfig {
    /// Size of the look-around window used for local extremum checks.
    pub peak_window_size: usize,
    /// Minimum time between counted steps in milliseconds (debounce).
    pub time_threshold_ms: u64,
    /// Weight of the latest window extremes in the threshold update (0-1).
    pub adaptation_rate: f64,
    /// Peak cadence and rhythm validation.
    pub validator: ValidatorConfig,
}

impl Default for StepDetectorConfig {
    fn default() -> Self {
        Self {
            peak_window_size: 10,    // 200ms at 50Hz
            time_threshold_ms: 250,  // Max ~4 steps/sec (running)
            adaptation_rate: 0.2,
            validator: ValidatorConfig::default(),
        }
    }
}

/// Which half of the step cycle the detector is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepPhase {
    /// Waiting for a local maximum above the peak threshold.
    #[default]
    AwaitingPeak,
    /// A peak was accepted; waiting for a local minimum below the valley threshold.
    AwaitingValley,
}

/// What a single smoothed value did to the state machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Detection {
    /// Nothing happened (warm-up, no extremum, or threshold not crossed).
    None,
    /// A peak was found and accepted; the cycle is open.
    PeakAccepted,
    /// A peak was found but the validator turned it down.
    PeakRejected,
    /// A valley closed the cycle inside the debounce interval; not counted.
    Debounced,
    /// A valley closed the cycle and a step was counted.
    Step {
        /// Timestamp of the sample that closed the cycle.
        timestamp_ms: u64,
    },
}

/// Peak/valley state machine with step validation and debounce.
#[derive(Debug, Clone)]
pub struct StepDetector {
    config: StepDetectorConfig,
    window: SlidingWindow<f64>,
    phase: StepPhase,
    validator: StepValidator,
    last_step_ms: Option<u64>,
}

impl StepDetector {
    /// Create a new step detector with the given configuration.
    pub fn new(config: StepDetectorConfig) -> Self {
        Self {
            window: SlidingWindow::new(config.peak_window_size),
            validator: StepValidator::new(config.validator.clone()),
            config,
            phase: StepPhase::AwaitingPeak,
            last_step_ms: None,
        }
    }

    /// Feed one smoothed magnitude observed at `timestamp_ms`.
    ///
    /// `thresholds` are read for the extremum checks and nudged after a
    /// counted step.
    pub fn process(
        &mut self,
        timestamp_ms: u64,
        smoothed: f64,
        thresholds: &mut Thresholds,
    ) -> Detection {
        self.window.push(smoothed);

        // Warm-up: the centre is only meaningful with a full window.
        if !self.window.is_full() {
            return Detection::None;
        }

        let Some(mid) = self.window.middle() else {
            return Detection::None;
        };

        match self.phase {
            StepPhase::AwaitingPeak => self.check_peak(timestamp_ms, mid, thresholds),
            StepPhase::AwaitingValley => self.check_valley(timestamp_ms, mid, thresholds),
        }
    }

    /// Current half of the step cycle.
    pub fn phase(&self) -> StepPhase {
        self.phase
    }

    /// True between an accepted peak and the valley that closes it.
    pub fn in_step(&self) -> bool {
        self.phase == StepPhase::AwaitingValley
    }

    /// Timestamp of the last counted step.
    pub fn last_step_ms(&self) -> Option<u64> {
        self.last_step_ms
    }

    /// The peak validator, for diagnostics.
    pub fn validator(&self) -> &StepValidator {
        &self.validator
    }

    /// Number of smoothed values currently in the look-around window.
    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Reset the detector state: window, open cycle, debounce and rhythm history.
    pub fn reset(&mut self) {
        self.window.clear();
        self.phase = StepPhase::AwaitingPeak;
        self.validator.reset();
        self.last_step_ms = None;
    }

    // =========================================================================
    // PRIVATE METHODS
    // =========================================================================

    fn check_peak(&mut self, timestamp_ms: u64, mid: f64, thresholds: &Thresholds) -> Detection {
        let is_peak = self.window.middle_is_local_max()
            && mid > thresholds.peak
            && mid > thresholds.noise_floor;
        if !is_peak {
            return Detection::None;
        }

        match self.validator.validate(timestamp_ms) {
            PeakVerdict::Rejected(reason) => {
                trace!(timestamp_ms, value = mid, ?reason, "spurious peak");
                Detection::PeakRejected
            }
            PeakVerdict::Accepted | PeakVerdict::NewEpisode => {
                self.phase = StepPhase::AwaitingValley;
                Detection::PeakAccepted
            }
        }
    }

    fn check_valley(
        &mut self,
        timestamp_ms: u64,
        mid: f64,
        thresholds: &mut Thresholds,
    ) -> Detection {
        let is_valley = self.window.middle_is_local_min() && mid < thresholds.valley;
        if !is_valley {
            return Detection::None;
        }

        self.phase = StepPhase::AwaitingPeak;

        let debounced = self.last_step_ms.is_some_and(|last| {
            timestamp_ms.saturating_sub(last) < self.config.time_threshold_ms
        });
        if debounced {
            trace!(timestamp_ms, "valley inside debounce interval");
            return Detection::Debounced;
        }

        self.last_step_ms = Some(timestamp_ms);

        if let (Some(recent_max), Some(recent_min)) = (self.window.max(), self.window.min()) {
            thresholds.adapt(recent_max, recent_min, self.config.adaptation_rate);
        }

        debug!(
            timestamp_ms,
            peak = thresholds.peak,
            valley = thresholds.valley,
            "step cycle completed"
        );
        Detection::Step { timestamp_ms }
    }
}

impl Default for StepDetector {
    fn default() -> Self {
        Self::new(StepDetectorConfig::default())
    }
}

// ============================================================================
// TESTS
// ============================================================================
