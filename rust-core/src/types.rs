//! Core data types for the step detection engine.
//!
//! This module defines the values that flow through the pipeline: raw
//! samples in, thresholds in the middle, step and calibration events out.
//!
//! Design principle: Types should make intent obvious. If a concept exists,
//! it gets a type. Never pass raw tuples or untyped collections across boundaries.

use serde::{Deserialize, Serialize};

/// Lowest peak threshold the engine will ever hold.
pub const MIN_PEAK_THRESHOLD: f64 = 1e-3;

/// A single raw acceleration sample.
///
/// Axes are optional because platform motion APIs may deliver partial
/// readings. A sample missing any axis is dropped before it reaches a window.
///
/// Serialized as `{"x": .., "y": .., "z": .., "t": ..}` with `null` allowed
/// for any axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Acceleration along x in m/s².
    pub x: Option<f64>,
    /// Acceleration along y in m/s².
    pub y: Option<f64>,
    /// Acceleration along z in m/s².
    pub z: Option<f64>,
    /// Monotonic timestamp in milliseconds. Required for temporal ordering.
    #[serde(rename = "t")]
    pub timestamp_ms: u64,
}

impl Sample {
    /// Creates a complete sample.
    ///
    /// Assumptions:
    /// - timestamp_ms must be monotonically increasing within a sequence
    pub fn new(timestamp_ms: u64, x: f64, y: f64, z: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            z: Some(z),
            timestamp_ms,
        }
    }

    /// Creates a sample whose axes may be absent.
    pub fn with_axes(timestamp_ms: u64, x: Option<f64>, y: Option<f64>, z: Option<f64>) -> Self {
        Self { x, y, z, timestamp_ms }
    }

    /// Creates a sample carrying a precomputed magnitude on the z axis.
    ///
    /// Handy for replaying magnitude traces: the Euclidean norm of
    /// `[0, 0, m]` is `|m|`.
    pub fn from_magnitude(timestamp_ms: u64, magnitude: f64) -> Self {
        Self::new(timestamp_ms, 0.0, 0.0, magnitude)
    }

    /// Euclidean norm of the acceleration vector.
    ///
    /// Returns `None` if any axis is absent or the norm is not finite.
    pub fn magnitude(&self) -> Option<f64> {
        let (x, y, z) = (self.x?, self.y?, self.z?);
        let magnitude = (x * x + y * y + z * z).sqrt();
        magnitude.is_finite().then_some(magnitude)
    }

    /// Whether the sample can contribute to the pipeline.
    pub fn is_complete(&self) -> bool {
        self.magnitude().is_some()
    }
}

/// Lifecycle state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EngineState {
    /// Not tracking. Samples are ignored.
    #[default]
    Idle,
    /// Collecting ambient motion to derive thresholds. No steps are emitted.
    Calibrating,
    /// Detecting steps.
    Tracking,
}

/// Detection thresholds for the peak/valley state machine.
///
/// Invariant after [`Thresholds::normalized`]: `peak > valley >= noise_floor >= 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// A local maximum must exceed this to start a step cycle.
    pub peak: f64,
    /// A local minimum must fall below this to complete a step cycle.
    pub valley: f64,
    /// Ambient signal level; peaks must also exceed it.
    pub noise_floor: f64,
}

impl Thresholds {
    /// Default valley threshold before any calibration.
    pub const DEFAULT_VALLEY: f64 = 0.2;
    /// Default noise floor before any calibration.
    pub const DEFAULT_NOISE_FLOOR: f64 = 0.1;

    /// Creates thresholds and enforces the ordering invariant.
    pub fn new(peak: f64, valley: f64, noise_floor: f64) -> Self {
        Self {
            peak,
            valley,
            noise_floor,
        }
        .normalized()
    }

    /// Pre-calibration thresholds for a given sensitivity.
    pub fn initial(sensitivity: f64) -> Self {
        Self::new(sensitivity, Self::DEFAULT_VALLEY, Self::DEFAULT_NOISE_FLOOR)
    }

    /// Restores `peak > valley >= noise_floor >= 0`.
    ///
    /// The peak is never lowered (except to replace a NaN): it is the value
    /// the user controls through sensitivity. On conflict the valley drops
    /// to half the peak and the noise floor follows it down.
    pub fn normalized(mut self) -> Self {
        if self.noise_floor.is_nan() {
            self.noise_floor = 0.0;
        }
        if self.valley.is_nan() {
            self.valley = self.noise_floor;
        }
        if self.peak.is_nan() {
            self.peak = MIN_PEAK_THRESHOLD;
        }

        self.noise_floor = self.noise_floor.max(0.0);
        self.valley = self.valley.max(self.noise_floor);
        self.peak = self.peak.max(MIN_PEAK_THRESHOLD);

        if self.peak <= self.valley {
            self.valley = self.peak / 2.0;
            self.noise_floor = self.noise_floor.min(self.valley);
        }
        self
    }

    /// Exponential moving-average nudge toward the recently observed extremes.
    ///
    /// `rate` is the weight of the new observation (0.2 by default).
    pub fn adapt(&mut self, recent_max: f64, recent_min: f64, rate: f64) {
        self.peak = (1.0 - rate) * self.peak + rate * recent_max;
        self.valley = (1.0 - rate) * self.valley + rate * recent_min;
        *self = self.normalized();
    }

    /// Whether the ordering invariant currently holds.
    pub fn is_ordered(&self) -> bool {
        self.peak > self.valley && self.valley >= self.noise_floor && self.noise_floor >= 0.0
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::initial(crate::config::DEFAULT_SENSITIVITY)
    }
}

// ============================================================================
// OUTPUT TYPES
// ============================================================================

/// A counted step. The sole externally visible output of step tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepEvent {
    /// Running step count after this step.
    pub count: u64,
    /// Timestamp of the sample that completed the step cycle.
    pub timestamp_ms: u64,
}

impl StepEvent {
    /// Creates a step event.
    pub fn new(count: u64, timestamp_ms: u64) -> Self {
        Self {
            count,
            timestamp_ms,
        }
    }
}

/// Outcome of a calibration phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    /// Number of smoothed magnitudes the statistics were computed over.
    pub sample_count: usize,
    /// Mean of the calibration buffer (0 when not applied).
    pub mean: f64,
    /// Population standard deviation of the buffer (0 when not applied).
    pub std_dev: f64,
    /// Thresholds in force after calibration.
    pub thresholds: Thresholds,
    /// False when too few samples were collected and the previous
    /// thresholds were kept.
    pub applied: bool,
}

/// Something the engine reports back for a single sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum EngineEvent {
    /// Calibration finished and tracking began.
    CalibrationComplete(CalibrationReport),
    /// A step was counted.
    Step(StepEvent),
}

impl EngineEvent {
    /// The step carried by this event, if any.
    pub fn as_step(&self) -> Option<StepEvent> {
        match self {
            EngineEvent::Step(step) => Some(*step),
            EngineEvent::CalibrationComplete(_) => None,
        }
    }
}
