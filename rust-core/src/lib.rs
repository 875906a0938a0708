//! Stride Sensing Library
//!
//! An on-device step detection engine that turns a stream of timestamped
//! 3-axis acceleration samples into a running step count.
//!
//! # Design Philosophy
//!
//! - **Adaptive, not fixed**: A short calibration phase at the start of every
//!   session derives detection thresholds from the user's own motion, and
//!   thresholds keep drifting toward the observed gait afterwards.
//! - **Cycle counting**: A step is one full peak-then-valley cycle of the
//!   smoothed acceleration magnitude, never a single crossing.
//! - **Silent rejection**: Malformed samples and implausible peaks are dropped
//!   without errors; the per-sample path never fails.
//! - **Bounded resources**: Every buffer has a fixed capacity. O(window) work
//!   per sample, no allocation on the hot path.
//!
//! # Example
//!
//! ```
//! use stride_sensing::{Sample, SensorAccess, StepCounter};
//!
//! let mut counter = StepCounter::with_defaults();
//! counter.on_step(|count| println!("step {count}"));
//!
//! assert!(counter.start(SensorAccess::Granted));
//! for i in 0..200u64 {
//!     counter.feed_sample(&Sample::new(i * 20, 0.0, 0.0, 0.05));
//! }
//! assert!(counter.is_tracking());
//! let steps = counter.stop();
//! assert_eq!(steps, 0);
//! ```

pub mod calibration;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod permission;
pub mod pipeline;
pub mod signal;
pub mod step_detection;
pub mod sync;
pub mod types;
pub mod validation;
pub mod window;

#[cfg(test)]
mod stress_tests;

// Re-export commonly used types
pub use config::{PipelineConfig, DEFAULT_SENSITIVITY};
pub use error::{ConfigError, PermissionError, StartError};
pub use metrics::{StepMetrics, StepSummary};
pub use permission::{negotiate_access, MotionPermission, PermissionState, SensorAccess};
pub use pipeline::StepCounter;
pub use sync::{StepSyncCursor, SyncBatch};
pub use types::{CalibrationReport, EngineEvent, EngineState, Sample, StepEvent, Thresholds};
