//! Engine configuration.
//!
//! Each stage owns its config struct next to its implementation;
//! [`PipelineConfig`] bundles them with the user-facing sensitivity. Values
//! can come from code (builders), the environment or a JSON document, and
//! every path ends in [`PipelineConfig::validate`].

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationConfig;
use crate::error::ConfigError;
use crate::signal::FilterConfig;
use crate::step_detection::StepDetectorConfig;

/// Default peak threshold before calibration, in m/s².
pub const DEFAULT_SENSITIVITY: f64 = 1.2;

/// Environment variable overriding [`PipelineConfig::sensitivity`].
pub const ENV_SENSITIVITY: &str = "STRIDE_SENSITIVITY";
/// Environment variable overriding the step debounce interval.
pub const ENV_TIME_THRESHOLD_MS: &str = "STRIDE_TIME_THRESHOLD_MS";
/// Environment variable overriding the calibration duration.
pub const ENV_CALIBRATION_TIME_MS: &str = "STRIDE_CALIBRATION_TIME_MS";
/// Environment variable overriding the smoothing window size.
pub const ENV_SMOOTHING_WINDOW: &str = "STRIDE_SMOOTHING_WINDOW";
/// Environment variable overriding the look-around window size.
pub const ENV_LOOK_AROUND_WINDOW: &str = "STRIDE_LOOK_AROUND_WINDOW";

/// Configuration for the complete step counting pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Minimum peak threshold in m/s². Lower counts gentler steps.
    pub sensitivity: f64,
    /// Magnitude smoothing.
    pub filter: FilterConfig,
    /// Startup calibration.
    pub calibration: CalibrationConfig,
    /// Peak/valley detection and validation.
    pub detector: StepDetectorConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sensitivity: DEFAULT_SENSITIVITY,
            filter: FilterConfig::default(),
            calibration: CalibrationConfig::default(),
            detector: StepDetectorConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Set the sensitivity (initial peak threshold).
    #[must_use]
    pub fn with_sensitivity(mut self, sensitivity: f64) -> Self {
        self.sensitivity = sensitivity;
        self
    }

    /// Set the minimum time between counted steps.
    #[must_use]
    pub fn with_time_threshold_ms(mut self, time_threshold_ms: u64) -> Self {
        self.detector.time_threshold_ms = time_threshold_ms;
        self
    }

    /// Set how long calibration collects samples after `start`.
    #[must_use]
    pub fn with_calibration_time_ms(mut self, calibration_time_ms: u64) -> Self {
        self.calibration.duration_ms = calibration_time_ms;
        self
    }

    /// Load configuration from `STRIDE_*` environment variables over the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but unparseable, or if the
    /// resulting configuration fails [`validate`](Self::validate).
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(sensitivity) = env_parse(ENV_SENSITIVITY)? {
            config.sensitivity = sensitivity;
        }
        if let Some(ms) = env_parse(ENV_TIME_THRESHOLD_MS)? {
            config.detector.time_threshold_ms = ms;
        }
        if let Some(ms) = env_parse(ENV_CALIBRATION_TIME_MS)? {
            config.calibration.duration_ms = ms;
        }
        if let Some(size) = env_parse(ENV_SMOOTHING_WINDOW)? {
            config.filter.smoothing_window_size = size;
        }
        if let Some(size) = env_parse(ENV_LOOK_AROUND_WINDOW)? {
            config.detector.peak_window_size = size;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed JSON or an invalid configuration.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the engine can run with these values.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.sensitivity.is_finite() && self.sensitivity > 0.0) {
            return Err(ConfigError::invalid(
                "sensitivity",
                format!("must be a positive number, got {}", self.sensitivity),
            ));
        }
        if self.filter.smoothing_window_size == 0 {
            return Err(ConfigError::invalid(
                "filter.smoothing_window_size",
                "must be at least 1",
            ));
        }
        if self.detector.peak_window_size == 0 {
            return Err(ConfigError::invalid(
                "detector.peak_window_size",
                "must be at least 1",
            ));
        }
        if self.calibration.buffer_capacity == 0 {
            return Err(ConfigError::invalid(
                "calibration.buffer_capacity",
                "must be at least 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.calibration.noise_floor_percentile) {
            return Err(ConfigError::invalid(
                "calibration.noise_floor_percentile",
                "must be within [0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&self.detector.adaptation_rate) {
            return Err(ConfigError::invalid(
                "detector.adaptation_rate",
                "must be within [0, 1]",
            ));
        }

        let validator = &self.detector.validator;
        if validator.min_step_interval_ms > validator.max_step_interval_ms {
            return Err(ConfigError::invalid(
                "detector.validator.min_step_interval_ms",
                format!(
                    "{} exceeds max_step_interval_ms {}",
                    validator.min_step_interval_ms, validator.max_step_interval_ms
                ),
            ));
        }
        if validator.peak_history_size == 0 {
            return Err(ConfigError::invalid(
                "detector.validator.peak_history_size",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

fn env_parse<T: FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value: raw }),
        Err(_) => Ok(None),
    }
}
