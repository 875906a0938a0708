//! Error types.
//!
//! The per-sample path has no error type: malformed samples are dropped and
//! spurious peaks are rejected silently. Errors only surface at the edges of
//! the engine (starting a session, loading configuration, asking the platform
//! for sensor access).

use thiserror::Error;

/// Why a tracking session could not be started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StartError {
    /// The device has no usable motion sensor.
    #[error("motion sensor is not available on this device")]
    SensorUnavailable,
    /// The user or platform refused access to the motion sensor.
    #[error("permission to read the motion sensor was denied")]
    PermissionDenied,
}

/// Invalid or unreadable engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field holds a value the engine cannot run with.
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Human-readable constraint that was violated.
        reason: String,
    },
    /// An environment variable is set but does not parse.
    #[error("environment variable {var}={value:?} could not be parsed")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// Raw value found in the environment.
        value: String,
    },
    /// A JSON configuration document is malformed.
    #[error("malformed configuration document: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Failure while asking the platform for motion-sensor permission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionError {
    /// The prompt could not be shown or was dismissed.
    #[error("permission prompt failed: {0}")]
    PromptFailed(String),
    /// The platform API reported an error.
    #[error("platform permission API error: {0}")]
    Platform(String),
}
