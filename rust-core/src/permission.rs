//! Motion sensor access negotiation.
//!
//! Platforms differ: some expose the accelerometer freely, some require an
//! explicit user prompt, some have no sensor at all. The engine only needs the
//! outcome, a [`SensorAccess`], which [`negotiate_access`] derives from an
//! injected [`MotionPermission`] implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PermissionError, StartError};

/// Outcome of sensor negotiation, handed to `StepCounter::start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorAccess {
    /// Samples will flow.
    Granted,
    /// No motion sensor on this device.
    Unavailable,
    /// The user or platform refused access.
    Denied,
}

impl SensorAccess {
    /// Map to the error `try_start` reports, if any.
    pub fn into_result(self) -> Result<(), StartError> {
        match self {
            SensorAccess::Granted => Ok(()),
            SensorAccess::Unavailable => Err(StartError::SensorUnavailable),
            SensorAccess::Denied => Err(StartError::PermissionDenied),
        }
    }
}

/// Answer to an explicit permission prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionState {
    /// The user allowed motion access.
    Granted,
    /// The user refused motion access.
    Denied,
}

/// Platform capability for motion-sensor access.
#[async_trait]
pub trait MotionPermission: Send + Sync {
    /// Whether the device has a motion sensor at all.
    async fn is_available(&self) -> bool;

    /// Whether access must be requested from the user before use.
    fn requires_prompt(&self) -> bool;

    /// Show the platform prompt and wait for the answer.
    async fn request_permission(&self) -> Result<PermissionState, PermissionError>;
}

/// Resolve sensor access through the platform.
///
/// A failed prompt counts as a denial.
pub async fn negotiate_access<P>(platform: &P) -> SensorAccess
where
    P: MotionPermission + ?Sized,
{
    if !platform.is_available().await {
        info!("motion sensor not available");
        return SensorAccess::Unavailable;
    }

    if !platform.requires_prompt() {
        return SensorAccess::Granted;
    }

    match platform.request_permission().await {
        Ok(PermissionState::Granted) => {
            info!("motion permission granted");
            SensorAccess::Granted
        }
        Ok(PermissionState::Denied) => {
            info!("motion permission denied by user");
            SensorAccess::Denied
        }
        Err(e) => {
            warn!(error = %e, "motion permission request failed");
            SensorAccess::Denied
        }
    }
}
