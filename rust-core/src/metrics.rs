//! Display figures derived from a step count.

use serde::{Deserialize, Serialize};

/// Average stride length in metres (30 inches).
pub const STRIDE_LENGTH_M: f64 = 0.762;
/// Energy spent per step in kcal.
pub const KCAL_PER_STEP: f64 = 0.04;
/// Daily goal used when none is configured.
pub const DEFAULT_DAILY_GOAL: u64 = 10_000;

/// Conversion of a step count into distance, energy and goal progress.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepMetrics {
    /// Metres per step.
    pub stride_length_m: f64,
    /// Kilocalories per step.
    pub kcal_per_step: f64,
    /// Daily step goal.
    pub daily_goal: u64,
}

impl Default for StepMetrics {
    fn default() -> Self {
        Self {
            stride_length_m: STRIDE_LENGTH_M,
            kcal_per_step: KCAL_PER_STEP,
            daily_goal: DEFAULT_DAILY_GOAL,
        }
    }
}

impl StepMetrics {
    /// Metrics with a custom daily goal.
    pub fn with_goal(daily_goal: u64) -> Self {
        Self {
            daily_goal,
            ..Self::default()
        }
    }

    /// Distance in kilometres, rounded to one decimal.
    pub fn distance_km(&self, steps: u64) -> f64 {
        let km = steps as f64 * self.stride_length_m / 1000.0;
        (km * 10.0).round() / 10.0
    }

    /// Energy in whole kilocalories.
    pub fn calories(&self, steps: u64) -> u64 {
        (steps as f64 * self.kcal_per_step).round() as u64
    }

    /// Percentage of the daily goal, rounded and capped at 100.
    pub fn goal_progress(&self, steps: u64) -> u8 {
        if self.daily_goal == 0 {
            return if steps > 0 { 100 } else { 0 };
        }
        let pct = (steps as f64 / self.daily_goal as f64 * 100.0).round();
        pct.min(100.0) as u8
    }

    /// All figures for `steps` at once.
    pub fn summarize(&self, steps: u64) -> StepSummary {
        StepSummary {
            steps,
            distance_km: self.distance_km(steps),
            calories: self.calories(steps),
            goal: self.daily_goal,
            goal_progress_pct: self.goal_progress(steps),
        }
    }
}

/// Snapshot of a step count in human terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepSummary {
    /// Step count the figures were derived from.
    pub steps: u64,
    /// Distance in km (one decimal).
    pub distance_km: f64,
    /// Energy in kcal.
    pub calories: u64,
    /// Daily goal.
    pub goal: u64,
    /// Goal progress, 0-100.
    pub goal_progress_pct: u8,
}
