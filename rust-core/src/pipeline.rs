//! Complete step counting engine.
//!
//! [`StepCounter`] owns every stage and drives the session lifecycle:
//!
//! ```text
//! Idle --start--> Calibrating --(calibration time elapsed)--> Tracking --stop--> Idle
//! ```
//!
//! Per sample the data flows Magnitude → Smoothing → (Calibration buffer
//! while calibrating) → Peak/Valley state machine → Validator → count.
//! Calibration and the sensitivity override feed thresholds back into the
//! state machine.
//!
//! The engine runs on the sample clock: every decision that involves time
//! uses sample timestamps, so replaying a recording gives the same count as
//! the live session did. An external timer may end calibration through
//! [`StepCounter::poll_calibration`] when samples stop arriving.
//!
//! All methods take `&mut self` and finish one sample before returning. No
//! locks, no background tasks.

use std::fmt;

use futures_util::{Stream, StreamExt};
use tracing::{debug, info, trace, warn};

use crate::calibration::{CalibrationEstimator, CalibrationProgress};
use crate::config::PipelineConfig;
use crate::error::{ConfigError, StartError};
use crate::permission::SensorAccess;
use crate::signal::{ProcessedSample, SignalProcessor};
use crate::step_detection::{Detection, StepDetector};
use crate::types::{CalibrationReport, EngineEvent, EngineState, Sample, StepEvent, Thresholds};

/// Called with the running count after every counted step.
pub type StepCallback = Box<dyn FnMut(u64) + Send>;

/// Called once per session when calibration finishes.
pub type CalibrationCallback = Box<dyn FnMut(&CalibrationReport) + Send>;

/// On-device step counting engine.
pub struct StepCounter {
    config: PipelineConfig,

    // Processing stages
    signal: SignalProcessor,
    calibration: CalibrationEstimator,
    detector: StepDetector,

    // Session state
    state: EngineState,
    thresholds: Thresholds,
    sensitivity: f64,
    step_count: u64,

    on_step: Option<StepCallback>,
    on_calibration_complete: Option<CalibrationCallback>,
}

impl StepCounter {
    /// Create an idle engine.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` fails validation.
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Create an idle engine with the default configuration.
    pub fn with_defaults() -> Self {
        Self::build(PipelineConfig::default())
    }

    fn build(config: PipelineConfig) -> Self {
        Self {
            signal: SignalProcessor::with_config(config.filter.clone()),
            calibration: CalibrationEstimator::new(config.calibration.clone()),
            detector: StepDetector::new(config.detector.clone()),
            state: EngineState::Idle,
            thresholds: Thresholds::initial(config.sensitivity),
            sensitivity: config.sensitivity,
            step_count: 0,
            on_step: None,
            on_calibration_complete: None,
            config,
        }
    }

    // =========================================================================
    // CALLBACKS
    // =========================================================================

    /// Register the step listener, replacing any previous one.
    pub fn on_step(&mut self, callback: impl FnMut(u64) + Send + 'static) {
        self.on_step = Some(Box::new(callback));
    }

    /// Register the calibration-complete listener, replacing any previous one.
    pub fn on_calibration_complete(
        &mut self,
        callback: impl FnMut(&CalibrationReport) + Send + 'static,
    ) {
        self.on_calibration_complete = Some(Box::new(callback));
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Start a tracking session. Returns `false` if the sensor is not usable.
    ///
    /// The calibration clock starts at the first sample or poll. Use
    /// [`start_at`](Self::start_at) when the host knows the current time.
    pub fn start(&mut self, access: SensorAccess) -> bool {
        Self::report_start(self.try_start(access))
    }

    /// Start a tracking session at `now_ms` on the sample clock. Returns
    /// `false` if the sensor is not usable.
    pub fn start_at(&mut self, access: SensorAccess, now_ms: u64) -> bool {
        Self::report_start(self.try_start_at(access, now_ms))
    }

    /// Start a tracking session.
    ///
    /// Resets the count to zero, clears all windows and the rhythm history,
    /// and begins calibration. Starting an active engine restarts the session.
    /// The calibration clock starts at the first sample or poll.
    ///
    /// # Errors
    ///
    /// Returns an error if sensor access was not granted; the engine is left
    /// untouched.
    pub fn try_start(&mut self, access: SensorAccess) -> Result<(), StartError> {
        self.begin_session(access, None)
    }

    /// Start a tracking session with calibration timed from `now_ms`.
    ///
    /// `now_ms` must be on the same clock as the sample timestamps. A single
    /// [`poll_calibration`](Self::poll_calibration) at `now_ms` plus the
    /// calibration duration ends calibration even if no sample arrived.
    ///
    /// # Errors
    ///
    /// Returns an error if sensor access was not granted; the engine is left
    /// untouched.
    pub fn try_start_at(&mut self, access: SensorAccess, now_ms: u64) -> Result<(), StartError> {
        self.begin_session(access, Some(now_ms))
    }

    /// Stop tracking and return the session's step count.
    ///
    /// Safe to call in any state, any number of times. An unfinished
    /// calibration is discarded and the thresholds stay as they were.
    pub fn stop(&mut self) -> u64 {
        if self.state == EngineState::Idle {
            return self.step_count;
        }

        if self.state == EngineState::Calibrating {
            self.calibration.abandon();
        }
        self.signal.reset();
        self.detector.reset();
        self.state = EngineState::Idle;

        info!(steps = self.step_count, "step tracking stopped");
        self.step_count
    }

    /// Zero the step count. State, thresholds and windows are untouched.
    pub fn reset(&mut self) {
        debug!(previous = self.step_count, "step count reset");
        self.step_count = 0;
    }

    /// Override the peak threshold. Lower values count gentler steps.
    ///
    /// Takes effect immediately in any state and becomes the floor for the
    /// next calibration. Non-finite or non-positive values are ignored.
    pub fn adjust_sensitivity(&mut self, sensitivity: f64) {
        if !(sensitivity.is_finite() && sensitivity > 0.0) {
            warn!(sensitivity, "ignoring invalid sensitivity");
            return;
        }

        self.sensitivity = sensitivity;
        self.thresholds.peak = sensitivity;
        self.thresholds = self.thresholds.normalized();

        info!(
            sensitivity,
            valley = self.thresholds.valley,
            noise_floor = self.thresholds.noise_floor,
            "sensitivity adjusted"
        );
    }

    // =========================================================================
    // SAMPLE PROCESSING
    // =========================================================================

    /// Process one raw sample.
    ///
    /// Returns the step counted on this sample, or the calibration report
    /// when this sample ended calibration. Samples are ignored while idle;
    /// malformed samples are dropped.
    pub fn feed_sample(&mut self, sample: &Sample) -> Option<EngineEvent> {
        if self.state == EngineState::Idle {
            trace!(timestamp_ms = sample.timestamp_ms, "sample ignored while idle");
            return None;
        }

        let processed = self.signal.process_sample(sample)?;

        if self.state == EngineState::Calibrating {
            match self
                .calibration
                .observe(processed.timestamp_ms, processed.smoothed)
            {
                CalibrationProgress::Collecting => return None,
                CalibrationProgress::Elapsed => {
                    let report = self.complete_calibration();
                    // The look-around window is empty here, so this sample
                    // can at most open a step cycle.
                    let _ = self.track(&processed);
                    return Some(EngineEvent::CalibrationComplete(report));
                }
            }
        }

        self.track(&processed).map(EngineEvent::Step)
    }

    /// End calibration from a timer if its time has run out at `now_ms`.
    ///
    /// `now_ms` must be on the same clock as the sample timestamps. After
    /// [`start`](Self::start) with no sample yet, the first poll anchors the
    /// calibration clock; [`start_at`](Self::start_at) anchors it up front.
    pub fn poll_calibration(&mut self, now_ms: u64) -> Option<CalibrationReport> {
        if self.state != EngineState::Calibrating || !self.calibration.is_elapsed(now_ms) {
            return None;
        }
        Some(self.complete_calibration())
    }

    /// Process a batch of samples and return the steps counted.
    pub fn feed_all<I>(&mut self, samples: I) -> Vec<StepEvent>
    where
        I: IntoIterator<Item = Sample>,
    {
        samples
            .into_iter()
            .filter_map(|sample| self.feed_sample(&sample))
            .filter_map(|event| event.as_step())
            .collect()
    }

    /// Consume a sample stream until it ends. Returns the step count.
    pub async fn run<S>(&mut self, samples: S) -> u64
    where
        S: Stream<Item = Sample>,
    {
        let mut samples = Box::pin(samples);
        while let Some(sample) = samples.next().await {
            self.feed_sample(&sample);
        }
        debug!(steps = self.step_count, "sample stream ended");
        self.step_count
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Steps counted in the current session.
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Thresholds currently in force.
    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Current sensitivity.
    pub fn sensitivity(&self) -> f64 {
        self.sensitivity
    }

    /// True between an accepted peak and its valley while tracking.
    pub fn in_step(&self) -> bool {
        self.state == EngineState::Tracking && self.detector.in_step()
    }

    /// Whether steps are being detected.
    pub fn is_tracking(&self) -> bool {
        self.state == EngineState::Tracking
    }

    /// Whether the engine is collecting calibration samples.
    pub fn is_calibrating(&self) -> bool {
        self.state == EngineState::Calibrating
    }

    /// Number of malformed samples dropped since creation.
    pub fn dropped_samples(&self) -> u64 {
        self.signal.dropped_count()
    }

    /// The configuration the engine was built with.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    // =========================================================================
    // PRIVATE METHODS
    // =========================================================================

    fn report_start(result: Result<(), StartError>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "step tracking not started");
                false
            }
        }
    }

    fn begin_session(
        &mut self,
        access: SensorAccess,
        started_at_ms: Option<u64>,
    ) -> Result<(), StartError> {
        access.into_result()?;

        if self.state != EngineState::Idle {
            info!(steps = self.step_count, "restarting active step tracking session");
        }

        self.step_count = 0;
        self.signal.reset();
        self.detector.reset();
        match started_at_ms {
            Some(now_ms) => self.calibration.begin_at(now_ms),
            None => self.calibration.begin(),
        }
        self.state = EngineState::Calibrating;

        info!(
            sensitivity = self.sensitivity,
            calibration_ms = self.config.calibration.duration_ms,
            started_at_ms,
            "step tracking started, calibrating"
        );
        Ok(())
    }

    fn complete_calibration(&mut self) -> CalibrationReport {
        let report = self.calibration.finish(self.sensitivity, self.thresholds);
        self.thresholds = report.thresholds;
        self.state = EngineState::Tracking;

        info!(
            applied = report.applied,
            samples = report.sample_count,
            peak = report.thresholds.peak,
            valley = report.thresholds.valley,
            noise_floor = report.thresholds.noise_floor,
            "calibration complete, tracking steps"
        );

        if let Some(callback) = self.on_calibration_complete.as_mut() {
            callback(&report);
        }
        report
    }

    fn track(&mut self, processed: &ProcessedSample) -> Option<StepEvent> {
        let detection = self.detector.process(
            processed.timestamp_ms,
            processed.smoothed,
            &mut self.thresholds,
        );

        let Detection::Step { timestamp_ms } = detection else {
            return None;
        };

        self.step_count += 1;
        debug!(count = self.step_count, timestamp_ms, "step counted");

        if let Some(callback) = self.on_step.as_mut() {
            callback(self.step_count);
        }
        Some(StepEvent::new(self.step_count, timestamp_ms))
    }
}

impl Default for StepCounter {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for StepCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepCounter")
            .field("state", &self.state)
            .field("step_count", &self.step_count)
            .field("thresholds", &self.thresholds)
            .field("sensitivity", &self.sensitivity)
            .field("in_step", &self.in_step())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Engine that passes raw magnitudes straight to the detector and ends
    /// calibration on the first sample.
    fn direct_counter() -> StepCounter {
        let mut config = PipelineConfig::default().with_calibration_time_ms(0);
        config.filter.smoothing_window_size = 1;
        StepCounter::new(config).expect("valid config")
    }

    fn magnitudes(values: &[f64], spacing_ms: u64) -> Vec<Sample> {
        values
            .iter()
            .enumerate()
            .map(|(i, &m)| Sample::from_magnitude(i as u64 * spacing_ms, m))
            .collect()
    }

    #[test]
    fn test_new_engine_is_idle() {
        let counter = StepCounter::with_defaults();
        assert_eq!(counter.state(), EngineState::Idle);
        assert_eq!(counter.step_count(), 0);
        assert_eq!(counter.thresholds(), Thresholds::initial(1.2));
        assert!(!counter.in_step());
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = PipelineConfig::default().with_sensitivity(-1.0);
        assert!(StepCounter::new(config).is_err());
    }

    #[test]
    fn test_idle_engine_ignores_samples() {
        let mut counter = direct_counter();
        let steps = counter.feed_all(magnitudes(&[0.1, 5.0, 0.1, 5.0, 0.1], 300));
        assert!(steps.is_empty());
        assert_eq!(counter.state(), EngineState::Idle);
    }

    #[test]
    fn test_start_enters_calibration() {
        let mut counter = StepCounter::with_defaults();
        assert!(counter.start(SensorAccess::Granted));
        assert!(counter.is_calibrating());
        assert!(!counter.is_tracking());
    }

    #[test]
    fn test_start_without_access_changes_nothing() {
        let mut counter = StepCounter::with_defaults();
        assert!(!counter.start(SensorAccess::Denied));
        assert_eq!(counter.state(), EngineState::Idle);

        assert_eq!(
            counter.try_start(SensorAccess::Unavailable),
            Err(StartError::SensorUnavailable)
        );
        assert_eq!(counter.state(), EngineState::Idle);
    }

    #[test]
    fn test_calibration_ends_on_elapsed_sample() {
        let mut counter = StepCounter::new(PipelineConfig::default().with_calibration_time_ms(1000))
            .expect("valid config");
        counter.start(SensorAccess::Granted);

        for i in 0..50 {
            assert!(counter.feed_sample(&Sample::from_magnitude(i * 20, 0.05)).is_none());
        }
        assert!(counter.is_calibrating());

        let event = counter.feed_sample(&Sample::from_magnitude(1000, 0.05));
        let Some(EngineEvent::CalibrationComplete(report)) = event else {
            panic!("expected calibration report, got {:?}", event);
        };
        assert!(report.applied);
        assert_eq!(report.sample_count, 50);
        assert!(counter.is_tracking());
        assert_eq!(counter.thresholds(), report.thresholds);
    }

    #[test]
    fn test_poll_calibration_from_timer() {
        let mut counter = StepCounter::with_defaults();
        counter.start(SensorAccess::Granted);
        counter.feed_sample(&Sample::from_magnitude(10_000, 0.05));

        assert!(counter.poll_calibration(12_000).is_none());
        let report = counter.poll_calibration(13_000).expect("calibration elapsed");
        assert!(!report.applied, "one sample is too few");
        assert!(counter.is_tracking());
        assert!(counter.poll_calibration(20_000).is_none());
    }

    #[test]
    fn test_timer_ends_calibration_without_samples() {
        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reports);

        let mut counter = StepCounter::with_defaults();
        counter.on_calibration_complete(move |report| sink.lock().unwrap().push(*report));
        assert!(counter.start_at(SensorAccess::Granted, 0));

        assert!(counter.poll_calibration(2999).is_none());
        let report = counter.poll_calibration(3000).expect("calibration elapsed");
        assert!(!report.applied);
        assert_eq!(report.sample_count, 0);
        assert_eq!(report.thresholds, Thresholds::initial(1.2));
        assert!(counter.is_tracking());
        assert_eq!(*reports.lock().unwrap(), vec![report]);
    }

    #[test]
    fn test_late_first_sample_does_not_extend_calibration() {
        let mut counter = StepCounter::with_defaults();
        counter.try_start_at(SensorAccess::Granted, 0).expect("access granted");

        for i in 0..50 {
            assert!(counter.feed_sample(&Sample::from_magnitude(2000 + i * 20, 0.05)).is_none());
        }
        let report = counter.poll_calibration(3000).expect("calibration elapsed");
        assert!(report.applied);
        assert_eq!(report.sample_count, 50);
        assert!(counter.is_tracking());
    }

    #[test]
    fn test_start_at_without_access_changes_nothing() {
        let mut counter = StepCounter::with_defaults();
        assert!(!counter.start_at(SensorAccess::Denied, 0));
        assert_eq!(
            counter.try_start_at(SensorAccess::Unavailable, 0),
            Err(StartError::SensorUnavailable)
        );
        assert_eq!(counter.state(), EngineState::Idle);
        assert!(counter.poll_calibration(10_000).is_none());
    }

    #[test]
    fn test_calibration_callback_fires_once() {
        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reports);

        let mut counter = direct_counter();
        counter.on_calibration_complete(move |report| {
            sink.lock().unwrap().push(report.sample_count);
        });
        counter.start(SensorAccess::Granted);
        counter.feed_all(magnitudes(&[0.1; 20], 20));

        assert_eq!(*reports.lock().unwrap(), vec![0]);
    }

    #[test]
    fn test_plateau_scenario_counts_two_steps() {
        let counts = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&counts);

        let mut counter = direct_counter();
        counter.on_step(move |count| sink.lock().unwrap().push(count));
        counter.start(SensorAccess::Granted);

        let mut values = vec![
            0.1, 0.1, 0.1, 0.1, 0.1, 2.0, 2.0, 0.1, 0.1, 0.1, 0.1, 0.1, 2.0, 2.0, 0.1, 0.1,
        ];
        values.extend([0.1; 4]);
        let steps = counter.feed_all(magnitudes(&values, 50));

        assert_eq!(steps, vec![StepEvent::new(1, 550), StepEvent::new(2, 900)]);
        assert_eq!(*counts.lock().unwrap(), vec![1, 2]);
        assert_eq!(counter.step_count(), 2);
    }

    #[test]
    fn test_in_step_between_peak_and_valley() {
        let mut counter = direct_counter();
        counter.start(SensorAccess::Granted);

        let values = [0.1, 0.1, 0.1, 0.1, 0.1, 2.0, 0.1, 0.1, 0.1, 0.1];
        counter.feed_all(magnitudes(&values, 50));
        assert!(counter.in_step());

        counter.feed_sample(&Sample::from_magnitude(500, 0.1));
        assert!(!counter.in_step());
        assert_eq!(counter.step_count(), 1);
    }

    #[test]
    fn test_stop_is_idempotent_and_keeps_count() {
        let mut counter = direct_counter();
        counter.start(SensorAccess::Granted);
        counter.feed_all(magnitudes(&[0.1, 0.1, 0.1, 0.1, 0.1, 2.0, 0.1, 0.1, 0.1, 0.1, 0.1], 50));
        assert_eq!(counter.step_count(), 1);

        assert_eq!(counter.stop(), 1);
        assert_eq!(counter.stop(), 1);
        assert_eq!(counter.state(), EngineState::Idle);
        assert!(!counter.in_step());
        assert_eq!(counter.step_count(), 1);
    }

    #[test]
    fn test_stop_mid_step_clears_cycle() {
        let mut counter = direct_counter();
        counter.start(SensorAccess::Granted);
        counter.feed_all(magnitudes(&[0.1, 0.1, 0.1, 0.1, 0.1, 2.0, 0.1, 0.1, 0.1, 0.1], 50));
        assert!(counter.in_step());

        counter.stop();
        counter.start(SensorAccess::Granted);
        // A fresh session needs a new peak; a lone valley does not count.
        let steps = counter.feed_all(
            [0.1; 12]
                .iter()
                .enumerate()
                .map(|(i, &m)| Sample::from_magnitude(1000 + i as u64 * 50, m)),
        );
        assert!(steps.is_empty());
    }

    #[test]
    fn test_restart_resets_count() {
        let mut counter = direct_counter();
        counter.start(SensorAccess::Granted);
        counter.feed_all(magnitudes(&[0.1, 0.1, 0.1, 0.1, 0.1, 2.0, 0.1, 0.1, 0.1, 0.1, 0.1], 50));
        assert_eq!(counter.step_count(), 1);

        assert!(counter.start(SensorAccess::Granted));
        assert_eq!(counter.step_count(), 0);
        assert!(counter.is_calibrating());
    }

    #[test]
    fn test_reset_zeroes_count_only() {
        let mut counter = direct_counter();
        counter.start(SensorAccess::Granted);
        counter.feed_all(magnitudes(&[0.1, 0.1, 0.1, 0.1, 0.1, 2.0, 0.1, 0.1, 0.1, 0.1, 0.1], 50));

        counter.reset();
        assert_eq!(counter.step_count(), 0);
        assert!(counter.is_tracking());
    }

    #[test]
    fn test_adjust_sensitivity_overrides_peak() {
        let mut counter = StepCounter::with_defaults();
        counter.adjust_sensitivity(0.1);
        let thresholds = counter.thresholds();
        assert_eq!(thresholds.peak, 0.1);
        assert_eq!(counter.sensitivity(), 0.1);
        assert!(thresholds.is_ordered());
        assert_eq!(thresholds.valley, 0.05);
    }

    #[test]
    fn test_adjust_sensitivity_ignores_invalid_values() {
        let mut counter = StepCounter::with_defaults();
        for value in [0.0, -2.0, f64::NAN, f64::INFINITY] {
            counter.adjust_sensitivity(value);
        }
        assert_eq!(counter.sensitivity(), 1.2);
        assert_eq!(counter.thresholds(), Thresholds::initial(1.2));
    }

    #[test]
    fn test_malformed_samples_are_dropped() {
        let mut counter = direct_counter();
        counter.start(SensorAccess::Granted);
        assert!(counter
            .feed_sample(&Sample::with_axes(0, None, Some(1.0), Some(1.0)))
            .is_none());
        assert_eq!(counter.dropped_samples(), 1);
        assert!(counter.is_calibrating());
    }
}
