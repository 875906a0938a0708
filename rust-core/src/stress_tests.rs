/// Production-level stress testing for the step counting engine.
///
/// These tests are designed to expose real-world failure modes that would only
/// appear under extreme, sustained, or pathological conditions.

#[cfg(test)]
mod stress_tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::permission::SensorAccess;
    use crate::pipeline::*;
    use crate::types::*;
    use crate::PipelineConfig;

    fn walking_sample(timestamp_ms: u64) -> Sample {
        let phase = (timestamp_ms % 500) as f64;
        let magnitude = if phase < 240.0 {
            2.5 * (std::f64::consts::PI * phase / 240.0).sin()
        } else {
            0.0
        };
        Sample::new(timestamp_ms, 0.6 * magnitude, 0.0, 0.8 * magnitude)
    }

    // ============================================================================
    // CATEGORY 1: EXTREME DURATION & THROUGHPUT
    // ============================================================================

    /// One hour of continuous walking at 50Hz (180k samples)
    #[test]
    fn stress_one_hour_walk_50hz() {
        let mut counter = StepCounter::with_defaults();
        counter.start(SensorAccess::Granted);

        for i in 0..150u64 {
            counter.feed_sample(&Sample::from_magnitude(i * 20, 0.05));
        }
        for i in 150..180_000u64 {
            counter.feed_sample(&walking_sample(i * 20));
        }

        // 3597 s of walking at 2 steps/s. Float convergence of the adaptive
        // threshold may end counting early; it must never overcount.
        let count = counter.step_count();
        assert!(count > 0);
        assert!(count <= 7194, "overcounted: {}", count);
        assert!(counter.thresholds().is_ordered());
    }

    // ============================================================================
    // CATEGORY 2: EXTREME PARAMETER VALUES
    // ============================================================================

    /// Free fall, impacts and sensor saturation
    #[test]
    fn stress_extreme_acceleration_values() {
        let mut counter = StepCounter::with_defaults();
        counter.start(SensorAccess::Granted);

        let cases = [
            [0.0, 0.0, 0.0],
            [50.0, 50.0, 50.0],
            [-50.0, -50.0, -50.0],
            [1e150, 0.0, 0.0],
            [0.0, -1e150, 0.0],
            [f64::MAX, f64::MAX, 0.0],
        ];

        for i in 0..2000u64 {
            let [x, y, z] = cases[(i % cases.len() as u64) as usize];
            counter.feed_sample(&Sample::new(i * 20, x, y, z));
            assert!(counter.thresholds().is_ordered());
        }
    }

    /// NaN and infinity never reach a window
    #[test]
    fn stress_nan_and_inf_corruption() {
        let mut counter = StepCounter::with_defaults();
        counter.start(SensorAccess::Granted);

        for i in 0..1000u64 {
            let sample = match i % 4 {
                0 => Sample::new(i * 20, f64::NAN, 0.0, 1.0),
                1 => Sample::new(i * 20, 0.0, f64::INFINITY, 1.0),
                2 => Sample::with_axes(i * 20, None, None, None),
                _ => Sample::from_magnitude(i * 20, 0.05),
            };
            counter.feed_sample(&sample);
        }

        assert_eq!(counter.dropped_samples(), 750);
        assert!(counter.is_tracking());
        assert!(counter.thresholds().is_ordered());
        assert_eq!(counter.step_count(), 0);
    }

    // ============================================================================
    // CATEGORY 3: TEMPORAL CHAOS & STATE TRANSITIONS
    // ============================================================================

    /// Timestamps going backwards must not panic or count
    #[test]
    fn stress_nonmonotonic_timestamps() {
        let mut counter = StepCounter::with_defaults();
        counter.start(SensorAccess::Granted);

        for i in 0..500u64 {
            let t = if i % 3 == 0 { 10_000 - i * 7 } else { i * 20 };
            counter.feed_sample(&walking_sample(t));
        }
        assert!(counter.thresholds().is_ordered());
    }

    /// Identical timestamps (sensor batching)
    #[test]
    fn stress_zero_time_deltas() {
        let mut counter = StepCounter::with_defaults();
        counter.start(SensorAccess::Granted);

        for i in 0..1000u64 {
            counter.feed_sample(&Sample::from_magnitude(5000, if i % 10 < 5 { 3.0 } else { 0.0 }));
        }
        // Every peak lands at the same instant: at most one step.
        assert!(counter.step_count() <= 1);
    }

    /// Random lifecycle calls interleaved with samples
    #[test]
    fn stress_random_lifecycle_chaos() {
        let mut rng = StdRng::seed_from_u64(2024);
        let mut counter = StepCounter::with_defaults();
        let mut last_count = 0;

        for i in 0..50_000u64 {
            let t = i * 20;
            match rng.gen_range(0..1000) {
                0..=2 => {
                    counter.start(SensorAccess::Granted);
                    last_count = 0;
                }
                3..=4 => {
                    counter.stop();
                }
                5 => {
                    counter.reset();
                    last_count = 0;
                }
                6..=8 => counter.adjust_sensitivity(rng.gen_range(-1.0..4.0)),
                9 => {
                    counter.start(SensorAccess::Denied);
                }
                10 => {
                    counter.poll_calibration(t);
                }
                _ => {
                    let noise: f64 = rng.gen_range(-0.3..0.3);
                    let s = walking_sample(t);
                    let m = s.magnitude().unwrap_or(0.0) + noise;
                    counter.feed_sample(&Sample::from_magnitude(t, m.max(0.0)));
                }
            }

            let thresholds = counter.thresholds();
            assert!(thresholds.is_ordered(), "invariant broken: {:?}", thresholds);
            assert!(counter.step_count() >= last_count, "count went backwards");
            last_count = counter.step_count();
            if !counter.is_tracking() {
                assert!(!counter.in_step());
            }
        }
    }

    // ============================================================================
    // CATEGORY 4: BOUNDARY CONDITIONS
    // ============================================================================

    /// Smallest legal windows and zero-length calibration
    #[test]
    fn stress_minimal_configuration() {
        let mut config = PipelineConfig::default().with_calibration_time_ms(0);
        config.filter.smoothing_window_size = 1;
        config.detector.peak_window_size = 1;
        config.calibration.buffer_capacity = 1;
        config.detector.validator.peak_history_size = 1;
        let mut counter = StepCounter::new(config).expect("valid config");
        counter.start(SensorAccess::Granted);

        for i in 0..5000u64 {
            counter.feed_sample(&walking_sample(i * 20));
        }
        assert!(counter.step_count() > 0);
        assert!(counter.thresholds().is_ordered());
    }

    /// Very large windows never fill on short input
    #[test]
    fn stress_oversized_windows() {
        let mut config = PipelineConfig::default().with_calibration_time_ms(0);
        config.detector.peak_window_size = 10_000;
        let mut counter = StepCounter::new(config).expect("valid config");
        counter.start(SensorAccess::Granted);

        for i in 0..9000u64 {
            counter.feed_sample(&walking_sample(i * 20));
        }
        assert_eq!(counter.step_count(), 0);
    }

    /// Sensitivity pushed to extremes mid-walk
    #[test]
    fn stress_sensitivity_extremes() {
        let mut counter = StepCounter::with_defaults();
        counter.start(SensorAccess::Granted);

        let extremes = [1e-9, 1e9, 0.5, f64::MIN_POSITIVE, 3.0];
        for (round, sensitivity) in extremes.into_iter().enumerate() {
            counter.adjust_sensitivity(sensitivity);
            assert!(counter.thresholds().is_ordered());
            for i in 0..500u64 {
                counter.feed_sample(&walking_sample(round as u64 * 10_000 + i * 20));
            }
            assert!(counter.thresholds().is_ordered());
        }
    }
}
