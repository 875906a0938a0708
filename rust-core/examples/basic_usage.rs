/// Basic usage example: feed accelerometer samples, get steps
use stride_sensing::{
    EngineEvent, PipelineConfig, Sample, SensorAccess, StepCounter, StepMetrics, StepSyncCursor,
};

fn main() {
    println!("=== Stride Sensing Engine: Basic Example ===\n");

    // Default config: 1.2 m/s² sensitivity, 250ms debounce, 3s calibration
    let config = PipelineConfig::default();
    let mut counter = StepCounter::new(config).expect("default config is valid");

    counter.on_step(|count| println!("  step {}", count));
    counter.on_calibration_complete(|report| {
        println!(
            "Calibrated from {} samples: peak {:.2}, valley {:.2}\n",
            report.sample_count, report.thresholds.peak, report.thresholds.valley
        );
    });

    if !counter.start(SensorAccess::Granted) {
        println!("Motion sensor not available");
        return;
    }

    // Simulated 50Hz stream: 3s standing still, 10s walking at 2 steps/s, 1s still
    let samples = (0..700u64).map(|i| {
        let t = i * 20;
        let magnitude = if (3000..13_000).contains(&t) {
            let phase = ((t - 3000) % 500) as f64;
            if phase < 240.0 {
                2.5 * (std::f64::consts::PI * phase / 240.0).sin()
            } else {
                0.0
            }
        } else {
            0.05
        };
        // Phone held at an angle: the motion shows up on two axes.
        Sample::new(t, 0.6 * magnitude, 0.0, 0.8 * magnitude)
    });

    println!("Processing samples...\n");

    let mut cursor = StepSyncCursor::new(5000);
    let mut calibrations = 0;

    for sample in samples {
        if let Some(EngineEvent::CalibrationComplete(_)) = counter.feed_sample(&sample) {
            calibrations += 1;
        }
        if let Some(batch) = cursor.poll(counter.step_count(), sample.timestamp_ms) {
            println!("  -- synced {} steps (total {})", batch.steps, batch.total);
        }
    }

    let total = counter.stop();
    if let Some(batch) = cursor.flush(total, 14_000) {
        println!("  -- synced {} steps (total {})", batch.steps, batch.total);
    }

    let summary = StepMetrics::default().summarize(total);
    println!("\n=== Summary ===");
    println!("Calibrations: {}", calibrations);
    println!("Steps: {}", summary.steps);
    println!("Distance: {:.1} km", summary.distance_km);
    println!("Calories: {} kcal", summary.calories);
    println!("Daily goal: {}%", summary.goal_progress_pct);
}
