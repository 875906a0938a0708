//! stride-replay
//!
//! Replays a recorded accelerometer trace through the step counting engine.
//! Input is JSON lines, one sample per line: `{"x":0.1,"y":0.2,"z":9.8,"t":1200}`.
//!
//! This is the entry point for the standalone binary. For library use, see lib.rs.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde_json::json;
use tracing::warn;

use stride_sensing::logging::LoggingConfig;
use stride_sensing::{
    EngineEvent, PipelineConfig, Sample, SensorAccess, StepCounter, StepMetrics, StepSyncCursor,
    SyncBatch,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "stride-replay",
    version,
    about = "Replay an accelerometer trace through the step counter"
)]
struct Args {
    /// JSON-lines sample file; reads stdin when omitted.
    input: Option<PathBuf>,

    /// JSON engine configuration; STRIDE_* environment variables are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the sensitivity (peak threshold floor) in m/s².
    #[arg(long)]
    sensitivity: Option<f64>,

    /// Override the minimum time between counted steps.
    #[arg(long)]
    time_threshold_ms: Option<u64>,

    /// Override the calibration duration.
    #[arg(long)]
    calibration_ms: Option<u64>,

    /// Interval between sync batches, on the sample clock.
    #[arg(long, default_value_t = stride_sensing::sync::DEFAULT_SYNC_INTERVAL_MS)]
    sync_interval_ms: u64,

    /// Daily step goal for the summary.
    #[arg(long, default_value_t = stride_sensing::metrics::DEFAULT_DAILY_GOAL)]
    goal: u64,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Log filter directive, overriding RUST_LOG.
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut logging = LoggingConfig::from_env();
    if let Some(level) = &args.log_level {
        logging = logging.with_level(level.clone());
    }
    logging.init()?;

    let config = load_config(&args)?;
    let mut counter = StepCounter::new(config).context("invalid engine configuration")?;
    let mut cursor = StepSyncCursor::new(args.sync_interval_ms);
    let metrics = StepMetrics::with_goal(args.goal);

    let reader: Box<dyn BufRead> = match &args.input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("opening {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();

    counter.start(SensorAccess::Granted);
    let mut last_ts = 0;

    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading line {}", index + 1))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let sample: Sample = match serde_json::from_str(line) {
            Ok(sample) => sample,
            Err(e) => {
                warn!(line = index + 1, error = %e, "skipping unparseable sample");
                continue;
            }
        };
        last_ts = sample.timestamp_ms;

        if let Some(event) = counter.feed_sample(&sample) {
            print_event(&mut out, args.format, &event)?;
        }
        if let Some(batch) = cursor.poll(counter.step_count(), sample.timestamp_ms) {
            print_sync(&mut out, args.format, &batch)?;
        }
    }

    if let Some(report) = counter.poll_calibration(last_ts) {
        print_event(&mut out, args.format, &EngineEvent::CalibrationComplete(report))?;
    }

    let total = counter.stop();
    if let Some(batch) = cursor.flush(total, last_ts) {
        print_sync(&mut out, args.format, &batch)?;
    }

    let summary = metrics.summarize(total);
    match args.format {
        OutputFormat::Json => {
            writeln!(out, "{}", json!({ "summary": summary }))?;
        }
        OutputFormat::Text => {
            writeln!(
                out,
                "total: {} steps, {:.1} km, {} kcal, {}% of {} goal",
                summary.steps,
                summary.distance_km,
                summary.calories,
                summary.goal_progress_pct,
                summary.goal
            )?;
        }
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            PipelineConfig::from_json_str(&raw)
                .with_context(|| format!("parsing {}", path.display()))?
        }
        None => PipelineConfig::from_env().context("reading STRIDE_* environment")?,
    };

    if let Some(sensitivity) = args.sensitivity {
        config = config.with_sensitivity(sensitivity);
    }
    if let Some(ms) = args.time_threshold_ms {
        config = config.with_time_threshold_ms(ms);
    }
    if let Some(ms) = args.calibration_ms {
        config = config.with_calibration_time_ms(ms);
    }
    Ok(config)
}

fn print_event(out: &mut impl Write, format: OutputFormat, event: &EngineEvent) -> Result<()> {
    match (format, event) {
        (OutputFormat::Json, EngineEvent::Step(step)) => {
            writeln!(out, "{}", json!({ "step": step }))?;
        }
        (OutputFormat::Json, EngineEvent::CalibrationComplete(report)) => {
            writeln!(out, "{}", json!({ "calibration": report }))?;
        }
        (OutputFormat::Text, EngineEvent::Step(step)) => {
            writeln!(out, "{:>8} ms  step {}", step.timestamp_ms, step.count)?;
        }
        (OutputFormat::Text, EngineEvent::CalibrationComplete(report)) => {
            writeln!(
                out,
                "calibrated from {} samples (applied: {}): peak {:.3}, valley {:.3}, noise {:.3}",
                report.sample_count,
                report.applied,
                report.thresholds.peak,
                report.thresholds.valley,
                report.thresholds.noise_floor
            )?;
        }
    }
    Ok(())
}

fn print_sync(out: &mut impl Write, format: OutputFormat, batch: &SyncBatch) -> Result<()> {
    match format {
        OutputFormat::Json => writeln!(out, "{}", json!({ "sync": batch }))?,
        OutputFormat::Text => writeln!(
            out,
            "{:>8} ms  synced {} steps (total {})",
            batch.synced_at_ms, batch.steps, batch.total
        )?,
    }
    Ok(())
}
