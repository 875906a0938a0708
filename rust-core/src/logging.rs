//! Structured logging setup for hosts and the replay tool.
//!
//! The library only emits `tracing` events; installing a subscriber is left to
//! the embedding application. [`LoggingConfig::init`] is the stock setup.

use std::env;
use std::io;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event, for log shipping.
    Json,
    /// Multi-field human-readable output.
    Pretty,
    /// Single-line output.
    Compact,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter directive (trace, debug, info, warn, error, or per-target).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Include source file and line numbers.
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Compact,
            include_location: false,
        }
    }
}

impl LoggingConfig {
    /// Read `RUST_LOG`, `LOG_FORMAT` and `LOG_INCLUDE_LOCATION`.
    #[must_use]
    pub fn from_env() -> Self {
        let level = env::var("RUST_LOG").unwrap_or_else(|_| "info".into());

        let format = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("pretty") => LogFormat::Pretty,
            _ => LogFormat::Compact,
        };

        Self {
            level,
            format,
            include_location: env::var("LOG_INCLUDE_LOCATION").is_ok(),
        }
    }

    /// Use `level` instead of the configured directive.
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Install the global tracing subscriber, writing to stderr.
    ///
    /// # Errors
    ///
    /// Returns an error if the filter directive is invalid or a global
    /// subscriber is already installed.
    pub fn init(&self) -> Result<()> {
        let env_filter = EnvFilter::try_new(&self.level)?;
        let registry = tracing_subscriber::registry().with(env_filter);

        match self.format {
            LogFormat::Json => {
                let json_layer = fmt::layer()
                    .with_file(self.include_location)
                    .with_line_number(self.include_location)
                    .with_target(true)
                    .with_writer(io::stderr)
                    .json();
                registry.with(json_layer).try_init()?;
            }
            LogFormat::Pretty => {
                let pretty_layer = fmt::layer()
                    .with_file(self.include_location)
                    .with_line_number(self.include_location)
                    .with_target(true)
                    .with_writer(io::stderr);
                registry.with(pretty_layer).try_init()?;
            }
            LogFormat::Compact => {
                let compact_layer = fmt::layer()
                    .compact()
                    .with_file(false)
                    .with_line_number(false)
                    .with_target(false)
                    .with_writer(io::stderr);
                registry.with(compact_layer).try_init()?;
            }
        }

        info!(level = %self.level, format = ?self.format, "logging initialized");
        Ok(())
    }
}

/// Install logging configured from the environment.
///
/// # Errors
///
/// See [`LoggingConfig::init`].
pub fn init_logging() -> Result<()> {
    LoggingConfig::from_env().init()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_from_env_format_selection() {
        env::set_var("LOG_FORMAT", "json");
        assert_eq!(LoggingConfig::from_env().format, LogFormat::Json);

        env::set_var("LOG_FORMAT", "pretty");
        assert_eq!(LoggingConfig::from_env().format, LogFormat::Pretty);

        env::set_var("LOG_FORMAT", "something-else");
        assert_eq!(LoggingConfig::from_env().format, LogFormat::Compact);

        env::remove_var("LOG_FORMAT");
    }

    #[test]
    #[serial]
    fn test_from_env_level() {
        env::set_var("RUST_LOG", "stride_sensing=debug");
        assert_eq!(LoggingConfig::from_env().level, "stride_sensing=debug");

        env::remove_var("RUST_LOG");
        assert_eq!(LoggingConfig::from_env().level, "info");
    }

    #[test]
    fn test_invalid_directive_is_an_error() {
        let config = LoggingConfig::default().with_level("stride_sensing=verbose");
        assert!(config.init().is_err());
    }
}
