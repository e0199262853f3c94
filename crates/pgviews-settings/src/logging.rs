//! Logging setup for pgviews binaries
//!
//! Console output for humans, and optionally JSON lines in a daily rotated
//! file for later inspection. `RUST_LOG` always takes precedence over the
//! configured filter.
//!
//! The "already exists" line of a sync is logged under
//! `pgviews::sync::exists`; add `pgviews::sync::exists=warn` to the filter
//! to hide it.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::{Result, SettingsError, paths};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogPreset {
    #[default]
    Development,
    Production,
    Testing,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory where log files are written
    pub log_dir: PathBuf,

    /// Whether to write JSON lines to a file
    pub enable_json_logs: bool,

    /// Whether to write human readable lines to stderr
    pub enable_console_logs: bool,

    /// Whether to include file/line information in logs
    pub include_location: bool,

    /// Whether to log span open/close
    pub enable_spans: bool,

    /// Default log level filter
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::development()
    }
}

impl LoggingConfig {
    pub fn from_preset(preset: LogPreset) -> Self {
        match preset {
            LogPreset::Development => Self::development(),
            LogPreset::Production => Self::production(),
            LogPreset::Testing => Self::testing(),
        }
    }

    /// Verbose console output, no files
    pub fn development() -> Self {
        Self {
            log_dir: paths::log_dir(),
            enable_json_logs: false,
            enable_console_logs: true,
            include_location: cfg!(debug_assertions),
            enable_spans: false,
            default_filter: "info,pgviews_sync=debug,pgviews_objects=debug,pgviews_migrations=debug"
                .to_string(),
        }
    }

    /// One line per view on the console, JSON logs on disk
    pub fn production() -> Self {
        Self {
            log_dir: paths::log_dir(),
            enable_json_logs: true,
            enable_console_logs: true,
            include_location: false,
            enable_spans: false,
            default_filter: "warn,pgviews=info,pgviews_sync=info,pgviews_migrations=info"
                .to_string(),
        }
    }

    /// Console only, everything
    pub fn testing() -> Self {
        Self {
            log_dir: std::env::temp_dir().join("pgviews-tests"),
            enable_json_logs: false,
            enable_console_logs: true,
            include_location: true,
            enable_spans: true,
            default_filter: "debug".to_string(),
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_filter))
    }
}

/// Install the global subscriber.
///
/// The returned guard flushes the JSON file writer when dropped, so keep it
/// alive until the program exits.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let span_events = if config.enable_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let mut layers = Vec::new();
    let mut guard = None;

    if config.enable_console_logs {
        let console_layer = fmt::layer()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_span_events(span_events.clone())
            .with_writer(std::io::stderr)
            .with_filter(config.env_filter())
            .boxed();
        layers.push(console_layer);
    }

    if config.enable_json_logs {
        std::fs::create_dir_all(&config.log_dir).map_err(|source| SettingsError::Io {
            path: config.log_dir.clone(),
            source,
        })?;
        let file_appender = tracing_appender::rolling::daily(&config.log_dir, "pgviews.log");
        let (non_blocking, worker_guard) = tracing_appender::non_blocking(file_appender);
        guard = Some(worker_guard);

        let json_layer = fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_span_events(span_events)
            .with_ansi(false)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(non_blocking)
            .with_filter(config.env_filter())
            .boxed();
        layers.push(json_layer);
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| SettingsError::Logging(e.to_string()))?;

    tracing::debug!(
        log_dir = %config.log_dir.display(),
        json_enabled = config.enable_json_logs,
        console_enabled = config.enable_console_logs,
        "logging initialized"
    );
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert!(!LoggingConfig::development().enable_json_logs);
        assert!(LoggingConfig::production().enable_json_logs);
        assert_eq!(LoggingConfig::testing().default_filter, "debug");
        assert_eq!(
            LoggingConfig::from_preset(LogPreset::Production).default_filter,
            LoggingConfig::production().default_filter
        );
    }

    #[test]
    fn test_preset_names() {
        let preset: LogPreset = serde_json::from_str("\"production\"").unwrap();
        assert_eq!(preset, LogPreset::Production);
    }
}
