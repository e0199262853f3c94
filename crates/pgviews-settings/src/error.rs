//! Error types for configuration loading

use pgviews_objects::ViewError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading settings or setting up logging
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Database {0} is not configured")]
    UnknownDatabase(String),

    #[error("View #{index} ({label}) is invalid: {source}")]
    InvalidView {
        index: usize,
        label: String,
        #[source]
        source: ViewError,
    },

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

/// Result type for settings
pub type Result<T> = std::result::Result<T, SettingsError>;
