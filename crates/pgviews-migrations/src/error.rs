//! Error types for view migrations

use pgviews_objects::ViewError;
use thiserror::Error;

/// Errors raised while recording or applying view migrations
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("No connection configured for database {0}")]
    UnknownDatabase(String),

    #[error("Failed to read or write snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid snapshot: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Snapshot lists view {namespace}.{name} more than once")]
    DuplicateState { namespace: String, name: String },

    #[error(transparent)]
    View(#[from] ViewError),
}

/// Result type for view migrations
pub type Result<T> = std::result::Result<T, MigrationError>;
