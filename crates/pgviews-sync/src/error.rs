//! Error types for sync runs

use pgviews_objects::ViewError;
use thiserror::Error;

/// Errors raised while syncing, refreshing or clearing views
#[derive(Debug, Error)]
pub enum SyncError {
    /// A single view failed; the run stops at the first failure
    #[error("pgview {label} ({qualified_name}) failed: {source}")]
    ViewFailed {
        label: String,
        qualified_name: String,
        #[source]
        source: ViewError,
    },

    #[error(
        "pgviews dependencies hit limit after {rounds} rounds, check dependencies of: {}",
        .pending.join(", ")
    )]
    DidNotConverge { rounds: usize, pending: Vec<String> },

    #[error("Unknown view {0}")]
    UnknownView(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    View(#[from] ViewError),
}

impl SyncError {
    /// Wrap a per-view failure with the view's identity
    pub fn view_failed(
        label: impl Into<String>,
        qualified_name: impl Into<String>,
        source: ViewError,
    ) -> Self {
        Self::ViewFailed {
            label: label.into(),
            qualified_name: qualified_name.into(),
            source,
        }
    }

    /// Whether this error comes from the view declarations rather than the database
    pub fn is_configuration_error(&self) -> bool {
        match self {
            SyncError::ViewFailed { source, .. } | SyncError::View(source) => {
                source.is_configuration_error()
            }
            SyncError::DidNotConverge { .. }
            | SyncError::UnknownView(_)
            | SyncError::Configuration(_) => true,
        }
    }
}

/// Result type for sync runs
pub type Result<T> = std::result::Result<T, SyncError>;
