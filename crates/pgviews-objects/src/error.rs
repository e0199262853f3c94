//! Error types for view definitions and view operations

use pgviews_core::PgViewsError;
use thiserror::Error;

/// Errors raised while declaring, ordering or applying views
#[derive(Debug, Error)]
pub enum ViewError {
    #[error("View name cannot be empty")]
    EmptyName,

    #[error("View {0} is already registered")]
    DuplicateView(String),

    #[error("View {0} has no SQL defined")]
    MissingSql(String),

    #[error("View {0} declares a concurrent index but is not materialized")]
    ConcurrentIndexOnPlainView(String),

    #[error("View {view}: invalid projection specifier {spec:?}")]
    InvalidProjection { view: String, spec: String },

    #[error("View {view}: query references ${index} but only {provided} parameter(s) are bound")]
    MissingParameter {
        view: String,
        index: usize,
        provided: usize,
    },

    #[error("View {0} is not a materialized view")]
    NotMaterialized(String),

    #[error("Cannot use concurrent refresh on view {view} without a concurrent index defined")]
    ConcurrentIndexNotDefined { view: String },

    #[error("View {view} depends on {dependency}, which is not declared")]
    UnresolvedDependency { view: String, dependency: String },

    #[error("Endless loop while ordering views, check dependencies of: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    #[error(transparent)]
    Database(#[from] PgViewsError),
}

impl ViewError {
    /// Whether this error is a declaration problem rather than a database failure
    pub fn is_configuration_error(&self) -> bool {
        !matches!(self, ViewError::Database(_))
    }
}

/// Result type for view operations
pub type Result<T> = std::result::Result<T, ViewError>;
