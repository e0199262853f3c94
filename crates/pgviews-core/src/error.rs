//! Error types for pgviews

use thiserror::Error;

/// Core error type for database operations
#[derive(Error, Debug)]
pub enum PgViewsError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    /// An error reported by the server, with its SQLSTATE code
    #[error("{message} (code: {code})")]
    Database { code: String, message: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("{0}")]
    Other(String),
}

impl PgViewsError {
    /// Build a server-side error from its SQLSTATE and message
    pub fn database(code: impl Into<String>, message: impl Into<String>) -> Self {
        PgViewsError::Database {
            code: code.into(),
            message: message.into(),
        }
    }

    /// The SQLSTATE code, if the error came from the server
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            PgViewsError::Database { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }

    /// Whether the server rejected the statement itself rather than failing
    /// to run it.
    ///
    /// Covers SQLSTATE classes 26 (invalid SQL statement name),
    /// 34 (invalid cursor name), 3D (invalid catalog name),
    /// 3F (invalid schema name) and 42 (syntax error or access rule
    /// violation, which includes `42P16 invalid_table_definition` raised when
    /// a replacement view changes column names or types).
    pub fn is_programming_error(&self) -> bool {
        let Some(code) = self.sqlstate() else {
            return false;
        };
        matches!(code.get(..2), Some("26" | "34" | "3D" | "3F" | "42"))
    }

    /// Whether the server reported that a relation does not exist
    pub fn is_undefined_table(&self) -> bool {
        self.sqlstate() == Some("42P01")
    }
}

/// Result type alias for database operations
pub type Result<T> = std::result::Result<T, PgViewsError>;
