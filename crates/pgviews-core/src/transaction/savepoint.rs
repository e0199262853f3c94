//! Savepoint support for database transactions
//!
//! Savepoints are what the view operations use as sub-transactions: a
//! statement that is expected to fail (such as a compatibility probe) runs
//! after a savepoint so the failure can be rolled back without aborting the
//! enclosing transaction.

use crate::Result;
use async_trait::async_trait;

/// A savepoint within a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Savepoint {
    name: String,
}

impl Savepoint {
    /// Create a new savepoint with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Get the name of the savepoint.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Trait for transactions that support savepoints.
///
/// # Example
/// ```ignore
/// let tx = conn.begin_transaction().await?;
/// tx.savepoint("probe").await?;
/// match tx.execute("CREATE OR REPLACE TEMPORARY VIEW probe AS SELECT 1", &[]).await {
///     Ok(_) => tx.release_savepoint("probe").await?,
///     Err(_) => tx.rollback_to_savepoint("probe").await?,
/// }
/// tx.commit().await?;
/// ```
#[async_trait]
pub trait SavepointSupport: Send + Sync {
    /// Create a savepoint with the given name.
    async fn savepoint(&self, name: &str) -> Result<Savepoint>;

    /// Rollback to a previously created savepoint.
    ///
    /// All changes made after the savepoint was created are undone. The
    /// savepoint itself remains valid.
    async fn rollback_to_savepoint(&self, name: &str) -> Result<()>;

    /// Release (delete) a savepoint, keeping the changes made after it.
    async fn release_savepoint(&self, name: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_savepoint_new() {
        let sp = Savepoint::new("check_conflict");
        assert_eq!(sp.name(), "check_conflict");
    }

    #[test]
    fn test_savepoint_equality() {
        let sp1 = Savepoint::new("same");
        let sp2 = Savepoint::new("same");
        let sp3 = Savepoint::new("different");

        assert_eq!(sp1, sp2);
        assert_ne!(sp1, sp3);
    }
}
