//! Connection and transaction traits

use crate::{QueryResult, Result, SavepointSupport, StatementResult, Value};
use async_trait::async_trait;

/// Anything that can run SQL: a connection or an open transaction.
///
/// Catalog lookups and DDL helpers are written against this trait so the
/// same code runs inside or outside a transactional scope.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Execute a statement that does not return rows (DDL, DML)
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult>;

    /// Execute a query that returns rows
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;
}

/// A database connection
#[async_trait]
pub trait Connection: Executor {
    /// Get the driver name (e.g., "postgresql")
    fn driver_name(&self) -> &str;

    /// Schema that unqualified view names resolve to on this connection.
    ///
    /// `None` means the server's search path decides and catalog lookups do
    /// not filter on schema.
    fn schema_name(&self) -> Option<&str> {
        None
    }

    /// Begin a transaction
    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>>;

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}

/// A database transaction
///
/// Dropping a transaction without calling `commit` or `rollback` leaves the
/// server-side transaction open until the connection is reused; callers are
/// expected to finish every transaction explicitly.
#[async_trait]
pub trait Transaction: Executor + SavepointSupport {
    /// Commit the transaction
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> Result<()>;
}
