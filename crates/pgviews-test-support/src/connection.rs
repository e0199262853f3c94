//! Connection and transaction over a `FakeDatabase`

use async_trait::async_trait;
use parking_lot::Mutex;
use pgviews_core::{
    Connection, Executor, PgViewsError, QueryResult, Result, Savepoint, SavepointSupport,
    StatementResult, Transaction, Value,
};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::catalog::{FakeDatabase, Objects};

/// Autocommit connection to a `FakeDatabase`
#[derive(Debug)]
pub struct FakeConnection {
    db: FakeDatabase,
    closed: AtomicBool,
}

impl FakeConnection {
    pub(crate) fn new(db: FakeDatabase) -> Self {
        Self {
            db,
            closed: AtomicBool::new(false),
        }
    }

    pub fn database(&self) -> &FakeDatabase {
        &self.db
    }
}

#[async_trait]
impl Executor for FakeConnection {
    async fn execute(&self, sql: &str, _params: &[Value]) -> Result<StatementResult> {
        let affected_rows = self.db.execute(sql)?;
        Ok(StatementResult { affected_rows })
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.db.query(sql, params)
    }
}

#[async_trait]
impl Connection for FakeConnection {
    fn driver_name(&self) -> &str {
        "fake"
    }

    fn schema_name(&self) -> Option<&str> {
        self.db.schema()
    }

    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>> {
        Ok(Box::new(FakeTransaction::new(self.db.clone())))
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Snapshot-based transaction.
///
/// Like PostgreSQL, a failed statement poisons the transaction until it
/// is rolled back, either fully or to a savepoint.
#[derive(Debug)]
pub struct FakeTransaction {
    db: FakeDatabase,
    snapshot: Objects,
    savepoints: Mutex<Vec<(String, Objects)>>,
    aborted: AtomicBool,
}

impl FakeTransaction {
    fn new(db: FakeDatabase) -> Self {
        let snapshot = db.snapshot();
        Self {
            db,
            snapshot,
            savepoints: Mutex::new(Vec::new()),
            aborted: AtomicBool::new(false),
        }
    }

    fn ensure_active(&self) -> Result<()> {
        if self.aborted.load(Ordering::SeqCst) {
            return Err(PgViewsError::database(
                "25P02",
                "current transaction is aborted, commands ignored until end of transaction block",
            ));
        }
        Ok(())
    }

    fn track<T>(&self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.aborted.store(true, Ordering::SeqCst);
        }
        result
    }
}

#[async_trait]
impl Executor for FakeTransaction {
    async fn execute(&self, sql: &str, _params: &[Value]) -> Result<StatementResult> {
        self.ensure_active()?;
        let affected_rows = self.track(self.db.execute(sql))?;
        Ok(StatementResult { affected_rows })
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.ensure_active()?;
        self.track(self.db.query(sql, params))
    }
}

#[async_trait]
impl SavepointSupport for FakeTransaction {
    async fn savepoint(&self, name: &str) -> Result<Savepoint> {
        self.ensure_active()?;
        self.savepoints
            .lock()
            .push((name.to_string(), self.db.snapshot()));
        Ok(Savepoint::new(name))
    }

    async fn rollback_to_savepoint(&self, name: &str) -> Result<()> {
        let mut savepoints = self.savepoints.lock();
        let position = savepoints
            .iter()
            .rposition(|(n, _)| n == name)
            .ok_or_else(|| no_such_savepoint(name))?;
        savepoints.truncate(position + 1);
        let (_, objects) = &savepoints[position];
        self.db.restore(objects.clone());
        self.aborted.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn release_savepoint(&self, name: &str) -> Result<()> {
        self.ensure_active()?;
        let mut savepoints = self.savepoints.lock();
        let position = savepoints
            .iter()
            .rposition(|(n, _)| n == name)
            .ok_or_else(|| no_such_savepoint(name))?;
        savepoints.truncate(position);
        Ok(())
    }
}

#[async_trait]
impl Transaction for FakeTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        if self.aborted.load(Ordering::SeqCst) {
            self.db.restore(self.snapshot.clone());
            return Err(PgViewsError::Transaction(
                "transaction was aborted and has been rolled back".into(),
            ));
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.db.restore(self.snapshot.clone());
        Ok(())
    }
}

fn no_such_savepoint(name: &str) -> PgViewsError {
    PgViewsError::database("3B001", format!("savepoint \"{}\" does not exist", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rollback_restores_catalog() {
        let db = FakeDatabase::new().with_table("sales", &["id", "total"]);
        let conn = db.connection();

        let tx = conn.begin_transaction().await.unwrap();
        tx.execute("CREATE VIEW totals AS SELECT total FROM sales", &[])
            .await
            .unwrap();
        assert!(db.has_view("totals"));
        tx.rollback().await.unwrap();

        assert!(!db.has_view("totals"));
    }

    #[tokio::test]
    async fn test_failed_statement_poisons_until_savepoint_rollback() {
        let db = FakeDatabase::new().with_table("sales", &["id", "total"]);
        let conn = db.connection();

        let tx = conn.begin_transaction().await.unwrap();
        tx.savepoint("probe").await.unwrap();
        assert!(tx.execute("CREATE VIEW broken AS SELECT x FROM missing", &[]).await.is_err());
        assert!(tx.execute("CREATE VIEW totals AS SELECT total FROM sales", &[]).await.is_err());

        tx.rollback_to_savepoint("probe").await.unwrap();
        tx.execute("CREATE VIEW totals AS SELECT total FROM sales", &[])
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert!(db.has_view("totals"));
    }

    #[tokio::test]
    async fn test_replace_view_cannot_rename_columns() {
        let db = FakeDatabase::new().with_table("sales", &["id", "total"]);
        let conn = db.connection();
        conn.execute("CREATE VIEW v AS SELECT id, total FROM sales", &[])
            .await
            .unwrap();

        let err = conn
            .execute("CREATE OR REPLACE VIEW v AS SELECT id, total AS amount FROM sales", &[])
            .await
            .unwrap_err();
        assert_eq!(err.sqlstate(), Some("42P16"));

        conn.execute(
            "CREATE OR REPLACE VIEW v AS SELECT id, total, 1 AS extra FROM sales",
            &[],
        )
        .await
        .unwrap();
        assert_eq!(
            db.columns("v"),
            Some(vec!["id".to_string(), "total".to_string(), "extra".to_string()])
        );
    }

    #[tokio::test]
    async fn test_drop_without_cascade_blocked_by_dependants() {
        let db = FakeDatabase::new().with_table("sales", &["id"]);
        let conn = db.connection();
        conn.execute("CREATE VIEW a AS SELECT id FROM sales", &[]).await.unwrap();
        conn.execute("CREATE VIEW b AS SELECT id FROM a", &[]).await.unwrap();

        let err = conn.execute("DROP VIEW IF EXISTS a", &[]).await.unwrap_err();
        assert_eq!(err.sqlstate(), Some("2BP01"));

        conn.execute("DROP VIEW IF EXISTS a CASCADE", &[]).await.unwrap();
        assert!(!db.has_view("a"));
        assert!(!db.has_view("b"));
    }

    #[tokio::test]
    async fn test_catalog_lookup_without_schema_filter() {
        let db = FakeDatabase::new().with_table("sales", &["id"]);
        let conn = db.connection();
        conn.execute("CREATE VIEW a AS SELECT id FROM sales", &[]).await.unwrap();

        let result = conn
            .query(
                "SELECT COUNT(*) FROM information_schema.views WHERE table_name = $1",
                &[Value::from("a")],
            )
            .await
            .unwrap();
        assert_eq!(result.scalar(), Some(&Value::Int64(1)));
    }
}
