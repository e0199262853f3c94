//! PostgreSQL connection implementation

use async_trait::async_trait;
use bytes::BytesMut;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_postgres::{
    types::{FromSql, ToSql, Type},
    Client, NoTls, Row as PgRow, Statement,
};
use pgviews_core::{
    ColumnMeta, Connection, Executor, PgViewsError, QueryResult, Result, Row, Savepoint,
    SavepointSupport, StatementResult, Transaction, Value,
};

use crate::{PostgresConfig, PostgresTlsConnector, SslMode};

fn map_postgres_error(context: &str, error: tokio_postgres::Error) -> PgViewsError {
    let Some(db_error) = error.as_db_error() else {
        return PgViewsError::Query(format!("{}: {}", context, error));
    };

    let mut message = db_error.message().to_string();

    if let Some(detail) = db_error.detail() {
        if !detail.trim().is_empty() {
            message.push_str(&format!(" (detail: {})", detail));
        }
    }

    if let Some(hint) = db_error.hint() {
        if !hint.trim().is_empty() {
            message.push_str(&format!(" (hint: {})", hint));
        }
    }

    PgViewsError::database(db_error.code().code(), message)
}

/// PostgreSQL connection wrapper
pub struct PostgresConnection {
    client: Arc<Mutex<Client>>,
    schema: Option<String>,
    closed: Arc<AtomicBool>,
}

impl PostgresConnection {
    /// Connect to a PostgreSQL database.
    ///
    /// When `config.schema` is set it is put first on the search path, so
    /// unqualified view names are created there.
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        tracing::info!(
            host = %config.host,
            port = config.port,
            database = %config.dbname,
            ssl_mode = config.ssl_mode.as_str(),
            "connecting to PostgreSQL database"
        );

        let pg_config = config.to_tokio_postgres();
        let closed = Arc::new(AtomicBool::new(false));

        let client = if config.ssl_mode == SslMode::Disable {
            let (client, connection) = pg_config
                .connect(NoTls)
                .await
                .map_err(|e| PgViewsError::Connection(format!("Failed to connect to PostgreSQL: {}", e)))?;
            let closed = Arc::clone(&closed);
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::error!(error = %e, "PostgreSQL connection error");
                }
                closed.store(true, Ordering::SeqCst);
            });
            client
        } else {
            let tls = PostgresTlsConnector::build(config)
                .map_err(|e| PgViewsError::Connection(e.to_string()))?;
            let (client, connection) = pg_config
                .connect(tls)
                .await
                .map_err(|e| PgViewsError::Connection(format!("Failed to connect to PostgreSQL: {}", e)))?;
            let closed = Arc::clone(&closed);
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::error!(error = %e, "PostgreSQL connection error");
                }
                closed.store(true, Ordering::SeqCst);
            });
            client
        };

        if let Some(schema) = &config.schema {
            let sql = format!("SET search_path TO {}, public", escape_identifier_pg(schema));
            client
                .batch_execute(&sql)
                .await
                .map_err(|e| map_postgres_error("Failed to set search_path", e))?;
        }

        tracing::info!(
            host = %config.host,
            database = %config.dbname,
            schema = config.schema.as_deref().unwrap_or("<default>"),
            "PostgreSQL connection established"
        );
        Ok(Self {
            client: Arc::new(Mutex::new(client)),
            schema: config.schema.clone(),
            closed,
        })
    }
}

/// Wrapper enum for converting pgviews_core::Value to types implementing ToSql.
#[derive(Debug)]
enum PgValue {
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    Json(serde_json::Value),
    DateTimeUtc(chrono::DateTime<chrono::Utc>),
    Date(chrono::NaiveDate),
    DateTime(chrono::NaiveDateTime),
}

impl PgValue {
    /// Convert a value into the variant that matches the parameter type the
    /// server inferred, so integers are written with the right width.
    fn from_value_for_type(value: &Value, target_type: Option<&Type>) -> Self {
        match value {
            Value::Null => PgValue::Null,
            Value::Bool(v) => PgValue::Bool(*v),
            Value::Int16(v) => Self::coerce_int(*v as i64, target_type),
            Value::Int32(v) => Self::coerce_int(*v as i64, target_type),
            Value::Int64(v) => Self::coerce_int(*v, target_type),
            Value::Float64(v) => PgValue::Float64(*v),
            Value::Decimal(v) | Value::String(v) => PgValue::String(v.clone()),
            Value::Bytes(v) => PgValue::Bytes(v.clone()),
            Value::Uuid(v) => PgValue::Uuid(*v),
            Value::Json(v) => PgValue::Json(v.clone()),
            Value::DateTimeUtc(v) => PgValue::DateTimeUtc(*v),
            Value::Date(v) => PgValue::Date(*v),
            Value::DateTime(v) => PgValue::DateTime(*v),
            Value::Array(_) => PgValue::String(value.to_sql_literal()),
        }
    }

    fn coerce_int(value: i64, target_type: Option<&Type>) -> Self {
        match target_type {
            Some(&Type::INT2) => PgValue::Int16(value as i16),
            Some(&Type::INT4) => PgValue::Int32(value as i32),
            _ => PgValue::Int64(value),
        }
    }
}

impl ToSql for PgValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<postgres_types::IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            PgValue::Null => Ok(postgres_types::IsNull::Yes),
            PgValue::Bool(v) => v.to_sql(ty, out),
            PgValue::Int16(v) => v.to_sql(ty, out),
            PgValue::Int32(v) => v.to_sql(ty, out),
            PgValue::Int64(v) => v.to_sql(ty, out),
            PgValue::Float64(v) => v.to_sql(ty, out),
            PgValue::String(v) => v.to_sql(ty, out),
            PgValue::Bytes(v) => v.to_sql(ty, out),
            PgValue::Uuid(v) => v.to_sql(ty, out),
            PgValue::Json(v) => v.to_sql(ty, out),
            PgValue::DateTimeUtc(v) => v.to_sql(ty, out),
            PgValue::Date(v) => v.to_sql(ty, out),
            PgValue::DateTime(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_: &Type) -> bool {
        true
    }

    postgres_types::to_sql_checked!();
}

/// Raw UTF-8 decoding for types without a dedicated mapping (enums, numeric text)
#[derive(Debug)]
struct PgFallbackString(String);

impl<'a> FromSql<'a> for PgFallbackString {
    fn from_sql(
        _: &Type,
        raw: &'a [u8],
    ) -> std::result::Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        Ok(Self(String::from_utf8(raw.to_vec())?))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

fn bind_params(statement: &Statement, params: &[Value]) -> Vec<PgValue> {
    let param_types = statement.params();
    params
        .iter()
        .enumerate()
        .map(|(i, value)| PgValue::from_value_for_type(value, param_types.get(i)))
        .collect()
}

async fn run_execute(client: &Client, sql: &str, params: &[Value]) -> Result<StatementResult> {
    let statement = client
        .prepare(sql)
        .await
        .map_err(|e| map_postgres_error("Failed to prepare statement", e))?;

    let pg_params = bind_params(&statement, params);
    let param_refs: Vec<&(dyn ToSql + Sync)> =
        pg_params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

    let rows_affected = client
        .execute(&statement, &param_refs)
        .await
        .map_err(|e| map_postgres_error("Failed to execute statement", e))?;

    tracing::debug!(affected_rows = rows_affected, "statement executed");
    Ok(StatementResult {
        affected_rows: rows_affected,
    })
}

async fn run_query(client: &Client, sql: &str, params: &[Value]) -> Result<QueryResult> {
    let start_time = std::time::Instant::now();

    let statement = client
        .prepare(sql)
        .await
        .map_err(|e| map_postgres_error("Failed to prepare query", e))?;

    let pg_params = bind_params(&statement, params);
    let param_refs: Vec<&(dyn ToSql + Sync)> =
        pg_params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

    let pg_rows = client
        .query(&statement, &param_refs)
        .await
        .map_err(|e| map_postgres_error("Failed to execute query", e))?;

    // Column metadata comes from the prepared statement so empty result sets
    // still describe their columns.
    let mut columns = Vec::new();
    let mut column_names = Vec::new();
    for (idx, col) in statement.columns().iter().enumerate() {
        let name = col.name().to_string();
        column_names.push(name.clone());
        columns.push(ColumnMeta {
            name,
            data_type: col.type_().name().to_string(),
            ordinal: idx,
        });
    }

    let mut rows = Vec::with_capacity(pg_rows.len());
    for pg_row in &pg_rows {
        let values = (0..columns.len())
            .map(|idx| postgres_to_value(pg_row, idx))
            .collect();
        rows.push(Row::new(column_names.clone(), values));
    }

    let execution_time_ms = start_time.elapsed().as_millis() as u64;
    tracing::debug!(
        row_count = rows.len(),
        execution_time_ms = execution_time_ms,
        "query executed successfully"
    );

    Ok(QueryResult {
        id: uuid::Uuid::new_v4(),
        columns,
        rows,
        affected_rows: 0,
        execution_time_ms,
    })
}

/// PostgreSQL transaction wrapper
///
/// Shares the connection's client; all statements issued through it run
/// between the `BEGIN` sent by `begin_transaction` and the final
/// `COMMIT`/`ROLLBACK`.
pub struct PostgresTransaction {
    client: Arc<Mutex<Client>>,
    committed: bool,
    rolled_back: bool,
}

impl Drop for PostgresTransaction {
    fn drop(&mut self) {
        if !self.committed && !self.rolled_back {
            tracing::warn!("PostgreSQL transaction dropped without commit or rollback");
        }
    }
}

#[async_trait]
impl Executor for PostgresTransaction {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        tracing::debug!(sql_preview = %sql.chars().take(100).collect::<String>(), "executing statement in transaction");
        let client = self.client.lock().await;
        run_execute(&client, sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        tracing::debug!(sql_preview = %sql.chars().take(100).collect::<String>(), "executing query in transaction");
        let client = self.client.lock().await;
        run_query(&client, sql, params).await
    }
}

#[async_trait]
impl SavepointSupport for PostgresTransaction {
    async fn savepoint(&self, name: &str) -> Result<Savepoint> {
        let client = self.client.lock().await;
        client
            .batch_execute(&format!("SAVEPOINT {}", escape_identifier_pg(name)))
            .await
            .map_err(|e| map_postgres_error("Failed to create savepoint", e))?;
        Ok(Savepoint::new(name))
    }

    async fn rollback_to_savepoint(&self, name: &str) -> Result<()> {
        let client = self.client.lock().await;
        client
            .batch_execute(&format!("ROLLBACK TO SAVEPOINT {}", escape_identifier_pg(name)))
            .await
            .map_err(|e| map_postgres_error("Failed to roll back to savepoint", e))
    }

    async fn release_savepoint(&self, name: &str) -> Result<()> {
        let client = self.client.lock().await;
        client
            .batch_execute(&format!("RELEASE SAVEPOINT {}", escape_identifier_pg(name)))
            .await
            .map_err(|e| map_postgres_error("Failed to release savepoint", e))
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn commit(mut self: Box<Self>) -> Result<()> {
        tracing::debug!("committing PostgreSQL transaction");

        if self.rolled_back {
            return Err(PgViewsError::Transaction("Transaction already rolled back".into()));
        }
        if self.committed {
            return Err(PgViewsError::Transaction("Transaction already committed".into()));
        }

        let client = self.client.lock().await;
        client
            .batch_execute("COMMIT")
            .await
            .map_err(|e| map_postgres_error("Failed to commit transaction", e))?;
        drop(client);

        self.committed = true;
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<()> {
        tracing::debug!("rolling back PostgreSQL transaction");

        if self.committed {
            return Err(PgViewsError::Transaction("Transaction already committed".into()));
        }
        if self.rolled_back {
            return Ok(());
        }

        let client = self.client.lock().await;
        client
            .batch_execute("ROLLBACK")
            .await
            .map_err(|e| map_postgres_error("Failed to rollback transaction", e))?;
        drop(client);

        self.rolled_back = true;
        Ok(())
    }
}

#[async_trait]
impl Executor for PostgresConnection {
    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        let client = self.client.lock().await;
        run_execute(&client, sql, params).await
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let client = self.client.lock().await;
        run_query(&client, sql, params).await
    }
}

#[async_trait]
impl Connection for PostgresConnection {
    fn driver_name(&self) -> &str {
        "postgresql"
    }

    fn schema_name(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>> {
        tracing::debug!("beginning PostgreSQL transaction");

        let client = self.client.lock().await;
        client
            .batch_execute("BEGIN")
            .await
            .map_err(|e| map_postgres_error("Failed to begin transaction", e))?;
        drop(client);

        Ok(Box::new(PostgresTransaction {
            client: Arc::clone(&self.client),
            committed: false,
            rolled_back: false,
        }))
    }

    async fn close(&self) -> Result<()> {
        tracing::info!("closing PostgreSQL connection");
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Convert a PostgreSQL row value to our Value type
fn postgres_to_value(row: &PgRow, idx: usize) -> Value {
    let col = &row.columns()[idx];

    match col.type_().name() {
        "bool" => row
            .try_get::<_, Option<bool>>(idx)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),
        "int2" => row
            .try_get::<_, Option<i16>>(idx)
            .ok()
            .flatten()
            .map(Value::Int16)
            .unwrap_or(Value::Null),
        "int4" => row
            .try_get::<_, Option<i32>>(idx)
            .ok()
            .flatten()
            .map(Value::Int32)
            .unwrap_or(Value::Null),
        "int8" => row
            .try_get::<_, Option<i64>>(idx)
            .ok()
            .flatten()
            .map(Value::Int64)
            .unwrap_or(Value::Null),
        "float8" => row
            .try_get::<_, Option<f64>>(idx)
            .ok()
            .flatten()
            .map(Value::Float64)
            .unwrap_or(Value::Null),
        "text" | "varchar" | "bpchar" | "name" => row
            .try_get::<_, Option<String>>(idx)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
        "bytea" => row
            .try_get::<_, Option<Vec<u8>>>(idx)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null),
        "uuid" => row
            .try_get::<_, Option<uuid::Uuid>>(idx)
            .ok()
            .flatten()
            .map(Value::Uuid)
            .unwrap_or(Value::Null),
        "json" | "jsonb" => row
            .try_get::<_, Option<serde_json::Value>>(idx)
            .ok()
            .flatten()
            .map(Value::Json)
            .unwrap_or(Value::Null),
        "date" => row
            .try_get::<_, Option<chrono::NaiveDate>>(idx)
            .ok()
            .flatten()
            .map(Value::Date)
            .unwrap_or(Value::Null),
        "timestamp" => row
            .try_get::<_, Option<chrono::NaiveDateTime>>(idx)
            .ok()
            .flatten()
            .map(Value::DateTime)
            .unwrap_or(Value::Null),
        "timestamptz" => row
            .try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)
            .ok()
            .flatten()
            .map(Value::DateTimeUtc)
            .unwrap_or(Value::Null),
        // PostgreSQL prefixes array type names with an underscore
        "_text" | "_varchar" | "_name" => row
            .try_get::<_, Option<Vec<String>>>(idx)
            .ok()
            .flatten()
            .map(|arr| Value::Array(arr.into_iter().map(Value::String).collect()))
            .unwrap_or(Value::Null),
        _ => row
            .try_get::<_, Option<PgFallbackString>>(idx)
            .ok()
            .flatten()
            .map(|value| Value::String(value.0))
            .unwrap_or(Value::Null),
    }
}

/// Escape a PostgreSQL identifier
fn escape_identifier_pg(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_identifier() {
        assert_eq!(escape_identifier_pg("tenant_a"), "\"tenant_a\"");
        assert_eq!(escape_identifier_pg("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_int_coercion_follows_parameter_type() {
        assert!(matches!(
            PgValue::from_value_for_type(&Value::Int64(5), Some(&Type::INT4)),
            PgValue::Int32(5)
        ));
        assert!(matches!(
            PgValue::from_value_for_type(&Value::Int32(5), Some(&Type::INT2)),
            PgValue::Int16(5)
        ));
        assert!(matches!(
            PgValue::from_value_for_type(&Value::Int32(5), None),
            PgValue::Int64(5)
        ));
    }

    #[test]
    fn test_strings_pass_through() {
        assert!(matches!(
            PgValue::from_value_for_type(&Value::from("public"), Some(&Type::NAME)),
            PgValue::String(ref s) if s == "public"
        ));
    }
}
