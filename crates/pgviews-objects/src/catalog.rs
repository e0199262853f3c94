//! Catalog lookups for views, materialized views and their indexes
//!
//! Every lookup takes the resolved `(schema, name)` pair; a `None` schema
//! means the lookup is not filtered by schema.

use pgviews_core::{Executor, Result};
use std::collections::{BTreeSet, HashMap};

use crate::statements::WhereClause;

async fn count<E: Executor + ?Sized>(executor: &E, table: &str, clause: WhereClause) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {} WHERE {}", table, clause.sql());
    let result = executor.query(&sql, clause.params()).await?;
    Ok(result.scalar().and_then(|v| v.as_i64()).unwrap_or(0))
}

/// Whether a plain view exists
pub async fn view_exists<E: Executor + ?Sized>(
    executor: &E,
    schema: Option<&str>,
    name: &str,
) -> Result<bool> {
    let clause = WhereClause::new()
        .eq("table_schema", schema)
        .eq("table_name", Some(name));
    Ok(count(executor, "information_schema.views", clause).await? > 0)
}

/// Whether a materialized view exists
pub async fn materialized_view_exists<E: Executor + ?Sized>(
    executor: &E,
    schema: Option<&str>,
    name: &str,
) -> Result<bool> {
    let clause = WhereClause::new()
        .eq("schemaname", schema)
        .eq("matviewname", Some(name));
    Ok(count(executor, "pg_matviews", clause).await? > 0)
}

/// Stored definitions of the named materialized views, as the server
/// reformatted them, keyed by view name
pub async fn materialized_view_definitions<E: Executor + ?Sized>(
    executor: &E,
    schema: Option<&str>,
    names: &[&str],
) -> Result<HashMap<String, String>> {
    let clause = WhereClause::new()
        .eq("schemaname", schema)
        .any_of("matviewname", names);
    let sql = format!(
        "SELECT matviewname, definition FROM pg_matviews WHERE {}",
        clause.sql()
    );
    let result = executor.query(&sql, clause.params()).await?;

    Ok(result
        .rows
        .iter()
        .filter_map(|row| {
            let name = row.get(0)?.as_str()?.to_string();
            let definition = row.get(1)?.as_str()?.to_string();
            Some((name, definition))
        })
        .collect())
}

/// Whether a materialized view currently holds data
pub async fn materialized_view_is_populated<E: Executor + ?Sized>(
    executor: &E,
    schema: Option<&str>,
    name: &str,
) -> Result<bool> {
    let clause = WhereClause::new()
        .eq("schemaname", schema)
        .eq("matviewname", Some(name));
    let sql = format!("SELECT ispopulated FROM pg_matviews WHERE {}", clause.sql());
    let result = executor.query(&sql, clause.params()).await?;
    Ok(result.scalar().and_then(|v| v.as_bool()).unwrap_or(false))
}

/// Names of the indexes defined on a relation
pub async fn index_names<E: Executor + ?Sized>(
    executor: &E,
    schema: Option<&str>,
    table: &str,
) -> Result<BTreeSet<String>> {
    let clause = WhereClause::new()
        .eq("schemaname", schema)
        .eq("tablename", Some(table));
    let sql = format!("SELECT indexname FROM pg_indexes WHERE {}", clause.sql());
    let result = executor.query(&sql, clause.params()).await?;
    Ok(result
        .first_column()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect())
}
