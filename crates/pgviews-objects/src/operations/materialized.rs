//! Materialized views: create, compare, reconcile indexes, refresh

use pgviews_core::{Connection, Executor};
use std::collections::BTreeSet;

use super::{finish, schema_label, SyncOutcome};
use crate::statements;
use crate::{catalog, Result, ViewDefinition, ViewError};

/// Indexes dropped and created by [`reconcile_indexes`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexChanges {
    pub dropped: Vec<String>,
    pub created: Vec<String>,
}

impl IndexChanges {
    pub fn is_empty(&self) -> bool {
        self.dropped.is_empty() && self.created.is_empty()
    }
}

/// Create a materialized view, or recreate it when its definition changed.
///
/// Without `check_sql_changed` an existing view is always dropped and
/// recreated. With it, the new query is first created as an unpopulated
/// scratch view and the definitions PostgreSQL stored for both are compared;
/// when they match only the indexes are reconciled (and the view refreshed
/// if it should hold data but does not) and `Exists` is returned.
pub async fn create_or_update_materialized_view(
    connection: &dyn Connection,
    view: &ViewDefinition,
    check_sql_changed: bool,
) -> Result<SyncOutcome> {
    if !view.is_materialized() {
        return Err(ViewError::NotMaterialized(view.label()));
    }
    let query = view.rendered_sql()?;
    let default_schema = connection.schema_name();

    let transaction = connection.begin_transaction().await?;
    let result = apply_materialized_view(
        &*transaction,
        view,
        &query,
        default_schema,
        check_sql_changed,
    )
    .await;
    finish(transaction, result).await
}

async fn apply_materialized_view<E: Executor + ?Sized>(
    executor: &E,
    view: &ViewDefinition,
    query: &str,
    default_schema: Option<&str>,
    check_sql_changed: bool,
) -> Result<SyncOutcome> {
    let table = view.table();
    let (schema, name) = table.resolve(default_schema);
    let schema_log = schema_label(default_schema);

    let exists = catalog::materialized_view_exists(executor, schema, name).await?;

    if check_sql_changed && exists {
        let scratch = table.sibling(statements::temporary_name(name));

        executor
            .execute(&statements::drop_view(&scratch, true, false), &[])
            .await?;
        executor
            .execute(&statements::create_materialized_view(&scratch, query, false), &[])
            .await?;
        let definitions =
            catalog::materialized_view_definitions(executor, schema, &[name, scratch.name()])
                .await?;
        executor
            .execute(&statements::drop_view(&scratch, true, false), &[])
            .await?;

        let live = definitions.get(name);
        if live.is_some() && live == definitions.get(scratch.name()) {
            reconcile_indexes(executor, view, default_schema).await?;

            if view.with_data_enabled()
                && !catalog::materialized_view_is_populated(executor, schema, name).await?
            {
                executor
                    .execute(&statements::refresh_materialized_view(table, false), &[])
                    .await?;
                tracing::info!(view = %table, schema = %schema_log, "pgview refreshed unpopulated materialized view");
            }
            return Ok(SyncOutcome::Exists);
        }
    }

    if exists {
        executor
            .execute(&statements::drop_view(table, true, true), &[])
            .await?;
        tracing::info!(view = %table, schema = %schema_log, "pgview dropped materialized view");
    }

    executor
        .execute(
            &statements::create_materialized_view(table, query, view.with_data_enabled()),
            &[],
        )
        .await?;
    tracing::info!(view = %table, schema = %schema_log, "pgview created materialized view");

    if let Some(columns) = view.concurrent_index() {
        executor
            .execute(&statements::create_concurrent_index(table, columns), &[])
            .await?;
        tracing::info!(view = %table, schema = %schema_log, "pgview created concurrent index");
    }

    for index in view.indexes() {
        executor
            .execute(&statements::create_index(table, index), &[])
            .await?;
        tracing::info!(view = %table, index = %index.name, schema = %schema_log, "pgview created index");
    }

    Ok(if exists {
        SyncOutcome::Updated
    } else {
        SyncOutcome::Created
    })
}

/// Bring the indexes on a materialized view in line with its declaration.
///
/// Indexes that exist but are not declared are dropped and declared ones
/// that are missing are created. Indexes present under a declared name are
/// left untouched, so a second call with the same declaration issues no DDL.
pub async fn reconcile_indexes<E: Executor + ?Sized>(
    executor: &E,
    view: &ViewDefinition,
    default_schema: Option<&str>,
) -> Result<IndexChanges> {
    let table = view.table();
    let (schema, name) = table.resolve(default_schema);
    let schema_log = schema_label(default_schema);

    let existing = catalog::index_names(executor, schema, name).await?;

    let concurrent_index_name = view.concurrent_index_name();
    let mut required: BTreeSet<String> = view.indexes().iter().map(|i| i.name.clone()).collect();
    if let Some(index_name) = &concurrent_index_name {
        required.insert(index_name.clone());
    }

    let mut changes = IndexChanges::default();

    for index_name in existing.difference(&required) {
        executor
            .execute(&statements::drop_index(schema, index_name), &[])
            .await?;
        tracing::info!(view = %table, index = %index_name, schema = %schema_log, "pgview dropped index");
        changes.dropped.push(index_name.clone());
    }

    for index_name in required.difference(&existing) {
        if Some(index_name) == concurrent_index_name.as_ref() {
            if let Some(columns) = view.concurrent_index() {
                executor
                    .execute(&statements::create_concurrent_index(table, columns), &[])
                    .await?;
                tracing::info!(view = %table, schema = %schema_log, "pgview created concurrent index");
            }
        } else if let Some(index) = view.indexes().iter().find(|i| &i.name == index_name) {
            executor
                .execute(&statements::create_index(table, index), &[])
                .await?;
            tracing::info!(view = %table, index = %index_name, schema = %schema_log, "pgview created index");
        }
        changes.created.push(index_name.clone());
    }

    Ok(changes)
}

/// Refresh a materialized view.
///
/// A concurrent refresh needs the view's concurrent index. When it is not
/// declared, `strict` turns the request into
/// [`ViewError::ConcurrentIndexNotDefined`]; otherwise a warning is logged
/// and a normal, exclusively locking refresh is done instead.
pub async fn refresh_materialized_view<E: Executor + ?Sized>(
    executor: &E,
    view: &ViewDefinition,
    concurrently: bool,
    strict: bool,
) -> Result<()> {
    if !view.is_materialized() {
        return Err(ViewError::NotMaterialized(view.label()));
    }

    let concurrently = if concurrently && view.concurrent_index().is_none() {
        if strict {
            return Err(ViewError::ConcurrentIndexNotDefined { view: view.label() });
        }
        tracing::warn!(
            view = %view.label(),
            "cannot use concurrent refresh without a concurrent index defined, falling back to normal refresh"
        );
        false
    } else {
        concurrently
    };

    executor
        .execute(
            &statements::refresh_materialized_view(view.table(), concurrently),
            &[],
        )
        .await?;
    tracing::debug!(view = %view.label(), concurrently, "refreshed materialized view");
    Ok(())
}
