//! Plain views

use pgviews_core::{Connection, Executor, SavepointSupport};

use super::{finish, SyncOutcome};
use crate::statements::{self, PROBE_VIEW_NAME};
use crate::{catalog, QualifiedName, Result, ViewSql};

/// Create a plain view, or bring an existing one up to date.
///
/// When the view exists and `update` is set, the new query is first tried
/// against a temporary copy of the live view. If PostgreSQL rejects the
/// replacement the view is only dropped (cascading to its dependants) and
/// recreated when `force` is set; otherwise nothing is changed and
/// `ForceRequired` is returned.
pub async fn create_or_update_view(
    connection: &dyn Connection,
    table: &QualifiedName,
    sql: &ViewSql,
    update: bool,
    force: bool,
) -> Result<SyncOutcome> {
    let query = sql.render(&table.to_string())?;
    let (schema, name) = table.resolve(connection.schema_name());

    let transaction = connection.begin_transaction().await?;
    let result = apply_view(&*transaction, table, schema, name, &query, update, force).await;
    finish(transaction, result).await
}

async fn apply_view<T>(
    transaction: &T,
    table: &QualifiedName,
    schema: Option<&str>,
    name: &str,
    query: &str,
    update: bool,
    force: bool,
) -> Result<SyncOutcome>
where
    T: Executor + SavepointSupport + ?Sized,
{
    let exists = catalog::view_exists(transaction, schema, name).await?;
    if exists && !update {
        return Ok(SyncOutcome::Exists);
    }

    let force_required = exists && is_incompatible(transaction, table, query).await?;

    if !force_required {
        transaction
            .execute(&statements::create_or_replace_view(table, query), &[])
            .await?;
        return Ok(if exists {
            SyncOutcome::Updated
        } else {
            SyncOutcome::Created
        });
    }

    if force {
        transaction
            .execute(&statements::drop_view(table, false, true), &[])
            .await?;
        transaction
            .execute(&statements::create_view(table, query), &[])
            .await?;
        return Ok(SyncOutcome::Forced);
    }

    Ok(SyncOutcome::ForceRequired)
}

/// Try the new query against a temporary copy of the live view.
///
/// Only errors PostgreSQL classifies as programming errors count as an
/// incompatible shape; anything else is returned. The copy is dropped in
/// every case.
async fn is_incompatible<T>(transaction: &T, table: &QualifiedName, query: &str) -> Result<bool>
where
    T: Executor + SavepointSupport + ?Sized,
{
    transaction
        .execute(&statements::create_probe_view(table), &[])
        .await?;
    transaction.savepoint(PROBE_VIEW_NAME).await?;

    let probe = match transaction
        .execute(&statements::replace_probe_view(query), &[])
        .await
    {
        Ok(_) => {
            transaction.release_savepoint(PROBE_VIEW_NAME).await?;
            Ok(false)
        }
        Err(error) => {
            transaction.rollback_to_savepoint(PROBE_VIEW_NAME).await?;
            transaction.release_savepoint(PROBE_VIEW_NAME).await?;
            if error.is_programming_error() {
                tracing::debug!(view = %table, error = %error, "new definition is incompatible with the live view");
                Ok(true)
            } else {
                Err(error)
            }
        }
    };

    transaction
        .execute(&statements::drop_probe_view(), &[])
        .await?;
    Ok(probe?)
}

/// Drop a view or materialized view and everything depending on it.
///
/// Absent views are not an error.
pub async fn drop_view<E: Executor + ?Sized>(
    executor: &E,
    table: &QualifiedName,
    is_materialized: bool,
) -> Result<SyncOutcome> {
    executor
        .execute(&statements::drop_view(table, is_materialized, true), &[])
        .await?;
    Ok(SyncOutcome::Dropped)
}
