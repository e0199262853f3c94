//! Refreshing materialized views together with what they are connected to

use pgviews_objects::{ViewDefinition, ViewError, ViewRegistry, refresh_materialized_view};
use std::collections::HashSet;

use crate::graph::{dependants, dependencies, reorder_by_dependencies};
use crate::{ConnectionRouter, Result, SyncError};

/// Refresh one materialized view on the database writes for it are routed to.
///
/// Returns `false`, after logging a warning, when the router has no
/// connection for that database.
pub async fn refresh_view(
    router: &dyn ConnectionRouter,
    view: &ViewDefinition,
    concurrently: bool,
    strict: bool,
) -> std::result::Result<bool, ViewError> {
    let alias = router.db_for_write(view);
    let Some(connection) = router.connection_for(&alias, view, false) else {
        tracing::warn!(view = %view.label(), using = %alias, "failed to find connection to refresh");
        return Ok(false);
    };
    refresh_materialized_view(&*connection, view, concurrently, strict).await?;
    Ok(true)
}

/// Refresh `labels` along with every view that depends on them, directly or
/// not, and everything those depend on, in dependency order.
///
/// Plain views in that set are passed over. Returns the number of
/// materialized views refreshed.
pub async fn refresh_specific_views(
    registry: &ViewRegistry,
    router: &dyn ConnectionRouter,
    labels: &[&str],
    concurrently: bool,
    strict: bool,
) -> Result<usize> {
    let mut selected: Vec<&ViewDefinition> = Vec::with_capacity(labels.len());
    for label in labels {
        let view = registry
            .get(label)
            .ok_or_else(|| SyncError::UnknownView(label.to_string()))?;
        selected.push(view);
    }

    let mut downstream = dependants(registry, &selected);
    while !downstream.is_empty() {
        selected.extend(downstream);
        downstream = dependants(registry, &selected);
    }
    let upstream = dependencies(registry, &selected)?;
    selected.extend(upstream);

    let mut seen = HashSet::new();
    selected.retain(|view| seen.insert(view.label()));

    let mut refreshed = 0;
    for view in reorder_by_dependencies(&selected)? {
        if !view.is_materialized() {
            continue;
        }
        let label = view.label();
        let done = refresh_view(router, view, concurrently, strict)
            .await
            .map_err(|source| SyncError::view_failed(&label, view.table().to_string(), source))?;
        if done {
            tracing::info!(view = %label, concurrently, "refreshed {}", label);
            refreshed += 1;
        }
    }
    Ok(refreshed)
}
