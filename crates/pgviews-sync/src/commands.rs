//! Entry points behind the `sync`, `refresh` and `clear` commands

use pgviews_objects::{ViewRegistry, drop_view};
use std::sync::Arc;

use crate::refresh::refresh_specific_views;
use crate::{
    BacklogReport, ConnectionRouter, RefreshOptions, Result, Signals, SyncError, SyncOptions,
    ViewRefresher, ViewSyncer,
};

/// Declared views together with where they go and who is told about it
pub struct PgViews {
    registry: ViewRegistry,
    router: Arc<dyn ConnectionRouter>,
    signals: Signals,
}

impl std::fmt::Debug for PgViews {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgViews")
            .field("views", &self.registry.len())
            .field("signals", &self.signals)
            .finish()
    }
}

impl PgViews {
    pub fn new(registry: ViewRegistry, router: Arc<dyn ConnectionRouter>) -> Self {
        Self {
            registry,
            router,
            signals: Signals::new(),
        }
    }

    pub fn registry(&self) -> &ViewRegistry {
        &self.registry
    }

    pub fn router(&self) -> &dyn ConnectionRouter {
        &*self.router
    }

    pub fn signals(&self) -> &Signals {
        &self.signals
    }

    /// Create or update every view routable to `using`
    pub async fn sync_all(&self, using: &str, options: SyncOptions) -> Result<BacklogReport> {
        if !self.registry.is_settled() {
            tracing::warn!(
                sources = ?self.registry.pending_sources(),
                "view projections are waiting on undeclared sources"
            );
        }
        tracing::debug!(using, ?options, views = self.registry.len(), "syncing pgviews");
        ViewSyncer::new(&self.registry, &*self.router, &self.signals)
            .run(using, options)
            .await
    }

    /// Refresh every materialized view routable to `using`
    pub async fn refresh_all(&self, using: &str, options: RefreshOptions) -> Result<BacklogReport> {
        tracing::debug!(using, ?options, "refreshing pgviews");
        ViewRefresher::new(&self.registry, &*self.router)
            .run(using, options)
            .await
    }

    /// Refresh the named views and everything connected to them
    pub async fn refresh_views(
        &self,
        labels: &[&str],
        concurrently: bool,
        strict: bool,
    ) -> Result<usize> {
        refresh_specific_views(&self.registry, &*self.router, labels, concurrently, strict).await
    }

    /// Drop every view routable to `using`, returning the labels dropped
    pub async fn clear_all(&self, using: &str) -> Result<Vec<String>> {
        let mut dropped = Vec::new();
        for view in self.registry.iter() {
            let Some(connection) = self.router.connection_for(using, view, true) else {
                continue;
            };
            let label = view.label();
            let outcome = drop_view(&*connection, view.table(), view.is_materialized())
                .await
                .map_err(|source| SyncError::view_failed(&label, view.table().to_string(), source))?;
            tracing::info!(view = %label, using, "{} ({}): {}", label, view.table(), outcome.describe());
            dropped.push(label);
        }
        Ok(dropped)
    }
}
