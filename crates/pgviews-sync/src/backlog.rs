//! Round-based processing of every declared view
//!
//! Views are taken in registry order. A view whose dependencies have not
//! been processed yet goes to the back of the queue for the next round.
//! After [`MAX_ROUNDS`] rounds with views still waiting the run gives up,
//! which is what a dependency cycle or a dependency on an unroutable view
//! looks like.

use async_trait::async_trait;
use pgviews_objects::{
    SyncOutcome, ViewDefinition, ViewError, ViewRegistry, create_or_update_materialized_view,
    create_or_update_view,
};
use std::collections::HashSet;

use crate::graph::MAX_ROUNDS;
use crate::refresh::refresh_view;
use crate::{ConnectionRouter, Result, Signals, SyncError, ViewSynced};

/// Log target of the "already exists" line, so it can be filtered on its own
pub const EXISTS_TARGET: &str = "pgviews::sync::exists";

/// What a backlog run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BacklogReport {
    /// Labels of processed views, in processing order
    pub finished: Vec<String>,
    /// Labels of views the router kept off the target database
    pub skipped: Vec<String>,
    /// Outcome per synced view, in processing order
    pub outcomes: Vec<(String, SyncOutcome)>,
    pub rounds: usize,
}

impl BacklogReport {
    pub fn outcome(&self, label: &str) -> Option<SyncOutcome> {
        self.outcomes
            .iter()
            .find(|(finished, _)| finished == label)
            .map(|(_, outcome)| *outcome)
    }

    /// Number of views whose database object changed
    pub fn changed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.has_changed())
            .count()
    }
}

enum Handled {
    Finished(Option<SyncOutcome>),
    Skipped,
}

#[async_trait]
trait ViewHandler: Send + Sync {
    async fn handle(&self, view: &ViewDefinition) -> std::result::Result<Handled, ViewError>;
}

async fn run_backlog<H: ViewHandler>(registry: &ViewRegistry, handler: &H) -> Result<BacklogReport> {
    let mut report = BacklogReport::default();
    let mut finished: HashSet<String> = HashSet::new();
    let mut backlog: Vec<&ViewDefinition> = registry.iter().collect();

    while !backlog.is_empty() && report.rounds < MAX_ROUNDS {
        report.rounds += 1;
        let mut deferred = Vec::new();

        for view in backlog {
            let label = view.label();
            if let Some(waiting_on) = view
                .dependencies()
                .iter()
                .find(|dependency| !finished.contains(*dependency))
            {
                tracing::info!(view = %label, waiting_on = %waiting_on, "putting pgview at back of queue");
                deferred.push(view);
                continue;
            }

            let handled = handler
                .handle(view)
                .await
                .map_err(|source| SyncError::view_failed(&label, view.table().to_string(), source))?;

            match handled {
                Handled::Finished(outcome) => {
                    if let Some(outcome) = outcome {
                        report.outcomes.push((label.clone(), outcome));
                    }
                    finished.insert(label.clone());
                    report.finished.push(label);
                }
                Handled::Skipped => report.skipped.push(label),
            }
        }

        backlog = deferred;
    }

    if !backlog.is_empty() {
        let pending: Vec<String> = backlog.iter().map(|view| view.label()).collect();
        tracing::warn!(
            rounds = report.rounds,
            pending = ?pending,
            "pgviews dependencies hit limit, check that view dependencies are correct"
        );
        return Err(SyncError::DidNotConverge {
            rounds: report.rounds,
            pending,
        });
    }

    Ok(report)
}

/// Flags of a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Replace plain views whose definition is incompatible, dropping dependants
    pub force: bool,
    /// Replace existing plain views
    pub update: bool,
    /// Compare materialized view definitions before recreating them
    pub check_sql_changed: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            force: false,
            update: true,
            check_sql_changed: false,
        }
    }
}

/// Flags of a refresh run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshOptions {
    pub concurrently: bool,
    /// Fail instead of falling back when a concurrent refresh is impossible
    pub strict: bool,
}

/// Creates or updates every declared view on one database
pub struct ViewSyncer<'a> {
    registry: &'a ViewRegistry,
    router: &'a dyn ConnectionRouter,
    signals: &'a Signals,
}

impl<'a> ViewSyncer<'a> {
    pub fn new(
        registry: &'a ViewRegistry,
        router: &'a dyn ConnectionRouter,
        signals: &'a Signals,
    ) -> Self {
        Self {
            registry,
            router,
            signals,
        }
    }

    /// Sync every view routable to `using`.
    ///
    /// `all_views_synced` is only signalled when every view was processed.
    pub async fn run(&self, using: &str, options: SyncOptions) -> Result<BacklogReport> {
        let handler = SyncHandler {
            router: self.router,
            signals: self.signals,
            using,
            options,
        };
        let report = run_backlog(self.registry, &handler).await?;

        tracing::info!(
            using,
            synced = report.finished.len(),
            changed = report.changed(),
            skipped = report.skipped.len(),
            "all pgviews synced"
        );
        self.signals.all_views_synced(using);
        Ok(report)
    }
}

struct SyncHandler<'a> {
    router: &'a dyn ConnectionRouter,
    signals: &'a Signals,
    using: &'a str,
    options: SyncOptions,
}

#[async_trait]
impl ViewHandler for SyncHandler<'_> {
    async fn handle(&self, view: &ViewDefinition) -> std::result::Result<Handled, ViewError> {
        let label = view.label();
        let using = self.using;
        let Some(connection) = self.router.connection_for(using, view, true) else {
            tracing::info!(view = %label, using, "skipping pgview (migrations not allowed on {})", using);
            return Ok(Handled::Skipped);
        };

        let status = if view.is_materialized() {
            create_or_update_materialized_view(&*connection, view, self.options.check_sql_changed)
                .await?
        } else {
            let sql = view
                .sql()
                .ok_or_else(|| ViewError::MissingSql(label.clone()))?;
            create_or_update_view(
                &*connection,
                view.table(),
                sql,
                self.options.update,
                self.options.force,
            )
            .await?
        };

        self.signals.view_synced(&ViewSynced {
            view: label.clone(),
            qualified_name: view.table().to_string(),
            update: self.options.update,
            force: self.options.force,
            status,
            has_changed: status.has_changed(),
            using: using.to_string(),
        });

        if status == SyncOutcome::Exists {
            tracing::info!(target: EXISTS_TARGET, view = %label, using, "pgview {} {}", label, status.describe());
        } else {
            tracing::info!(view = %label, using, status = %status, "pgview {} {}", label, status.describe());
        }

        Ok(Handled::Finished(Some(status)))
    }
}

/// Refreshes every declared materialized view on one database, in
/// dependency order
pub struct ViewRefresher<'a> {
    registry: &'a ViewRegistry,
    router: &'a dyn ConnectionRouter,
}

impl<'a> ViewRefresher<'a> {
    pub fn new(registry: &'a ViewRegistry, router: &'a dyn ConnectionRouter) -> Self {
        Self { registry, router }
    }

    /// Plain views are passed over but still count as finished so their
    /// dependants are not held back.
    pub async fn run(&self, using: &str, options: RefreshOptions) -> Result<BacklogReport> {
        let handler = RefreshHandler {
            router: self.router,
            using,
            options,
        };
        run_backlog(self.registry, &handler).await
    }
}

struct RefreshHandler<'a> {
    router: &'a dyn ConnectionRouter,
    using: &'a str,
    options: RefreshOptions,
}

#[async_trait]
impl ViewHandler for RefreshHandler<'_> {
    async fn handle(&self, view: &ViewDefinition) -> std::result::Result<Handled, ViewError> {
        let using = self.using;
        if self.router.connection_for(using, view, true).is_none() {
            tracing::info!(view = %view.label(), using, "skipping pgview (migrations not allowed on {})", using);
            return Ok(Handled::Skipped);
        }

        if view.is_materialized()
            && refresh_view(self.router, view, self.options.concurrently, self.options.strict)
                .await?
        {
            tracing::info!(view = %view.label(), using, "pgview {} refreshed", view.label());
        }
        Ok(Handled::Finished(None))
    }
}
