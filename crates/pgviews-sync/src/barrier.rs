//! Syncing views once every migration group has been applied

use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;

use crate::{PgViews, Result, SyncError, SyncOptions};

type Callback = Arc<dyn Fn(String) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Counts finished migration groups and runs its callbacks when the last
/// one of a run reports in, then starts counting again.
pub struct MigrateBarrier {
    total: usize,
    completed: Mutex<usize>,
    callbacks: Mutex<Vec<Callback>>,
}

impl std::fmt::Debug for MigrateBarrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrateBarrier")
            .field("total", &self.total)
            .field("completed", &*self.completed.lock())
            .field("callbacks", &self.callbacks.lock().len())
            .finish()
    }
}

impl MigrateBarrier {
    pub fn new(total_groups: usize) -> Self {
        Self {
            total: total_groups,
            completed: Mutex::new(0),
            callbacks: Mutex::new(Vec::new()),
        }
    }

    /// Run `callback` with the database alias each time all groups are done
    pub fn on_all_migrated<F, Fut>(&self, callback: F)
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let callback: Callback = Arc::new(move |using| -> BoxFuture<'static, Result<()>> {
            Box::pin(callback(using))
        });
        self.callbacks.lock().push(callback);
    }

    pub fn completed(&self) -> usize {
        *self.completed.lock()
    }

    /// Record one finished group. Returns whether this completed the run.
    ///
    /// Callbacks run in registration order; the first failure stops the
    /// remaining ones and is returned.
    pub async fn group_migrated(&self, using: &str) -> Result<bool> {
        {
            let mut completed = self.completed.lock();
            *completed += 1;
            tracing::debug!(completed = *completed, total = self.total, "migration group finished");
            if *completed < self.total {
                return Ok(false);
            }
            *completed = 0;
        }

        tracing::info!(using, "all applications have migrated, time to sync");
        let callbacks = self.callbacks.lock().clone();
        for callback in callbacks {
            callback(using.to_string()).await?;
        }
        Ok(true)
    }
}

/// Syncs every view after migrations, with the flags a post-migrate sync uses
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoSync {
    pub check_sql_changed: bool,
    /// Leave the barrier untouched
    pub disabled: bool,
}

impl AutoSync {
    pub fn new(check_sql_changed: bool, disabled: bool) -> Self {
        Self {
            check_sql_changed,
            disabled,
        }
    }

    pub fn options(&self) -> SyncOptions {
        SyncOptions {
            force: true,
            update: true,
            check_sql_changed: self.check_sql_changed,
        }
    }

    /// Register the sync on `barrier`. Returns whether it was registered.
    pub fn install(&self, barrier: &MigrateBarrier, engine: Arc<PgViews>) -> bool {
        if self.disabled {
            tracing::debug!("sync on migrate is disabled");
            return false;
        }
        let options = self.options();
        barrier.on_all_migrated(move |using| {
            let engine = engine.clone();
            async move {
                engine.sync_all(&using, options).await.map_err(|error| {
                    tracing::error!(using = %using, error = %error, "pgviews sync after migrate failed");
                    error
                })?;
                Ok::<(), SyncError>(())
            }
        });
        true
    }
}
