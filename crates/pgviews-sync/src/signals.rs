//! Notifications emitted while views are synced

use parking_lot::RwLock;
use pgviews_objects::SyncOutcome;
use serde::Serialize;
use std::sync::Arc;

/// One view was processed by a sync run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewSynced {
    /// `namespace.name` of the view
    pub view: String,
    /// Relation the view was applied to
    pub qualified_name: String,
    pub update: bool,
    pub force: bool,
    pub status: SyncOutcome,
    pub has_changed: bool,
    /// Database alias the run targeted
    pub using: String,
}

/// Receives sync notifications. Both hooks default to doing nothing.
pub trait SyncObserver: Send + Sync {
    fn view_synced(&self, _event: &ViewSynced) {}

    /// Every view of a run on `using` was synced
    fn all_views_synced(&self, _using: &str) {}
}

/// Set of connected observers
#[derive(Clone, Default)]
pub struct Signals {
    observers: Arc<RwLock<Vec<Arc<dyn SyncObserver>>>>,
}

impl std::fmt::Debug for Signals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signals")
            .field("observers", &self.observers.read().len())
            .finish()
    }
}

impl Signals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, observer: Arc<dyn SyncObserver>) {
        self.observers.write().push(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().len()
    }

    pub(crate) fn view_synced(&self, event: &ViewSynced) {
        for observer in self.snapshot() {
            observer.view_synced(event);
        }
    }

    pub(crate) fn all_views_synced(&self, using: &str) {
        for observer in self.snapshot() {
            observer.all_views_synced(using);
        }
    }

    // Observers may connect further observers while being notified
    fn snapshot(&self) -> Vec<Arc<dyn SyncObserver>> {
        self.observers.read().clone()
    }
}
