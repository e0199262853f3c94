use serde::{Deserialize, Serialize};
use std::fmt;

/// What happened to a view during a sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncOutcome {
    /// The view did not exist and was created
    Created,
    /// The view existed and was replaced in place
    Updated,
    /// The view already matched, nothing was done
    Exists,
    /// The view was dropped (with its dependants) and recreated
    Forced,
    /// The new definition is incompatible and `force` was not given
    ForceRequired,
    /// The view was dropped
    Dropped,
}

impl SyncOutcome {
    /// Whether the database object changed
    pub fn has_changed(self) -> bool {
        !matches!(self, SyncOutcome::Exists | SyncOutcome::ForceRequired)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SyncOutcome::Created => "CREATED",
            SyncOutcome::Updated => "UPDATED",
            SyncOutcome::Exists => "EXISTS",
            SyncOutcome::Forced => "FORCED",
            SyncOutcome::ForceRequired => "FORCE_REQUIRED",
            SyncOutcome::Dropped => "DROPPED",
        }
    }

    /// Human readable action, used for the per-view log line
    pub fn describe(self) -> &'static str {
        match self {
            SyncOutcome::Created => "created",
            SyncOutcome::Updated => "updated",
            SyncOutcome::Exists => "already exists, skipping",
            SyncOutcome::Forced => "forced overwrite of existing schema",
            SyncOutcome::ForceRequired => {
                "exists with incompatible schema, --force required to update"
            }
            SyncOutcome::Dropped => "dropped",
        }
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
