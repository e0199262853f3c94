//! Register and delete intents for a single view

use pgviews_objects::{QualifiedName, drop_view};
use pgviews_sync::ConnectionRouter;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{MigrationError, Result, ViewSnapshot, ViewState};

#[cfg(test)]
mod tests;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// The view is declared from here on
    Register,
    /// The view is gone from here on
    Delete,
}

/// How an operation combines with a later one in the same list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reduction {
    /// Both operations, and nothing in between, collapse into these
    Replace(Vec<ViewOperation>),
    /// The later operation is about another view and can be moved past
    Independent,
    /// Neither operation may move past the other
    Blocked,
}

/// A recorded change to one view
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewOperation {
    pub kind: OperationKind,
    pub namespace: String,
    pub name: String,
    pub materialized: bool,
    pub db_name: String,
}

impl ViewOperation {
    pub fn register(state: &ViewState) -> Self {
        Self::from_state(OperationKind::Register, state)
    }

    pub fn delete(state: &ViewState) -> Self {
        Self::from_state(OperationKind::Delete, state)
    }

    fn from_state(kind: OperationKind, state: &ViewState) -> Self {
        Self {
            kind,
            namespace: state.namespace.clone(),
            name: state.name.clone(),
            materialized: state.materialized,
            db_name: state.db_name.clone(),
        }
    }

    pub fn name_lower(&self) -> String {
        self.name.to_lowercase()
    }

    pub fn state(&self) -> ViewState {
        ViewState::new(&self.namespace, &self.name, self.materialized, &self.db_name)
    }

    /// e.g. `Register materialized view Totals`
    pub fn describe(&self) -> String {
        let action = match self.kind {
            OperationKind::Register => "Register",
            OperationKind::Delete => "Delete",
        };
        if self.materialized {
            format!("{} materialized view {}", action, self.name)
        } else {
            format!("{} view {}", action, self.name)
        }
    }

    /// Apply the intent to a snapshot
    pub fn state_forwards(&self, snapshot: &mut ViewSnapshot) {
        match self.kind {
            OperationKind::Register => {
                snapshot.insert(self.state());
            }
            OperationKind::Delete => {
                snapshot.remove(&self.namespace, &self.name);
            }
        }
    }

    /// Apply the intent to the database behind `using`.
    ///
    /// Registering does nothing, the next sync creates the view. Deleting
    /// drops the view, with its dependants, unless the router keeps the
    /// view's namespace off that database. Returns whether DDL was run.
    pub async fn database_forwards(&self, router: &dyn ConnectionRouter, using: &str) -> Result<bool> {
        if self.kind == OperationKind::Register {
            return Ok(false);
        }
        if !router.allow_migrate(using, &self.namespace) {
            tracing::debug!(view = %self.name, using, "view not migrated on this database");
            return Ok(false);
        }
        let connection = router
            .connection(using)
            .ok_or_else(|| MigrationError::UnknownDatabase(using.to_string()))?;

        drop_view(&*connection, &QualifiedName::parse(&self.db_name), self.materialized).await?;
        tracing::info!(view = %self.name, table = %self.db_name, using, "{}", self.describe());
        Ok(true)
    }

    fn same_view(&self, other: &ViewOperation) -> bool {
        self.namespace == other.namespace && self.name_lower() == other.name_lower()
    }

    /// Combine with `other`, which comes later in the same operation list.
    ///
    /// - register then register of the same view keeps the later one
    /// - register then delete of the same view cancels out
    /// - delete then delete keeps the later one
    ///
    /// Operations on the same view that differ in flags or table never fold.
    pub fn reduce(&self, other: &ViewOperation) -> Reduction {
        if !self.same_view(other) {
            return Reduction::Independent;
        }
        if self.materialized != other.materialized || self.db_name != other.db_name {
            return Reduction::Blocked;
        }
        match (self.kind, other.kind) {
            (OperationKind::Register, OperationKind::Register)
            | (OperationKind::Delete, OperationKind::Delete) => {
                Reduction::Replace(vec![other.clone()])
            }
            (OperationKind::Register, OperationKind::Delete) => Reduction::Replace(Vec::new()),
            (OperationKind::Delete, OperationKind::Register) => Reduction::Blocked,
        }
    }
}

impl fmt::Display for ViewOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}
