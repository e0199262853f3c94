//! Recorded shape of declared views

use pgviews_objects::{ViewDefinition, ViewRegistry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::{MigrationError, Result};

/// `(namespace, lower-cased name)`, the identity of a view across snapshots
pub type ViewKey = (String, String);

/// What a migration records about one view.
///
/// Two states are the same view only when every field matches; any change
/// is applied as a delete followed by a register.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewState {
    pub namespace: String,
    pub name: String,
    pub materialized: bool,
    /// Relation the view lives in, `schema.name` or `name`
    pub db_name: String,
}

impl ViewState {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        materialized: bool,
        db_name: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            materialized,
            db_name: db_name.into(),
        }
    }

    pub fn from_view(view: &ViewDefinition) -> Self {
        Self::new(
            view.namespace(),
            view.name(),
            view.is_materialized(),
            view.table().to_string(),
        )
    }

    pub fn name_lower(&self) -> String {
        self.name.to_lowercase()
    }

    pub fn key(&self) -> ViewKey {
        (self.namespace.clone(), self.name_lower())
    }
}

/// Every recorded view, keyed by namespace and lower-cased name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewSnapshot {
    views: BTreeMap<ViewKey, ViewState>,
}

impl ViewSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything currently declared
    pub fn from_registry(registry: &ViewRegistry) -> Self {
        let mut snapshot = Self::new();
        for view in registry.iter() {
            snapshot.insert(ViewState::from_view(view));
        }
        snapshot
    }

    /// Add or replace the state for its key
    pub fn insert(&mut self, state: ViewState) -> Option<ViewState> {
        self.views.insert(state.key(), state)
    }

    pub fn remove(&mut self, namespace: &str, name: &str) -> Option<ViewState> {
        self.views
            .remove(&(namespace.to_string(), name.to_lowercase()))
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<&ViewState> {
        self.views.get(&(namespace.to_string(), name.to_lowercase()))
    }

    pub fn contains(&self, namespace: &str, name: &str) -> bool {
        self.get(namespace, name).is_some()
    }

    pub(crate) fn by_key(&self, key: &ViewKey) -> Option<&ViewState> {
        self.views.get(key)
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &ViewKey> {
        self.views.keys()
    }

    /// States ordered by namespace, then name
    pub fn iter(&self) -> impl Iterator<Item = &ViewState> {
        self.views.values()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// Read a snapshot written by [`ViewSnapshot::save`]. A missing file is
    /// an empty snapshot.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no view snapshot yet");
            return Ok(Self::new());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        tracing::debug!(path = %path.display(), views = self.len(), "saved view snapshot");
        Ok(())
    }

    /// Views as a JSON array
    pub fn to_json(&self) -> Result<String> {
        let states: Vec<&ViewState> = self.iter().collect();
        Ok(serde_json::to_string_pretty(&states)?)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let states: Vec<ViewState> = serde_json::from_str(content)?;
        let mut snapshot = Self::new();
        for state in states {
            let (namespace, name) = (state.namespace.clone(), state.name.clone());
            if snapshot.insert(state).is_some() {
                return Err(MigrationError::DuplicateState { namespace, name });
            }
        }
        Ok(snapshot)
    }
}
