//! Turning two snapshots into view operations

use std::collections::{BTreeMap, BTreeSet};

use crate::{ViewKey, ViewOperation, ViewSnapshot};


/// Operations needed to go from one snapshot to another, per namespace
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewDiff {
    changes: BTreeMap<String, Vec<ViewOperation>>,
}

impl ViewDiff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Namespaces with at least one operation, sorted
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.changes.keys().map(String::as_str)
    }

    pub fn for_namespace(&self, namespace: &str) -> &[ViewOperation] {
        self.changes
            .get(namespace)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Every operation, namespace by namespace
    pub fn operations(&self) -> impl Iterator<Item = &ViewOperation> {
        self.changes.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.changes.values().map(Vec::len).sum()
    }

    fn push(&mut self, operation: ViewOperation) {
        self.changes
            .entry(operation.namespace.clone())
            .or_default()
            .push(operation);
    }
}

/// Compare two snapshots.
///
/// Views only in `from` are deleted, views only in `to` are registered, and
/// views in both whose state differs are deleted and then registered again.
/// Within a namespace every delete comes before every register.
pub fn diff(from: &ViewSnapshot, to: &ViewSnapshot) -> ViewDiff {
    let old: BTreeSet<&ViewKey> = from.keys().collect();
    let new: BTreeSet<&ViewKey> = to.keys().collect();

    let changed: BTreeSet<&ViewKey> = old
        .intersection(&new)
        .filter(|key| from.by_key(key) != to.by_key(key))
        .copied()
        .collect();

    let deleted: BTreeSet<&ViewKey> = old
        .difference(&new)
        .chain(changed.iter())
        .copied()
        .collect();
    let created: BTreeSet<&ViewKey> = new
        .difference(&old)
        .chain(changed.iter())
        .copied()
        .collect();

    let mut result = ViewDiff::default();
    for key in deleted {
        if let Some(state) = from.by_key(key) {
            result.push(ViewOperation::delete(state));
        }
    }
    for key in created {
        if let Some(state) = to.by_key(key) {
            result.push(ViewOperation::register(state));
        }
    }

    tracing::debug!(
        namespaces = result.changes.len(),
        operations = result.len(),
        "diffed view snapshots"
    );
    result
}
