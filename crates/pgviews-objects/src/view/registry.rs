//! Registry of declared views
//!
//! Views are kept in registration order, which is the order the backlog
//! scheduler first attempts them in. Field projections whose source is not
//! available yet are parked until the host reports the source with
//! [`ViewRegistry::source_available`].

use indexmap::IndexMap;
use std::collections::HashMap;

use super::definition::{source_key, ProjectedField, ViewDefinition};
use crate::{Result, ViewError};

#[derive(Debug, Clone)]
struct PendingProjection {
    view: String,
    field: ProjectedField,
}

/// The set of declared views, keyed by label
#[derive(Debug, Default)]
pub struct ViewRegistry {
    views: IndexMap<String, ViewDefinition>,
    pending: HashMap<String, Vec<PendingProjection>>,
    sources: HashMap<String, Vec<String>>,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from views in declaration order
    pub fn from_views(views: impl IntoIterator<Item = ViewDefinition>) -> Result<Self> {
        let mut registry = Self::new();
        for view in views {
            registry.register(view)?;
        }
        Ok(registry)
    }

    /// Validate and add a view.
    ///
    /// Projections whose source is already available are applied straight
    /// away; the rest wait for `source_available`.
    pub fn register(&mut self, view: ViewDefinition) -> Result<()> {
        view.validate()?;
        let label = view.label();
        if self.views.contains_key(&label) {
            return Err(ViewError::DuplicateView(label));
        }

        let projections = view.projections()?;
        self.views.insert(label.clone(), view);

        for projection in projections {
            let key = projection.source_key();
            match self.sources.get(&key).cloned() {
                Some(source_fields) => {
                    self.apply_projection(&label, &projection.field, &source_fields);
                }
                None => {
                    tracing::debug!(view = %label, source = %key, "deferring projection until source is available");
                    self.pending.entry(key).or_default().push(PendingProjection {
                        view: label.clone(),
                        field: projection.field,
                    });
                }
            }
        }

        tracing::debug!(view = %label, "registered view");
        Ok(())
    }

    /// Record that a source relation and its fields are now known and
    /// resolve every projection waiting on it.
    ///
    /// Returns the number of fields added to views.
    pub fn source_available(
        &mut self,
        namespace: &str,
        source: &str,
        fields: Vec<String>,
    ) -> usize {
        let key = source_key(namespace, source);
        let waiting = self.pending.remove(&key).unwrap_or_default();
        self.sources.insert(key, fields.clone());

        waiting
            .iter()
            .map(|pending| self.apply_projection(&pending.view, &pending.field, &fields))
            .sum()
    }

    fn apply_projection(
        &mut self,
        label: &str,
        field: &ProjectedField,
        source_fields: &[String],
    ) -> usize {
        let Some(view) = self.views.get_mut(label) else {
            return 0;
        };
        let selected: Vec<&String> = match field {
            ProjectedField::All => source_fields.iter().collect(),
            ProjectedField::Named(name) => source_fields.iter().filter(|f| *f == name).collect(),
        };
        if let ProjectedField::Named(name) = field {
            if selected.is_empty() {
                tracing::warn!(view = %label, field = %name, "projected field not found on source");
            }
        }
        selected
            .into_iter()
            .filter(|name| view.add_projected_field(name))
            .count()
    }

    /// Sources that projections are still waiting for, sorted
    pub fn pending_sources(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.pending.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Whether every projection has been resolved
    pub fn is_settled(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn get(&self, label: &str) -> Option<&ViewDefinition> {
        self.views.get(label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.views.contains_key(label)
    }

    /// Views in registration order
    pub fn iter(&self) -> impl Iterator<Item = &ViewDefinition> {
        self.views.values()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.views.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}
