//! Dependency graph over declared views
//!
//! Views name their dependencies by label (`namespace.name`). These helpers
//! walk that graph within a `ViewRegistry` to find what a set of views needs,
//! what needs them, and an order in which they can be applied.

use pgviews_objects::{ViewDefinition, ViewError, ViewRegistry};
use std::collections::{BTreeMap, BTreeSet, HashSet};

#[cfg(test)]
mod tests;

/// Most rounds `reorder_by_dependencies` and the backlog take before
/// giving up on a set of views.
pub const MAX_ROUNDS: usize = 10;

/// Registry views outside `views` that declare a direct dependency on one
/// of them, in registry order.
pub fn dependants<'a>(
    registry: &'a ViewRegistry,
    views: &[&ViewDefinition],
) -> Vec<&'a ViewDefinition> {
    let labels: HashSet<String> = views.iter().map(|view| view.label()).collect();

    registry
        .iter()
        .filter(|candidate| !labels.contains(&candidate.label()))
        .filter(|candidate| {
            candidate
                .dependencies()
                .iter()
                .any(|dependency| labels.contains(dependency))
        })
        .collect()
}

/// Every view `views` transitively depends on that is not already part of
/// `views`, sorted by label.
///
/// A dependency label missing from the registry is an error.
pub fn dependencies<'a>(
    registry: &'a ViewRegistry,
    views: &[&ViewDefinition],
) -> Result<Vec<&'a ViewDefinition>, ViewError> {
    let given: BTreeSet<String> = views.iter().map(|view| view.label()).collect();
    let mut found: BTreeMap<String, &'a ViewDefinition> = BTreeMap::new();

    let mut frontier: Vec<(String, Vec<String>)> = views
        .iter()
        .map(|view| (view.label(), view.dependencies().to_vec()))
        .collect();

    while !frontier.is_empty() {
        let mut next = Vec::new();
        for (label, declared) in frontier {
            for dependency in declared {
                if given.contains(&dependency) || found.contains_key(&dependency) {
                    continue;
                }
                let view = registry.get(&dependency).ok_or_else(|| {
                    ViewError::UnresolvedDependency {
                        view: label.clone(),
                        dependency: dependency.clone(),
                    }
                })?;
                next.push((dependency.clone(), view.dependencies().to_vec()));
                found.insert(dependency, view);
            }
        }
        frontier = next;
    }

    Ok(found.into_values().collect())
}

/// Order `views` so every view comes after the views it depends on.
///
/// Each round takes every remaining view whose dependencies inside the set
/// were placed in earlier rounds, sorted by label. Dependencies outside the
/// set are treated as satisfied. Views still unplaced after [`MAX_ROUNDS`]
/// rounds are reported as a cycle.
pub fn reorder_by_dependencies<'a>(
    views: &[&'a ViewDefinition],
) -> Result<Vec<&'a ViewDefinition>, ViewError> {
    let mut remaining: BTreeMap<String, &'a ViewDefinition> = views
        .iter()
        .map(|view| (view.label(), *view))
        .collect();
    let in_set: HashSet<String> = remaining.keys().cloned().collect();
    let mut placed: HashSet<String> = HashSet::new();
    let mut ordered = Vec::with_capacity(remaining.len());

    for _ in 0..MAX_ROUNDS {
        if remaining.is_empty() {
            break;
        }

        let ready: Vec<String> = remaining
            .iter()
            .filter(|(_, view)| {
                view.dependencies()
                    .iter()
                    .all(|dependency| !in_set.contains(dependency) || placed.contains(dependency))
            })
            .map(|(label, _)| label.clone())
            .collect();

        for label in ready {
            if let Some(view) = remaining.remove(&label) {
                ordered.push(view);
                placed.insert(label);
            }
        }
    }

    if !remaining.is_empty() {
        return Err(ViewError::DependencyCycle(remaining.into_keys().collect()));
    }
    Ok(ordered)
}
