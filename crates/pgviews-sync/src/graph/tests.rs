//! Tests for dependency resolution and ordering

use super::*;
use pretty_assertions::assert_eq;

fn view(label: &str, dependencies: &[&str]) -> ViewDefinition {
    let (namespace, name) = label.split_once('.').unwrap();
    dependencies
        .iter()
        .fold(ViewDefinition::materialized(namespace, name), |view, dependency| {
            view.with_dependency(*dependency)
        })
}

fn labels(views: &[&ViewDefinition]) -> Vec<String> {
    views.iter().map(|view| view.label()).collect()
}

/// base <- middle <- top, base <- side, plus an unrelated view
fn chain_registry() -> ViewRegistry {
    ViewRegistry::from_views([
        view("app.Top", &["app.Middle"]),
        view("app.Middle", &["app.Base"]),
        view("app.Base", &[]),
        view("app.Side", &["app.Base"]),
        view("app.Unrelated", &[]),
    ])
    .unwrap()
}

mod dependants_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_direct_dependants_only() {
        let registry = chain_registry();
        let base = registry.get("app.Base").unwrap();

        let found = dependants(&registry, &[base]);

        assert_eq!(labels(&found), vec!["app.Middle", "app.Side"]);
    }

    #[test]
    fn test_excludes_views_already_in_set() {
        let registry = chain_registry();
        let base = registry.get("app.Base").unwrap();
        let middle = registry.get("app.Middle").unwrap();

        let found = dependants(&registry, &[base, middle]);

        assert_eq!(labels(&found), vec!["app.Top", "app.Side"]);
    }

    #[test]
    fn test_leaf_has_no_dependants() {
        let registry = chain_registry();
        let top = registry.get("app.Top").unwrap();

        assert!(dependants(&registry, &[top]).is_empty());
    }
}

mod dependencies_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_transitive_closure() {
        let registry = chain_registry();
        let top = registry.get("app.Top").unwrap();

        let found = dependencies(&registry, &[top]).unwrap();

        assert_eq!(labels(&found), vec!["app.Base", "app.Middle"]);
    }

    #[test]
    fn test_views_in_set_are_not_repeated() {
        let registry = chain_registry();
        let top = registry.get("app.Top").unwrap();
        let middle = registry.get("app.Middle").unwrap();

        let found = dependencies(&registry, &[top, middle]).unwrap();

        assert_eq!(labels(&found), vec!["app.Base"]);
    }

    #[test]
    fn test_unresolved_dependency() {
        let registry =
            ViewRegistry::from_views([view("app.Orphan", &["app.Missing"])]).unwrap();
        let orphan = registry.get("app.Orphan").unwrap();

        let result = dependencies(&registry, &[orphan]);

        assert!(matches!(
            result,
            Err(ViewError::UnresolvedDependency { ref view, ref dependency })
                if view == "app.Orphan" && dependency == "app.Missing"
        ));
    }

    #[test]
    fn test_cycle_terminates() {
        let registry = ViewRegistry::from_views([
            view("app.A", &["app.B"]),
            view("app.B", &["app.A"]),
        ])
        .unwrap();
        let a = registry.get("app.A").unwrap();

        let found = dependencies(&registry, &[a]).unwrap();

        assert_eq!(labels(&found), vec!["app.B"]);
    }
}

mod reorder_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_dependencies_come_first() {
        let registry = chain_registry();
        let views: Vec<&ViewDefinition> = ["app.Top", "app.Side", "app.Middle", "app.Base"]
            .iter()
            .map(|label| registry.get(label).unwrap())
            .collect();

        let ordered = reorder_by_dependencies(&views).unwrap();

        assert_eq!(
            labels(&ordered),
            vec!["app.Base", "app.Middle", "app.Side", "app.Top"]
        );
    }

    #[test]
    fn test_rounds_sorted_by_label() {
        let registry = ViewRegistry::from_views([
            view("b.Second", &[]),
            view("a.First", &[]),
            view("c.Third", &[]),
        ])
        .unwrap();
        let views: Vec<&ViewDefinition> = registry.iter().collect();

        let ordered = reorder_by_dependencies(&views).unwrap();

        assert_eq!(labels(&ordered), vec!["a.First", "b.Second", "c.Third"]);
    }

    #[test]
    fn test_dependencies_outside_set_are_satisfied() {
        let registry = chain_registry();
        let top = registry.get("app.Top").unwrap();

        let ordered = reorder_by_dependencies(&[top]).unwrap();

        assert_eq!(labels(&ordered), vec!["app.Top"]);
    }

    #[test]
    fn test_cycle_is_reported() {
        let registry = ViewRegistry::from_views([
            view("app.A", &["app.B"]),
            view("app.B", &["app.A"]),
            view("app.Free", &[]),
        ])
        .unwrap();
        let views: Vec<&ViewDefinition> = registry.iter().collect();

        let result = reorder_by_dependencies(&views);

        assert!(matches!(
            result,
            Err(ViewError::DependencyCycle(ref pending)) if pending == &["app.A", "app.B"]
        ));
    }

    #[test]
    fn test_empty_input() {
        assert!(reorder_by_dependencies(&[]).unwrap().is_empty());
    }
}
