//! Tests for view operations

use super::*;
use pretty_assertions::assert_eq;

fn state(name: &str, materialized: bool) -> ViewState {
    ViewState::new("app", name, materialized, format!("app_{}", name.to_lowercase()))
}

mod describe_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_describe() {
        assert_eq!(
            ViewOperation::register(&state("Totals", true)).describe(),
            "Register materialized view Totals"
        );
        assert_eq!(
            ViewOperation::register(&state("Regions", false)).describe(),
            "Register view Regions"
        );
        assert_eq!(
            ViewOperation::delete(&state("Totals", true)).to_string(),
            "Delete materialized view Totals"
        );
        assert_eq!(
            ViewOperation::delete(&state("Regions", false)).describe(),
            "Delete view Regions"
        );
    }

    #[test]
    fn test_serialized_form() {
        let operation = ViewOperation::delete(&state("Totals", true));

        let json = serde_json::to_value(&operation).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "kind": "delete",
                "namespace": "app",
                "name": "Totals",
                "materialized": true,
                "db_name": "app_totals"
            })
        );
    }
}

mod state_forwards_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_register_then_delete() {
        let mut snapshot = ViewSnapshot::new();

        ViewOperation::register(&state("Totals", true)).state_forwards(&mut snapshot);
        assert_eq!(snapshot.get("app", "totals"), Some(&state("Totals", true)));

        ViewOperation::delete(&state("Totals", true)).state_forwards(&mut snapshot);
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_delete_of_unknown_view_is_ignored() {
        let mut snapshot = ViewSnapshot::new();
        snapshot.insert(state("Regions", false));

        ViewOperation::delete(&state("Totals", true)).state_forwards(&mut snapshot);

        assert_eq!(snapshot.len(), 1);
    }
}

mod reduce_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_register_then_register_keeps_later() {
        let first = ViewOperation::register(&state("Totals", true));
        let second = ViewOperation::register(&state("TOTALS", true));

        assert_eq!(first.reduce(&second), Reduction::Replace(vec![second.clone()]));
    }

    #[test]
    fn test_register_then_delete_cancels() {
        let register = ViewOperation::register(&state("Totals", true));
        let delete = ViewOperation::delete(&state("Totals", true));

        assert_eq!(register.reduce(&delete), Reduction::Replace(Vec::new()));
    }

    #[test]
    fn test_delete_then_delete_keeps_later() {
        let delete = ViewOperation::delete(&state("Totals", true));

        assert_eq!(delete.reduce(&delete), Reduction::Replace(vec![delete.clone()]));
    }

    #[test]
    fn test_delete_then_register_is_kept() {
        let delete = ViewOperation::delete(&state("Totals", true));
        let register = ViewOperation::register(&state("Totals", true));

        assert_eq!(delete.reduce(&register), Reduction::Blocked);
    }

    #[test]
    fn test_different_flags_do_not_fold() {
        let register = ViewOperation::register(&state("Totals", true));
        let delete = ViewOperation::delete(&state("Totals", false));

        assert_eq!(register.reduce(&delete), Reduction::Blocked);
    }

    #[test]
    fn test_other_view_is_independent() {
        let register = ViewOperation::register(&state("Totals", true));
        let other = ViewOperation::delete(&state("Regions", true));

        assert_eq!(register.reduce(&other), Reduction::Independent);
    }
}
