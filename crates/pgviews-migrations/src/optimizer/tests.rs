//! Tests for the operation optimizer

use super::*;
use crate::ViewState;
use pretty_assertions::assert_eq;

fn register(name: &str, materialized: bool) -> ViewOperation {
    ViewOperation::register(&ViewState::new("app", name, materialized, name.to_lowercase()))
}

fn delete(name: &str, materialized: bool) -> ViewOperation {
    ViewOperation::delete(&ViewState::new("app", name, materialized, name.to_lowercase()))
}

#[test]
fn test_register_delete_folds_to_nothing() {
    let operations = vec![register("Totals", true), delete("Totals", true)];

    assert!(optimize(&operations).is_empty());
}

#[test]
fn test_register_delete_register_keeps_final_registration() {
    let operations = vec![
        register("Totals", false),
        delete("Totals", false),
        register("Totals", true),
    ];

    assert_eq!(optimize(&operations), vec![register("Totals", true)]);
}

#[test]
fn test_folds_across_unrelated_views() {
    let operations = vec![
        register("Totals", true),
        register("Regions", false),
        delete("Totals", true),
    ];

    assert_eq!(optimize(&operations), vec![register("Regions", false)]);
}

#[test]
fn test_repeated_registrations_collapse() {
    let operations = vec![
        register("Totals", true),
        register("Totals", true),
        register("Totals", true),
    ];

    assert_eq!(optimize(&operations), vec![register("Totals", true)]);
}

#[test]
fn test_delete_then_register_is_preserved() {
    let operations = vec![delete("Totals", false), register("Totals", true)];

    assert_eq!(optimize(&operations), operations);
}

#[test]
fn test_blocked_pair_stops_folding() {
    let operations = vec![
        register("Totals", false),
        register("Totals", true),
        delete("Totals", false),
    ];

    assert_eq!(optimize(&operations), operations);
}

#[test]
fn test_idempotent() {
    let operations = vec![
        register("Totals", false),
        delete("Regions", true),
        delete("Totals", false),
        register("Totals", true),
        delete("Regions", true),
    ];

    let once = optimize(&operations);
    let twice = optimize(&once);

    assert_eq!(once, vec![register("Totals", true), delete("Regions", true)]);
    assert_eq!(twice, once);
}
