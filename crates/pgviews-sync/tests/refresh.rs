//! Refreshing materialized views, all at once or a connected subset

use pgviews_objects::{ViewDefinition, ViewError, ViewRegistry};
use pgviews_sync::{PgViews, RefreshOptions, StaticRouter, SyncError, SyncOptions};
use pgviews_test_support::{FakeDatabase, Refresh};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn refreshed(db: &FakeDatabase) -> Vec<String> {
    db.refreshes().into_iter().map(|refresh| refresh.view).collect()
}

/// base <- middle <- leaf, plus an independent view with a concurrent index
/// and a plain view on top of base
fn chain_views() -> Vec<ViewDefinition> {
    vec![
        ViewDefinition::materialized("app", "Leaf")
            .with_sql("SELECT region FROM app_middle")
            .with_dependency("app.Middle"),
        ViewDefinition::materialized("app", "Middle")
            .with_sql("SELECT region, total FROM app_base")
            .with_dependency("app.Base"),
        ViewDefinition::materialized("app", "Base").with_sql("SELECT id, region, total FROM sales"),
        ViewDefinition::materialized("app", "Ranked")
            .with_sql("SELECT id, total FROM sales")
            .with_concurrent_index("id"),
        ViewDefinition::new("app", "Regions")
            .with_sql("SELECT region FROM app_base")
            .with_dependency("app.Base"),
    ]
}

async fn synced() -> (FakeDatabase, PgViews) {
    let db = FakeDatabase::new().with_table("sales", &["id", "region", "total"]);
    let router = StaticRouter::new().with_database("default", Arc::new(db.connection()));
    let pgviews = PgViews::new(
        ViewRegistry::from_views(chain_views()).unwrap(),
        Arc::new(router),
    );
    pgviews.sync_all("default", SyncOptions::default()).await.unwrap();
    (db, pgviews)
}

mod refresh_views_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_subset_pulls_in_connected_views() {
        let (db, pgviews) = synced().await;

        let count = pgviews.refresh_views(&["app.Middle"], false, false).await.unwrap();

        assert_eq!(count, 3);
        assert_eq!(
            refreshed(&db),
            vec!["public.app_base", "public.app_middle", "public.app_leaf"]
        );
    }

    #[tokio::test]
    async fn test_dependant_is_refreshed_after_its_dependency() {
        let (db, pgviews) = synced().await;

        let count = pgviews.refresh_views(&["app.Base"], false, false).await.unwrap();

        assert_eq!(count, 3);
        let order = refreshed(&db);
        let position = |name: &str| order.iter().position(|view| view == name).unwrap();
        assert!(position("public.app_base") < position("public.app_middle"));
        assert!(position("public.app_middle") < position("public.app_leaf"));
        assert!(!order.contains(&"public.app_ranked".to_string()));
    }

    #[tokio::test]
    async fn test_isolated_view_refreshes_alone() {
        let (db, pgviews) = synced().await;

        let count = pgviews.refresh_views(&["app.Ranked"], true, false).await.unwrap();

        assert_eq!(count, 1);
        assert_eq!(
            db.refreshes(),
            vec![Refresh {
                view: "public.app_ranked".into(),
                concurrently: true
            }]
        );
    }

    #[tokio::test]
    async fn test_unknown_label() {
        let (_db, pgviews) = synced().await;

        let result = pgviews.refresh_views(&["app.Nope"], false, false).await;

        assert!(matches!(result, Err(SyncError::UnknownView(ref label)) if label == "app.Nope"));
    }

    #[tokio::test]
    async fn test_strict_concurrent_without_index_fails() {
        let (db, pgviews) = synced().await;

        let result = pgviews.refresh_views(&["app.Leaf"], true, true).await;

        assert!(matches!(
            result,
            Err(SyncError::ViewFailed {
                source: ViewError::ConcurrentIndexNotDefined { .. },
                ..
            })
        ));
        assert!(db.refreshes().is_empty());
    }
}

mod refresh_all_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_refreshes_materialized_views_in_order() {
        let (db, pgviews) = synced().await;

        let report = pgviews
            .refresh_all("default", RefreshOptions::default())
            .await
            .unwrap();

        assert_eq!(
            refreshed(&db),
            vec![
                "public.app_base",
                "public.app_ranked",
                "public.app_middle",
                "public.app_leaf"
            ]
        );
        assert_eq!(report.finished.len(), 5);
        assert!(report.outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_falls_back_without_index() {
        let (db, pgviews) = synced().await;
        let options = RefreshOptions {
            concurrently: true,
            strict: false,
        };

        pgviews.refresh_all("default", options).await.unwrap();

        let concurrent: Vec<(String, bool)> = db
            .refreshes()
            .into_iter()
            .map(|refresh| (refresh.view, refresh.concurrently))
            .collect();
        assert_eq!(
            concurrent,
            vec![
                ("public.app_base".to_string(), false),
                ("public.app_ranked".to_string(), true),
                ("public.app_middle".to_string(), false),
                ("public.app_leaf".to_string(), false),
            ]
        );
    }

    #[tokio::test]
    async fn test_strict_stops_at_first_view_without_index() {
        let (db, pgviews) = synced().await;
        let options = RefreshOptions {
            concurrently: true,
            strict: true,
        };

        let error = pgviews.refresh_all("default", options).await.unwrap_err();

        match error {
            SyncError::ViewFailed { label, source, .. } => {
                assert_eq!(label, "app.Base");
                assert!(matches!(source, ViewError::ConcurrentIndexNotDefined { .. }));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(db.refreshes().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_alias_leaves_dependants_waiting() {
        let (db, pgviews) = synced().await;

        let error = pgviews
            .refresh_all("replica", RefreshOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(error, SyncError::DidNotConverge { .. }));
        assert!(db.refreshes().is_empty());
    }
}
