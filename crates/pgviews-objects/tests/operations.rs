//! View operations against the in-memory catalog

use pgviews_core::{Connection, Executor};
use pgviews_objects::{
    IndexSpec, QualifiedName, SyncOutcome, ViewDefinition, ViewError, ViewSql,
    create_or_update_materialized_view, create_or_update_view, drop_view, reconcile_indexes,
    refresh_materialized_view,
};
use pgviews_test_support::{FakeDatabase, Refresh};
use pretty_assertions::assert_eq;

fn sales_db() -> FakeDatabase {
    FakeDatabase::new().with_table("sales", &["id", "region", "month", "total"])
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

mod plain_view_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_create_then_exists_without_update() {
        let db = sales_db();
        let conn = db.connection();
        let table = QualifiedName::new("sales_by_region");
        let sql = ViewSql::new("SELECT region, total FROM sales");

        let first = create_or_update_view(&conn, &table, &sql, false, false).await.unwrap();
        let second = create_or_update_view(&conn, &table, &sql, false, false).await.unwrap();

        assert_eq!(first, SyncOutcome::Created);
        assert_eq!(second, SyncOutcome::Exists);
        assert!(!second.has_changed());
        assert_eq!(db.columns("sales_by_region"), Some(strings(&["region", "total"])));
    }

    #[tokio::test]
    async fn test_update_same_definition_is_stable() {
        let db = sales_db();
        let conn = db.connection();
        let table = QualifiedName::new("sales_by_region");
        let sql = ViewSql::new("SELECT region, total FROM sales;");

        let first = create_or_update_view(&conn, &table, &sql, true, false).await.unwrap();
        let second = create_or_update_view(&conn, &table, &sql, true, false).await.unwrap();

        assert_eq!(first, SyncOutcome::Created);
        assert_eq!(second, SyncOutcome::Updated);
        assert_eq!(db.columns("sales_by_region"), Some(strings(&["region", "total"])));
        assert!(!db.has_relation("check_conflict"));
    }

    #[tokio::test]
    async fn test_appending_a_column_updates_in_place() {
        let db = sales_db();
        let conn = db.connection();
        let table = QualifiedName::new("totals");

        create_or_update_view(&conn, &table, &"SELECT id, total FROM sales".into(), true, false)
            .await
            .unwrap();
        let outcome = create_or_update_view(
            &conn,
            &table,
            &"SELECT id, total, month FROM sales".into(),
            true,
            false,
        )
        .await
        .unwrap();

        assert_eq!(outcome, SyncOutcome::Updated);
        assert_eq!(db.columns("totals"), Some(strings(&["id", "total", "month"])));
    }

    #[tokio::test]
    async fn test_incompatible_change_requires_force() {
        let db = sales_db();
        let conn = db.connection();
        let base = QualifiedName::new("base");
        let dependant = QualifiedName::new("dependant");

        create_or_update_view(&conn, &base, &"SELECT id AS a, total AS b FROM sales".into(), true, false)
            .await
            .unwrap();
        create_or_update_view(&conn, &dependant, &"SELECT b FROM base".into(), true, false)
            .await
            .unwrap();

        let renamed: ViewSql = "SELECT id AS a, region AS c, total AS b FROM sales".into();
        let outcome = create_or_update_view(&conn, &base, &renamed, true, false).await.unwrap();

        assert_eq!(outcome, SyncOutcome::ForceRequired);
        assert!(!outcome.has_changed());
        assert_eq!(db.columns("base"), Some(strings(&["a", "b"])));
        assert!(db.has_view("dependant"));
        assert!(!db.has_relation("check_conflict"));
        assert!(conn.query("SELECT * FROM base", &[]).await.is_ok());
    }

    #[tokio::test]
    async fn test_forced_change_drops_dependants() {
        let db = sales_db();
        let conn = db.connection();
        let base = QualifiedName::new("base");
        let dependant = QualifiedName::new("dependant");

        create_or_update_view(&conn, &base, &"SELECT id AS a, total AS b FROM sales".into(), true, false)
            .await
            .unwrap();
        create_or_update_view(&conn, &dependant, &"SELECT b FROM base".into(), true, false)
            .await
            .unwrap();

        let renamed: ViewSql = "SELECT id AS a, region AS c, total AS b FROM sales".into();
        let outcome = create_or_update_view(&conn, &base, &renamed, true, true).await.unwrap();

        assert_eq!(outcome, SyncOutcome::Forced);
        assert!(outcome.has_changed());
        assert_eq!(db.columns("base"), Some(strings(&["a", "c", "b"])));
        assert!(!db.has_view("dependant"));
    }

    #[tokio::test]
    async fn test_unexpected_probe_failure_rolls_back() {
        let db = sales_db();
        let conn = db.connection();
        let table = QualifiedName::new("totals");

        create_or_update_view(&conn, &table, &"SELECT id, total FROM sales".into(), true, false)
            .await
            .unwrap();
        db.fail_on("CREATE OR REPLACE TEMPORARY VIEW", "53100");

        let err = create_or_update_view(
            &conn,
            &table,
            &"SELECT id, total, month FROM sales".into(),
            true,
            true,
        )
        .await
        .unwrap_err();

        match err {
            ViewError::Database(db_err) => assert_eq!(db_err.sqlstate(), Some("53100")),
            other => panic!("expected database error, got {:?}", other),
        }
        assert_eq!(db.columns("totals"), Some(strings(&["id", "total"])));
        assert!(!db.has_relation("check_conflict"));
    }

    #[tokio::test]
    async fn test_parameters_are_rendered() {
        let db = sales_db();
        let conn = db.connection();
        let table = QualifiedName::new("north");
        let sql = ViewSql::new("SELECT id, total FROM sales WHERE region = $1")
            .with_params(vec!["north".into()]);

        create_or_update_view(&conn, &table, &sql, true, false).await.unwrap();

        assert!(
            db.executed()
                .iter()
                .any(|s| s == "CREATE OR REPLACE VIEW north AS SELECT id, total FROM sales WHERE region = 'north'")
        );
    }

    #[tokio::test]
    async fn test_connection_schema_scopes_lookups() {
        let db = FakeDatabase::new()
            .with_schema("tenant_a")
            .with_table("sales", &["id", "total"]);
        let conn = db.connection();
        assert_eq!(conn.schema_name(), Some("tenant_a"));

        let outcome = create_or_update_view(
            &conn,
            &QualifiedName::new("totals"),
            &"SELECT id, total FROM sales".into(),
            true,
            false,
        )
        .await
        .unwrap();

        assert_eq!(outcome, SyncOutcome::Created);
        assert!(db.has_view("tenant_a.totals"));
        assert!(
            db.queries()
                .iter()
                .any(|q| q.contains("table_schema = $1 AND table_name = $2"))
        );
    }

    #[tokio::test]
    async fn test_drop_view_is_idempotent() {
        let db = sales_db();
        let conn = db.connection();
        let table = QualifiedName::new("totals");
        create_or_update_view(&conn, &table, &"SELECT id FROM sales".into(), true, false)
            .await
            .unwrap();

        assert_eq!(drop_view(&conn, &table, false).await.unwrap(), SyncOutcome::Dropped);
        assert_eq!(drop_view(&conn, &table, false).await.unwrap(), SyncOutcome::Dropped);
        assert!(!db.has_view("totals"));
    }
}

mod materialized_view_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn monthly(sql: &str) -> ViewDefinition {
        ViewDefinition::materialized("reports", "Monthly")
            .with_table("monthly")
            .with_sql(sql)
            .with_concurrent_index("month, region")
            .with_index(IndexSpec::new("monthly_total", &["-total"]))
    }

    #[tokio::test]
    async fn test_create_with_indexes() {
        let db = sales_db();
        let conn = db.connection();
        let view = monthly("SELECT month, region, total FROM sales");

        let outcome = create_or_update_materialized_view(&conn, &view, false).await.unwrap();

        assert_eq!(outcome, SyncOutcome::Created);
        assert!(db.has_materialized_view("monthly"));
        assert!(db.is_populated("monthly"));
        assert_eq!(
            db.indexes_on("monthly"),
            strings(&["monthly_month_region_index", "monthly_total"])
        );
    }

    #[tokio::test]
    async fn test_recreated_without_sql_check() {
        let db = sales_db();
        let conn = db.connection();
        let view = monthly("SELECT month, region, total FROM sales");

        create_or_update_materialized_view(&conn, &view, false).await.unwrap();
        let outcome = create_or_update_materialized_view(&conn, &view, false).await.unwrap();

        assert_eq!(outcome, SyncOutcome::Updated);
        assert!(db.executed().iter().any(|s| s == "DROP MATERIALIZED VIEW IF EXISTS monthly CASCADE"));
    }

    #[tokio::test]
    async fn test_unchanged_definition_is_kept() {
        let db = sales_db();
        let conn = db.connection();

        create_or_update_materialized_view(&conn, &monthly("SELECT month, region, total FROM sales"), true)
            .await
            .unwrap();
        db.clear_log();

        // Whitespace differences disappear in the stored definition
        let reformatted = monthly("SELECT month,  region,\n total FROM sales;");
        let outcome = create_or_update_materialized_view(&conn, &reformatted, true).await.unwrap();

        assert_eq!(outcome, SyncOutcome::Exists);
        assert!(!db.executed().iter().any(|s| s.contains("DROP MATERIALIZED VIEW IF EXISTS monthly CASCADE")));
        assert!(!db.has_relation("monthly_temp"));
        assert!(db.has_materialized_view("monthly"));
    }

    #[tokio::test]
    async fn test_changed_definition_is_recreated() {
        let db = sales_db();
        let conn = db.connection();

        create_or_update_materialized_view(&conn, &monthly("SELECT month, region, total FROM sales"), true)
            .await
            .unwrap();
        let changed = monthly("SELECT month, region, total, id FROM sales");
        let outcome = create_or_update_materialized_view(&conn, &changed, true).await.unwrap();

        assert_eq!(outcome, SyncOutcome::Updated);
        assert_eq!(db.columns("monthly"), Some(strings(&["month", "region", "total", "id"])));
        assert!(!db.has_relation("monthly_temp"));
    }

    #[tokio::test]
    async fn test_unpopulated_view_refreshed_when_data_required() {
        let db = sales_db();
        let conn = db.connection();
        let sql = "SELECT month, region, total FROM sales";

        create_or_update_materialized_view(&conn, &monthly(sql).with_data(false), true)
            .await
            .unwrap();
        assert!(!db.is_populated("monthly"));

        let outcome = create_or_update_materialized_view(&conn, &monthly(sql), true).await.unwrap();

        assert_eq!(outcome, SyncOutcome::Exists);
        assert!(db.is_populated("monthly"));
        assert_eq!(
            db.refreshes(),
            vec![Refresh {
                view: "public.monthly".into(),
                concurrently: false
            }]
        );
    }

    #[tokio::test]
    async fn test_plain_definition_rejected() {
        let conn = sales_db().connection();
        let view = ViewDefinition::new("reports", "Plain").with_sql("SELECT 1 AS a");
        assert!(matches!(
            create_or_update_materialized_view(&conn, &view, false).await,
            Err(ViewError::NotMaterialized(_))
        ));
    }
}

mod index_reconciliation_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_reconcile_drops_extra_and_creates_missing() {
        let db = sales_db();
        let conn = db.connection();
        let original = ViewDefinition::materialized("reports", "Monthly")
            .with_table("monthly")
            .with_sql("SELECT month, region, total FROM sales")
            .with_index(IndexSpec::new("monthly_region", &["region"]));
        create_or_update_materialized_view(&conn, &original, false).await.unwrap();

        let declared = ViewDefinition::materialized("reports", "Monthly")
            .with_table("monthly")
            .with_sql("SELECT month, region, total FROM sales")
            .with_concurrent_index("month, region")
            .with_index(IndexSpec::new("monthly_total", &["total"]));

        let changes = reconcile_indexes(&conn, &declared, None).await.unwrap();
        assert_eq!(changes.dropped, strings(&["monthly_region"]));
        assert_eq!(
            changes.created,
            strings(&["monthly_month_region_index", "monthly_total"])
        );

        db.clear_log();
        let second = reconcile_indexes(&conn, &declared, None).await.unwrap();
        assert!(second.is_empty());
        assert!(db.executed().is_empty());
    }

    #[tokio::test]
    async fn test_long_concurrent_index_name_is_recognised() {
        let db = FakeDatabase::new().with_table(
            "analytics.sales",
            &["customer_id", "region_id", "month", "total"],
        );
        let conn = db.connection();
        let view = ViewDefinition::materialized("analytics", "MonthlySalesByRegion")
            .with_table("analytics.monthly_sales_by_region")
            .with_sql("SELECT customer_id, region_id, month, total FROM analytics.sales")
            .with_concurrent_index("customer_id, region_id, month");
        create_or_update_materialized_view(&conn, &view, false).await.unwrap();

        let stored = db.indexes_on("analytics.monthly_sales_by_region");
        assert_eq!(stored.len(), 1);
        assert_eq!(Some(stored[0].clone()), view.concurrent_index_name());

        db.clear_log();
        let changes = reconcile_indexes(&conn, &view, None).await.unwrap();
        assert!(changes.is_empty());
        assert!(db.executed().is_empty());
    }
}

mod refresh_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn created(db: &FakeDatabase, view: &ViewDefinition) {
        create_or_update_materialized_view(&db.connection(), view, false)
            .await
            .unwrap();
        db.clear_log();
    }

    #[tokio::test]
    async fn test_strict_concurrent_refresh_without_index_fails() {
        let db = sales_db();
        let view = ViewDefinition::materialized("reports", "Totals")
            .with_table("totals")
            .with_sql("SELECT id, total FROM sales");
        created(&db, &view).await;

        let err = refresh_materialized_view(&db.connection(), &view, true, true)
            .await
            .unwrap_err();

        assert!(matches!(err, ViewError::ConcurrentIndexNotDefined { ref view } if view == "reports.Totals"));
        assert!(db.refreshes().is_empty());
    }

    #[tokio::test]
    async fn test_permissive_concurrent_refresh_falls_back() {
        let db = sales_db();
        let view = ViewDefinition::materialized("reports", "Totals")
            .with_table("totals")
            .with_sql("SELECT id, total FROM sales");
        created(&db, &view).await;

        refresh_materialized_view(&db.connection(), &view, true, false)
            .await
            .unwrap();

        assert_eq!(
            db.refreshes(),
            vec![Refresh {
                view: "public.totals".into(),
                concurrently: false
            }]
        );
    }

    #[tokio::test]
    async fn test_concurrent_refresh_with_index() {
        let db = sales_db();
        let view = ViewDefinition::materialized("reports", "Totals")
            .with_table("totals")
            .with_sql("SELECT id, total FROM sales")
            .with_concurrent_index("id");
        created(&db, &view).await;

        refresh_materialized_view(&db.connection(), &view, true, true)
            .await
            .unwrap();

        assert_eq!(
            db.executed(),
            strings(&["REFRESH MATERIALIZED VIEW CONCURRENTLY totals"])
        );
    }
}
