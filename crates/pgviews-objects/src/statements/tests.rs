//! Tests for statement builders

use super::*;
use crate::{IndexSpec, QualifiedName};
use pgviews_core::Value;

mod view_statement_tests {
    use super::*;

    #[test]
    fn test_create_or_replace_view() {
        let table = QualifiedName::parse("reports.sales");
        assert_eq!(
            create_or_replace_view(&table, "SELECT 1 AS id"),
            "CREATE OR REPLACE VIEW reports.sales AS SELECT 1 AS id"
        );
    }

    #[test]
    fn test_drop_view_variants() {
        let table = QualifiedName::new("sales");
        assert_eq!(
            drop_view(&table, false, true),
            "DROP VIEW IF EXISTS sales CASCADE"
        );
        assert_eq!(
            drop_view(&table, true, false),
            "DROP MATERIALIZED VIEW IF EXISTS sales"
        );
    }

    #[test]
    fn test_create_materialized_view_data_clause() {
        let table = QualifiedName::new("sales");
        assert!(create_materialized_view(&table, "SELECT 1", true).ends_with(" WITH DATA"));
        assert!(create_materialized_view(&table, "SELECT 1", false).ends_with(" WITH NO DATA"));
    }

    #[test]
    fn test_refresh() {
        let table = QualifiedName::new("sales");
        assert_eq!(
            refresh_materialized_view(&table, true),
            "REFRESH MATERIALIZED VIEW CONCURRENTLY sales"
        );
        assert_eq!(
            refresh_materialized_view(&table, false),
            "REFRESH MATERIALIZED VIEW sales"
        );
    }

    #[test]
    fn test_probe_statements() {
        let table = QualifiedName::new("sales");
        assert_eq!(
            create_probe_view(&table),
            "CREATE TEMPORARY VIEW check_conflict AS SELECT * FROM sales"
        );
        assert_eq!(
            replace_probe_view("SELECT 2 AS id"),
            "CREATE OR REPLACE TEMPORARY VIEW check_conflict AS SELECT 2 AS id"
        );
        assert_eq!(drop_probe_view(), "DROP VIEW IF EXISTS check_conflict");
    }
}

mod index_statement_tests {
    use super::*;

    #[test]
    fn test_concurrent_index_name_sorts_and_trims() {
        assert_eq!(
            concurrent_index_name("sales", "month , id"),
            "sales_id_month_index"
        );
        assert_eq!(
            concurrent_index_name("sales", "id,month"),
            concurrent_index_name("sales", "month,id")
        );
    }

    #[test]
    fn test_long_concurrent_index_name_fits_identifier_limit() {
        let name = concurrent_index_name(
            "analytics.monthly_sales_by_region",
            "customer_id, region_id, month",
        );

        assert_eq!(name.len(), MAX_IDENTIFIER_LENGTH);
        assert!(name.starts_with("analytics_monthly_sales_by_region_customer_id_month_"));
        assert_eq!(
            name,
            concurrent_index_name("analytics.monthly_sales_by_region", "month,region_id,customer_id")
        );
        assert_ne!(
            name,
            concurrent_index_name("analytics.monthly_sales_by_region", "customer_id, region_id, week")
        );
    }

    #[test]
    fn test_create_concurrent_index_keeps_declared_order() {
        let table = QualifiedName::parse("reports.sales");
        assert_eq!(
            create_concurrent_index(&table, "month, id"),
            "CREATE UNIQUE INDEX reports_sales_id_month_index ON reports.sales (month, id)"
        );
    }

    #[test]
    fn test_create_index_descending_and_unique() {
        let table = QualifiedName::new("sales");
        let index = IndexSpec::new("sales_month", &["-month", "region"]).unique();
        assert_eq!(
            create_index(&table, &index),
            "CREATE UNIQUE INDEX sales_month ON sales (month DESC, region)"
        );
    }

    #[test]
    fn test_drop_index() {
        assert_eq!(drop_index(Some("reports"), "idx"), "DROP INDEX reports.idx");
        assert_eq!(drop_index(None, "idx"), "DROP INDEX idx");
    }
}

mod naming_tests {
    use super::*;

    #[test]
    fn test_temporary_name_short() {
        assert_eq!(temporary_name("sales"), "sales_temp");
    }

    #[test]
    fn test_temporary_name_truncated_to_identifier_limit() {
        let long = "a".repeat(70);
        let temp = temporary_name(&long);
        assert_eq!(temp.len(), MAX_IDENTIFIER_LENGTH);
        assert!(temp.starts_with(&"a".repeat(59)));
        assert_ne!(temp, temporary_name(&"b".repeat(70)));
        assert_eq!(temp, temporary_name(&long));
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("sales"), "sales");
        assert_eq!(quote_identifier("Sales"), "\"Sales\"");
        assert_eq!(quote_identifier("order"), "\"order\"");
        assert_eq!(quote_identifier("reports.sales"), "reports.sales");
        assert_eq!(quote_identifier("my view"), "\"my view\"");
    }
}

mod bind_literal_tests {
    use super::*;

    #[test]
    fn test_placeholders_in_strings_untouched() {
        let bound = bind_literals("SELECT '$1' AS a, $1 AS b", &[Value::Int64(7)]).unwrap();
        assert_eq!(bound, "SELECT '$1' AS a, 7 AS b");
    }

    #[test]
    fn test_repeated_placeholder() {
        let bound = bind_literals("SELECT $1 AS a, $1 AS b", &[Value::Bool(true)]).unwrap();
        assert_eq!(bound, "SELECT TRUE AS a, TRUE AS b");
    }

    #[test]
    fn test_out_of_range() {
        assert_eq!(bind_literals("SELECT $0", &[]), Err(0));
        assert_eq!(bind_literals("SELECT $3", &[Value::Null]), Err(3));
    }
}

mod where_clause_tests {
    use super::*;

    #[test]
    fn test_numbering_across_conditions() {
        let clause = WhereClause::new()
            .eq("schemaname", Some("reports"))
            .any_of("matviewname", &["sales", "sales_temp"]);
        assert_eq!(clause.sql(), "schemaname = $1 AND matviewname IN ($2, $3)");
        assert_eq!(
            clause.params(),
            &[
                Value::from("reports"),
                Value::from("sales"),
                Value::from("sales_temp")
            ]
        );
    }

    #[test]
    fn test_empty_clause() {
        assert_eq!(WhereClause::new().eq("schemaname", None).sql(), "TRUE");
    }
}
