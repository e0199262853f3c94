//! Recognisers for the statement shapes pgviews sends

use regex::Regex;
use std::sync::LazyLock;

static CREATE_VIEW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^CREATE (OR REPLACE )?(TEMPORARY )?VIEW (\S+) AS (.+)$").expect("valid regex")
});

static CREATE_MATERIALIZED_VIEW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^CREATE MATERIALIZED VIEW (\S+) AS (.+) WITH (NO )?DATA$")
        .expect("valid regex")
});

static DROP_VIEW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^DROP (MATERIALIZED )?VIEW IF EXISTS (\S+)( CASCADE)?$").expect("valid regex")
});

static CREATE_INDEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^CREATE (UNIQUE )?INDEX (\S+) ON (\S+) \((.+)\)$").expect("valid regex")
});

static DROP_INDEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^DROP INDEX (\S+)$").expect("valid regex"));

static REFRESH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^REFRESH MATERIALIZED VIEW (CONCURRENTLY )?(\S+)$").expect("valid regex")
});

static SELECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*SELECT\s+(.+?)(?:\s+FROM\s+(.+))?$").expect("valid regex")
});

static SOURCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:FROM|JOIN)\s+("?[A-Za-z_][\w\."]*)"#).expect("valid regex")
});

static ALIAS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\s+AS\s+("?\w+"?)\s*$"#).expect("valid regex"));

static CATALOG_QUERY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^SELECT (.+?) FROM (information_schema\.views|pg_matviews|pg_indexes) WHERE (.+)$")
        .expect("valid regex")
});

static EQ_CONDITION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+) = \$(\d+)$").expect("valid regex"));

static IN_CONDITION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+) IN \((.+)\)$").expect("valid regex"));

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Statement {
    CreateView {
        name: String,
        query: String,
        or_replace: bool,
        temporary: bool,
    },
    CreateMaterializedView {
        name: String,
        query: String,
        with_data: bool,
    },
    DropView {
        name: String,
        materialized: bool,
        cascade: bool,
    },
    CreateIndex {
        name: String,
        table: String,
        columns: Vec<String>,
        unique: bool,
    },
    DropIndex {
        name: String,
    },
    Refresh {
        name: String,
        concurrently: bool,
    },
}

pub(crate) fn parse_statement(sql: &str) -> Option<Statement> {
    let sql = sql.trim().trim_end_matches(';');

    if let Some(c) = CREATE_MATERIALIZED_VIEW.captures(sql) {
        return Some(Statement::CreateMaterializedView {
            name: unquote(&c[1]),
            query: c[2].to_string(),
            with_data: c.get(3).is_none(),
        });
    }
    if let Some(c) = CREATE_VIEW.captures(sql) {
        return Some(Statement::CreateView {
            name: unquote(&c[3]),
            query: c[4].to_string(),
            or_replace: c.get(1).is_some(),
            temporary: c.get(2).is_some(),
        });
    }
    if let Some(c) = DROP_VIEW.captures(sql) {
        return Some(Statement::DropView {
            name: unquote(&c[2]),
            materialized: c.get(1).is_some(),
            cascade: c.get(3).is_some(),
        });
    }
    if let Some(c) = CREATE_INDEX.captures(sql) {
        let columns = split_top_level(&c[4])
            .into_iter()
            .map(|column| {
                let column = column.trim();
                let column = column.strip_suffix(" DESC").unwrap_or(column);
                unquote(column.trim())
            })
            .collect();
        return Some(Statement::CreateIndex {
            name: unquote(&c[2]),
            table: unquote(&c[3]),
            columns,
            unique: c.get(1).is_some(),
        });
    }
    if let Some(c) = DROP_INDEX.captures(sql) {
        return Some(Statement::DropIndex {
            name: unquote(&c[1]),
        });
    }
    if let Some(c) = REFRESH.captures(sql) {
        return Some(Statement::Refresh {
            name: unquote(&c[2]),
            concurrently: c.get(1).is_some(),
        });
    }
    None
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SelectItem {
    Column(String),
    Star(Option<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SelectShape {
    pub items: Vec<SelectItem>,
    pub sources: Vec<String>,
}

/// Output columns and referenced relations of a simple `SELECT`
pub(crate) fn parse_select(query: &str) -> Option<SelectShape> {
    let query = query.trim().trim_end_matches(';');
    let captures = SELECT.captures(query)?;

    let items = split_top_level(&captures[1])
        .into_iter()
        .map(|item| {
            let item = item.trim();
            if item == "*" {
                return SelectItem::Star(None);
            }
            if let Some(prefix) = item.strip_suffix(".*") {
                return SelectItem::Star(Some(unquote(prefix)));
            }
            if let Some(alias) = ALIAS.captures(item) {
                return SelectItem::Column(unquote(&alias[1]));
            }
            let last = item.split_whitespace().last().unwrap_or(item);
            let name = match last.split_once('(') {
                Some((function, _)) => function.to_lowercase(),
                None => last.rsplit('.').next().unwrap_or(last).to_string(),
            };
            SelectItem::Column(unquote(&name))
        })
        .collect();

    let sources = SOURCE
        .captures_iter(query)
        .map(|c| unquote(&c[1]))
        .collect();

    Some(SelectShape { items, sources })
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Projection {
    Count,
    Columns(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Condition {
    Eq(String, usize),
    In(String, Vec<usize>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CatalogQuery {
    pub projection: Projection,
    pub relation: String,
    pub conditions: Vec<Condition>,
}

/// A lookup against `information_schema.views`, `pg_matviews` or `pg_indexes`
pub(crate) fn parse_catalog_query(sql: &str) -> Option<CatalogQuery> {
    let captures = CATALOG_QUERY.captures(sql.trim())?;

    let projection = if captures[1].trim() == "COUNT(*)" {
        Projection::Count
    } else {
        Projection::Columns(
            captures[1]
                .split(',')
                .map(|c| c.trim().to_string())
                .collect(),
        )
    };

    let mut conditions = Vec::new();
    for part in captures[3].split(" AND ") {
        let part = part.trim();
        if part == "TRUE" {
            continue;
        }
        if let Some(c) = EQ_CONDITION.captures(part) {
            conditions.push(Condition::Eq(c[1].to_string(), c[2].parse().ok()?));
        } else if let Some(c) = IN_CONDITION.captures(part) {
            let params = c[2]
                .split(',')
                .map(|p| p.trim().trim_start_matches('$').parse().ok())
                .collect::<Option<Vec<usize>>>()?;
            conditions.push(Condition::In(c[1].to_string(), params));
        } else {
            return None;
        }
    }

    Some(CatalogQuery {
        projection,
        relation: captures[2].to_string(),
        conditions,
    })
}

/// Strip identifier quoting from every dotted part
pub(crate) fn unquote(name: &str) -> String {
    name.split('.')
        .map(|part| part.trim().trim_matches('"').replace("\"\"", "\""))
        .collect::<Vec<_>>()
        .join(".")
}

/// Split on commas that are not inside parentheses
pub(crate) fn split_top_level(list: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for ch in list.chars() {
        match ch {
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => parts.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}

/// Collapse whitespace the way the server's deparsed definitions read
pub(crate) fn normalize_definition(query: &str) -> String {
    let collapsed = query
        .trim()
        .trim_end_matches(';')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    format!(" {};", collapsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_select_columns_and_sources() {
        let shape = parse_select("SELECT s.id, total AS amount, count(*) FROM sales s JOIN regions r ON true").unwrap();
        assert_eq!(
            shape.items,
            vec![
                SelectItem::Column("id".into()),
                SelectItem::Column("amount".into()),
                SelectItem::Column("count".into()),
            ]
        );
        assert_eq!(shape.sources, vec!["sales".to_string(), "regions".to_string()]);
    }

    #[test]
    fn test_parse_select_without_from() {
        let shape = parse_select("SELECT 1 AS a, 'x' AS b").unwrap();
        assert_eq!(shape.sources, Vec::<String>::new());
        assert_eq!(shape.items.len(), 2);
    }

    #[test]
    fn test_parse_catalog_query() {
        let query = parse_catalog_query(
            "SELECT matviewname, definition FROM pg_matviews WHERE schemaname = $1 AND matviewname IN ($2, $3)",
        )
        .unwrap();
        assert_eq!(query.relation, "pg_matviews");
        assert_eq!(
            query.conditions,
            vec![
                Condition::Eq("schemaname".into(), 1),
                Condition::In("matviewname".into(), vec![2, 3]),
            ]
        );
    }

    #[test]
    fn test_parse_create_index() {
        assert_eq!(
            parse_statement("CREATE UNIQUE INDEX idx ON reports.sales (month DESC, id)"),
            Some(Statement::CreateIndex {
                name: "idx".into(),
                table: "reports.sales".into(),
                columns: vec!["month".into(), "id".into()],
                unique: true,
            })
        );
    }

    #[test]
    fn test_normalize_definition() {
        assert_eq!(normalize_definition("SELECT  1\n AS a;"), " SELECT 1 AS a;");
    }
}
