//! DDL builders for views, materialized views and their indexes

use pgviews_core::Value;
use regex::Regex;
use ring::digest;
use std::sync::LazyLock;

use crate::{IndexSpec, QualifiedName};

/// PostgreSQL truncates identifiers longer than this many bytes
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Name of the temporary view used to probe whether a new definition is
/// compatible with the live one
pub const PROBE_VIEW_NAME: &str = "check_conflict";

const TEMPORARY_SUFFIX: &str = "_temp";
const DIGEST_LENGTH: usize = 4;

static POSITIONAL_PARAM_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([0-9]+)").expect("valid regex"));

// String literals, dollar-quoted bodies and comments are never rewritten
static SKIP_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"'(?:[^']|'')*'|\$([A-Za-z_][A-Za-z0-9_]*)?\$[\s\S]*?\$([A-Za-z_][A-Za-z0-9_]*)?\$|--[^\n]*|/\*[\s\S]*?\*/")
        .expect("valid regex")
});

/// `CREATE VIEW <table> AS <query>`
pub fn create_view(table: &QualifiedName, query: &str) -> String {
    format!("CREATE VIEW {} AS {}", quote_qualified(table), query)
}

/// `CREATE OR REPLACE VIEW <table> AS <query>`
pub fn create_or_replace_view(table: &QualifiedName, query: &str) -> String {
    format!("CREATE OR REPLACE VIEW {} AS {}", quote_qualified(table), query)
}

/// Temporary copy of an existing view, the starting point of the
/// compatibility probe
pub fn create_probe_view(table: &QualifiedName) -> String {
    format!(
        "CREATE TEMPORARY VIEW {} AS SELECT * FROM {}",
        PROBE_VIEW_NAME,
        quote_qualified(table)
    )
}

/// Replace the probe view with the new definition; fails when the new shape
/// is incompatible with the old one
pub fn replace_probe_view(query: &str) -> String {
    format!("CREATE OR REPLACE TEMPORARY VIEW {} AS {}", PROBE_VIEW_NAME, query)
}

pub fn drop_probe_view() -> String {
    format!("DROP VIEW IF EXISTS {}", PROBE_VIEW_NAME)
}

/// `DROP [MATERIALIZED] VIEW IF EXISTS <table> [CASCADE]`
pub fn drop_view(table: &QualifiedName, is_materialized: bool, cascade: bool) -> String {
    let view_type = if is_materialized {
        "MATERIALIZED VIEW"
    } else {
        "VIEW"
    };
    let cascade_clause = if cascade { " CASCADE" } else { "" };
    format!(
        "DROP {} IF EXISTS {}{}",
        view_type,
        quote_qualified(table),
        cascade_clause
    )
}

/// `CREATE MATERIALIZED VIEW <table> AS <query> WITH [NO] DATA`
pub fn create_materialized_view(table: &QualifiedName, query: &str, with_data: bool) -> String {
    let data_clause = if with_data { "WITH DATA" } else { "WITH NO DATA" };
    format!(
        "CREATE MATERIALIZED VIEW {} AS {} {}",
        quote_qualified(table),
        query,
        data_clause
    )
}

/// `REFRESH MATERIALIZED VIEW [CONCURRENTLY] <table>`
pub fn refresh_materialized_view(table: &QualifiedName, concurrently: bool) -> String {
    let concurrent_clause = if concurrently { "CONCURRENTLY " } else { "" };
    format!(
        "REFRESH MATERIALIZED VIEW {}{}",
        concurrent_clause,
        quote_qualified(table)
    )
}

/// Unique index backing concurrent refresh
///
/// The index name comes from `concurrent_index_name`; the columns keep their
/// declared order.
pub fn create_concurrent_index(table: &QualifiedName, columns: &str) -> String {
    let column_list: Vec<&str> = columns.split(',').map(str::trim).collect();
    format!(
        "CREATE UNIQUE INDEX {} ON {} ({})",
        quote_identifier(&concurrent_index_name(&table.to_string(), columns)),
        quote_qualified(table),
        column_list.join(", ")
    )
}

/// `CREATE [UNIQUE] INDEX <name> ON <table> (<columns>)`
///
/// Columns prefixed with `-` are indexed descending.
pub fn create_index(table: &QualifiedName, index: &IndexSpec) -> String {
    let columns: Vec<String> = index
        .columns
        .iter()
        .map(|column| match column.strip_prefix('-') {
            Some(name) => format!("{} DESC", quote_identifier(name)),
            None => quote_identifier(column),
        })
        .collect();
    let unique = if index.unique { "UNIQUE " } else { "" };
    format!(
        "CREATE {}INDEX {} ON {} ({})",
        unique,
        quote_identifier(&index.name),
        quote_qualified(table),
        columns.join(", ")
    )
}

/// `DROP INDEX [<schema>.]<index>`
pub fn drop_index(schema: Option<&str>, index_name: &str) -> String {
    match schema {
        Some(schema) => format!(
            "DROP INDEX {}.{}",
            quote_identifier(schema),
            quote_identifier(index_name)
        ),
        None => format!("DROP INDEX {}", quote_identifier(index_name)),
    }
}

/// Deterministic name of the concurrent-refresh index.
///
/// Dots in the table name become underscores and the trimmed columns are
/// sorted, so the same declaration always yields the same name. Long names
/// are shortened with [`truncate_identifier`] so the server stores them as given.
///
/// # Examples
///
/// ```
/// use pgviews_objects::statements::concurrent_index_name;
///
/// assert_eq!(
///     concurrent_index_name("reports.sales", " region, id "),
///     "reports_sales_id_region_index"
/// );
/// ```
pub fn concurrent_index_name(table: &str, columns: &str) -> String {
    let mut column_list: Vec<&str> = columns
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect();
    column_list.sort_unstable();
    truncate_identifier(&format!(
        "{}_{}_index",
        table.replace('.', "_"),
        column_list.join("_")
    ))
}

/// Name of the scratch materialized view used to compare definitions,
/// `<name>_temp` shortened to fit PostgreSQL's identifier limit.
pub fn temporary_name(name: &str) -> String {
    truncate_identifier(&format!("{}{}", name, TEMPORARY_SUFFIX))
}

/// Shorten an identifier to `MAX_IDENTIFIER_LENGTH` bytes, replacing the tail
/// with a short digest of the full name so distinct long names stay distinct.
pub fn truncate_identifier(name: &str) -> String {
    if name.len() <= MAX_IDENTIFIER_LENGTH {
        return name.to_string();
    }
    let hash = digest::digest(&digest::SHA256, name.as_bytes());
    let suffix = &hex::encode(hash.as_ref())[..DIGEST_LENGTH];

    let mut cut = MAX_IDENTIFIER_LENGTH - DIGEST_LENGTH;
    while !name.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{}", &name[..cut], suffix)
}

/// Replace `$n` placeholders with the literal form of `params[n - 1]`.
///
/// Placeholders inside string literals, dollar-quoted bodies and comments
/// are left alone. Returns the offending index when a placeholder has no
/// matching parameter.
pub fn bind_literals(query: &str, params: &[Value]) -> std::result::Result<String, usize> {
    let skip_ranges: Vec<(usize, usize)> = SKIP_REGEX
        .find_iter(query)
        .map(|m| (m.start(), m.end()))
        .collect();

    let mut result = String::with_capacity(query.len());
    let mut last_end = 0;

    for captures in POSITIONAL_PARAM_REGEX.captures_iter(query) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        if skip_ranges
            .iter()
            .any(|&(start, end)| whole.start() >= start && whole.start() < end)
        {
            continue;
        }

        let index: usize = captures[1].parse().unwrap_or(0);
        let value = index
            .checked_sub(1)
            .and_then(|i| params.get(i))
            .ok_or(index)?;

        result.push_str(&query[last_end..whole.start()]);
        result.push_str(&value.to_sql_literal());
        last_end = whole.end();
    }

    result.push_str(&query[last_end..]);
    Ok(result)
}

/// Quote a possibly schema-qualified identifier
pub fn quote_identifier(name: &str) -> String {
    if name.contains('.') {
        name.split('.')
            .map(quote_single_identifier)
            .collect::<Vec<_>>()
            .join(".")
    } else {
        quote_single_identifier(name)
    }
}

pub fn quote_qualified(name: &QualifiedName) -> String {
    match name.schema() {
        Some(schema) => format!(
            "{}.{}",
            quote_single_identifier(schema),
            quote_single_identifier(name.name())
        ),
        None => quote_single_identifier(name.name()),
    }
}

fn quote_single_identifier(name: &str) -> String {
    if needs_quoting(name) {
        format!("\"{}\"", name.replace('"', "\"\""))
    } else {
        name.to_string()
    }
}

fn needs_quoting(name: &str) -> bool {
    let Some(first) = name.chars().next() else {
        return true;
    };
    if !first.is_ascii_lowercase() && first != '_' {
        return true;
    }
    name.chars()
        .any(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'))
        || RESERVED_KEYWORDS.contains(&name.to_uppercase().as_str())
}

static RESERVED_KEYWORDS: &[&str] = &[
    "ALL",
    "ANALYSE",
    "ANALYZE",
    "AND",
    "ANY",
    "ARRAY",
    "AS",
    "ASC",
    "ASYMMETRIC",
    "BOTH",
    "CASE",
    "CAST",
    "CHECK",
    "COLLATE",
    "COLUMN",
    "CONSTRAINT",
    "CREATE",
    "CURRENT_CATALOG",
    "CURRENT_DATE",
    "CURRENT_ROLE",
    "CURRENT_TIME",
    "CURRENT_TIMESTAMP",
    "CURRENT_USER",
    "DEFAULT",
    "DEFERRABLE",
    "DESC",
    "DISTINCT",
    "DO",
    "ELSE",
    "END",
    "EXCEPT",
    "FALSE",
    "FETCH",
    "FOR",
    "FOREIGN",
    "FROM",
    "GRANT",
    "GROUP",
    "HAVING",
    "IN",
    "INITIALLY",
    "INTERSECT",
    "INTO",
    "LATERAL",
    "LEADING",
    "LIMIT",
    "LOCALTIME",
    "LOCALTIMESTAMP",
    "NOT",
    "NULL",
    "OFFSET",
    "ON",
    "ONLY",
    "OR",
    "ORDER",
    "PLACING",
    "PRIMARY",
    "REFERENCES",
    "RETURNING",
    "SELECT",
    "SESSION_USER",
    "SOME",
    "SYMMETRIC",
    "TABLE",
    "THEN",
    "TO",
    "TRAILING",
    "TRUE",
    "UNION",
    "UNIQUE",
    "USER",
    "USING",
    "VARIADIC",
    "WHEN",
    "WHERE",
    "WINDOW",
    "WITH",
];
