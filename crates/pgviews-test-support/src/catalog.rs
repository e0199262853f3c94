//! In-memory catalog state and statement evaluation

use parking_lot::Mutex;
use pgviews_core::{PgViewsError, QueryResult, Result, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::connection::FakeConnection;
use crate::sql::{
    self, CatalogQuery, Condition, Projection, SelectItem, Statement, normalize_definition,
};

const TEMP_SCHEMA: &str = "pg_temp";
const DEFAULT_SCHEMA: &str = "public";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RelationKind {
    Table,
    View,
    MaterializedView,
}

#[derive(Debug, Clone)]
pub(crate) struct Relation {
    schema: String,
    name: String,
    kind: RelationKind,
    columns: Vec<String>,
    definition: String,
    populated: bool,
    depends_on: Vec<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct Index {
    schema: String,
    name: String,
    table: String,
    unique: bool,
}

/// Everything a transaction can roll back
#[derive(Debug, Clone, Default)]
pub(crate) struct Objects {
    relations: BTreeMap<String, Relation>,
    indexes: BTreeMap<String, Index>,
}

/// One `REFRESH MATERIALIZED VIEW` that reached the fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refresh {
    pub view: String,
    pub concurrently: bool,
}

#[derive(Debug, Default)]
struct State {
    objects: Objects,
    executed: Vec<String>,
    queries: Vec<String>,
    refreshes: Vec<Refresh>,
    failures: Vec<(String, String)>,
}

/// Shared handle to an in-memory database.
///
/// Clones share state, so a test can keep one handle for assertions while
/// the code under test works through connections.
#[derive(Debug, Clone, Default)]
pub struct FakeDatabase {
    state: Arc<Mutex<State>>,
    schema: Option<String>,
}

impl FakeDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connections report `schema` as their schema and create unqualified
    /// objects there. Without it they use `public` but report no schema.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Add a base table
    pub fn with_table(self, name: &str, columns: &[&str]) -> Self {
        {
            let mut state = self.state.lock();
            let (schema, table) = self.target(name, false);
            state.objects.relations.insert(
                key(&schema, &table),
                Relation {
                    schema,
                    name: table,
                    kind: RelationKind::Table,
                    columns: columns.iter().map(|c| c.to_string()).collect(),
                    definition: String::new(),
                    populated: true,
                    depends_on: Vec::new(),
                },
            );
        }
        self
    }

    /// Fail any statement or query containing `pattern` with `sqlstate`
    pub fn fail_on(&self, pattern: impl Into<String>, sqlstate: impl Into<String>) {
        self.state
            .lock()
            .failures
            .push((pattern.into(), sqlstate.into()));
    }

    pub fn connection(&self) -> FakeConnection {
        FakeConnection::new(self.clone())
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// Statements sent through `execute`, in order
    pub fn executed(&self) -> Vec<String> {
        self.state.lock().executed.clone()
    }

    /// Catalog and ad-hoc queries sent through `query`, in order
    pub fn queries(&self) -> Vec<String> {
        self.state.lock().queries.clone()
    }

    pub fn clear_log(&self) {
        let mut state = self.state.lock();
        state.executed.clear();
        state.queries.clear();
        state.refreshes.clear();
    }

    pub fn refreshes(&self) -> Vec<Refresh> {
        self.state.lock().refreshes.clone()
    }

    pub fn has_view(&self, name: &str) -> bool {
        self.relation_kind(name) == Some(RelationKind::View)
    }

    pub fn has_materialized_view(&self, name: &str) -> bool {
        self.relation_kind(name) == Some(RelationKind::MaterializedView)
    }

    pub fn has_relation(&self, name: &str) -> bool {
        self.relation_kind(name).is_some()
    }

    /// Output columns of a relation
    pub fn columns(&self, name: &str) -> Option<Vec<String>> {
        let state = self.state.lock();
        let key = self.resolve(&state.objects, name)?;
        state.objects.relations.get(&key).map(|r| r.columns.clone())
    }

    /// Stored definition of a view, as the server would deparse it
    pub fn definition(&self, name: &str) -> Option<String> {
        let state = self.state.lock();
        let key = self.resolve(&state.objects, name)?;
        state.objects.relations.get(&key).map(|r| r.definition.clone())
    }

    pub fn is_populated(&self, name: &str) -> bool {
        let state = self.state.lock();
        self.resolve(&state.objects, name)
            .and_then(|key| state.objects.relations.get(&key).map(|r| r.populated))
            .unwrap_or(false)
    }

    /// Index names on a relation, sorted
    pub fn indexes_on(&self, name: &str) -> Vec<String> {
        let state = self.state.lock();
        let Some(table) = self.resolve(&state.objects, name) else {
            return Vec::new();
        };
        state
            .objects
            .indexes
            .values()
            .filter(|index| index.table == table)
            .map(|index| index.name.clone())
            .collect()
    }

    fn relation_kind(&self, name: &str) -> Option<RelationKind> {
        let state = self.state.lock();
        let key = self.resolve(&state.objects, name)?;
        state.objects.relations.get(&key).map(|r| r.kind)
    }

    pub(crate) fn snapshot(&self) -> Objects {
        self.state.lock().objects.clone()
    }

    pub(crate) fn restore(&self, objects: Objects) {
        self.state.lock().objects = objects;
    }

    /// Run a statement, returning the affected row count
    pub(crate) fn execute(&self, sql: &str) -> Result<u64> {
        let mut state = self.state.lock();
        state.executed.push(sql.to_string());
        check_failures(&state, sql)?;

        let statement = sql::parse_statement(sql).ok_or_else(|| {
            PgViewsError::database("42601", format!("syntax error: unsupported statement {:?}", sql))
        })?;
        self.apply(&mut state, statement)
    }

    /// Run a query, binding `params`
    pub(crate) fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let mut state = self.state.lock();
        state.queries.push(sql.to_string());
        check_failures(&state, sql)?;

        if let Some(catalog_query) = sql::parse_catalog_query(sql) {
            return catalog_rows(&state.objects, &catalog_query, params);
        }

        let (columns, _) = self.analyse(&state.objects, sql)?;
        let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
        Ok(QueryResult::from_rows(&columns, Vec::new()))
    }

    fn apply(&self, state: &mut State, statement: Statement) -> Result<u64> {
        match statement {
            Statement::CreateView {
                name,
                query,
                or_replace,
                temporary,
            } => {
                let (columns, depends_on) = self.analyse(&state.objects, &query)?;
                let (schema, view) = self.target(&name, temporary);
                let view_key = key(&schema, &view);

                if let Some(existing) = state.objects.relations.get(&view_key) {
                    if !or_replace {
                        return Err(already_exists(&view));
                    }
                    if existing.kind != RelationKind::View {
                        return Err(PgViewsError::database(
                            "42809",
                            format!("\"{}\" is not a view", view),
                        ));
                    }
                    check_replacement(&existing.columns, &columns)?;
                }

                state.objects.relations.insert(
                    view_key,
                    Relation {
                        schema,
                        name: view,
                        kind: RelationKind::View,
                        columns,
                        definition: normalize_definition(&query),
                        populated: true,
                        depends_on,
                    },
                );
                Ok(0)
            }
            Statement::CreateMaterializedView {
                name,
                query,
                with_data,
            } => {
                let (columns, depends_on) = self.analyse(&state.objects, &query)?;
                let (schema, view) = self.target(&name, false);
                let view_key = key(&schema, &view);
                if state.objects.relations.contains_key(&view_key) {
                    return Err(already_exists(&view));
                }
                state.objects.relations.insert(
                    view_key,
                    Relation {
                        schema,
                        name: view,
                        kind: RelationKind::MaterializedView,
                        columns,
                        definition: normalize_definition(&query),
                        populated: with_data,
                        depends_on,
                    },
                );
                Ok(0)
            }
            Statement::DropView {
                name,
                materialized,
                cascade,
            } => {
                let Some(view_key) = self.resolve(&state.objects, &name) else {
                    return Ok(0);
                };
                let expected = if materialized {
                    RelationKind::MaterializedView
                } else {
                    RelationKind::View
                };
                if state.objects.relations.get(&view_key).map(|r| r.kind) != Some(expected) {
                    let noun = if materialized { "a materialized view" } else { "a view" };
                    return Err(PgViewsError::database(
                        "42809",
                        format!("\"{}\" is not {}", name, noun),
                    ));
                }
                drop_relation(&mut state.objects, &view_key, cascade)?;
                Ok(0)
            }
            Statement::CreateIndex {
                name,
                table,
                columns,
                unique,
            } => {
                let table_key = self
                    .resolve(&state.objects, &table)
                    .ok_or_else(|| undefined_table(&table))?;
                let relation = state
                    .objects
                    .relations
                    .get(&table_key)
                    .ok_or_else(|| undefined_table(&table))?;
                if relation.kind == RelationKind::View {
                    return Err(PgViewsError::database(
                        "42809",
                        format!("cannot create index on relation \"{}\"", table),
                    ));
                }
                if let Some(missing) = columns.iter().find(|c| !relation.columns.contains(c)) {
                    return Err(PgViewsError::database(
                        "42703",
                        format!("column \"{}\" does not exist", missing),
                    ));
                }
                let schema = relation.schema.clone();
                let name = server_identifier(&name);
                let index_key = key(&schema, &name);
                if state.objects.indexes.contains_key(&index_key) {
                    return Err(already_exists(&name));
                }
                state.objects.indexes.insert(
                    index_key,
                    Index {
                        schema,
                        name,
                        table: table_key,
                        unique,
                    },
                );
                Ok(0)
            }
            Statement::DropIndex { name } => {
                let index_key = match name.split_once('.') {
                    Some((schema, index)) => key(schema, &server_identifier(index)),
                    None => key(self.default_schema(), &server_identifier(&name)),
                };
                state.objects.indexes.remove(&index_key).ok_or_else(|| {
                    PgViewsError::database(
                        "42704",
                        format!("index \"{}\" does not exist", name),
                    )
                })?;
                Ok(0)
            }
            Statement::Refresh { name, concurrently } => {
                let view_key = self
                    .resolve(&state.objects, &name)
                    .ok_or_else(|| undefined_table(&name))?;
                let has_unique_index = state
                    .objects
                    .indexes
                    .values()
                    .any(|index| index.table == view_key && index.unique);
                let relation = state
                    .objects
                    .relations
                    .get_mut(&view_key)
                    .ok_or_else(|| undefined_table(&name))?;
                if relation.kind != RelationKind::MaterializedView {
                    return Err(PgViewsError::database(
                        "42809",
                        format!("\"{}\" is not a materialized view", name),
                    ));
                }
                if concurrently && !relation.populated {
                    return Err(PgViewsError::database(
                        "0A000",
                        "CONCURRENTLY cannot be used when the materialized view is not populated",
                    ));
                }
                if concurrently && !has_unique_index {
                    return Err(PgViewsError::database(
                        "55000",
                        format!("cannot refresh materialized view \"{}\" concurrently", name),
                    ));
                }
                relation.populated = true;
                state.refreshes.push(Refresh {
                    view: view_key,
                    concurrently,
                });
                Ok(0)
            }
        }
    }

    /// Output columns and source relations of a query
    fn analyse(&self, objects: &Objects, query: &str) -> Result<(Vec<String>, Vec<String>)> {
        let shape = sql::parse_select(query).ok_or_else(|| {
            PgViewsError::database("42601", format!("syntax error in query {:?}", query))
        })?;

        let mut sources = Vec::new();
        for source in &shape.sources {
            let source_key = self
                .resolve(objects, source)
                .ok_or_else(|| undefined_table(source))?;
            sources.push(source_key);
        }

        let mut columns: Vec<String> = Vec::new();
        for item in shape.items {
            match item {
                SelectItem::Column(name) => columns.push(name),
                SelectItem::Star(prefix) => {
                    let relations: Vec<&Relation> = sources
                        .iter()
                        .filter_map(|source_key| objects.relations.get(source_key))
                        .collect();
                    // An unknown prefix is a table alias; expand every source
                    let named: Vec<&&Relation> = relations
                        .iter()
                        .filter(|r| prefix.as_deref() == Some(r.name.as_str()))
                        .collect();
                    if named.is_empty() {
                        for relation in &relations {
                            columns.extend(relation.columns.iter().cloned());
                        }
                    } else {
                        for relation in named {
                            columns.extend(relation.columns.iter().cloned());
                        }
                    }
                }
            }
        }

        let duplicate = {
            let mut seen = BTreeSet::new();
            columns.iter().find(|c| !seen.insert(c.as_str())).cloned()
        };
        if let Some(duplicate) = duplicate {
            return Err(PgViewsError::database(
                "42701",
                format!("column \"{}\" specified more than once", duplicate),
            ));
        }

        Ok((columns, sources))
    }

    fn default_schema(&self) -> &str {
        self.schema.as_deref().unwrap_or(DEFAULT_SCHEMA)
    }

    /// Where a new object with this name goes
    fn target(&self, name: &str, temporary: bool) -> (String, String) {
        match name.split_once('.') {
            Some((schema, name)) => (schema.to_string(), name.to_string()),
            None if temporary => (TEMP_SCHEMA.to_string(), name.to_string()),
            None => (self.default_schema().to_string(), name.to_string()),
        }
    }

    /// Key of an existing relation, searching temporary objects first
    fn resolve(&self, objects: &Objects, name: &str) -> Option<String> {
        let name = sql::unquote(name);
        let candidates = match name.split_once('.') {
            Some(_) => vec![name.clone()],
            None => vec![key(TEMP_SCHEMA, &name), key(self.default_schema(), &name)],
        };
        candidates
            .into_iter()
            .find(|candidate| objects.relations.contains_key(candidate))
    }
}

/// Identifiers longer than 63 bytes are cut silently, as the server does
fn server_identifier(name: &str) -> String {
    let mut cut = name.len().min(63);
    while !name.is_char_boundary(cut) {
        cut -= 1;
    }
    name[..cut].to_string()
}

fn key(schema: &str, name: &str) -> String {
    format!("{}.{}", schema, name)
}

fn check_failures(state: &State, sql: &str) -> Result<()> {
    match state.failures.iter().find(|(pattern, _)| sql.contains(pattern.as_str())) {
        Some((_, code)) => Err(PgViewsError::database(code.clone(), "injected failure")),
        None => Ok(()),
    }
}

fn already_exists(name: &str) -> PgViewsError {
    PgViewsError::database("42P07", format!("relation \"{}\" already exists", name))
}

fn undefined_table(name: &str) -> PgViewsError {
    PgViewsError::database("42P01", format!("relation \"{}\" does not exist", name))
}

/// `CREATE OR REPLACE VIEW` may only append columns
fn check_replacement(old: &[String], new: &[String]) -> Result<()> {
    if new.len() < old.len() {
        return Err(PgViewsError::database("42P16", "cannot drop columns from view"));
    }
    for (old_column, new_column) in old.iter().zip(new) {
        if old_column != new_column {
            return Err(PgViewsError::database(
                "42P16",
                format!(
                    "cannot change name of view column \"{}\" to \"{}\"",
                    old_column, new_column
                ),
            ));
        }
    }
    Ok(())
}

fn drop_relation(objects: &mut Objects, relation_key: &str, cascade: bool) -> Result<()> {
    let dependants: Vec<String> = objects
        .relations
        .iter()
        .filter(|(_, r)| r.depends_on.iter().any(|d| d == relation_key))
        .map(|(k, _)| k.clone())
        .collect();

    if !dependants.is_empty() && !cascade {
        return Err(PgViewsError::database(
            "2BP01",
            format!(
                "cannot drop {} because other objects depend on it",
                relation_key
            ),
        ));
    }

    for dependant in dependants {
        drop_relation(objects, &dependant, true)?;
    }

    objects.relations.remove(relation_key);
    objects.indexes.retain(|_, index| index.table != relation_key);
    Ok(())
}

fn catalog_rows(objects: &Objects, query: &CatalogQuery, params: &[Value]) -> Result<QueryResult> {
    let rows: Vec<BTreeMap<&str, Value>> = match query.relation.as_str() {
        "information_schema.views" => objects
            .relations
            .values()
            .filter(|r| r.kind == RelationKind::View && r.schema != TEMP_SCHEMA)
            .map(|r| {
                BTreeMap::from([
                    ("table_schema", Value::from(r.schema.as_str())),
                    ("table_name", Value::from(r.name.as_str())),
                ])
            })
            .collect(),
        "pg_matviews" => objects
            .relations
            .values()
            .filter(|r| r.kind == RelationKind::MaterializedView)
            .map(|r| {
                BTreeMap::from([
                    ("schemaname", Value::from(r.schema.as_str())),
                    ("matviewname", Value::from(r.name.as_str())),
                    ("definition", Value::from(r.definition.as_str())),
                    ("ispopulated", Value::Bool(r.populated)),
                ])
            })
            .collect(),
        _ => objects
            .indexes
            .values()
            .filter_map(|index| {
                let table = objects.relations.get(&index.table)?;
                Some(BTreeMap::from([
                    ("schemaname", Value::from(index.schema.as_str())),
                    ("tablename", Value::from(table.name.as_str())),
                    ("indexname", Value::from(index.name.as_str())),
                ]))
            })
            .collect(),
    };

    let param = |n: &usize| -> Result<&Value> {
        n.checked_sub(1).and_then(|i| params.get(i)).ok_or_else(|| {
            PgViewsError::database("08P01", format!("bind message is missing parameter ${}", n))
        })
    };

    let mut matching = Vec::new();
    'rows: for row in rows {
        for condition in &query.conditions {
            let keep = match condition {
                Condition::Eq(column, n) => row.get(column.as_str()) == Some(param(n)?),
                Condition::In(column, ns) => {
                    let mut found = false;
                    for n in ns {
                        found |= row.get(column.as_str()) == Some(param(n)?);
                    }
                    found
                }
            };
            if !keep {
                continue 'rows;
            }
        }
        matching.push(row);
    }

    match &query.projection {
        Projection::Count => Ok(QueryResult::from_rows(
            &["count"],
            vec![vec![Value::Int64(matching.len() as i64)]],
        )),
        Projection::Columns(columns) => {
            let names: Vec<&str> = columns.iter().map(String::as_str).collect();
            let rows = matching
                .iter()
                .map(|row| {
                    names
                        .iter()
                        .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
                        .collect()
                })
                .collect();
            Ok(QueryResult::from_rows(&names, rows))
        }
    }
}
