//! Declared view definitions
//!
//! A `ViewDefinition` is a plain description of a view: where it lives, the
//! query it runs, what it depends on and how it is indexed. Definitions are
//! built once at startup and never change while views are being synced.

use pgviews_core::Value;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use crate::statements;
use crate::{Result, ViewError};

/// `<namespace>.<source>.<field|*>`
static FIELD_SPEC_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\.([A-Za-z_][A-Za-z0-9_]*)\.(\*|[A-Za-z_][A-Za-z0-9_]*)$")
        .expect("valid regex")
});

/// Whether a view is a plain view or a materialized view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    #[default]
    Plain,
    Materialized,
}

/// Whether rows may be written through the view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ViewAccess {
    #[default]
    ReadWrite,
    ReadOnly,
}

/// A relation name with an optional schema
///
/// # Examples
///
/// ```
/// use pgviews_objects::QualifiedName;
///
/// let name = QualifiedName::parse("reports.monthly_sales");
/// assert_eq!(name.schema(), Some("reports"));
/// assert_eq!(name.name(), "monthly_sales");
/// assert_eq!(name.resolve(Some("public")), (Some("reports"), "monthly_sales"));
///
/// let bare = QualifiedName::parse("monthly_sales");
/// assert_eq!(bare.resolve(Some("tenant_a")), (Some("tenant_a"), "monthly_sales"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct QualifiedName {
    schema: Option<String>,
    name: String,
}

impl QualifiedName {
    /// A name without an explicit schema
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    /// A schema-qualified name
    pub fn with_schema(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }

    /// Split `schema.name` on the first dot; anything without a dot has no schema.
    pub fn parse(value: &str) -> Self {
        match value.split_once('.') {
            Some((schema, name)) => Self::with_schema(schema, name),
            None => Self::new(value),
        }
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The schema and name used for catalog lookups.
    ///
    /// An explicit schema wins; otherwise `default_schema` (normally the
    /// connection's configured schema) is used. `None` means the lookup must
    /// not filter on schema.
    pub fn resolve<'a>(&'a self, default_schema: Option<&'a str>) -> (Option<&'a str>, &'a str) {
        (self.schema.as_deref().or(default_schema), &self.name)
    }

    /// Another relation in the same schema
    pub fn sibling(&self, name: impl Into<String>) -> Self {
        Self {
            schema: self.schema.clone(),
            name: name.into(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

impl From<String> for QualifiedName {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<&str> for QualifiedName {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<QualifiedName> for String {
    fn from(value: QualifiedName) -> Self {
        value.to_string()
    }
}

/// A parameterised view query
///
/// Placeholders are written `$1`, `$2`, ... and are rendered as SQL literals
/// before the query is embedded into DDL, since `CREATE VIEW` cannot take
/// server-side bind parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSql {
    query: String,
    params: Vec<Value>,
}

impl ViewSql {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(mut self, params: Vec<Value>) -> Self {
        self.params = params;
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// The query ready to embed in DDL: trimmed, without a trailing
    /// semicolon, with parameters rendered as literals.
    pub fn render(&self, view: &str) -> Result<String> {
        let query = self.query.trim();
        let query = query.strip_suffix(';').unwrap_or(query).trim_end();
        statements::bind_literals(query, &self.params).map_err(|index| {
            ViewError::MissingParameter {
                view: view.to_string(),
                index,
                provided: self.params.len(),
            }
        })
    }
}

impl From<&str> for ViewSql {
    fn from(query: &str) -> Self {
        Self::new(query)
    }
}

/// A secondary index declared on a materialized view
///
/// Columns prefixed with `-` are indexed in descending order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

impl IndexSpec {
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Which fields of a source relation a projection copies
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProjectedField {
    All,
    Named(String),
}

/// A `<namespace>.<source>.<field|*>` projection specifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Projection {
    pub namespace: String,
    pub source: String,
    pub field: ProjectedField,
}

impl Projection {
    /// Parse a specifier, returning `None` when it does not match
    /// `<namespace>.<source>.<field|*>`.
    pub fn parse(spec: &str) -> Option<Self> {
        let captures = FIELD_SPEC_REGEX.captures(spec)?;
        let field = match &captures[3] {
            "*" => ProjectedField::All,
            name => ProjectedField::Named(name.to_string()),
        };
        Some(Self {
            namespace: captures[1].to_string(),
            source: captures[2].to_string(),
            field,
        })
    }

    /// Registry key of the source this projection waits for
    pub fn source_key(&self) -> String {
        source_key(&self.namespace, &self.source)
    }
}

pub(crate) fn source_key(namespace: &str, source: &str) -> String {
    format!("{}.{}", namespace, source.to_lowercase())
}

/// A declared view
///
/// # Examples
///
/// ```
/// use pgviews_objects::{IndexSpec, ViewDefinition};
///
/// let view = ViewDefinition::materialized("reports", "MonthlySales")
///     .with_table("reports.monthly_sales")
///     .with_sql("SELECT id, month, total FROM sales_summary")
///     .with_dependency("reports.SalesSummary")
///     .with_concurrent_index("id, month")
///     .with_index(IndexSpec::new("monthly_sales_month", &["-month"]));
///
/// assert_eq!(view.label(), "reports.MonthlySales");
/// assert_eq!(
///     view.concurrent_index_name().as_deref(),
///     Some("reports_monthly_sales_id_month_index")
/// );
/// assert!(view.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct ViewDefinition {
    namespace: String,
    name: String,
    table: QualifiedName,
    sql: Option<ViewSql>,
    kind: ViewKind,
    access: ViewAccess,
    dependencies: Vec<String>,
    concurrent_index: Option<String>,
    with_data: bool,
    indexes: Vec<IndexSpec>,
    fields: Vec<String>,
    projection_specs: Vec<String>,
}

impl ViewDefinition {
    /// Declare a plain view. The table defaults to `<namespace>_<name>` in
    /// lower case.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let name = name.into();
        let table = QualifiedName::new(format!("{}_{}", namespace, name).to_lowercase());
        Self {
            namespace,
            name,
            table,
            sql: None,
            kind: ViewKind::Plain,
            access: ViewAccess::ReadWrite,
            dependencies: Vec::new(),
            concurrent_index: None,
            with_data: true,
            indexes: Vec::new(),
            fields: Vec::new(),
            projection_specs: Vec::new(),
        }
    }

    /// Declare a materialized view
    pub fn materialized(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(namespace, name).with_kind(ViewKind::Materialized)
    }

    pub fn with_kind(mut self, kind: ViewKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.access = ViewAccess::ReadOnly;
        self
    }

    pub fn with_access(mut self, access: ViewAccess) -> Self {
        self.access = access;
        self
    }

    /// Set the database relation, `schema.name` or just `name`
    pub fn with_table(mut self, table: impl Into<QualifiedName>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_sql(mut self, sql: impl Into<ViewSql>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    /// Add a dependency on another declared view, by label
    pub fn with_dependency(mut self, label: impl Into<String>) -> Self {
        self.dependencies.push(label.into());
        self
    }

    /// Comma separated columns of the unique index that enables
    /// `REFRESH MATERIALIZED VIEW CONCURRENTLY`
    pub fn with_concurrent_index(mut self, columns: impl Into<String>) -> Self {
        self.concurrent_index = Some(columns.into());
        self
    }

    /// Whether a materialized view is populated when it is created
    pub fn with_data(mut self, with_data: bool) -> Self {
        self.with_data = with_data;
        self
    }

    pub fn with_index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.fields.push(field.into());
        self
    }

    /// Copy one field (or `*` for all) from another relation once it is
    /// available, e.g. `"sales.Customer.name"`
    pub fn with_projection(mut self, spec: impl Into<String>) -> Self {
        self.projection_specs.push(spec.into());
        self
    }

    /// Check the definition is internally consistent
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() || self.namespace.trim().is_empty() {
            return Err(ViewError::EmptyName);
        }
        if self.concurrent_index.is_some() && self.kind != ViewKind::Materialized {
            return Err(ViewError::ConcurrentIndexOnPlainView(self.label()));
        }
        self.projections()?;
        Ok(())
    }

    /// `<namespace>.<name>`, the identity dependencies refer to
    pub fn label(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &QualifiedName {
        &self.table
    }

    pub fn sql(&self) -> Option<&ViewSql> {
        self.sql.as_ref()
    }

    /// The query ready to embed in DDL
    pub fn rendered_sql(&self) -> Result<String> {
        let sql = self
            .sql
            .as_ref()
            .ok_or_else(|| ViewError::MissingSql(self.label()))?;
        sql.render(&self.label())
    }

    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    pub fn is_materialized(&self) -> bool {
        self.kind == ViewKind::Materialized
    }

    pub fn access(&self) -> ViewAccess {
        self.access
    }

    pub fn is_read_only(&self) -> bool {
        self.access == ViewAccess::ReadOnly
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn concurrent_index(&self) -> Option<&str> {
        self.concurrent_index.as_deref()
    }

    /// Name of the unique index backing concurrent refresh
    pub fn concurrent_index_name(&self) -> Option<String> {
        self.concurrent_index
            .as_deref()
            .map(|columns| statements::concurrent_index_name(&self.table.to_string(), columns))
    }

    pub fn with_data_enabled(&self) -> bool {
        self.with_data
    }

    pub fn indexes(&self) -> &[IndexSpec] {
        &self.indexes
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Parsed projection specifiers
    pub fn projections(&self) -> Result<Vec<Projection>> {
        self.projection_specs
            .iter()
            .map(|spec| {
                Projection::parse(spec).ok_or_else(|| ViewError::InvalidProjection {
                    view: self.label(),
                    spec: spec.clone(),
                })
            })
            .collect()
    }

    /// Add a projected field unless the view already declares one with that name.
    pub(crate) fn add_projected_field(&mut self, field: &str) -> bool {
        if self.fields.iter().any(|existing| existing == field) {
            return false;
        }
        self.fields.push(field.to_string());
        true
    }
}
