//! Views declared in the settings file

use pgviews_core::Value;
use pgviews_objects::{IndexSpec, ViewDefinition, ViewError, ViewKind, ViewSql};
use serde::{Deserialize, Serialize};

/// A `[[views.indexes]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSettings {
    pub name: String,
    /// Columns in order; a leading `-` sorts descending
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

/// A `[[views]]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewSettings {
    pub namespace: String,
    pub name: String,
    /// `schema.name` or `name`; defaults to `<namespace>_<name>`
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub sql: Option<String>,
    /// Values for `$1`, `$2`, ... in `sql`
    #[serde(default)]
    pub params: Vec<toml::Value>,
    #[serde(default)]
    pub materialized: bool,
    #[serde(default)]
    pub read_only: bool,
    /// Labels (`namespace.name`) of views this one reads from
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub concurrent_index: Option<String>,
    #[serde(default = "default_with_data")]
    pub with_data: bool,
    #[serde(default)]
    pub indexes: Vec<IndexSettings>,
    #[serde(default)]
    pub fields: Vec<String>,
    /// `namespace.source.field` or `namespace.source.*`
    #[serde(default)]
    pub projection: Vec<String>,
}

fn default_with_data() -> bool {
    true
}

impl ViewSettings {
    pub fn label(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    pub fn to_definition(&self) -> Result<ViewDefinition, ViewError> {
        let kind = if self.materialized {
            ViewKind::Materialized
        } else {
            ViewKind::Plain
        };
        let mut view = ViewDefinition::new(&self.namespace, &self.name)
            .with_kind(kind)
            .with_data(self.with_data);

        if let Some(table) = &self.table {
            view = view.with_table(table.as_str());
        }
        if let Some(sql) = &self.sql {
            let params = self.params.iter().map(param_value).collect();
            view = view.with_sql(ViewSql::new(sql.as_str()).with_params(params));
        }
        if self.read_only {
            view = view.read_only();
        }
        if let Some(columns) = &self.concurrent_index {
            view = view.with_concurrent_index(columns.as_str());
        }
        for dependency in &self.dependencies {
            view = view.with_dependency(dependency.as_str());
        }
        for index in &self.indexes {
            let columns: Vec<&str> = index.columns.iter().map(String::as_str).collect();
            let mut spec = IndexSpec::new(&index.name, &columns);
            if index.unique {
                spec = spec.unique();
            }
            view = view.with_index(spec);
        }
        for field in &self.fields {
            view = view.with_field(field.as_str());
        }
        for spec in &self.projection {
            view = view.with_projection(spec.as_str());
        }

        view.validate()?;
        Ok(view)
    }
}

fn param_value(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s.clone()),
        toml::Value::Integer(i) => Value::Int64(*i),
        toml::Value::Float(f) => Value::Float64(*f),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.iter().map(param_value).collect()),
        toml::Value::Table(table) => serde_json::to_value(table)
            .map(Value::Json)
            .unwrap_or(Value::Null),
    }
}
