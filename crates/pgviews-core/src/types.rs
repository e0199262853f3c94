//! Core value and result types

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A database value that can represent the SQL types pgviews deals with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// NULL value
    Null,
    /// Boolean
    Bool(bool),
    /// 16-bit signed integer
    Int16(i16),
    /// 32-bit signed integer
    Int32(i32),
    /// 64-bit signed integer
    Int64(i64),
    /// 64-bit floating point
    Float64(f64),
    /// Decimal/Numeric (stored as string for precision)
    Decimal(String),
    /// UTF-8 string
    String(String),
    /// Binary data
    Bytes(Vec<u8>),
    /// UUID
    Uuid(Uuid),
    /// Date (year, month, day)
    Date(NaiveDate),
    /// DateTime without timezone
    DateTime(NaiveDateTime),
    /// DateTime with timezone (UTC)
    DateTimeUtc(DateTime<Utc>),
    /// JSON value
    Json(serde_json::Value),
    /// Array of values
    Array(Vec<Value>),
}

impl Value {
    /// Check if the value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int16(v) => Some(*v as i64),
            Value::Int32(v) => Some(*v as i64),
            Value::Int64(v) => Some(*v),
            Value::String(s) => s.parse::<i64>().ok(),
            _ => None,
        }
    }

    /// Try to get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Render the value as a PostgreSQL literal, escaping quotes.
    ///
    /// Used where the server cannot take bind parameters, such as the body of
    /// a `CREATE VIEW` statement.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(v) => if *v { "TRUE" } else { "FALSE" }.to_string(),
            Value::Int16(v) => v.to_string(),
            Value::Int32(v) => v.to_string(),
            Value::Int64(v) => v.to_string(),
            Value::Float64(v) if v.is_nan() => "'NaN'::float8".to_string(),
            Value::Float64(v) if v.is_infinite() => {
                let sign = if v.is_sign_negative() { "-" } else { "" };
                format!("'{}Infinity'::float8", sign)
            }
            Value::Float64(v) => v.to_string(),
            Value::Decimal(v) => v.to_string(),
            Value::String(v) => format!("'{}'", v.replace('\'', "''")),
            Value::Bytes(v) => {
                let hex: String = v.iter().map(|b| format!("{:02x}", b)).collect();
                format!("'\\x{}'::bytea", hex)
            }
            Value::Uuid(v) => format!("'{}'::uuid", v),
            Value::Date(v) => format!("'{}'::date", v),
            Value::DateTime(v) => format!("'{}'::timestamp", v),
            Value::DateTimeUtc(v) => format!("'{}'::timestamptz", v.to_rfc3339()),
            Value::Json(v) => format!("'{}'::jsonb", v.to_string().replace('\'', "''")),
            Value::Array(arr) => {
                let values: Vec<String> = arr.iter().map(Value::to_sql_literal).collect();
                format!("ARRAY[{}]", values.join(", "))
            }
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int16(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::Uuid(v) => write!(f, "{}", v),
            Value::Date(v) => write!(f, "{}", v),
            Value::DateTime(v) => write!(f, "{}", v),
            Value::DateTimeUtc(v) => write!(f, "{}", v),
            Value::Json(v) => write!(f, "{}", v),
            Value::Array(v) => write!(f, "[{} items]", v.len()),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int64(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

/// A row from a query result
#[derive(Debug, Clone)]
pub struct Row {
    /// Column values
    pub values: Vec<Value>,
    columns: Vec<String>,
}

impl Row {
    /// Create a new row
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self { values, columns }
    }

    /// Get a value by column index
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get a value by column name
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Get column names
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

/// Column metadata
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ColumnMeta {
    /// Column name
    #[serde(default)]
    pub name: String,
    /// Data type (database-specific string)
    #[serde(default)]
    pub data_type: String,
    /// Column ordinal position (0-based)
    #[serde(default)]
    pub ordinal: usize,
}

/// Query result
#[derive(Debug, Clone)]
pub struct QueryResult {
    /// Unique query ID
    pub id: Uuid,
    /// Column metadata
    pub columns: Vec<ColumnMeta>,
    /// Result rows
    pub rows: Vec<Row>,
    /// Rows affected (for DML statements)
    pub affected_rows: u64,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Create a new empty query result
    pub fn empty() -> Self {
        Self {
            id: Uuid::new_v4(),
            columns: Vec::new(),
            rows: Vec::new(),
            affected_rows: 0,
            execution_time_ms: 0,
        }
    }

    /// Build a result from column names and rows of values
    pub fn from_rows(columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        let names: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        Self {
            id: Uuid::new_v4(),
            columns: names
                .iter()
                .enumerate()
                .map(|(ordinal, name)| ColumnMeta {
                    name: name.clone(),
                    data_type: String::new(),
                    ordinal,
                })
                .collect(),
            rows: rows
                .into_iter()
                .map(|values| Row::new(names.clone(), values))
                .collect(),
            affected_rows: 0,
            execution_time_ms: 0,
        }
    }

    /// Check if the result has rows
    pub fn has_rows(&self) -> bool {
        !self.rows.is_empty()
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// The first column of the first row, if any
    pub fn scalar(&self) -> Option<&Value> {
        self.rows.first().and_then(|row| row.get(0))
    }

    /// The first column of every row
    pub fn first_column(&self) -> impl Iterator<Item = &Value> {
        self.rows.iter().filter_map(|row| row.get(0))
    }
}

/// Result of executing a statement that does not return rows
#[derive(Debug, Clone)]
pub struct StatementResult {
    /// Rows affected
    pub affected_rows: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_string_literal_escapes_quotes() {
        assert_eq!(Value::from("o'brien").to_sql_literal(), "'o''brien'");
    }

    #[test]
    fn test_scalar_literals() {
        assert_eq!(Value::Null.to_sql_literal(), "NULL");
        assert_eq!(Value::Bool(true).to_sql_literal(), "TRUE");
        assert_eq!(Value::Int32(7).to_sql_literal(), "7");
        assert_eq!(
            Value::Array(vec![Value::Int64(1), Value::from("a")]).to_sql_literal(),
            "ARRAY[1, 'a']"
        );
    }

    #[test]
    fn test_non_finite_floats_are_typed_literals() {
        assert_eq!(Value::Float64(f64::NAN).to_sql_literal(), "'NaN'::float8");
        assert_eq!(Value::Float64(f64::INFINITY).to_sql_literal(), "'Infinity'::float8");
        assert_eq!(
            Value::Float64(f64::NEG_INFINITY).to_sql_literal(),
            "'-Infinity'::float8"
        );
        assert_eq!(Value::Float64(1.5).to_sql_literal(), "1.5");
    }

    #[test]
    fn test_query_result_scalar() {
        let result = QueryResult::from_rows(&["count"], vec![vec![Value::Int64(3)]]);
        assert_eq!(result.scalar().and_then(Value::as_i64), Some(3));
        assert_eq!(result.rows[0].get_by_name("count"), Some(&Value::Int64(3)));

        assert!(QueryResult::empty().scalar().is_none());
    }

    #[test]
    fn test_first_column() {
        let result = QueryResult::from_rows(
            &["indexname"],
            vec![vec![Value::from("a")], vec![Value::from("b")]],
        );
        let names: Vec<&str> = result.first_column().filter_map(Value::as_str).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
