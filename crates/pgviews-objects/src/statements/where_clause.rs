//! WHERE clause builder for catalog lookups

use pgviews_core::Value;

/// Conjunction of `column = $n` / `column IN ($n, ..)` conditions.
///
/// Conditions whose value is absent are left out entirely, so a lookup with
/// no known schema does not filter on schema at all.
///
/// # Examples
///
/// ```
/// use pgviews_objects::statements::WhereClause;
///
/// let clause = WhereClause::new()
///     .eq("schemaname", None)
///     .eq("matviewname", Some("sales"));
/// assert_eq!(clause.sql(), "matviewname = $1");
/// assert_eq!(clause.params().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct WhereClause {
    conditions: Vec<String>,
    params: Vec<Value>,
}

impl WhereClause {
    pub fn new() -> Self {
        Self::default()
    }

    /// `column = value`, skipped when `value` is `None`
    pub fn eq(mut self, column: &str, value: Option<&str>) -> Self {
        if let Some(value) = value {
            self.params.push(Value::from(value));
            self.conditions
                .push(format!("{} = ${}", column, self.params.len()));
        }
        self
    }

    /// `column IN (values..)`, skipped when `values` is empty
    pub fn any_of(mut self, column: &str, values: &[&str]) -> Self {
        if values.is_empty() {
            return self;
        }
        let placeholders: Vec<String> = values
            .iter()
            .map(|value| {
                self.params.push(Value::from(*value));
                format!("${}", self.params.len())
            })
            .collect();
        self.conditions
            .push(format!("{} IN ({})", column, placeholders.join(", ")));
        self
    }

    /// The condition text; `TRUE` when nothing was added
    pub fn sql(&self) -> String {
        if self.conditions.is_empty() {
            "TRUE".to_string()
        } else {
            self.conditions.join(" AND ")
        }
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }
}
