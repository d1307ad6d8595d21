//! Column/value pairs carried by insert, update and delete changes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where a column's value comes from.
///
/// File, JSON and template sources are resolved while the change log is
/// loaded, so by the time a changeset executes only two shapes remain: a
/// literal value, or a sub-query that has to run against the live store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    /// A value known at load time.
    Literal(Value),
    /// A command evaluated against the target store at execution time.
    Query {
        /// Raw command text.
        query: String,
        /// `/`-separated path selecting part of the command result.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        /// Collect every match of `path` instead of the first one.
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        multi_valued: bool,
    },
}

/// A named column value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnValue {
    /// Column (or document field) name.
    pub name: String,
    /// Value source.
    pub value: ValueSource,
}

impl ColumnValue {
    /// Create a column with a literal value.
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: ValueSource::Literal(value.into()),
        }
    }

    /// Create a column whose value is computed by a sub-query.
    pub fn query(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: ValueSource::Query {
                query: query.into(),
                path: None,
                multi_valued: false,
            },
        }
    }

    /// Set the result path of a sub-query column.
    pub fn with_path(mut self, selector: impl Into<String>, multi: bool) -> Self {
        if let ValueSource::Query {
            path, multi_valued, ..
        } = &mut self.value
        {
            *path = Some(selector.into());
            *multi_valued = multi;
        }
        self
    }

    /// The literal value, if this column has one.
    pub fn literal(&self) -> Option<&Value> {
        match &self.value {
            ValueSource::Literal(v) => Some(v),
            ValueSource::Query { .. } => None,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Column name can not be empty".to_string());
        }
        match &self.value {
            ValueSource::Query { query, .. } if query.trim().is_empty() => Err(format!(
                "Value query of column '{}' is empty",
                self.name
            )),
            _ => Ok(()),
        }
    }
}
