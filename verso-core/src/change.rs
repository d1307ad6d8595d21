//! Typed change operations.
//!
//! Every operation a changeset can carry is a variant of [`Change`]. The
//! executor matches on the variant to pick the versioner method, so adding an
//! operation means adding a variant and handling it everywhere the compiler
//! asks for it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::column::ColumnValue;

/// Free-form backend specific options attached to a change.
pub type Options = BTreeMap<String, Value>;

/// A single change operation inside a changeset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Change {
    /// Create a table or collection.
    CreateTable(CreateTableChange),
    /// Create an index.
    CreateIndex(CreateIndexChange),
    /// Insert one record.
    Insert(InsertChange),
    /// Update matching records.
    Update(UpdateChange),
    /// Delete matching records.
    Delete(DeleteChange),
    /// Run a raw query or command.
    Query(QueryChange),
    /// Run a raw script.
    Script(ScriptChange),
    /// Run a finder and an update per matched record.
    FindAndUpdate(FindAndUpdateChange),
}

impl Change {
    /// Short name of the operation, as written in change log files.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateTable(_) => "create-table",
            Self::CreateIndex(_) => "create-index",
            Self::Insert(_) => "insert",
            Self::Update(_) => "update",
            Self::Delete(_) => "delete",
            Self::Query(_) => "query",
            Self::Script(_) => "script",
            Self::FindAndUpdate(_) => "find-and-update",
        }
    }

    /// Check the operation is complete enough to be executed.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::CreateTable(c) => c.validate(),
            Self::CreateIndex(c) => c.validate(),
            Self::Insert(c) => c.validate(),
            Self::Update(c) => c.validate(),
            Self::Delete(c) => c.validate(),
            Self::Query(c) => c.validate(),
            Self::Script(c) => c.validate(),
            Self::FindAndUpdate(c) => c.validate(),
        }
    }
}

fn require(value: &str, what: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{} can not be empty", what))
    } else {
        Ok(())
    }
}

fn validate_columns(columns: &[ColumnValue]) -> Result<(), String> {
    columns.iter().try_for_each(ColumnValue::validate)
}

/// Creates a table or collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTableChange {
    /// Table name.
    pub table: String,
    /// Treat "already exists" as success.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ignore_if_exists: bool,
    /// Backend options.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: Options,
}

impl CreateTableChange {
    /// Create a change for the given table.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ignore_if_exists: false,
            options: Options::new(),
        }
    }

    fn validate(&self) -> Result<(), String> {
        require(&self.table, "Table name")
    }
}

/// One column of an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexColumn {
    /// Column name.
    pub name: String,
    /// Ascending (`true`) or descending order.
    pub ascending: bool,
    /// Build a text index on this column.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub text: bool,
}

impl IndexColumn {
    /// An ascending column.
    pub fn ascending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ascending: true,
            text: false,
        }
    }

    /// A descending column.
    pub fn descending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ascending: false,
            text: false,
        }
    }

    /// A text-indexed column.
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ascending: true,
            text: true,
        }
    }
}

/// Creates an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateIndexChange {
    /// Index name.
    pub name: String,
    /// Table the index belongs to.
    pub table: String,
    /// Whether the index enforces uniqueness.
    pub unique: bool,
    /// Indexed columns, in order.
    pub columns: Vec<IndexColumn>,
    /// Backend options.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: Options,
}

impl CreateIndexChange {
    /// Create an index over a single ascending column.
    pub fn new(
        name: impl Into<String>,
        table: impl Into<String>,
        unique: bool,
        column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            unique,
            columns: vec![IndexColumn::ascending(column)],
            options: Options::new(),
        }
    }

    fn validate(&self) -> Result<(), String> {
        require(&self.name, "Index name")?;
        require(&self.table, "Table name")?;
        if self.columns.is_empty() {
            return Err("No index columns specified".to_string());
        }
        self.columns
            .iter()
            .try_for_each(|c| require(&c.name, "Index-column name"))
    }
}

/// Inserts one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertChange {
    /// Target table.
    pub table: String,
    /// Column values of the new record.
    pub columns: Vec<ColumnValue>,
}

impl InsertChange {
    /// Create an insert with a single literal column.
    pub fn new(table: impl Into<String>, column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            table: table.into(),
            columns: vec![ColumnValue::new(column, value)],
        }
    }

    /// Append a column.
    pub fn column(mut self, column: ColumnValue) -> Self {
        self.columns.push(column);
        self
    }

    fn validate(&self) -> Result<(), String> {
        require(&self.table, "Table name")?;
        if self.columns.is_empty() {
            return Err("Column values can not be empty".to_string());
        }
        validate_columns(&self.columns)
    }
}

/// Updates every record matching the conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateChange {
    /// Target table.
    pub table: String,
    /// Values to set.
    pub columns: Vec<ColumnValue>,
    /// Equality conditions, all of which must match.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<ColumnValue>,
    /// Backend options.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: Options,
}

impl UpdateChange {
    /// Create an update without conditions.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            conditions: Vec::new(),
            options: Options::new(),
        }
    }

    /// Append a value to set.
    pub fn set(mut self, column: ColumnValue) -> Self {
        self.columns.push(column);
        self
    }

    /// Append a condition.
    pub fn condition(mut self, condition: ColumnValue) -> Self {
        self.conditions.push(condition);
        self
    }

    fn validate(&self) -> Result<(), String> {
        require(&self.table, "Table name")?;
        if self.columns.is_empty() {
            return Err("No column-values specified for update".to_string());
        }
        validate_columns(&self.columns)?;
        validate_columns(&self.conditions)
    }
}

/// Deletes every record matching the conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteChange {
    /// Target table.
    pub table: String,
    /// Equality conditions, all of which must match.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<ColumnValue>,
    /// Backend options.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: Options,
}

impl DeleteChange {
    /// Create a delete with a single literal condition.
    pub fn new(table: impl Into<String>, column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            table: table.into(),
            conditions: vec![ColumnValue::new(column, value)],
            options: Options::new(),
        }
    }

    fn validate(&self) -> Result<(), String> {
        require(&self.table, "Table name")?;
        validate_columns(&self.conditions)
    }
}

/// Runs a raw query or command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryChange {
    /// Query text.
    pub query: String,
    /// Render `${...}` placeholders before running.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub template: bool,
}

impl QueryChange {
    /// Create a plain query.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            template: false,
        }
    }

    fn validate(&self) -> Result<(), String> {
        require(&self.query, "Query")
    }
}

/// Runs a raw script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptChange {
    /// Script text.
    pub script: String,
}

impl ScriptChange {
    /// Create a script change.
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
        }
    }

    fn validate(&self) -> Result<(), String> {
        require(&self.script, "Script")
    }
}

/// Runs a finder query, then an update rendered from each matched record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindAndUpdateChange {
    /// Finder command text.
    pub find_query: String,
    /// Update command template, rendered once per record.
    pub update_template: String,
}

impl FindAndUpdateChange {
    /// Create a find-and-update change.
    pub fn new(find_query: impl Into<String>, update_template: impl Into<String>) -> Self {
        Self {
            find_query: find_query.into(),
            update_template: update_template.into(),
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.find_query.trim().is_empty() {
            return Err("No finder query specified".to_string());
        }
        if self.update_template.trim().is_empty() {
            return Err("No update query template specified".to_string());
        }
        Ok(())
    }
}
