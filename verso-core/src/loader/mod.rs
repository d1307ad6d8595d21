//! Change log files.
//!
//! A change log is a TOML (`.toml`) or JSON (`.json`) document holding an
//! ordered `log` array. Each entry either includes another change log, whose
//! changesets are spliced in at that position, or declares a changeset:
//!
//! ```toml
//! [[log]]
//! include = "common/base.toml"
//!
//! [[log]]
//! id = "create-users"
//! author = "alice"
//!
//! [[log.changes]]
//! type = "create-table"
//! table = "USERS"
//! ```
//!
//! Paths inside a file (includes and file-sourced values) are relative to
//! that file's directory. File-sourced values are read while loading, so the
//! resulting model is self-contained.

mod xml;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::change::{
    Change, CreateIndexChange, CreateTableChange, DeleteChange, FindAndUpdateChange, IndexColumn,
    InsertChange, Options, QueryChange, ScriptChange, UpdateChange,
};
use crate::changelog::{ChangeLog, ChangeSet};
use crate::column::{ColumnValue, ValueSource};
use crate::error::{VersoError, VersoResult};
use crate::template;

pub use xml::to_json as xml_to_json;

/// Load a change log and every file it includes.
pub fn load(path: impl AsRef<Path>) -> VersoResult<ChangeLog> {
    ChangeLogLoader::new().load(path)
}

/// Loads change logs, resolving includes depth first.
#[derive(Debug, Default)]
pub struct ChangeLogLoader {
    log: ChangeLog,
    stack: Vec<PathBuf>,
}

impl ChangeLogLoader {
    /// Create a loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the change log at `path`.
    pub fn load(mut self, path: impl AsRef<Path>) -> VersoResult<ChangeLog> {
        let path = path.as_ref();
        self.load_file(path)?;
        if self.log.is_empty() {
            return Err(VersoError::configuration(format!(
                "No changesets found in '{}'",
                path.display()
            )));
        }
        debug!(changesets = self.log.len(), "Loaded change log");
        Ok(self.log)
    }

    fn load_file(&mut self, path: &Path) -> VersoResult<()> {
        let content = fs::read_to_string(path).map_err(|e| {
            VersoError::resource(format!("Failed to read change log '{}': {}", path.display(), e))
        })?;
        let canonical = fs::canonicalize(path)?;
        if self.stack.contains(&canonical) {
            return Err(VersoError::configuration(format!(
                "Circular include of '{}'",
                path.display()
            )));
        }

        let def = parse(path, &content).map_err(|e| in_file(path, e))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        debug!(file = %path.display(), entries = def.log.len(), "Reading change log");
        self.stack.push(canonical);
        for entry in def.log {
            match entry.into_kind().map_err(|e| in_file(path, e))? {
                Entry::Include(include) => self.load_file(&base.join(include))?,
                Entry::ChangeSet(declared) => {
                    let change_set = declared
                        .resolve(base, &file_name)
                        .and_then(|cs| cs.validate().map(|_| cs))
                        .map_err(|e| in_file(path, e))?;
                    self.log.push(change_set).map_err(|e| in_file(path, e))?;
                }
            }
        }
        self.stack.pop();
        Ok(())
    }
}

fn parse(path: &Path, content: &str) -> VersoResult<ChangeLogDef> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(content).map_err(|e| VersoError::configuration(e.to_string())),
        Some("json") => {
            serde_json::from_str(content).map_err(|e| VersoError::configuration(e.to_string()))
        }
        _ => Err(VersoError::configuration(
            "Unsupported change log format, expected a .toml or .json file",
        )),
    }
}

fn in_file(path: &Path, err: VersoError) -> VersoError {
    match err {
        VersoError::Configuration(msg) => {
            VersoError::Configuration(format!("{}: {}", path.display(), msg))
        }
        VersoError::Resource(msg) => VersoError::Resource(format!("{}: {}", path.display(), msg)),
        other => other,
    }
}

fn read(base: &Path, file: &str) -> VersoResult<String> {
    let path = base.join(file);
    fs::read_to_string(&path)
        .map_err(|e| VersoError::resource(format!("Failed to read '{}': {}", path.display(), e)))
}

fn read_json(base: &Path, file: &str) -> VersoResult<Value> {
    serde_json::from_str(&read(base, file)?)
        .map_err(|e| VersoError::configuration(format!("Invalid JSON in '{}': {}", file, e)))
}

fn read_object(base: &Path, file: &str) -> VersoResult<Map<String, Value>> {
    match read_json(base, file)? {
        Value::Object(map) => Ok(map),
        _ => Err(VersoError::configuration(format!(
            "'{}' must contain a JSON object",
            file
        ))),
    }
}

fn read_xml(base: &Path, file: &str) -> VersoResult<Map<String, Value>> {
    xml::to_json(&read(base, file)?)
        .map_err(|e| VersoError::configuration(format!("'{}': {}", file, e)))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChangeLogDef {
    #[serde(default)]
    log: Vec<EntryDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EntryDef {
    include: Option<String>,
    id: Option<String>,
    author: Option<String>,
    #[serde(default)]
    changes: Vec<ChangeDef>,
}

enum Entry {
    Include(String),
    ChangeSet(ChangeSetDef),
}

struct ChangeSetDef {
    id: String,
    author: String,
    changes: Vec<ChangeDef>,
}

impl EntryDef {
    fn into_kind(self) -> VersoResult<Entry> {
        match self.include {
            Some(include) => {
                if self.id.is_some() || self.author.is_some() || !self.changes.is_empty() {
                    return Err(VersoError::configuration(format!(
                        "Include of '{}' can not also declare a changeset",
                        include
                    )));
                }
                Ok(Entry::Include(include))
            }
            None => Ok(Entry::ChangeSet(ChangeSetDef {
                id: self.id.unwrap_or_default(),
                author: self.author.unwrap_or_default(),
                changes: self.changes,
            })),
        }
    }
}

impl ChangeSetDef {
    fn resolve(self, base: &Path, file_name: &str) -> VersoResult<ChangeSet> {
        let id = self.id;
        let changes = self
            .changes
            .into_iter()
            .map(|c| c.resolve(base))
            .collect::<VersoResult<Vec<_>>>()
            .map_err(|e| match e {
                VersoError::Configuration(msg) => {
                    VersoError::Configuration(format!("changeset '{}': {}", id, msg))
                }
                VersoError::Resource(msg) => {
                    VersoError::Resource(format!("changeset '{}': {}", id, msg))
                }
                other => other,
            })?;
        Ok(ChangeSet {
            id,
            author: self.author,
            source_file: file_name.to_string(),
            changes,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum ChangeDef {
    CreateTable(CreateTableDef),
    CreateIndex(CreateIndexDef),
    Insert(InsertDef),
    Update(UpdateDef),
    Delete(DeleteDef),
    Query(QueryDef),
    Script(ScriptDef),
    FindAndUpdate(FindAndUpdateDef),
}

impl ChangeDef {
    fn resolve(self, base: &Path) -> VersoResult<Change> {
        Ok(match self {
            Self::CreateTable(d) => Change::CreateTable(CreateTableChange {
                table: d.table,
                ignore_if_exists: d.ignore_if_exists,
                options: d.options,
            }),
            Self::CreateIndex(d) => Change::CreateIndex(CreateIndexChange {
                name: d.name,
                table: d.table,
                unique: d.unique,
                columns: d
                    .columns
                    .into_iter()
                    .map(|c| IndexColumn {
                        name: c.name,
                        ascending: c.ascending,
                        text: c.text,
                    })
                    .collect(),
                options: d.options,
            }),
            Self::Insert(d) => {
                let mut columns = resolve_columns(d.columns, base)?;
                if let Some(file) = d.columns_json {
                    columns.extend(literal_columns(read_object(base, &file)?));
                }
                Change::Insert(InsertChange {
                    table: d.table,
                    columns,
                })
            }
            Self::Update(d) => {
                let mut columns = resolve_columns(d.columns, base)?;
                if let Some(file) = d.columns_json {
                    columns.extend(literal_columns(read_object(base, &file)?));
                }
                if let Some(file) = d.columns_xml {
                    columns.extend(literal_columns(read_xml(base, &file)?));
                }
                Change::Update(UpdateChange {
                    table: d.table,
                    columns,
                    conditions: resolve_columns(d.conditions, base)?,
                    options: d.options,
                })
            }
            Self::Delete(d) => Change::Delete(DeleteChange {
                table: d.table,
                conditions: resolve_columns(d.conditions, base)?,
                options: d.options,
            }),
            Self::Query(d) => Change::Query(QueryChange {
                query: d.query,
                template: d.template,
            }),
            Self::Script(d) => {
                let script = match (d.script, d.file) {
                    (Some(script), None) => script,
                    (None, Some(file)) => read(base, &file)?,
                    _ => {
                        return Err(VersoError::configuration(
                            "A script change needs exactly one of 'script' or 'file'",
                        ));
                    }
                };
                Change::Script(ScriptChange { script })
            }
            Self::FindAndUpdate(d) => Change::FindAndUpdate(FindAndUpdateChange {
                find_query: d.find_query,
                update_template: d.update_template,
            }),
        })
    }
}

fn literal_columns(map: Map<String, Value>) -> impl Iterator<Item = ColumnValue> {
    map.into_iter().map(|(name, value)| ColumnValue::new(name, value))
}

fn resolve_columns(columns: Vec<ColumnDef>, base: &Path) -> VersoResult<Vec<ColumnValue>> {
    columns.into_iter().map(|c| c.resolve(base)).collect()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateTableDef {
    table: String,
    #[serde(default)]
    ignore_if_exists: bool,
    #[serde(default)]
    options: Options,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct IndexColumnDef {
    name: String,
    #[serde(default = "default_true")]
    ascending: bool,
    #[serde(default)]
    text: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateIndexDef {
    name: String,
    table: String,
    #[serde(default)]
    unique: bool,
    #[serde(default)]
    columns: Vec<IndexColumnDef>,
    #[serde(default)]
    options: Options,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct InsertDef {
    table: String,
    #[serde(default)]
    columns: Vec<ColumnDef>,
    columns_json: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateDef {
    table: String,
    #[serde(default)]
    columns: Vec<ColumnDef>,
    #[serde(default)]
    conditions: Vec<ColumnDef>,
    columns_json: Option<String>,
    columns_xml: Option<String>,
    #[serde(default)]
    options: Options,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeleteDef {
    table: String,
    #[serde(default)]
    conditions: Vec<ColumnDef>,
    #[serde(default)]
    options: Options,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct QueryDef {
    query: String,
    #[serde(default)]
    template: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScriptDef {
    script: Option<String>,
    file: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FindAndUpdateDef {
    find_query: String,
    update_template: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ColumnDef {
    name: String,
    value: Option<Value>,
    json: Option<String>,
    date: Option<String>,
    file: Option<String>,
    json_file: Option<String>,
    xml_file: Option<String>,
    template: Option<String>,
    query: Option<String>,
    path: Option<String>,
    #[serde(default)]
    multi_valued: bool,
}

impl ColumnDef {
    fn source_count(&self) -> usize {
        [
            self.value.is_some(),
            self.json.is_some(),
            self.date.is_some(),
            self.file.is_some(),
            self.json_file.is_some(),
            self.xml_file.is_some(),
            self.template.is_some(),
            self.query.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }

    fn resolve(self, base: &Path) -> VersoResult<ColumnValue> {
        if self.source_count() != 1 {
            return Err(VersoError::configuration(format!(
                "Column '{}' must have exactly one value source",
                self.name
            )));
        }
        if self.query.is_none() && (self.path.is_some() || self.multi_valued) {
            return Err(VersoError::configuration(format!(
                "Column '{}' sets 'path' without a 'query'",
                self.name
            )));
        }

        let name = self.name;
        let value = if let Some(value) = self.value {
            value
        } else if let Some(json) = self.json {
            serde_json::from_str(&json).map_err(|e| {
                VersoError::configuration(format!("Invalid JSON in column '{}': {}", name, e))
            })?
        } else if let Some(date) = self.date {
            let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|e| {
                VersoError::configuration(format!(
                    "Invalid date '{}' in column '{}', expected yyyy-mm-dd: {}",
                    date, name, e
                ))
            })?;
            serde_json::json!({ "$date": format!("{}T00:00:00Z", date.format("%Y-%m-%d")) })
        } else if let Some(file) = self.file {
            Value::String(read(base, &file)?)
        } else if let Some(file) = self.json_file {
            read_json(base, &file)?
        } else if let Some(file) = self.xml_file {
            Value::Object(read_xml(base, &file)?)
        } else if let Some(text) = self.template {
            let rendered = template::render(&text, &Value::Object(Map::new()))?;
            serde_json::from_str(&rendered).map_err(|e| {
                VersoError::configuration(format!(
                    "Template of column '{}' is not valid JSON: {}",
                    name, e
                ))
            })?
        } else if let Some(query) = self.query {
            return Ok(ColumnValue {
                name,
                value: ValueSource::Query {
                    query,
                    path: self.path,
                    multi_valued: self.multi_valued,
                },
            });
        } else {
            Value::Null
        };

        Ok(ColumnValue::new(name, value))
    }
}
