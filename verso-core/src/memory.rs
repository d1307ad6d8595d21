//! In-memory versioner.
//!
//! Tables are ordered lists of JSON rows. Unique indexes are enforced on
//! insert, updates and deletes match rows by field equality, and queries and
//! scripts understand a small set of document commands:
//!
//! - `{"find": table, "filter": {..}}`
//! - `{"insert": table, "documents": [..]}`
//! - `{"update": table, "updates": [{"q": {..}, "u": {"$set": {..}}}]}`
//! - `{"delete": table, "deletes": [{"q": {..}}]}`
//! - `{"ping": 1}`
//!
//! Text that is not a JSON document and commands outside this list fail the
//! change, the same way the server rejects them. The versioner is a cheap
//! handle over shared state, so a clone kept by a test can inspect the store
//! after the executor has closed it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::change::{
    CreateIndexChange, CreateTableChange, DeleteChange, FindAndUpdateChange, InsertChange,
    QueryChange, ScriptChange, UpdateChange,
};
use crate::column::{ColumnValue, ValueSource};
use crate::history::{self, LOCK_NAME, LOCK_TABLE, LOCK_VALUE};
use crate::path;
use crate::template;
use crate::versioner::{ConnectionArgs, SchemaVersioner, VersionerError, VersionerResult};

type Row = Map<String, Value>;

/// A failure injected into a [`MemoryVersioner`] operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    operation: &'static str,
    table: Option<String>,
    message: String,
}

impl Fault {
    /// Fail `operation` on every table.
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            table: None,
            message: message.into(),
        }
    }

    /// Restrict the fault to one table.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Fail `init`.
    pub fn on_init(message: impl Into<String>) -> Self {
        Self::new("init", message)
    }

    /// Fail inserts into `table`.
    pub fn on_insert(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new("insert", message).table(table)
    }

    /// Fail deletes from `table`.
    pub fn on_delete(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new("delete", message).table(table)
    }

    /// Fail `close`.
    pub fn on_close(message: impl Into<String>) -> Self {
        Self::new("close", message)
    }

    fn applies(&self, operation: &str, table: Option<&str>) -> bool {
        self.operation == operation
            && match (&self.table, table) {
                (None, _) => true,
                (Some(expected), Some(actual)) => expected == actual,
                (Some(_), None) => false,
            }
    }
}

#[derive(Debug, Clone)]
struct Index {
    name: String,
    columns: Vec<String>,
    unique: bool,
}

#[derive(Debug, Default)]
struct Table {
    rows: Vec<Row>,
    indexes: Vec<Index>,
}

impl Table {
    fn check_unique(&self, row: &Row) -> VersionerResult<()> {
        for index in self.indexes.iter().filter(|i| i.unique) {
            let key: Vec<Option<&Value>> = index.columns.iter().map(|c| row.get(c)).collect();
            let taken = self
                .rows
                .iter()
                .any(|existing| index.columns.iter().map(|c| existing.get(c)).eq(key.iter().copied()));
            if taken {
                return Err(VersionerError::new(format!(
                    "duplicate key error, index: {}",
                    index.name
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct State {
    tables: BTreeMap<String, Table>,
    executed: Vec<String>,
    faults: Vec<Fault>,
    args: Option<ConnectionArgs>,
    connected: bool,
    close_count: usize,
    next_id: u64,
}

impl State {
    fn check(&self, operation: &str, table: Option<&str>) -> VersionerResult<()> {
        match self.faults.iter().find(|f| f.applies(operation, table)) {
            Some(fault) => Err(VersionerError::new(fault.message.clone())),
            None => Ok(()),
        }
    }

    fn insert_row(&mut self, table: &str, mut row: Row) -> VersionerResult<()> {
        if !row.contains_key("_id") {
            self.next_id += 1;
            row.insert("_id".to_string(), Value::String(format!("{:024x}", self.next_id)));
        }
        let target = self.tables.entry(table.to_string()).or_default();
        target.check_unique(&row)?;
        target.rows.push(row);
        Ok(())
    }

    fn find(&self, table: &str, filter: &Row) -> Vec<Row> {
        self.tables
            .get(table)
            .map(|t| {
                t.rows
                    .iter()
                    .filter(|row| matches(row, filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn update(&mut self, table: &str, filter: &Row, set: &Row) -> usize {
        let Some(target) = self.tables.get_mut(table) else {
            return 0;
        };
        let mut count = 0;
        for row in target.rows.iter_mut().filter(|row| matches(row, filter)) {
            for (key, value) in set {
                row.insert(key.clone(), value.clone());
            }
            count += 1;
        }
        count
    }

    fn delete(&mut self, table: &str, filter: &Row) -> usize {
        let Some(target) = self.tables.get_mut(table) else {
            return 0;
        };
        let before = target.rows.len();
        target.rows.retain(|row| !matches(row, filter));
        before - target.rows.len()
    }

    fn run_command(&mut self, text: &str) -> VersionerResult<Value> {
        let command = match parse(text)? {
            Value::Object(command) => command,
            other => {
                return Err(VersionerError::new(format!(
                    "Expected a command document, found {}",
                    other
                )));
            }
        };
        self.executed.push(text.to_string());
        self.run_document(&command)
    }

    fn run_document(&mut self, command: &Row) -> VersionerResult<Value> {
        if let Some(table) = command.get("find").and_then(Value::as_str) {
            let docs = self.find(table, &object(command.get("filter"))?);
            return Ok(json!({"cursor": {"firstBatch": docs}, "ok": 1}));
        }
        if let Some(table) = command.get("insert").and_then(Value::as_str) {
            let docs = array(command.get("documents"))?;
            for doc in &docs {
                self.insert_row(table, object(Some(doc))?)?;
            }
            return Ok(json!({"n": docs.len(), "ok": 1}));
        }
        if let Some(table) = command.get("update").and_then(Value::as_str) {
            let mut n = 0;
            for statement in array(command.get("updates"))? {
                let filter = object(statement.get("q"))?;
                let update = object(statement.get("u"))?;
                let set = match update.get("$set") {
                    Some(set) => object(Some(set))?,
                    None => update,
                };
                n += self.update(table, &filter, &set);
            }
            return Ok(json!({"n": n, "ok": 1}));
        }
        if let Some(table) = command.get("delete").and_then(Value::as_str) {
            let mut n = 0;
            for statement in array(command.get("deletes"))? {
                n += self.delete(table, &object(statement.get("q"))?);
            }
            return Ok(json!({"n": n, "ok": 1}));
        }
        if command.contains_key("ping") {
            return Ok(json!({"ok": 1}));
        }
        match command.keys().next() {
            Some(name) => Err(VersionerError::new(format!("no such command: '{}'", name))),
            None => Err(VersionerError::new("empty command document")),
        }
    }

    fn resolve(&mut self, columns: &[ColumnValue]) -> VersionerResult<Row> {
        let mut row = Row::new();
        for column in columns {
            let value = match &column.value {
                ValueSource::Literal(v) => v.clone(),
                ValueSource::Query {
                    query,
                    path: selector,
                    multi_valued,
                } => {
                    let result = self.run_command(query)?;
                    match selector {
                        Some(selector) => path::select(&result, selector, *multi_valued),
                        None => result,
                    }
                }
            };
            row.insert(column.name.clone(), value);
        }
        Ok(row)
    }
}

fn matches(row: &Row, filter: &Row) -> bool {
    filter.iter().all(|(key, value)| row.get(key) == Some(value))
}

fn parse(text: &str) -> VersionerResult<Value> {
    serde_json::from_str(text)
        .map_err(|e| VersionerError::new(format!("Invalid command text: {}", e)))
}

fn object(value: Option<&Value>) -> VersionerResult<Row> {
    match value {
        None => Ok(Row::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(other) => Err(VersionerError::new(format!("Expected a document, found {}", other))),
    }
}

fn array(value: Option<&Value>) -> VersionerResult<Vec<Value>> {
    match value {
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(other) => Err(VersionerError::new(format!("Expected an array, found {}", other))),
        None => Err(VersionerError::new("Expected an array, found nothing")),
    }
}

// Driver-style `{"$oid": ".."}` ids are flattened to their hex string.
fn plain_id(value: &Value) -> Value {
    match value.get("$oid") {
        Some(Value::String(hex)) => Value::String(hex.clone()),
        _ => value.clone(),
    }
}

/// A [`SchemaVersioner`] keeping every table in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryVersioner {
    state: Arc<Mutex<State>>,
}

impl MemoryVersioner {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `operation` fail until faults are cleared.
    pub fn inject_fault(&self, fault: Fault) {
        self.state.lock().faults.push(fault);
    }

    /// Remove every injected fault.
    pub fn clear_faults(&self) {
        self.state.lock().faults.clear();
    }

    /// Create the lock table with its unique index and insert the lock row,
    /// as a concurrent run would.
    pub fn seed_lock(&self) {
        let (_, index) = history::lock_table();
        let mut state = self.state.lock();
        let table = state.tables.entry(LOCK_TABLE.to_string()).or_default();
        if !table.indexes.iter().any(|i| i.name == index.name) {
            table.indexes.push(Index {
                name: index.name,
                columns: vec![LOCK_NAME.to_string()],
                unique: true,
            });
        }
        let mut row = Row::new();
        row.insert(LOCK_NAME.to_string(), Value::String(LOCK_VALUE.to_string()));
        table.rows.push(row);
    }

    /// Rows of a table, in insertion order.
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.state
            .lock()
            .tables
            .get(table)
            .map(|t| t.rows.iter().cloned().map(Value::Object).collect())
            .unwrap_or_default()
    }

    /// Names of every table.
    pub fn tables(&self) -> Vec<String> {
        self.state.lock().tables.keys().cloned().collect()
    }

    /// Names of the indexes of a table.
    pub fn indexes(&self, table: &str) -> Vec<String> {
        self.state
            .lock()
            .tables
            .get(table)
            .map(|t| t.indexes.iter().map(|i| i.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Every query, script and sub-query command run so far.
    pub fn executed(&self) -> Vec<String> {
        self.state.lock().executed.clone()
    }

    /// Arguments passed to the last `init`.
    pub fn connection_args(&self) -> Option<ConnectionArgs> {
        self.state.lock().args.clone()
    }

    /// Check if the store was closed after its last `init`.
    pub fn is_closed(&self) -> bool {
        let state = self.state.lock();
        !state.connected && state.close_count > 0
    }

    /// Number of `close` calls.
    pub fn close_count(&self) -> usize {
        self.state.lock().close_count
    }
}

#[async_trait::async_trait]
impl SchemaVersioner for MemoryVersioner {
    async fn init(&mut self, args: &ConnectionArgs) -> VersionerResult<()> {
        let mut state = self.state.lock();
        state.check("init", None)?;
        state.args = Some(args.clone());
        state.connected = true;
        debug!("Initialized in-memory versioner");
        Ok(())
    }

    async fn is_table_present(&self, name: &str) -> VersionerResult<bool> {
        Ok(self.state.lock().tables.contains_key(name))
    }

    async fn fetch_current_change_sets(
        &self,
        log_table: &str,
        id_column: &str,
        checksum_column: &str,
    ) -> VersionerResult<HashMap<String, String>> {
        let state = self.state.lock();
        state.check("fetch", Some(log_table))?;
        let Some(table) = state.tables.get(log_table) else {
            return Ok(HashMap::new());
        };
        Ok(table
            .rows
            .iter()
            .filter_map(|row| {
                let id = row.get(id_column)?.as_str()?;
                let checksum = row.get(checksum_column)?.as_str()?;
                Some((id.to_string(), checksum.to_string()))
            })
            .collect())
    }

    async fn create_table(&self, change: &CreateTableChange) -> VersionerResult<()> {
        let mut state = self.state.lock();
        state.check("create_table", Some(&change.table))?;
        if state.tables.contains_key(&change.table) {
            if change.ignore_if_exists {
                debug!(table = %change.table, "Table exists, ignoring");
                return Ok(());
            }
            return Err(VersionerError::new(format!(
                "Table '{}' already exists",
                change.table
            )));
        }
        state.tables.insert(change.table.clone(), Table::default());
        Ok(())
    }

    async fn create_index(&self, change: &CreateIndexChange) -> VersionerResult<()> {
        let mut state = self.state.lock();
        state.check("create_index", Some(&change.table))?;
        let table = state.tables.entry(change.table.clone()).or_default();
        if table.indexes.iter().any(|i| i.name == change.name) {
            return Ok(());
        }
        let index = Index {
            name: change.name.clone(),
            columns: change.columns.iter().map(|c| c.name.clone()).collect(),
            unique: change.unique,
        };
        if index.unique {
            let mut seen: Vec<Vec<Option<&Value>>> = Vec::new();
            for row in &table.rows {
                let key: Vec<Option<&Value>> = index.columns.iter().map(|c| row.get(c)).collect();
                if seen.contains(&key) {
                    return Err(VersionerError::new(format!(
                        "duplicate key error, index: {}",
                        index.name
                    )));
                }
                seen.push(key);
            }
        }
        table.indexes.push(index);
        Ok(())
    }

    async fn insert(&self, change: &InsertChange) -> VersionerResult<()> {
        let mut state = self.state.lock();
        state.check("insert", Some(&change.table))?;
        let row = state.resolve(&change.columns)?;
        state.insert_row(&change.table, row)
    }

    async fn update(&self, change: &UpdateChange) -> VersionerResult<()> {
        let mut state = self.state.lock();
        state.check("update", Some(&change.table))?;
        let set = state.resolve(&change.columns)?;
        let filter = state.resolve(&change.conditions)?;
        let n = state.update(&change.table, &filter, &set);
        debug!(table = %change.table, matched = n, "Updated rows");
        Ok(())
    }

    async fn delete(&self, change: &DeleteChange) -> VersionerResult<()> {
        let mut state = self.state.lock();
        state.check("delete", Some(&change.table))?;
        let filter = state.resolve(&change.conditions)?;
        let n = state.delete(&change.table, &filter);
        debug!(table = %change.table, matched = n, "Deleted rows");
        Ok(())
    }

    async fn execute_query(&self, change: &QueryChange) -> VersionerResult<()> {
        let text = if change.template {
            let mut context = Row::new();
            context.insert(
                "change".to_string(),
                serde_json::to_value(change).map_err(VersionerError::from_backend)?,
            );
            template::render(&change.query, &Value::Object(context))
                .map_err(VersionerError::from_backend)?
        } else {
            change.query.clone()
        };
        let mut state = self.state.lock();
        state.check("query", None)?;
        state.run_command(&text)?;
        Ok(())
    }

    async fn execute_script(&self, change: &ScriptChange) -> VersionerResult<()> {
        let mut state = self.state.lock();
        state.check("script", None)?;
        match parse(&change.script)? {
            Value::Array(commands) => {
                state.executed.push(change.script.clone());
                for command in commands {
                    state.run_document(&object(Some(&command))?)?;
                }
            }
            _ => {
                state.run_command(&change.script)?;
            }
        }
        Ok(())
    }

    async fn find_and_update(&self, change: &FindAndUpdateChange) -> VersionerResult<()> {
        let mut state = self.state.lock();
        state.check("find_and_update", None)?;
        let result = state.run_command(&change.find_query)?;
        let docs = match result.get("cursor").and_then(|c| c.get("firstBatch")) {
            Some(Value::Array(docs)) => docs.clone(),
            _ => {
                return Err(VersionerError::new(
                    "finder query did not return cursor.firstBatch",
                ));
            }
        };
        debug!(records = docs.len(), "Found records to update");

        for mut doc in docs {
            if let Some(id) = doc.get("_id").map(plain_id) {
                doc["_id"] = id;
            }
            let update = template::render(&change.update_template, &doc)
                .map_err(VersionerError::from_backend)?;
            state.run_command(&update)?;
        }
        Ok(())
    }

    async fn close(&mut self) -> VersionerResult<()> {
        let mut state = self.state.lock();
        state.close_count += 1;
        state.connected = false;
        state.check("close", None)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::IndexColumn;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_unique_index_enforced() {
        let store = MemoryVersioner::new();
        store
            .create_index(&CreateIndexChange::new("IDX", "USERS", true, "email"))
            .await
            .unwrap();

        let insert = InsertChange::new("USERS", "email", "a@x.io");
        store.insert(&insert).await.unwrap();
        let err = store.insert(&insert).await.unwrap_err();
        assert!(err.message().contains("duplicate key"));
        assert_eq!(store.rows("USERS").len(), 1);
    }

    #[tokio::test]
    async fn test_create_table_exists() {
        let store = MemoryVersioner::new();
        let mut change = CreateTableChange::new("USERS");
        store.create_table(&change).await.unwrap();
        assert!(store.create_table(&change).await.is_err());

        change.ignore_if_exists = true;
        store.create_table(&change).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_and_delete_by_condition() {
        let store = MemoryVersioner::new();
        store.insert(&InsertChange::new("USERS", "name", "Alice")).await.unwrap();
        store.insert(&InsertChange::new("USERS", "name", "Bob")).await.unwrap();

        let update = UpdateChange::new("USERS")
            .set(ColumnValue::new("active", true))
            .condition(ColumnValue::new("name", "Bob"));
        store.update(&update).await.unwrap();

        let rows = store.rows("USERS");
        assert_eq!(rows[0].get("active"), None);
        assert_eq!(rows[1]["active"], json!(true));

        store.delete(&DeleteChange::new("USERS", "name", "Alice")).await.unwrap();
        assert_eq!(store.rows("USERS").len(), 1);
    }

    #[tokio::test]
    async fn test_sub_query_column() {
        let store = MemoryVersioner::new();
        store.insert(&InsertChange::new("USERS", "name", "Alice")).await.unwrap();
        let owner_id = store.rows("USERS")[0]["_id"].clone();

        let insert = InsertChange::new("POSTS", "title", "Hello").column(
            ColumnValue::query("owner", r#"{"find": "USERS", "filter": {"name": "Alice"}}"#)
                .with_path("cursor/firstBatch/_id", false),
        );
        store.insert(&insert).await.unwrap();

        assert_eq!(store.rows("POSTS")[0]["owner"], owner_id);
    }

    #[tokio::test]
    async fn test_find_and_update() {
        let store = MemoryVersioner::new();
        store.insert(&InsertChange::new("USERS", "name", "Alice")).await.unwrap();
        store.insert(&InsertChange::new("USERS", "name", "Bob")).await.unwrap();

        let change = FindAndUpdateChange::new(
            r#"{"find": "USERS"}"#,
            r#"{"update": "USERS", "updates": [{"q": {"_id": "${_id}"}, "u": {"$set": {"slug": "${name}"}}}]}"#,
        );
        store.find_and_update(&change).await.unwrap();

        let slugs: Vec<_> = store.rows("USERS").iter().map(|r| r["slug"].clone()).collect();
        assert_eq!(slugs, vec![json!("Alice"), json!("Bob")]);
    }

    #[tokio::test]
    async fn test_query_template_uses_change_context() {
        let store = MemoryVersioner::new();
        let change = QueryChange {
            query: r#"{"ping": 1, "template": ${change.template}}"#.to_string(),
            template: true,
        };
        store.execute_query(&change).await.unwrap();
        assert_eq!(store.executed(), vec![r#"{"ping": 1, "template": true}"#.to_string()]);
    }

    #[tokio::test]
    async fn test_script_array_runs_each_command() {
        let store = MemoryVersioner::new();
        let script = ScriptChange::new(
            r#"[{"insert": "T", "documents": [{"a": 1}, {"a": 2}]}, {"delete": "T", "deletes": [{"q": {"a": 1}}]}]"#,
        );
        store.execute_script(&script).await.unwrap();
        assert_eq!(store.rows("T").len(), 1);
    }

    #[tokio::test]
    async fn test_faults_and_close() {
        let mut store = MemoryVersioner::new();
        store.inject_fault(Fault::on_insert("USERS", "nope"));
        assert!(store.insert(&InsertChange::new("USERS", "a", 1)).await.is_err());
        assert!(store.insert(&InsertChange::new("OTHER", "a", 1)).await.is_ok());

        store.clear_faults();
        store.init(&ConnectionArgs::new().database("test")).await.unwrap();
        assert!(!store.is_closed());
        store.close().await.unwrap();
        assert!(store.is_closed());
        assert_eq!(store.close_count(), 1);
        assert_eq!(
            store.connection_args().and_then(|a| a.database),
            Some("test".to_string())
        );
    }

    #[tokio::test]
    async fn test_compound_index_names() {
        let store = MemoryVersioner::new();
        let mut change = CreateIndexChange::new("IDX", "USERS", false, "a");
        change.columns.push(IndexColumn::descending("b"));
        store.create_index(&change).await.unwrap();
        assert_eq!(store.indexes("USERS"), vec!["IDX".to_string()]);
    }

    #[tokio::test]
    async fn test_malformed_query_rejected() {
        let store = MemoryVersioner::new();
        let err = store
            .execute_query(&QueryChange::new(r#"{"update": "USERS", oops"#))
            .await
            .unwrap_err();
        assert!(err.message().contains("Invalid command text"));

        let err = store.execute_query(&QueryChange::new("[1, 2]")).await.unwrap_err();
        assert!(err.message().contains("Expected a command document"));
        assert!(store.executed().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_command_rejected() {
        let store = MemoryVersioner::new();
        let err = store
            .execute_query(&QueryChange::new(r#"{"dropDatabase": 1}"#))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "no such command: 'dropDatabase'");

        assert!(store.execute_query(&QueryChange::new("{}")).await.is_err());
        assert!(store.execute_script(&ScriptChange::new("db.users.drop()")).await.is_err());
        assert!(
            store
                .execute_script(&ScriptChange::new(r#"[{"ping": 1}, {"compact": "USERS"}]"#))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_find_and_update_requires_cursor() {
        let store = MemoryVersioner::new();
        store.insert(&InsertChange::new("USERS", "name", "Alice")).await.unwrap();

        let update = r#"{"update": "USERS", "updates": [{"q": {"_id": "${_id}"}, "u": {"$set": {"seen": true}}}]}"#;
        let err = store
            .find_and_update(&FindAndUpdateChange::new("not json at all", update))
            .await
            .unwrap_err();
        assert!(err.message().contains("Invalid command text"));

        let err = store
            .find_and_update(&FindAndUpdateChange::new(r#"{"ping": 1}"#, update))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "finder query did not return cursor.firstBatch");
        assert_eq!(store.rows("USERS")[0].get("seen"), None);
    }
}
