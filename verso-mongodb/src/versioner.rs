//! The MongoDB implementation of the versioner port.

use std::collections::HashMap;

use bson::{Document, doc};
use futures::TryStreamExt;
use mongodb::options::{CreateCollectionOptions, DeleteOptions, IndexOptions, UpdateOptions};
use mongodb::{Client, Database, IndexModel};
use serde_json::{Map, Value};
use tracing::{debug, info};
use verso_core::path;
use verso_core::template;
use verso_core::{
    ColumnValue, ConnectionArgs, CreateIndexChange, CreateTableChange, DeleteChange,
    FindAndUpdateChange, InsertChange, QueryChange, SchemaVersioner, ScriptChange, UpdateChange,
    ValueSource, VersionerResult,
};

use crate::config::MongoConfig;
use crate::document::{
    document_to_json, fields_document, filter_document, index_keys, json_to_document, options,
    parse_command, set_document,
};
use crate::error::{MongoError, MongoResult};

/// A [`SchemaVersioner`] backed by a MongoDB database.
///
/// Tables are collections, queries and scripts are extended JSON command
/// documents run with `runCommand`.
#[derive(Default)]
pub struct MongoVersioner {
    client: Option<Client>,
    database: Option<Database>,
}

impl MongoVersioner {
    /// Create an unconnected versioner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if `init` succeeded and `close` has not been called since.
    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    fn db(&self) -> MongoResult<&Database> {
        self.database.as_ref().ok_or(MongoError::NotConnected)
    }

    async fn run_command(&self, command: Document) -> MongoResult<Document> {
        debug!(command = %command, "Running command");
        Ok(self.db()?.run_command(command, None).await?)
    }

    async fn run_text(&self, text: &str) -> MongoResult<Document> {
        self.run_command(parse_command(text)?).await
    }

    async fn resolve(&self, columns: &[ColumnValue]) -> MongoResult<Map<String, Value>> {
        let mut fields = Map::new();
        for column in columns {
            let value = match &column.value {
                ValueSource::Literal(value) => value.clone(),
                ValueSource::Query {
                    query,
                    path: selector,
                    multi_valued,
                } => {
                    let result = document_to_json(self.run_text(query).await?);
                    match selector {
                        Some(selector) => path::select(&result, selector, *multi_valued),
                        None => result,
                    }
                }
            };
            fields.insert(column.name.clone(), value);
        }
        Ok(fields)
    }

    async fn connect(&mut self, args: &ConnectionArgs) -> MongoResult<()> {
        let config = MongoConfig::from_args(args)?;
        let client = Client::with_options(config.to_client_options().await?)?;
        let database = client.database(&config.database);

        database.run_command(doc! { "ping": 1 }, None).await?;
        info!(uri = %config.uri(), database = %config.database, "Connected to MongoDB");

        self.client = Some(client);
        self.database = Some(database);
        Ok(())
    }

    async fn fetch(
        &self,
        log_table: &str,
        id_column: &str,
        checksum_column: &str,
    ) -> MongoResult<HashMap<String, String>> {
        let cursor = self
            .db()?
            .collection::<Document>(log_table)
            .find(None, None)
            .await?;
        let records: Vec<Document> = cursor.try_collect().await?;

        Ok(records
            .iter()
            .filter_map(|record| {
                let id = record.get_str(id_column).ok()?;
                let checksum = record.get_str(checksum_column).ok()?;
                Some((id.to_string(), checksum.to_string()))
            })
            .collect())
    }

    async fn create_collection(&self, change: &CreateTableChange) -> MongoResult<()> {
        let opts: CreateCollectionOptions = options(&change.options)?;
        match self.db()?.create_collection(&change.table, opts).await {
            Ok(()) => Ok(()),
            Err(err) => {
                let err = MongoError::from(err);
                if change.ignore_if_exists && err.is_namespace_exists() {
                    debug!(table = %change.table, "Collection exists, ignoring");
                    Ok(())
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn index(&self, change: &CreateIndexChange) -> MongoResult<()> {
        let mut opts: IndexOptions = options(&change.options)?;
        opts.name = Some(change.name.clone());
        opts.unique = Some(change.unique);

        let model = IndexModel::builder()
            .keys(index_keys(&change.columns))
            .options(opts)
            .build();
        self.db()?
            .collection::<Document>(&change.table)
            .create_index(model, None)
            .await?;
        Ok(())
    }

    async fn insert_one(&self, change: &InsertChange) -> MongoResult<()> {
        let doc = fields_document(&self.resolve(&change.columns).await?)?;
        self.db()?
            .collection::<Document>(&change.table)
            .insert_one(doc, None)
            .await?;
        Ok(())
    }

    async fn update_many(&self, change: &UpdateChange) -> MongoResult<()> {
        let update = set_document(&self.resolve(&change.columns).await?)?;
        let filter = filter_document(&self.resolve(&change.conditions).await?)?;
        let opts: UpdateOptions = options(&change.options)?;

        let result = self
            .db()?
            .collection::<Document>(&change.table)
            .update_many(filter, update, opts)
            .await?;
        debug!(table = %change.table, matched = result.matched_count, "Updated documents");
        Ok(())
    }

    async fn delete_many(&self, change: &DeleteChange) -> MongoResult<()> {
        let filter = filter_document(&self.resolve(&change.conditions).await?)?;
        let opts: DeleteOptions = options(&change.options)?;

        let result = self
            .db()?
            .collection::<Document>(&change.table)
            .delete_many(filter, opts)
            .await?;
        debug!(table = %change.table, deleted = result.deleted_count, "Deleted documents");
        Ok(())
    }

    async fn query(&self, change: &QueryChange) -> MongoResult<()> {
        let text = if change.template {
            let mut context = Map::new();
            context.insert("change".to_string(), serde_json::to_value(change)?);
            template::render(&change.query, &Value::Object(context))
                .map_err(|e| MongoError::query(e.to_string()))?
        } else {
            change.query.clone()
        };
        self.run_text(&text).await?;
        Ok(())
    }

    async fn script(&self, change: &ScriptChange) -> MongoResult<()> {
        let value: Value = serde_json::from_str(&change.script)?;
        let commands = match &value {
            Value::Array(items) => items
                .iter()
                .map(json_to_document)
                .collect::<MongoResult<Vec<_>>>()?,
            _ => vec![json_to_document(&value)?],
        };
        for command in commands {
            self.run_command(command).await?;
        }
        Ok(())
    }

    async fn find_then_update(&self, change: &FindAndUpdateChange) -> MongoResult<()> {
        let result = document_to_json(self.run_text(&change.find_query).await?);
        let records = match result.get("cursor").and_then(|c| c.get("firstBatch")) {
            Some(Value::Array(records)) => records.clone(),
            _ => {
                return Err(MongoError::query(
                    "finder query did not return cursor.firstBatch",
                ));
            }
        };
        debug!(records = records.len(), "Found records to update");

        for record in &records {
            let update = template::render(&change.update_template, record)
                .map_err(|e| MongoError::query(e.to_string()))?;
            self.run_text(&update).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for MongoVersioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoVersioner")
            .field("connected", &self.is_connected())
            .field("database", &self.database.as_ref().map(|d| d.name().to_string()))
            .finish()
    }
}

#[async_trait::async_trait]
impl SchemaVersioner for MongoVersioner {
    async fn init(&mut self, args: &ConnectionArgs) -> VersionerResult<()> {
        Ok(self.connect(args).await?)
    }

    async fn is_table_present(&self, name: &str) -> VersionerResult<bool> {
        let names = self
            .db()?
            .list_collection_names(doc! { "name": name })
            .await
            .map_err(MongoError::from)?;
        Ok(names.iter().any(|n| n == name))
    }

    async fn fetch_current_change_sets(
        &self,
        log_table: &str,
        id_column: &str,
        checksum_column: &str,
    ) -> VersionerResult<HashMap<String, String>> {
        Ok(self.fetch(log_table, id_column, checksum_column).await?)
    }

    async fn create_table(&self, change: &CreateTableChange) -> VersionerResult<()> {
        Ok(self.create_collection(change).await?)
    }

    async fn create_index(&self, change: &CreateIndexChange) -> VersionerResult<()> {
        Ok(self.index(change).await?)
    }

    async fn insert(&self, change: &InsertChange) -> VersionerResult<()> {
        Ok(self.insert_one(change).await?)
    }

    async fn update(&self, change: &UpdateChange) -> VersionerResult<()> {
        Ok(self.update_many(change).await?)
    }

    async fn delete(&self, change: &DeleteChange) -> VersionerResult<()> {
        Ok(self.delete_many(change).await?)
    }

    async fn execute_query(&self, change: &QueryChange) -> VersionerResult<()> {
        Ok(self.query(change).await?)
    }

    async fn execute_script(&self, change: &ScriptChange) -> VersionerResult<()> {
        Ok(self.script(change).await?)
    }

    async fn find_and_update(&self, change: &FindAndUpdateChange) -> VersionerResult<()> {
        Ok(self.find_then_update(change).await?)
    }

    async fn close(&mut self) -> VersionerResult<()> {
        self.database = None;
        if self.client.take().is_some() {
            debug!("Closed MongoDB client");
        }
        Ok(())
    }
}
