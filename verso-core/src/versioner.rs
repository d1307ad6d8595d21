//! The port the executor drives to apply changes to a concrete store.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::change::{
    CreateIndexChange, CreateTableChange, DeleteChange, FindAndUpdateChange, InsertChange,
    QueryChange, ScriptChange, UpdateChange,
};

/// Boxed error type backends may attach as a source.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error raised by a [`SchemaVersioner`] operation.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct VersionerError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl VersionerError {
    /// Create an error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create an error wrapping a backend error.
    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Wrap a backend error, using its display text as the message.
    pub fn from_backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::with_source(err.to_string(), err)
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Result type alias for versioner operations.
pub type VersionerResult<T> = Result<T, VersionerError>;

/// Connection parameters handed to [`SchemaVersioner::init`].
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectionArgs {
    /// Server host.
    pub host: Option<String>,
    /// Server port.
    pub port: Option<u16>,
    /// Comma-separated `host:port` replica list.
    pub replicas: Option<String>,
    /// Database name.
    pub database: Option<String>,
    /// User name.
    pub username: Option<String>,
    /// Password.
    pub password: Option<String>,
    /// Connect over TLS.
    pub enable_ssl: bool,
}

impl ConnectionArgs {
    /// Create empty connection arguments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the replica list.
    pub fn replicas(mut self, replicas: impl Into<String>) -> Self {
        self.replicas = Some(replicas.into());
        self
    }

    /// Set the database name.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the credentials.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Enable or disable TLS.
    pub fn enable_ssl(mut self, enable: bool) -> Self {
        self.enable_ssl = enable;
        self
    }
}

impl fmt::Debug for ConnectionArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionArgs")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("replicas", &self.replicas)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("enable_ssl", &self.enable_ssl)
            .finish()
    }
}

/// Operations a backing store must provide to run change logs.
///
/// Every method raises on failure rather than silently doing nothing; the
/// executor awaits each call before issuing the next one.
#[async_trait::async_trait]
pub trait SchemaVersioner: Send + Sync {
    /// Connect to the store.
    async fn init(&mut self, args: &ConnectionArgs) -> VersionerResult<()>;

    /// Check if a table or collection exists.
    async fn is_table_present(&self, name: &str) -> VersionerResult<bool>;

    /// Read `{changeset id -> checksum}` from the bookkeeping table.
    async fn fetch_current_change_sets(
        &self,
        log_table: &str,
        id_column: &str,
        checksum_column: &str,
    ) -> VersionerResult<HashMap<String, String>>;

    /// Create a table or collection.
    async fn create_table(&self, change: &CreateTableChange) -> VersionerResult<()>;

    /// Create an index.
    async fn create_index(&self, change: &CreateIndexChange) -> VersionerResult<()>;

    /// Insert one record.
    async fn insert(&self, change: &InsertChange) -> VersionerResult<()>;

    /// Update matching records.
    async fn update(&self, change: &UpdateChange) -> VersionerResult<()>;

    /// Delete matching records.
    async fn delete(&self, change: &DeleteChange) -> VersionerResult<()>;

    /// Run a raw query or command.
    async fn execute_query(&self, change: &QueryChange) -> VersionerResult<()>;

    /// Run a raw script.
    async fn execute_script(&self, change: &ScriptChange) -> VersionerResult<()>;

    /// Run a finder, then an update rendered from each matched record.
    async fn find_and_update(&self, change: &FindAndUpdateChange) -> VersionerResult<()>;

    /// Release every resource held by the versioner.
    async fn close(&mut self) -> VersionerResult<()>;
}
