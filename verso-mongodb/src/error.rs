//! Error types for MongoDB operations.

use thiserror::Error;
use verso_core::VersionerError;

/// Result type for MongoDB operations.
pub type MongoResult<T> = Result<T, MongoError>;

/// Server error code of "collection already exists".
const NAMESPACE_EXISTS: i32 = 48;

/// Errors that can occur during MongoDB operations.
#[derive(Error, Debug)]
pub enum MongoError {
    /// MongoDB driver error.
    #[error("mongodb error: {0}")]
    Driver(#[from] mongodb::error::Error),

    /// BSON serialization error.
    #[error("bson error: {0}")]
    Bson(#[from] bson::ser::Error),

    /// BSON deserialization error.
    #[error("bson deserialization error: {0}")]
    BsonDe(#[from] bson::de::Error),

    /// Extended JSON could not be converted to BSON.
    #[error("extended json error: {0}")]
    ExtJson(#[from] bson::extjson::de::Error),

    /// Command text is not valid JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Query execution error.
    #[error("query error: {0}")]
    Query(String),

    /// An operation was attempted before `init` or after `close`.
    #[error("not connected")]
    NotConnected,
}

impl MongoError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a query error.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query(message.into())
    }

    /// Check if this is a configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Check if the server reported that a collection already exists.
    pub fn is_namespace_exists(&self) -> bool {
        match self {
            Self::Driver(err) => match err.kind.as_ref() {
                mongodb::error::ErrorKind::Command(cmd) => {
                    cmd.code == NAMESPACE_EXISTS || cmd.code_name == "NamespaceExists"
                }
                _ => false,
            },
            _ => false,
        }
    }
}

impl From<MongoError> for VersionerError {
    fn from(err: MongoError) -> Self {
        VersionerError::from_backend(err)
    }
}
