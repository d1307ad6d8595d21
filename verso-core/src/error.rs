//! Error types for loading and executing change logs.

use thiserror::Error;

use crate::versioner::VersionerError;

/// Result type alias for change log operations.
pub type VersoResult<T> = Result<T, VersoError>;

/// Errors that can occur while loading or executing a change log.
#[derive(Debug, Error)]
pub enum VersoError {
    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input, malformed change log or duplicate changeset id.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A referenced file, template or sub-query could not be resolved.
    #[error("Resource error: {0}")]
    Resource(String),

    /// A changeset could not be rendered into its canonical form.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The lock row could not be inserted.
    #[error("Failed to obtain the lock: {0}")]
    Lock(String),

    /// The lock row could not be removed after the run.
    #[error("Failed to release the lock: {0}")]
    Unlock(String),

    /// Stored checksum differs from the recomputed one.
    #[error(
        "Changeset '{id}' is modified from last execution.\n\tOld checksum: {old}\n\tNew checksum: {new}"
    )]
    ChecksumMismatch {
        /// Changeset id.
        id: String,
        /// Checksum recorded when the changeset was executed.
        old: String,
        /// Checksum of the changeset as currently declared.
        new: String,
    },

    /// A change operation failed while its changeset was executing.
    #[error("An error occurred while executing changeset '{changeset}' [{change}]: {message}")]
    Dispatch {
        /// Changeset id.
        changeset: String,
        /// Kind of change that failed.
        change: &'static str,
        /// Backend error message.
        message: String,
    },

    /// Bookkeeping operation against the target store failed.
    #[error("Versioner error: {0}")]
    Versioner(#[from] VersionerError),
}

impl VersoError {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a resource error.
    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create a dispatch error.
    pub fn dispatch(
        changeset: impl Into<String>,
        change: &'static str,
        msg: impl Into<String>,
    ) -> Self {
        Self::Dispatch {
            changeset: changeset.into(),
            change,
            message: msg.into(),
        }
    }

    /// The changeset this error belongs to, if any.
    pub fn change_set_id(&self) -> Option<&str> {
        match self {
            Self::ChecksumMismatch { id, .. } => Some(id),
            Self::Dispatch { changeset, .. } => Some(changeset),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for VersoError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
