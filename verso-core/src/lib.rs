//! # verso-core
//!
//! Change log engine for verso.
//!
//! This crate provides:
//! - A typed change log model (changesets of create-table, create-index,
//!   insert, update, delete, query, script and find-and-update changes)
//! - Whitespace-insensitive MD5 checksums of changesets
//! - The [`SchemaVersioner`] port implemented once per backing store
//! - The [`ChangeLogExecutor`] that applies each changeset exactly once
//! - A loader for TOML and JSON change log files with includes
//! - An in-memory versioner for tests and dry runs
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌──────────────────┐
//! │ Change log   │────▶│ Loader         │────▶│ ChangeLog        │
//! │ files        │     └────────────────┘     └──────────────────┘
//! └──────────────┘                                     │
//!                                                      ▼
//! ┌──────────────┐     ┌────────────────┐     ┌──────────────────┐
//! │ RunTracker   │◀────│ Executor       │────▶│ SchemaVersioner  │
//! └──────────────┘     └────────────────┘     └──────────────────┘
//!                                                      │
//!                                                      ▼
//!                                             ┌──────────────────┐
//!                                             │ DATABASE_CHANGE_ │
//!                                             │ LOG (+ _LOCK)    │
//!                                             └──────────────────┘
//! ```
//!
//! Every executed changeset gets a row in `DATABASE_CHANGE_LOG` holding its
//! id, author, checksum and source file. Later runs skip changesets whose
//! recorded checksum still matches and fail on those that were modified.
//! A single row in `DATABASE_CHANGE_LOG_LOCK` keeps two runs from applying
//! the same log concurrently. The lock has no expiry: a run that dies while
//! holding it leaves the row behind until an operator deletes it.
//!
//! ## Example
//!
//! ```rust,ignore
//! use verso_core::{ChangeLogExecutor, ConnectionArgs, MemoryVersioner, loader};
//!
//! async fn apply() -> Result<(), Box<dyn std::error::Error>> {
//!     let log = loader::load("changelog.toml")?;
//!
//!     let mut executor = ChangeLogExecutor::new(MemoryVersioner::new());
//!     let tracker = executor.run(&log, &ConnectionArgs::new()).await;
//!
//!     println!("{}", tracker.summary());
//!     std::process::exit(tracker.exit_code());
//! }
//! ```

pub mod change;
pub mod changelog;
pub mod checksum;
pub mod column;
pub mod error;
pub mod executor;
pub mod history;
pub mod loader;
pub mod memory;
pub mod path;
pub mod template;
pub mod tracker;
pub mod versioner;

// Re-exports
pub use change::{
    Change, CreateIndexChange, CreateTableChange, DeleteChange, FindAndUpdateChange, IndexColumn,
    InsertChange, Options, QueryChange, ScriptChange, UpdateChange,
};
pub use changelog::{ChangeLog, ChangeSet};
pub use column::{ColumnValue, ValueSource};
pub use error::{VersoError, VersoResult};
pub use executor::{ChangeLogExecutor, ExecutorConfig};
pub use loader::ChangeLogLoader;
pub use memory::{Fault, MemoryVersioner};
pub use tracker::{EXIT_FAILURE, EXIT_SUCCESS, LOCK_FAILED, RunTracker};
pub use versioner::{
    BoxError, ConnectionArgs, SchemaVersioner, VersionerError, VersionerResult,
};
