//! # Verso
//!
//! Applies versioned, declarative database change logs exactly once.
//!
//! Verso provides:
//! - A change log model of ordered changesets, loaded from TOML or JSON files
//! - Exactly-once execution tracked in a `DATABASE_CHANGE_LOG` table
//! - Drift detection through whitespace-insensitive MD5 checksums
//! - A lock row that keeps concurrent runs apart
//! - MongoDB and in-memory backends
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use verso::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), verso::VersoError> {
//!     let log = verso::loader::load("db/changelog.toml")?;
//!     let args = ConnectionArgs::new().host("localhost").database("app");
//!
//!     let mut executor = ChangeLogExecutor::new(MongoVersioner::new());
//!     let tracker = executor.run(&log, &args).await;
//!
//!     println!("{}", tracker.summary());
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub use verso_core::*;

/// The MongoDB versioner.
#[cfg(feature = "mongodb")]
#[cfg_attr(docsrs, doc(cfg(feature = "mongodb")))]
pub mod mongodb {
    pub use verso_mongodb::*;
}

#[cfg(feature = "mongodb")]
pub use verso_mongodb::MongoVersioner;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use verso_core::{
        Change, ChangeLog, ChangeLogExecutor, ChangeSet, ColumnValue, ConnectionArgs,
        ExecutorConfig, MemoryVersioner, RunTracker, SchemaVersioner, VersoError, VersoResult,
    };

    #[cfg(feature = "mongodb")]
    pub use verso_mongodb::MongoVersioner;
}
