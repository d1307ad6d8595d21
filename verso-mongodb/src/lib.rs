//! # verso-mongodb
//!
//! MongoDB schema versioner for verso.
//!
//! This crate provides:
//! - [`MongoVersioner`], the [`SchemaVersioner`](verso_core::SchemaVersioner)
//!   implementation for MongoDB
//! - Connection configuration from host/port or a replica list
//! - Conversion between change log JSON (extended JSON allowed) and BSON
//!
//! Tables map to collections. Query, script and find-and-update changes
//! carry MongoDB command documents written as extended JSON, which are run
//! with `runCommand`:
//!
//! ```json
//! { "update": "USERS", "updates": [{ "q": { "name": "Alice" }, "u": { "$set": { "active": true } } }] }
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use verso_core::{ChangeLogExecutor, ConnectionArgs, loader};
//! use verso_mongodb::MongoVersioner;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let log = loader::load("changelog.toml")?;
//!     let args = ConnectionArgs::new()
//!         .replicas("rs1.local:27017,rs2.local:27017")
//!         .database("app")
//!         .credentials("admin", "secret");
//!
//!     let mut executor = ChangeLogExecutor::new(MongoVersioner::new());
//!     let tracker = executor.run(&log, &args).await;
//!     println!("{}", tracker.summary());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod versioner;

pub use bson::{Bson, Document, doc};
pub use config::MongoConfig;
pub use error::{MongoError, MongoResult};
pub use versioner::MongoVersioner;
