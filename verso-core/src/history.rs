//! Bookkeeping tables.
//!
//! The change log table holds one row per executed changeset; the lock table
//! holds at most one row, present while a run is in progress. Both are
//! created on demand through the regular versioner operations, so a backend
//! needs no special support for them.

use crate::change::{CreateIndexChange, CreateTableChange, DeleteChange, InsertChange, UpdateChange};
use crate::changelog::ChangeSet;
use crate::column::ColumnValue;

/// Table recording executed changesets.
pub const CHANGE_LOG_TABLE: &str = "DATABASE_CHANGE_LOG";
/// Table holding the lock row.
pub const LOCK_TABLE: &str = "DATABASE_CHANGE_LOG_LOCK";

/// Changeset id column.
pub const CHANGE_SET_ID: &str = "CHANGE_SET_ID";
/// Author column.
pub const AUTHOR: &str = "AUTHOR";
/// Checksum column.
pub const CHECKSUM: &str = "CHECKSUM";
/// Source file column.
pub const FILE_NAME: &str = "FILE_NAME";

/// Lock name column.
pub const LOCK_NAME: &str = "NAME";
/// Value of the single lock row.
pub const LOCK_VALUE: &str = "LOCK";

const CHANGE_LOG_INDEX: &str = "DATABASE_CHANGE_LOG_CSET_ID";
const LOCK_INDEX: &str = "DATABASE_CHANGE_LOG_LOCK_NAME";

/// Changes creating the change log table and its unique id index.
pub fn change_log_table() -> (CreateTableChange, CreateIndexChange) {
    (
        CreateTableChange::new(CHANGE_LOG_TABLE),
        CreateIndexChange::new(CHANGE_LOG_INDEX, CHANGE_LOG_TABLE, true, CHANGE_SET_ID),
    )
}

/// Changes creating the lock table and its unique name index.
pub fn lock_table() -> (CreateTableChange, CreateIndexChange) {
    (
        CreateTableChange::new(LOCK_TABLE),
        CreateIndexChange::new(LOCK_INDEX, LOCK_TABLE, true, LOCK_NAME),
    )
}

/// Insert of the lock row. Fails on a store where the lock is already held.
pub fn lock_row() -> InsertChange {
    InsertChange::new(LOCK_TABLE, LOCK_NAME, LOCK_VALUE)
}

/// Delete of the lock row.
pub fn unlock_row() -> DeleteChange {
    DeleteChange::new(LOCK_TABLE, LOCK_NAME, LOCK_VALUE)
}

/// Execution record of a successfully applied changeset.
pub fn execution_record(change_set: &ChangeSet, checksum: &str) -> InsertChange {
    InsertChange::new(CHANGE_LOG_TABLE, CHANGE_SET_ID, change_set.id.as_str())
        .column(ColumnValue::new(AUTHOR, change_set.author.as_str()))
        .column(ColumnValue::new(CHECKSUM, checksum))
        .column(ColumnValue::new(FILE_NAME, change_set.source_file.as_str()))
}

/// Replacement of the stored checksum of a changeset.
pub fn checksum_update(id: &str, checksum: &str) -> UpdateChange {
    UpdateChange::new(CHANGE_LOG_TABLE)
        .set(ColumnValue::new(CHECKSUM, checksum))
        .condition(ColumnValue::new(CHANGE_SET_ID, id))
}
