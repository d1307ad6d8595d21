//! In-memory change log model.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::change::Change;
use crate::error::{VersoError, VersoResult};

/// A named, authored unit of changes applied exactly once.
///
/// The checksum is not stored here; it is recomputed from `changes` on every
/// run by [`crate::checksum::evaluate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Unique changeset id.
    pub id: String,
    /// Author of the changeset.
    pub author: String,
    /// Name of the file the changeset was declared in.
    #[serde(default)]
    pub source_file: String,
    /// Ordered change operations.
    pub changes: Vec<Change>,
}

impl ChangeSet {
    /// Create an empty changeset.
    pub fn new(id: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            author: author.into(),
            source_file: String::new(),
            changes: Vec::new(),
        }
    }

    /// Set the source file name.
    pub fn source_file(mut self, name: impl Into<String>) -> Self {
        self.source_file = name.into();
        self
    }

    /// Append a change.
    pub fn change(mut self, change: Change) -> Self {
        self.changes.push(change);
        self
    }

    /// Validate id, author and every change.
    pub fn validate(&self) -> VersoResult<()> {
        if self.id.trim().is_empty() {
            return Err(VersoError::configuration("Changeset id can not be empty"));
        }
        if self.author.trim().is_empty() {
            return Err(VersoError::configuration(format!(
                "Author of changeset '{}' can not be empty",
                self.id
            )));
        }
        if self.changes.is_empty() {
            return Err(VersoError::configuration(format!(
                "Changeset '{}' has no changes",
                self.id
            )));
        }
        for change in &self.changes {
            change.validate().map_err(|msg| {
                VersoError::configuration(format!(
                    "Invalid {} change in changeset '{}': {}",
                    change.kind(),
                    self.id,
                    msg
                ))
            })?;
        }
        Ok(())
    }
}

/// An ordered sequence of changesets with unique ids.
#[derive(Debug, Clone, Default)]
pub struct ChangeLog {
    change_sets: Vec<ChangeSet>,
    ids: HashSet<String>,
}

impl ChangeLog {
    /// Create an empty change log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a changeset, rejecting duplicate ids.
    pub fn push(&mut self, change_set: ChangeSet) -> VersoResult<()> {
        if !self.ids.insert(change_set.id.clone()) {
            return Err(VersoError::configuration(format!(
                "Duplicate changeset id encountered: {}",
                change_set.id
            )));
        }
        self.change_sets.push(change_set);
        Ok(())
    }

    /// Check if a changeset id is already present.
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Number of changesets.
    pub fn len(&self) -> usize {
        self.change_sets.len()
    }

    /// Check if the log is empty.
    pub fn is_empty(&self) -> bool {
        self.change_sets.is_empty()
    }

    /// Iterate changesets in load order.
    pub fn iter(&self) -> impl Iterator<Item = &ChangeSet> {
        self.change_sets.iter()
    }

    /// Changesets in load order.
    pub fn change_sets(&self) -> &[ChangeSet] {
        &self.change_sets
    }
}

impl TryFrom<Vec<ChangeSet>> for ChangeLog {
    type Error = VersoError;

    fn try_from(change_sets: Vec<ChangeSet>) -> VersoResult<Self> {
        let mut log = Self::new();
        for change_set in change_sets {
            log.push(change_set)?;
        }
        Ok(log)
    }
}

impl<'a> IntoIterator for &'a ChangeLog {
    type Item = &'a ChangeSet;
    type IntoIter = std::slice::Iter<'a, ChangeSet>;

    fn into_iter(self) -> Self::IntoIter {
        self.change_sets.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{CreateTableChange, InsertChange};

    fn change_set(id: &str) -> ChangeSet {
        ChangeSet::new(id, "alice").change(Change::CreateTable(CreateTableChange::new("USERS")))
    }

    #[test]
    fn test_push_preserves_order() {
        let mut log = ChangeLog::new();
        log.push(change_set("a")).unwrap();
        log.push(change_set("c")).unwrap();
        log.push(change_set("b")).unwrap();

        let ids: Vec<_> = log.iter().map(|cs| cs.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut log = ChangeLog::new();
        log.push(change_set("a")).unwrap();

        let err = log.push(change_set("a")).unwrap_err();
        assert!(matches!(err, VersoError::Configuration(_)));
        assert!(err.to_string().contains("Duplicate changeset id encountered: a"));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_validate_requires_author_and_changes() {
        let no_author = ChangeSet::new("x", " ")
            .change(Change::Insert(InsertChange::new("T", "a", 1)));
        assert!(no_author.validate().is_err());

        let no_changes = ChangeSet::new("x", "bob");
        let err = no_changes.validate().unwrap_err();
        assert!(err.to_string().contains("has no changes"));
    }

    #[test]
    fn test_validate_names_bad_change() {
        let cs = ChangeSet::new("x", "bob").change(Change::CreateTable(CreateTableChange::new("")));
        let err = cs.validate().unwrap_err();
        assert!(err.to_string().contains("create-table"));
        assert!(err.to_string().contains("'x'"));
    }

    #[test]
    fn test_try_from_vec() {
        let log = ChangeLog::try_from(vec![change_set("a"), change_set("b")]).unwrap();
        assert!(log.contains("b"));
        assert!(ChangeLog::try_from(vec![change_set("a"), change_set("a")]).is_err());
    }
}
