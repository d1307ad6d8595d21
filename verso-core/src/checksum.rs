//! Changeset fingerprints.
//!
//! A changeset's change list is serialized to JSON with object keys in
//! sorted order, every run of whitespace inside string values is collapsed
//! to a single space, and the result is hashed with MD5. Re-indenting a
//! change log or reordering the keys of an embedded document therefore never
//! changes a fingerprint, while any change in content does.

use md5::{Digest, Md5};
use regex_lite::Regex;
use serde_json::{Map, Value};

use crate::changelog::ChangeSet;
use crate::error::{VersoError, VersoResult};

/// Compute the fingerprint of a changeset.
///
/// The result is 32 lowercase hex characters.
pub fn evaluate(change_set: &ChangeSet) -> VersoResult<String> {
    let whitespace = whitespace()?;
    let value = normalize(serde_json::to_value(&change_set.changes)?, &whitespace);
    let canonical = serde_json::to_string(&value)?;
    Ok(compute_checksum(&canonical))
}

fn compute_checksum(content: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

fn whitespace() -> VersoResult<Regex> {
    Regex::new(r"\s+").map_err(|e| VersoError::serialization(e.to_string()))
}

// Objects are rebuilt key by key so the output order does not depend on
// whether `serde_json` keeps insertion order in this build.
fn normalize(value: Value, whitespace: &Regex) -> Value {
    match value {
        Value::String(s) => Value::String(whitespace.replace_all(&s, " ").into_owned()),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|v| normalize(v, whitespace)).collect())
        }
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (key, item) in entries {
                sorted.insert(key, normalize(item, whitespace));
            }
            Value::Object(sorted)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{Change, InsertChange, QueryChange};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn query_set(query: &str) -> ChangeSet {
        ChangeSet::new("q", "alice").change(Change::Query(QueryChange::new(query)))
    }

    #[test]
    fn test_collapse_whitespace() {
        let re = whitespace().unwrap();
        let collapse = |s: &str| normalize(Value::String(s.to_string()), &re);
        assert_eq!(collapse("a  b\t\n c"), json!("a b c"));
        assert_eq!(collapse("\n\nlead"), json!(" lead"));
        assert_eq!(collapse("plain"), json!("plain"));
    }

    #[test]
    fn test_checksum_format() {
        let checksum = evaluate(&query_set("{}")).unwrap();
        assert_eq!(checksum.len(), 32);
        assert!(checksum.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_known_digest() {
        assert_eq!(compute_checksum(""), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_whitespace_invariance() {
        let a = query_set("{\"find\": \"USERS\",\n    \"filter\": {}}");
        let b = query_set("{\"find\": \"USERS\", \"filter\": {}}");
        assert_eq!(evaluate(&a).unwrap(), evaluate(&b).unwrap());
    }

    #[test]
    fn test_metadata_excluded() {
        let a = query_set("{}");
        let b = query_set("{}").source_file("other.toml");
        let mut c = query_set("{}");
        c.author = "bob".to_string();

        let checksum = evaluate(&a).unwrap();
        assert_eq!(evaluate(&b).unwrap(), checksum);
        assert_eq!(evaluate(&c).unwrap(), checksum);
    }

    #[test]
    fn test_content_change_detected() {
        let a = ChangeSet::new("i", "alice").change(Change::Insert(InsertChange::new("USERS", "name", "Alice")));
        let b = ChangeSet::new("i", "alice").change(Change::Insert(InsertChange::new("USERS", "name", "Alicia")));
        assert_ne!(evaluate(&a).unwrap(), evaluate(&b).unwrap());
    }

    #[test]
    fn test_key_order_ignored() {
        let profile = |value: Value| {
            ChangeSet::new("p", "alice").change(Change::Insert(InsertChange::new("USERS", "profile", value)))
        };
        let a = profile(json!({"zeta": 1, "alpha": 2}));
        let b = profile(json!({"alpha": 2, "zeta": 1}));
        assert_eq!(evaluate(&a).unwrap(), evaluate(&b).unwrap());
    }

    #[test]
    fn test_nested_keys_sorted() {
        let re = whitespace().unwrap();
        let value = normalize(json!({"b": {"y": 1, "x": [{"d": 1, "c": 2}]}, "a": 0}), &re);
        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            r#"{"a":0,"b":{"x":[{"c":2,"d":1}],"y":1}}"#
        );
    }
}
