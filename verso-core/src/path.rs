//! Selecting values out of command results by `/`-separated path.

use serde_json::Value;

/// Select the value(s) at `path` in `value`.
///
/// Arrays met along the way are flattened, so `cursor/firstBatch/_id`
/// reaches the `_id` of every document in the batch. With `multi` set, every
/// match is returned as an array; otherwise the first match, or `null` when
/// nothing matched.
pub fn select(value: &Value, path: &str, multi: bool) -> Value {
    let mut current = vec![value];
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        current = current
            .into_iter()
            .flat_map(|v| step(v, segment))
            .collect();
    }

    let mut matches: Vec<Value> = Vec::new();
    for v in current {
        match v {
            Value::Array(items) if !path.is_empty() => matches.extend(items.iter().cloned()),
            other => matches.push(other.clone()),
        }
    }

    if multi {
        Value::Array(matches)
    } else {
        matches.into_iter().next().unwrap_or(Value::Null)
    }
}

fn step<'a>(value: &'a Value, segment: &str) -> Vec<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment).into_iter().collect(),
        Value::Array(items) => items.iter().flat_map(|item| step(item, segment)).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn find_result() -> Value {
        json!({
            "cursor": {
                "firstBatch": [
                    {"_id": "a1", "name": "Alice"},
                    {"_id": "b2", "name": "Bob"}
                ]
            },
            "ok": 1
        })
    }

    #[test]
    fn test_single_value() {
        assert_eq!(select(&find_result(), "cursor/firstBatch/_id", false), json!("a1"));
    }

    #[test]
    fn test_multi_valued() {
        assert_eq!(
            select(&find_result(), "cursor/firstBatch/name", true),
            json!(["Alice", "Bob"])
        );
    }

    #[test]
    fn test_array_leaf_is_flattened() {
        let docs = select(&find_result(), "cursor/firstBatch", true);
        assert_eq!(docs.as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_no_match() {
        assert_eq!(select(&find_result(), "cursor/nextBatch", false), Value::Null);
        assert_eq!(select(&find_result(), "cursor/nextBatch", true), json!([]));
    }
}
