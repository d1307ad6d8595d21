//! Conversions between change log JSON and BSON documents.

use bson::{Bson, Document, doc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use verso_core::{IndexColumn, Options};

use crate::error::{MongoError, MongoResult};

/// Convert a JSON value (extended JSON allowed) to BSON.
pub fn json_to_bson(value: &Value) -> MongoResult<Bson> {
    Ok(Bson::try_from(value.clone())?)
}

/// Convert a JSON object to a BSON document.
pub fn json_to_document(value: &Value) -> MongoResult<Document> {
    match json_to_bson(value)? {
        Bson::Document(doc) => Ok(doc),
        other => Err(MongoError::query(format!("expected a document, found {}", other))),
    }
}

/// Parse command text as an extended JSON document.
pub fn parse_command(text: &str) -> MongoResult<Document> {
    let value: Value = serde_json::from_str(text)?;
    json_to_document(&value)
}

/// Convert a BSON document to JSON, rendering object ids as hex strings.
pub fn document_to_json(doc: Document) -> Value {
    plain_object_ids(Bson::Document(doc).into_relaxed_extjson())
}

/// Replace every `{"$oid": ".."}` with its hex string.
pub fn plain_object_ids(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(hex)) = map.get("$oid") {
                    return Value::String(hex.clone());
                }
            }
            Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, plain_object_ids(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(plain_object_ids).collect()),
        other => other,
    }
}

/// Build a document from named JSON values.
pub fn fields_document(fields: &Map<String, Value>) -> MongoResult<Document> {
    let mut doc = Document::new();
    for (name, value) in fields {
        doc.insert(name.clone(), json_to_bson(value)?);
    }
    Ok(doc)
}

/// Build an equality filter. Several conditions are combined with `$and`.
pub fn filter_document(conditions: &Map<String, Value>) -> MongoResult<Document> {
    match conditions.len() {
        0 => Ok(Document::new()),
        1 => fields_document(conditions),
        _ => {
            let clauses = conditions
                .iter()
                .map(|(name, value)| {
                    let mut clause = Document::new();
                    clause.insert(name.clone(), json_to_bson(value)?);
                    Ok(Bson::Document(clause))
                })
                .collect::<MongoResult<Vec<Bson>>>()?;
            Ok(doc! { "$and": clauses })
        }
    }
}

/// Build a `$set` update.
pub fn set_document(columns: &Map<String, Value>) -> MongoResult<Document> {
    let fields = fields_document(columns)?;
    Ok(doc! { "$set": fields })
}

/// Build index keys: `1` ascending, `-1` descending, `"text"` for text indexes.
pub fn index_keys(columns: &[IndexColumn]) -> Document {
    let mut keys = Document::new();
    for column in columns {
        let direction = if column.text {
            Bson::String("text".to_string())
        } else if column.ascending {
            Bson::Int32(1)
        } else {
            Bson::Int32(-1)
        };
        keys.insert(column.name.clone(), direction);
    }
    keys
}

/// Deserialize a change's option bag into a driver option struct.
pub fn options<T>(bag: &Options) -> MongoResult<T>
where
    T: DeserializeOwned + Default,
{
    if bag.is_empty() {
        return Ok(T::default());
    }
    let map: Map<String, Value> = bag.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    let doc = fields_document(&map)?;
    bson::from_document(doc).map_err(|e| MongoError::config(format!("invalid options: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::options::{IndexOptions, UpdateOptions};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_extended_json() {
        let doc = parse_command(r#"{"find": "USERS", "filter": {"born": {"$date": "1990-04-01T00:00:00Z"}}}"#).unwrap();
        let filter = doc.get_document("filter").unwrap();
        assert!(matches!(filter.get("born"), Some(Bson::DateTime(_))));
    }

    #[test]
    fn test_object_ids_become_strings() {
        let oid = bson::oid::ObjectId::new();
        let value = document_to_json(doc! { "_id": oid, "tags": [{ "ref": oid }] });
        assert_eq!(value["_id"], json!(oid.to_hex()));
        assert_eq!(value["tags"][0]["ref"], json!(oid.to_hex()));
    }

    #[test]
    fn test_filter_single_and_multiple() {
        let single = filter_document(&map(json!({"name": "Alice"}))).unwrap();
        assert_eq!(single, doc! { "name": "Alice" });

        let multiple = filter_document(&map(json!({"a": 1, "b": "x"}))).unwrap();
        assert_eq!(multiple, doc! { "$and": [{ "a": 1 }, { "b": "x" }] });

        assert!(filter_document(&Map::new()).unwrap().is_empty());
    }

    #[test]
    fn test_set_document() {
        let set = set_document(&map(json!({"active": true}))).unwrap();
        assert_eq!(set, doc! { "$set": { "active": true } });
    }

    #[test]
    fn test_index_keys() {
        let columns = vec![
            IndexColumn::ascending("a"),
            IndexColumn::descending("b"),
            IndexColumn::text("c"),
        ];
        assert_eq!(index_keys(&columns), doc! { "a": 1, "b": -1, "c": "text" });
    }

    #[test]
    fn test_options_bag() {
        let mut bag = Options::new();
        bag.insert("sparse".to_string(), json!(true));
        let index: IndexOptions = options(&bag).unwrap();
        assert_eq!(index.sparse, Some(true));

        let update: UpdateOptions = options(&Options::new()).unwrap();
        assert!(update.upsert.is_none());
    }
}
