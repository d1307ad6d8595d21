//! XML documents as JSON maps.
//!
//! Child elements become keys of their parent (repeated names collect into an
//! array), attributes become keys of their element and leaf text is typed as
//! a boolean, integer, float or string. The root element itself is dropped.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use serde_json::{Map, Number, Value};

use crate::error::{VersoError, VersoResult};

struct Frame {
    name: String,
    fields: Map<String, Value>,
    text: String,
}

impl Frame {
    fn open(start: &BytesStart<'_>) -> VersoResult<Self> {
        let mut fields = Map::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| VersoError::configuration(format!("Invalid XML attribute: {}", e)))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value().map_err(invalid)?;
            fields.insert(key, typed(&value));
        }
        Ok(Self {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            fields,
            text: String::new(),
        })
    }

    fn close(self) -> (String, Value) {
        let text = self.text.trim();
        let value = if self.fields.is_empty() {
            typed(text)
        } else {
            let mut fields = self.fields;
            if !text.is_empty() {
                fields.insert("#text".to_string(), typed(text));
            }
            Value::Object(fields)
        };
        (self.name, value)
    }
}

fn invalid(err: quick_xml::Error) -> VersoError {
    VersoError::configuration(format!("Invalid XML: {}", err))
}

fn typed(text: &str) -> Value {
    match text {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(i) = text.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Some(n) = text.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(n);
    }
    Value::String(text.to_string())
}

fn attach(fields: &mut Map<String, Value>, name: String, value: Value) {
    match fields.get_mut(&name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            fields.insert(name, value);
        }
    }
}

/// Convert an XML document to the map of its root element's children.
pub fn to_json(xml: &str) -> VersoResult<Map<String, Value>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<Value> = None;

    loop {
        match reader.read_event().map_err(invalid)? {
            Event::Start(start) => stack.push(Frame::open(&start)?),
            Event::Empty(start) => {
                let (name, value) = Frame::open(&start)?.close();
                match stack.last_mut() {
                    Some(parent) => attach(&mut parent.fields, name, value),
                    None => root = Some(value),
                }
            }
            Event::Text(text) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&text.unescape().map_err(invalid)?);
                }
            }
            Event::CData(data) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::End(_) => {
                let Some(frame) = stack.pop() else {
                    return Err(VersoError::configuration("Invalid XML: unexpected closing tag"));
                };
                let (name, value) = frame.close();
                match stack.last_mut() {
                    Some(parent) => attach(&mut parent.fields, name, value),
                    None => root = Some(value),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(VersoError::configuration("Invalid XML: unclosed element"));
    }
    match root {
        Some(Value::Object(fields)) => Ok(fields),
        Some(_) => Err(VersoError::configuration(
            "XML document root must contain child elements",
        )),
        None => Err(VersoError::configuration("XML document is empty")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_nested_document() {
        let xml = r#"
            <user>
                <name>Alice</name>
                <age>30</age>
                <active>true</active>
                <address city="Oslo"><zip>0150</zip></address>
            </user>
        "#;
        let map = to_json(xml).unwrap();
        assert_eq!(
            Value::Object(map),
            json!({
                "name": "Alice",
                "age": 30,
                "active": true,
                "address": {"city": "Oslo", "zip": 150}
            })
        );
    }

    #[test]
    fn test_repeated_children_become_array() {
        let map = to_json("<r><tag>a</tag><tag>b</tag><tag>c</tag></r>").unwrap();
        assert_eq!(map["tag"], json!(["a", "b", "c"]));
    }

    #[test]
    fn test_escaped_text() {
        let map = to_json("<r><expr>a &lt; b</expr><raw><![CDATA[x & y]]></raw></r>").unwrap();
        assert_eq!(map["expr"], json!("a < b"));
        assert_eq!(map["raw"], json!("x & y"));
    }

    #[test]
    fn test_leaf_root_rejected() {
        assert!(to_json("<value>1</value>").is_err());
        assert!(to_json("").is_err());
    }
}
