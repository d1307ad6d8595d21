//! `${path}` placeholder rendering.
//!
//! Placeholders are replaced by the value found at a dotted path in a JSON
//! context. Strings are inserted as-is, every other value as JSON text, so
//! `"${name}"` and `${count}` both produce valid JSON in a command template.

use regex_lite::Regex;
use serde_json::Value;

use crate::error::{VersoError, VersoResult};

/// Render a template against a context.
pub fn render(template: &str, context: &Value) -> VersoResult<String> {
    let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| VersoError::resource(e.to_string()))?;
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for cap in re.captures_iter(template) {
        let (Some(full), Some(name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        push_literal(&mut out, &template[last..full.start()], template)?;

        let path = name.as_str().trim();
        let value = lookup(context, path).ok_or_else(|| {
            VersoError::resource(format!("Unresolved template placeholder '${{{}}}'", path))
        })?;
        match value {
            Value::String(s) => out.push_str(s),
            other => out.push_str(&other.to_string()),
        }
        last = full.end();
    }

    push_literal(&mut out, &template[last..], template)?;
    Ok(out)
}

// Text between placeholders must not open another one.
fn push_literal(out: &mut String, text: &str, template: &str) -> VersoResult<()> {
    if text.contains("${") {
        return Err(VersoError::resource(format!(
            "Malformed placeholder in template: {}",
            template
        )));
    }
    out.push_str(text);
    Ok(())
}

/// Find the value at a dotted path. Numeric segments index into arrays.
pub fn lookup<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    path.split('.').try_fold(context, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_string_and_json_values() {
        let ctx = json!({"_id": "abc", "count": 3, "tags": ["a", "b"]});
        let out = render(r#"{"q": {"_id": "${_id}"}, "n": ${count}, "t": ${tags}}"#, &ctx).unwrap();
        assert_eq!(out, r#"{"q": {"_id": "abc"}, "n": 3, "t": ["a","b"]}"#);
    }

    #[test]
    fn test_render_nested_path() {
        let ctx = json!({"change": {"query": "x", "items": [{"id": 7}]}});
        assert_eq!(render("${change.items.0.id}", &ctx).unwrap(), "7");
        assert_eq!(render("${ change.query }", &ctx).unwrap(), "x");
    }

    #[test]
    fn test_no_placeholders() {
        assert_eq!(render("plain text {}", &json!({})).unwrap(), "plain text {}");
    }

    #[test]
    fn test_missing_path_is_resource_error() {
        let err = render("${missing}", &json!({})).unwrap_err();
        assert!(matches!(err, VersoError::Resource(_)));
        assert!(err.to_string().contains("${missing}"));
    }

    #[test]
    fn test_unterminated_placeholder() {
        let err = render("abc ${oops", &json!({"oops": 1})).unwrap_err();
        assert!(err.to_string().contains("Malformed placeholder"));
        assert!(render("${oops} then ${", &json!({"oops": 1})).is_err());
        assert!(render("empty ${}", &json!({})).is_err());
    }

    #[test]
    fn test_repeated_placeholder() {
        let ctx = json!({"name": "Alice"});
        assert_eq!(render("${name}/${name}", &ctx).unwrap(), "Alice/Alice");
    }
}
