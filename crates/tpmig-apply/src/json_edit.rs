//! In-memory edits on parsed JSON documents.

use serde_json::{Map, Value};

fn has_name(item: &Value, name: &str) -> bool {
    item.get("Name").and_then(Value::as_str) == Some(name)
}

/// Set `key` to `value` in a mapping root, or merge `value` into the first
/// element named `key` of a list root.
///
/// In a list, an object `value` is merged field by field; any other value is
/// stored under `"value"`. A missing element is appended (`value` itself if
/// it is an object, else `{"Name": key, "value": value}`). Returns `false`
/// and leaves `root` alone when it is neither a mapping nor a list.
pub fn upsert_keyed(root: &mut Value, key: &str, value: Value) -> bool {
    match root {
        Value::Object(map) => {
            map.insert(key.to_string(), value);
            true
        }
        Value::Array(items) => {
            match items.iter_mut().find(|item| item.is_object() && has_name(item, key)) {
                Some(Value::Object(existing)) => match value {
                    Value::Object(fields) => existing.extend(fields),
                    other => {
                        existing.insert("value".to_string(), other);
                    }
                },
                _ => items.push(match value {
                    Value::Object(fields) => Value::Object(fields),
                    other => {
                        let mut element = Map::new();
                        element.insert("Name".to_string(), Value::String(key.to_string()));
                        element.insert("value".to_string(), other);
                        Value::Object(element)
                    }
                }),
            }
            true
        }
        _ => false,
    }
}

/// First object named `name` in a list root, or the root itself when it is a
/// single object with that name.
pub fn find_named<'a>(root: &'a Value, name: &str) -> Option<&'a Value> {
    match root {
        Value::Array(items) => items.iter().find(|item| has_name(item, name)),
        single => has_name(single, name).then_some(single),
    }
}

/// Drop every element named after `entry` from `root` (a list, or a single
/// value treated as a one-element list) and append `entry`.
pub fn replace_named(root: Value, name: &str, entry: Value) -> Value {
    let mut items = match root {
        Value::Array(items) => items,
        single => vec![single],
    };
    items.retain(|item| !has_name(item, name));
    items.push(entry);
    Value::Array(items)
}
