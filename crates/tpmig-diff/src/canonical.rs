//! Key-sorted JSON serialization used for deep equality.

use serde_json::{Map, Value};

/// Serialize `value` with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Two values are equal when their canonical serializations match byte for byte.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    canonical_json(a) == canonical_json(b)
}

/// [`values_equal`] for bare objects.
pub fn objects_equal(a: &Map<String, Value>, b: &Map<String, Value>) -> bool {
    let mut left = String::new();
    let mut right = String::new();
    write_object(&mut left, a);
    write_object(&mut right, b);
    left == right
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => write_object(out, map),
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn write_object(out: &mut String, map: &Map<String, Value>) {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    out.push('{');
    for (i, key) in keys.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&Value::String(key.clone()).to_string());
        out.push(':');
        write_value(out, &map[key.as_str()]);
    }
    out.push('}');
}
