//! Recursive JSON tree diff.
//!
//! Objects are compared key by key. Arrays are compared element by element
//! only when every element on both sides is an object with a `Name`; they
//! are then matched by name. Any other differing array, type mismatch, or
//! unequal leaf produces a single `changed` record for the whole value.
//! Numeric leaves compare by value, so `1` and `1.0` are equal; whole arrays
//! compare by their canonical text first.
//!
//! Paths join object keys with `.` and name-matched array elements with
//! `[Name=<name>]`, e.g. `Items[Name=X].v`.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};
use tpmig_types::TreeChange;

use crate::canonical::values_equal;
use crate::shape::{is_named_object, name_of};

/// Diff two JSON trees into a flat, ordered list of changes.
pub fn diff_json_trees(reference: &Value, new: &Value) -> Vec<TreeChange> {
    let mut changes = Vec::new();
    walk(reference, new, "", &mut changes);
    changes
}

fn walk(reference: &Value, new: &Value, path: &str, out: &mut Vec<TreeChange>) {
    match (reference, new) {
        (Value::Object(a), Value::Object(b)) => diff_objects(a, b, path, out),
        (Value::Array(a), Value::Array(b)) => {
            if values_equal(reference, new) {
                return;
            }
            if a.iter().chain(b.iter()).all(is_named_object) {
                diff_named_arrays(a, b, path, out);
            } else {
                out.push(changed(path, reference, new));
            }
        }
        _ => {
            if !leaves_equal(reference, new) {
                out.push(changed(path, reference, new));
            }
        }
    }
}

fn leaves_equal(reference: &Value, new: &Value) -> bool {
    match (reference, new) {
        (Value::Number(a), Value::Number(b)) => a == b || a.as_f64() == b.as_f64(),
        _ => values_equal(reference, new),
    }
}

fn diff_objects(
    a: &Map<String, Value>,
    b: &Map<String, Value>,
    path: &str,
    out: &mut Vec<TreeChange>,
) {
    let keys: BTreeSet<&String> = a.keys().chain(b.keys()).collect();
    for key in keys {
        let child = if path.is_empty() {
            key.clone()
        } else {
            format!("{path}.{key}")
        };
        compare_child(a.get(key.as_str()), b.get(key.as_str()), child, out);
    }
}

fn diff_named_arrays(a: &[Value], b: &[Value], path: &str, out: &mut Vec<TreeChange>) {
    let by_name = |items: &[Value]| -> BTreeMap<String, Value> {
        items
            .iter()
            .filter_map(|item| Some((name_of(item.get("Name")?), item.clone())))
            .collect()
    };
    let a = by_name(a);
    let b = by_name(b);

    let names: BTreeSet<&String> = a.keys().chain(b.keys()).collect();
    for name in names {
        compare_child(a.get(name), b.get(name), format!("{path}[Name={name}]"), out);
    }
}

fn compare_child(
    reference: Option<&Value>,
    new: Option<&Value>,
    path: String,
    out: &mut Vec<TreeChange>,
) {
    match (reference, new) {
        (None, Some(new_value)) => out.push(TreeChange::Added {
            path,
            new_value: new_value.clone(),
        }),
        (Some(ref_value), None) => out.push(TreeChange::Removed {
            path,
            ref_value: ref_value.clone(),
        }),
        (Some(r), Some(n)) => walk(r, n, &path, out),
        (None, None) => {}
    }
}

fn changed(path: &str, reference: &Value, new: &Value) -> TreeChange {
    TreeChange::Changed {
        path: path.to_string(),
        ref_value: reference.clone(),
        new_value: new.clone(),
    }
}
