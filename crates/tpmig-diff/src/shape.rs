//! Normalization of parsed documents into name-keyed maps.
//!
//! A parsed root is classified once into a [`ConfigShape`]; each comparison
//! then asks for the keyed view it needs.

use serde_json::{Map, Value};

/// Key used for a document whose root is neither an object nor an array.
pub const ROOT_KEY: &str = "__root__";

/// The three root shapes a TP JSON file can take.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigShape {
    /// `{ "key": value, ... }`
    FlatMap(Map<String, Value>),
    /// `[ {"Name": ..., ...}, ... ]`, not necessarily all named.
    NamedList(Vec<Value>),
    /// A bare string, number, boolean or null.
    Scalar(Value),
}

impl ConfigShape {
    pub fn classify(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::FlatMap(map),
            Value::Array(items) => Self::NamedList(items),
            scalar => Self::Scalar(scalar),
        }
    }

    /// Flat view: list elements are keyed by `Name`, or by index when they
    /// have none; a scalar becomes the single [`ROOT_KEY`] entry. Duplicate
    /// keys keep the last value.
    pub fn into_flat_map(self) -> Map<String, Value> {
        match self {
            Self::FlatMap(map) => map,
            Self::NamedList(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| {
                    let key = item.get("Name").map_or_else(|| i.to_string(), name_of);
                    (key, item)
                })
                .collect(),
            Self::Scalar(value) => {
                let mut map = Map::new();
                map.insert(ROOT_KEY.to_string(), value);
                map
            }
        }
    }

    /// Name-keyed view: only list elements that are objects with a `Name`
    /// survive; a scalar yields nothing. Duplicate names keep the last value.
    pub fn into_name_keyed(self) -> Map<String, Value> {
        match self {
            Self::FlatMap(map) => map,
            Self::NamedList(items) => items
                .into_iter()
                .filter_map(|item| {
                    let name = item.as_object()?.get("Name").map(name_of)?;
                    Some((name, item))
                })
                .collect(),
            Self::Scalar(_) => Map::new(),
        }
    }
}

/// Render a `Name` value as a key: strings verbatim, anything else as JSON.
pub fn name_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Returns `true` if `value` is an object carrying a `Name` field.
pub fn is_named_object(value: &Value) -> bool {
    value.as_object().is_some_and(|map| map.contains_key("Name"))
}
