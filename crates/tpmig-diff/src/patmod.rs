//! Named-entry parsing for patmod files.
//!
//! A patmod file is a JSON array of named objects wrapped in free text with
//! C-style comments. Parsing runs in two passes over the raw text:
//!
//! 1. Clean the text (comments, trailing commas), parse it, and collect every
//!    object that carries a `Name`.
//! 2. Collect the spans of all non-empty `/* ... */` comments in the raw text,
//!    then give each entry the closest comment ending before the first
//!    occurrence of `"Name": "<name>"`.
//!
//! The second pass is positional, not structural. An entry whose name first
//! appears inside another entry, or a comment placed between unrelated
//! entries, can be attributed to the wrong entry.

use std::collections::{BTreeSet, HashSet};
use std::ops::Range;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tpmig_types::NamedEntry;
use tracing::{debug, warn};

use crate::error::Result;
use crate::lenient::{clean, read_text};
use crate::shape::name_of;

/// Object keys that wrap the entry array in some files, in lookup order.
pub const WRAPPER_KEYS: &[&str] = &[
    "Configurations",
    "configurations",
    "entries",
    "Entries",
    "items",
];

/// A non-empty `/* ... */` comment in the raw text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommentSpan {
    pub start: usize,
    pub end: usize,
    /// Comment body with surrounding whitespace trimmed.
    pub text: String,
}

fn comment_body_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)/\*(.*?)\*/").expect("valid comment regex"))
}

/// Read and parse a patmod file.
///
/// Only an unreadable file is an error; text that does not parse yields an
/// empty list.
pub fn load_named_entries(path: &Path) -> Result<Vec<NamedEntry>> {
    let raw = read_text(path)?;
    let entries = parse_named_entries(&raw);
    debug!(path = %path.display(), entries = entries.len(), "parsed patmod entries");
    Ok(entries)
}

/// Parse patmod text into named entries, first occurrence of a name winning.
pub fn parse_named_entries(raw: &str) -> Vec<NamedEntry> {
    let Some(root) = parse_cleaned(raw) else {
        warn!("patmod text did not parse as JSON; treating as empty");
        return Vec::new();
    };

    let spans = comment_spans(raw);
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for item in unwrap_entries(root) {
        let Value::Object(entry) = item else { continue };
        let Some(name) = entry.get("Name").map(name_of) else {
            continue;
        };
        if !seen.insert(name.clone()) {
            continue;
        }
        let leading_comments = leading_comment(raw, &name, &spans)
            .map(|span| vec![span.text.clone()])
            .unwrap_or_default();
        entries.push(NamedEntry {
            name,
            entry,
            leading_comments,
        });
    }

    entries
}

/// Every entry `Name` plus every `ConfigurationElement[].Name` in a patmod
/// file. Unreadable or unparsable files give an empty set.
pub fn patmod_names(path: &Path) -> BTreeSet<String> {
    let raw = match read_text(path) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "cannot collect patmod names");
            return BTreeSet::new();
        }
    };
    let Some(root) = parse_cleaned(&raw) else {
        warn!(path = %path.display(), "patmod text did not parse; no names collected");
        return BTreeSet::new();
    };

    let mut names = BTreeSet::new();
    for item in unwrap_entries(root) {
        let Some(map) = item.as_object() else { continue };
        insert_name(&mut names, map.get("Name"));
        if let Some(Value::Array(elements)) = map.get("ConfigurationElement") {
            for element in elements {
                insert_name(&mut names, element.get("Name"));
            }
        }
    }
    names
}

fn insert_name(names: &mut BTreeSet<String>, value: Option<&Value>) {
    match value {
        None | Some(Value::Null) => {}
        Some(v) => {
            let name = name_of(v);
            if !name.is_empty() {
                names.insert(name);
            }
        }
    }
}

/// Parse cleaned text, retrying as a bare comma-separated object sequence.
fn parse_cleaned(raw: &str) -> Option<Value> {
    let cleaned = clean(raw);
    if let Ok(value) = serde_json::from_str(&cleaned) {
        return Some(value);
    }
    let wrapped = format!("[{}]", cleaned.trim().trim_end_matches(','));
    serde_json::from_str(&wrapped).ok()
}

/// Descend into a wrapper key, or treat a lone object as a one-element list.
fn unwrap_entries(root: Value) -> Vec<Value> {
    match root {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            let wrapper = WRAPPER_KEYS
                .iter()
                .find(|key| matches!(map.get(**key), Some(Value::Array(_))));
            match wrapper.and_then(|key| map.remove(*key)) {
                Some(Value::Array(items)) => items,
                _ => vec![Value::Object(map)],
            }
        }
        _ => Vec::new(),
    }
}

/// All non-empty block comments in `raw`, in textual order.
pub fn comment_spans(raw: &str) -> Vec<CommentSpan> {
    comment_body_re()
        .captures_iter(raw)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let text = caps.get(1)?.as_str().trim();
            (!text.is_empty()).then(|| CommentSpan {
                start: whole.start(),
                end: whole.end(),
                text: text.to_string(),
            })
        })
        .collect()
}

/// The comment ending closest before the first `"Name": "<name>"` marker.
pub fn leading_comment<'a>(
    raw: &str,
    name: &str,
    spans: &'a [CommentSpan],
) -> Option<&'a CommentSpan> {
    let marker = format!("\"Name\": \"{name}\"");
    let pos = raw.find(&marker)?;
    spans
        .iter()
        .filter(|span| span.end <= pos)
        .max_by_key(|span| span.end)
}

/// Byte range of the object whose `Name` is `name`, extended backwards over
/// any block comments that directly precede it.
///
/// The first `"Name" : "<name>"` occurrence anchors the search; the
/// enclosing braces are found by depth counting outside string literals and
/// comments.
pub fn locate_entry_block(raw: &str, name: &str) -> Option<Range<usize>> {
    let marker = Regex::new(&format!(r#""Name"\s*:\s*"{}""#, regex::escape(name))).ok()?;
    let anchor = marker.find(raw)?.start();
    let open = enclosing_open_brace(raw, anchor)?;
    let close = matching_close_brace(raw, open)?;
    Some(extend_over_comments(raw, open)..close + 1)
}

fn enclosing_open_brace(raw: &str, before: usize) -> Option<usize> {
    let mut open = Vec::new();
    scan_braces(&raw.as_bytes()[..before], 0, |i, b| {
        if b == b'{' {
            open.push(i);
        } else {
            open.pop();
        }
        false
    });
    open.pop()
}

fn matching_close_brace(raw: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut close = None;
    scan_braces(raw.as_bytes(), open, |i, b| {
        if b == b'{' {
            depth += 1;
            return false;
        }
        depth = depth.saturating_sub(1);
        if depth == 0 {
            close = Some(i);
        }
        close.is_some()
    });
    close
}

/// Visit every `{` and `}` from `start` on that sits outside string literals
/// and comments, until `visit` returns `true`.
fn scan_braces(bytes: &[u8], start: usize, mut visit: impl FnMut(usize, u8) -> bool) {
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = bytes[i + 2..]
                    .windows(2)
                    .position(|w| w == b"*/")
                    .map_or(bytes.len(), |p| i + 2 + p + 1);
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                i = bytes[i..]
                    .iter()
                    .position(|&c| c == b'\n')
                    .map_or(bytes.len(), |p| i + p);
            }
            b @ (b'{' | b'}') => {
                if visit(i, b) {
                    return;
                }
            }
            _ => {}
        }
        i += 1;
    }
}

fn extend_over_comments(raw: &str, mut start: usize) -> usize {
    loop {
        let before = raw[..start].trim_end();
        if !before.ends_with("*/") {
            return start;
        }
        match before.rfind("/*") {
            Some(open) => start = open,
            None => return start,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PATMOD: &str = r#"
/* Core vmin overrides */
[
    /* CFC search */
    {
        "Name": "CFC_VMIN",
        "ConfigurationElement": [ { "Name": "cfc_elem", "Value": "0x1" } ],
        "Url": "http://docs.example.com/cfc", // owner: pm
    },
    /**/
    {
        "Name": "IA_VMIN",
        "Value": 3,
    },
    /* duplicate, ignored */
    { "Name": "CFC_VMIN", "Value": 99 }
]
"#;

    #[test]
    fn parses_named_entries_with_leading_comments() {
        let entries = parse_named_entries(PATMOD);
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].name, "CFC_VMIN");
        assert_eq!(entries[0].leading_comments, vec!["CFC search".to_string()]);
        assert_eq!(entries[0].entry["Url"], json!("http://docs.example.com/cfc"));

        // The empty `/**/` is skipped, so the closest non-empty comment wins.
        assert_eq!(entries[1].name, "IA_VMIN");
        assert_eq!(entries[1].leading_comments, vec!["CFC search".to_string()]);
    }

    #[test]
    fn first_occurrence_wins() {
        let entries = parse_named_entries(PATMOD);
        let cfc = entries.iter().find(|e| e.name == "CFC_VMIN").unwrap();
        assert!(cfc.entry.get("Value").is_none());
    }

    #[test]
    fn bare_object_sequence_is_wrapped() {
        let entries = parse_named_entries("{\"Name\": \"A\"},\n{\"Name\": \"B\"},\n");
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn wrapper_key_is_unwrapped() {
        let entries = parse_named_entries(r#"{"entries": [{"Name": "A"}, {"NoName": 1}]}"#);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "A");
    }

    #[test]
    fn single_object_is_one_entry() {
        let entries = parse_named_entries(r#"{"Name": "Solo", "x": 1}"#);
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn garbage_is_empty_not_error() {
        assert!(parse_named_entries("this is { not json").is_empty());
    }

    #[test]
    fn collects_entry_and_element_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.patmod.json");
        std::fs::write(&path, PATMOD).unwrap();
        let names = patmod_names(&path);
        assert!(names.contains("CFC_VMIN"));
        assert!(names.contains("IA_VMIN"));
        assert!(names.contains("cfc_elem"));
    }

    #[test]
    fn names_of_missing_file_is_empty() {
        assert!(patmod_names(Path::new("/nonexistent/x.patmod.json")).is_empty());
    }

    #[test]
    fn locates_block_with_its_comment() {
        let range = locate_entry_block(PATMOD, "CFC_VMIN").unwrap();
        let block = &PATMOD[range];
        assert!(block.starts_with("/* CFC search */"));
        assert!(block.ends_with('}'));
        assert!(block.contains("cfc_elem"));
        assert!(!block.contains("IA_VMIN"));
    }

    #[test]
    fn locates_block_with_braces_inside_strings() {
        let raw = r#"[ {"Name": "A", "Expr": "x}y"}, {"Name": "B"} ]"#;
        let block = &raw[locate_entry_block(raw, "A").unwrap()];
        assert_eq!(block, r#"{"Name": "A", "Expr": "x}y"}"#);
    }

    #[test]
    fn braces_in_strings_before_the_name_are_ignored() {
        let raw = r#"[ {"Note": "}", "Expr": "{{", "Name": "A"}, {"Name": "B"} ]"#;
        let block = &raw[locate_entry_block(raw, "A").unwrap()];
        assert_eq!(block, r#"{"Note": "}", "Expr": "{{", "Name": "A"}"#);
    }

    #[test]
    fn braces_in_comments_are_ignored() {
        let raw = "[\n  /* old: { */\n  {\n    // }\n    \"Name\": \"A\"\n  }\n]";
        let block = &raw[locate_entry_block(raw, "A").unwrap()];
        assert_eq!(block, "/* old: { */\n  {\n    // }\n    \"Name\": \"A\"\n  }");
    }

    #[test]
    fn missing_block_is_none() {
        assert!(locate_entry_block(PATMOD, "NOPE").is_none());
    }
}
