//! Tolerant loading of JSON-with-comments TP files.
//!
//! TP configuration files are nominally JSON but routinely carry `/* */` and
//! `//` comments and trailing commas. Strict parsing is tried first; only when
//! it fails is the text cleaned and parsed again.
//!
//! The line-comment guard only looks at the single character before `//`: a
//! `//` preceded by `:` (as in `http://`) is kept, any other `//` inside a
//! string value is still treated as a comment start.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{DiffError, Result};

fn block_comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid block comment regex"))
}

fn trailing_comma_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r",\s*([}\]])").expect("valid trailing comma regex"))
}

/// Read a file as text, replacing invalid UTF-8 sequences.
pub fn read_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|source| DiffError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Load a JSON file, falling back to comment and trailing-comma cleanup.
pub fn load_lenient(path: &Path) -> Result<Value> {
    let raw = read_text(path)?;
    parse_lenient(&raw).map_err(|source| DiffError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse text strictly, then once more after [`clean`] if that fails.
pub fn parse_lenient(raw: &str) -> std::result::Result<Value, serde_json::Error> {
    match serde_json::from_str(raw) {
        Ok(value) => Ok(value),
        Err(_) => serde_json::from_str(&clean(raw)),
    }
}

/// Strip comments, then trailing commas.
pub fn clean(raw: &str) -> String {
    strip_trailing_commas(&strip_comments(raw))
}

/// Replace `/* ... */` blocks and `//` line comments with a single space.
pub fn strip_comments(raw: &str) -> String {
    let without_blocks = block_comment_re().replace_all(raw, " ");
    strip_line_comments(&without_blocks)
}

/// Drop a comma that is followed only by whitespace and a closing `]` or `}`.
pub fn strip_trailing_commas(text: &str) -> String {
    trailing_comma_re().replace_all(text, "$1").into_owned()
}

fn strip_line_comments(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut copied_from = 0;
    let mut i = 0;

    while i + 1 < bytes.len() {
        let starts_comment =
            bytes[i] == b'/' && bytes[i + 1] == b'/' && (i == 0 || bytes[i - 1] != b':');
        if starts_comment {
            out.push_str(&text[copied_from..i]);
            out.push(' ');
            let end = text[i..].find('\n').map_or(text.len(), |offset| i + offset);
            i = end;
            copied_from = end;
        } else {
            i += 1;
        }
    }

    out.push_str(&text[copied_from..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strict_json_is_untouched() {
        let value = parse_lenient(r#"{"url": "a//b"}"#).unwrap();
        assert_eq!(value, json!({"url": "a//b"}));
    }

    #[test]
    fn trailing_commas_parse_like_clean_json() {
        let sloppy = parse_lenient("{\"a\": [1, 2, 3,], \"b\": {\"c\": 1,},\n}").unwrap();
        let clean = parse_lenient(r#"{"a": [1, 2, 3], "b": {"c": 1}}"#).unwrap();
        assert_eq!(sloppy, clean);
    }

    #[test]
    fn comments_are_stripped() {
        let text = "/* header */\n{\n  // a note\n  \"a\": 1 /* inline */\n}";
        assert_eq!(parse_lenient(text).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn url_after_colon_survives_comment_stripping() {
        let text = "// list\n{\"homepage\": \"http://example.com\", // trailing\n \"n\": 2,}";
        let value = parse_lenient(text).unwrap();
        assert_eq!(value["homepage"], json!("http://example.com"));
        assert_eq!(value["n"], json!(2));
    }

    #[test]
    fn line_comment_runs_to_end_of_line_only() {
        assert_eq!(strip_comments("a // x\nb"), "a  \nb");
    }

    #[test]
    fn block_comment_spans_lines() {
        assert_eq!(strip_comments("a/* x\n y */b"), "a b");
    }

    #[test]
    fn load_reports_path_on_parse_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = load_lenient(&path).unwrap_err();
        assert!(matches!(err, DiffError::Parse { .. }));
        assert!(err.to_string().contains("bad.json"));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_lenient(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, DiffError::Io { .. }));
    }
}
