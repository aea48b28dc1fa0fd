//! Pattern search path comparison of two env files.
//!
//! An env file assigns its pattern path list as a run of quoted segments,
//! possibly joined with `+` and interleaved with `//` comments:
//!
//! ```text
//! HDST_PAT_PATH = "~pats/core;~pats/uncore;"
//!               + "\\server\share\pats;"   // shared
//!               + "$TORCH_AUTO_PAT_PATH;";
//! ```
//!
//! The assignment ends at the first `;` followed by a line break or the end
//! of the file. Each quoted segment may hold several `;`-separated paths.

use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tpmig_types::{EnvDiff, PathEntry, PathKind};
use tracing::{debug, warn};

use crate::error::Result;
use crate::lenient::read_text;

fn line_comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"//[^\n]*").expect("valid line comment regex"))
}

fn quoted_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""([^"]*)""#).expect("valid quoted segment regex"))
}

fn drive_letter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z]:\\").expect("valid drive letter regex"))
}

pub fn classify_path(path: &str) -> PathKind {
    if path.starts_with('~') {
        PathKind::Internal
    } else if path.starts_with(r"\\") {
        PathKind::ExternalUnc
    } else if drive_letter_re().is_match(path) {
        PathKind::Local
    } else if path.starts_with('$') {
        PathKind::Var
    } else {
        PathKind::Other
    }
}

/// Extract the paths assigned to `path_block`, in file order.
///
/// A file without the assignment yields an empty list.
pub fn parse_path_list(content: &str, path_block: &str) -> Result<Vec<String>> {
    let assignment = Regex::new(&format!(
        r"{}\s*=\s*([\s\S]+?);(?:\s*\n|\s*$)",
        regex::escape(path_block)
    ))?;
    let Some(caps) = assignment.captures(content) else {
        return Ok(Vec::new());
    };

    let block = line_comment_re().replace_all(&caps[1], "");
    let paths = quoted_re()
        .captures_iter(&block)
        .flat_map(|segment| {
            segment[1]
                .split(';')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(String::from)
                .collect::<Vec<_>>()
        })
        .collect();
    Ok(paths)
}

pub fn load_path_list(path: &Path, path_block: &str) -> Result<Vec<String>> {
    parse_path_list(&read_text(path)?, path_block)
}

/// Compare the path lists of two env files.
///
/// Every list keeps the order of the file it comes from; `in_both` follows
/// the reference order. A file that cannot be read is recorded on its side
/// and compared as an empty list.
pub fn compare_env(reference: &Path, new: &Path, path_block: &str) -> EnvDiff {
    let mut result = EnvDiff {
        reference_path: reference.to_path_buf(),
        new_path: new.to_path_buf(),
        ..EnvDiff::default()
    };

    let reference_paths = load_path_list(reference, path_block).unwrap_or_else(|e| {
        warn!(error = %e, "reference env file not loaded");
        result.load_error_reference = Some(e.to_string());
        Vec::new()
    });
    let new_paths = load_path_list(new, path_block).unwrap_or_else(|e| {
        warn!(error = %e, "new env file not loaded");
        result.load_error_new = Some(e.to_string());
        Vec::new()
    });

    let in_reference: HashSet<&str> = reference_paths.iter().map(String::as_str).collect();
    let in_new: HashSet<&str> = new_paths.iter().map(String::as_str).collect();

    result.only_in_reference = entries(&reference_paths, |p| !in_new.contains(p));
    result.only_in_new = entries(&new_paths, |p| !in_reference.contains(p));
    result.in_both = entries(&reference_paths, |p| in_new.contains(p));
    result.reference_paths = entries(&reference_paths, |_| true);
    result.new_paths = entries(&new_paths, |_| true);

    debug!(
        only_in_reference = result.only_in_reference.len(),
        only_in_new = result.only_in_new.len(),
        in_both = result.in_both.len(),
        "env comparison done"
    );
    result
}

/// Classified entries for the paths that pass `keep`, first occurrence only.
fn entries(paths: &[String], keep: impl Fn(&str) -> bool) -> Vec<PathEntry> {
    let mut seen = HashSet::new();
    paths
        .iter()
        .filter(|p| keep(p.as_str()) && seen.insert(p.as_str()))
        .map(|p| PathEntry {
            path: p.clone(),
            kind: classify_path(p),
        })
        .collect()
}
