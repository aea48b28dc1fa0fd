//! MTPL instance comparison.
//!
//! An MTPL file declares test instances as brace-delimited blocks:
//!
//! ```text
//! Test iCTC SCN_CORE_VMIN
//! {
//!     Timeout = 5;
//!     # Retries = 2;
//!     Patlist = "PL_CORE";
//! }
//!
//! MultiTrialTest SCN_MT_1
//! {
//!     Loops = 2;
//! }
//! ```
//!
//! Parsing is line-based. A `Test <type> <name>` or `MultiTrialTest <name>`
//! line opens an instance; it closes on the line where the brace depth,
//! counted from the header line, falls back to zero after the first `{`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};
use tpmig_types::{InstanceDiff, InstanceKind, MtplDiff, MtplInstance};
use tracing::{debug, warn};

use crate::error::Result;
use crate::lenient::read_text;

/// Placeholder for a run of digits in an instance name pattern.
pub const DIGITS_PLACEHOLDER: &str = "{X}";

fn test_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Test\s+\S+\s+([^\s{]+)").expect("valid Test header regex"))
}

fn multi_trial_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^MultiTrialTest\s+([^\s{]+)").expect("valid MultiTrialTest header regex")
    })
}

fn header(line: &str) -> Option<(InstanceKind, &str)> {
    if let Some(caps) = test_header_re().captures(line) {
        return caps.get(1).map(|m| (InstanceKind::Test, m.as_str()));
    }
    multi_trial_header_re()
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| (InstanceKind::MultiTrialTest, m.as_str()))
}

struct OpenBlock<'a> {
    name: &'a str,
    kind: InstanceKind,
    lines: Vec<&'a str>,
    depth: i64,
    opened: bool,
}

impl<'a> OpenBlock<'a> {
    fn push(&mut self, line: &'a str) {
        let trimmed = line.trim();
        let opens = trimmed.matches('{').count() as i64;
        let closes = trimmed.matches('}').count() as i64;
        self.depth += opens - closes;
        self.opened |= opens > 0;
        self.lines.push(line);
    }

    fn is_closed(&self) -> bool {
        self.opened && self.depth <= 0
    }

    fn finish(self) -> MtplInstance {
        let raw_block = self.lines.concat();
        MtplInstance {
            name: self.name.to_string(),
            kind: self.kind,
            fields: key_values(&raw_block),
            raw_block,
        }
    }
}

/// Every instance in `content`, by name. A repeated name keeps its last block;
/// a block still open at the end of the file is dropped.
pub fn parse_instances(content: &str) -> BTreeMap<String, MtplInstance> {
    let mut instances = BTreeMap::new();
    let mut open: Option<OpenBlock<'_>> = None;

    for line in content.split_inclusive('\n') {
        if open.is_none() {
            let Some((kind, name)) = header(line.trim()) else {
                continue;
            };
            open = Some(OpenBlock {
                name,
                kind,
                lines: Vec::new(),
                depth: 0,
                opened: false,
            });
        }
        let Some(block) = open.as_mut() else {
            continue;
        };
        block.push(line);
        if block.is_closed() {
            if let Some(block) = open.take() {
                let instance = block.finish();
                instances.insert(instance.name.clone(), instance);
            }
        }
    }

    if let Some(block) = open {
        warn!(instance = block.name, "instance block not closed before end of file");
    }
    instances
}

/// `key = value;` pairs of a block. Lines starting with `#` are skipped, the
/// value loses its trailing semicolons, keys containing spaces are ignored and
/// a repeated key keeps its last value.
fn key_values(block: &str) -> BTreeMap<String, String> {
    block
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .filter_map(|(key, value)| {
            let key = key.trim();
            if key.is_empty() || key.contains(' ') {
                return None;
            }
            let value = value.trim().trim_end_matches(';').trim();
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

pub fn load_instances(path: &Path) -> Result<BTreeMap<String, MtplInstance>> {
    Ok(parse_instances(&read_text(path)?))
}

/// The instance names to compare: `names` first, in order and without
/// repeats, then every available name matching a pattern.
///
/// In a pattern, [`DIGITS_PLACEHOLDER`] stands for zero or more digits and
/// everything else is literal. Patterns match whole names, ignoring case.
pub fn resolve_instances(
    names: &[String],
    patterns: &[String],
    available: &BTreeSet<String>,
) -> Vec<String> {
    let mut resolved = Vec::new();
    let mut seen = BTreeSet::new();
    for name in names {
        if seen.insert(name.clone()) {
            resolved.push(name.clone());
        }
    }

    for pattern in patterns {
        let Some(matcher) = pattern_matcher(pattern) else {
            continue;
        };
        for name in available {
            if matcher.is_match(name) && seen.insert(name.clone()) {
                resolved.push(name.clone());
            }
        }
    }
    resolved
}

fn pattern_matcher(pattern: &str) -> Option<Regex> {
    let literal = regex::escape(pattern).replace(&regex::escape(DIGITS_PLACEHOLDER), r"\d*");
    match RegexBuilder::new(&format!("^{literal}$"))
        .case_insensitive(true)
        .build()
    {
        Ok(matcher) => Some(matcher),
        Err(e) => {
            warn!(pattern, error = %e, "instance pattern skipped");
            None
        }
    }
}

/// Compare the selected instances of two MTPL files field by field.
///
/// Patterns are resolved against the names of both files. A file that cannot
/// be read is recorded on its side and treated as having no instances.
pub fn compare_instances(
    reference: &Path,
    new: &Path,
    names: &[String],
    patterns: &[String],
) -> MtplDiff {
    let mut result = MtplDiff {
        reference_path: reference.to_path_buf(),
        new_path: new.to_path_buf(),
        ..MtplDiff::default()
    };

    let reference_instances = load_instances(reference).unwrap_or_else(|e| {
        warn!(error = %e, "reference MTPL not loaded");
        result.load_error_reference = Some(e.to_string());
        BTreeMap::new()
    });
    let new_instances = load_instances(new).unwrap_or_else(|e| {
        warn!(error = %e, "new MTPL not loaded");
        result.load_error_new = Some(e.to_string());
        BTreeMap::new()
    });

    let available: BTreeSet<String> = reference_instances
        .keys()
        .chain(new_instances.keys())
        .cloned()
        .collect();
    result.resolved_names = resolve_instances(names, patterns, &available);

    for name in &result.resolved_names {
        match (reference_instances.get(name), new_instances.get(name)) {
            (Some(_), None) => result.only_in_reference.push(name.clone()),
            (None, Some(_)) => result.only_in_new.push(name.clone()),
            (None, None) => result.not_found.push(name.clone()),
            (Some(reference), Some(new)) => {
                let diff_keys = differing_keys(&reference.fields, &new.fields);
                if diff_keys.is_empty() {
                    result.identical.push(name.clone());
                } else {
                    result.different.push(InstanceDiff {
                        name: name.clone(),
                        kind: reference.kind,
                        ref_fields: reference.fields.clone(),
                        new_fields: new.fields.clone(),
                        diff_keys,
                    });
                }
            }
        }
    }

    debug!(
        resolved = result.resolved_names.len(),
        different = result.different.len(),
        identical = result.identical.len(),
        not_found = result.not_found.len(),
        "MTPL comparison done"
    );
    result
}

/// Sorted keys whose value differs or that exist on one side only.
fn differing_keys(
    reference: &BTreeMap<String, String>,
    new: &BTreeMap<String, String>,
) -> Vec<String> {
    let keys: BTreeSet<&String> = reference.keys().chain(new.keys()).collect();
    keys.into_iter()
        .filter(|key| reference.get(*key) != new.get(*key))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const REFERENCE_MTPL: &str = "\
Version 1.0;

Test iCTC SCN_CORE_VMIN
{
    Timeout = 5;
    # Retries = 2;
    Patlist = \"PL_CORE\";
    Bypass Flag = 1;
}

MultiTrialTest SCN_MT_1
{
    Loops = 2;
    Nested
    {
        Inner = a;
    }
}

MultiTrialTest SCN_MT_12 {
    Loops = 3;
}

Test iCTC SCN_OLD
{
}
";

    const NEW_MTPL: &str = "\
Test iCTC SCN_CORE_VMIN
{
    Timeout = 7;
    Patlist = \"PL_CORE\";
    Retries = 1;;
}

MultiTrialTest SCN_MT_1
{
    Loops = 2;
    Nested
    {
        Inner = a;
    }
}

MultiTrialTest SCN_MT_12 {
    Loops = 3;
}

MultiTrialTest SCN_MT_2 {
    Loops = 1;
}
";

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_both_instance_kinds() {
        let instances = parse_instances(REFERENCE_MTPL);
        assert_eq!(instances.len(), 4);

        let core = &instances["SCN_CORE_VMIN"];
        assert_eq!(core.kind, InstanceKind::Test);
        assert!(core.raw_block.starts_with("Test iCTC SCN_CORE_VMIN\n{"));
        assert!(core.raw_block.ends_with("}\n"));
        assert_eq!(core.fields["Timeout"], "5");
        assert_eq!(core.fields["Patlist"], "\"PL_CORE\"");
        assert!(!core.fields.contains_key("# Retries"));
        assert!(!core.fields.contains_key("Bypass Flag"));

        let multi = &instances["SCN_MT_1"];
        assert_eq!(multi.kind, InstanceKind::MultiTrialTest);
        assert_eq!(multi.fields["Inner"], "a");
        assert!(multi.raw_block.contains("Inner = a;"));
        assert_eq!(instances["SCN_MT_12"].fields["Loops"], "3");
    }

    #[test]
    fn header_without_brace_waits_for_the_opening_line() {
        let instances = parse_instances("Test iCTC A\n\n{\n  X = 1;\n}\nTest iCTC B {}\n");
        assert_eq!(instances["A"].fields["X"], "1");
        assert!(instances["B"].fields.is_empty());
    }

    #[test]
    fn trailing_semicolons_are_dropped() {
        let instances = parse_instances(NEW_MTPL);
        assert_eq!(instances["SCN_MT_2"].fields["Loops"], "1");
        assert_eq!(instances["SCN_CORE_VMIN"].fields["Retries"], "1");
    }

    #[test]
    fn unclosed_block_is_dropped() {
        let instances = parse_instances("Test iCTC A\n{\n  X = 1;\n}\nTest iCTC B\n{\n  Y = 2;\n");
        assert_eq!(instances.keys().collect::<Vec<_>>(), vec!["A"]);
    }

    #[test]
    fn resolves_exact_names_then_patterns() {
        let available: BTreeSet<String> =
            strings(&["SCN_MT_1", "SCN_MT_12", "SCN_MT_X", "scn_mt_", "SCN_CORE", "SCNXCORE"])
                .into_iter()
                .collect();
        let resolved = resolve_instances(
            &strings(&["SCN_CORE", "SCN_MISSING", "SCN_CORE"]),
            &strings(&["SCN_MT_{X}", "SCN.CORE"]),
            &available,
        );
        assert_eq!(
            resolved,
            strings(&["SCN_CORE", "SCN_MISSING", "SCN_MT_1", "SCN_MT_12", "scn_mt_"])
        );
    }

    #[test]
    fn compares_selected_instances() {
        let dir = tempfile::tempdir().unwrap();
        let reference = dir.path().join("ref.mtpl");
        let new = dir.path().join("new.mtpl");
        fs::write(&reference, REFERENCE_MTPL).unwrap();
        fs::write(&new, NEW_MTPL).unwrap();

        let result = compare_instances(
            &reference,
            &new,
            &strings(&["SCN_CORE_VMIN", "SCN_OLD", "SCN_GONE"]),
            &strings(&["SCN_MT_{X}"]),
        );
        let selected = ["SCN_CORE_VMIN", "SCN_OLD", "SCN_GONE"];
        let matched = ["SCN_MT_1", "SCN_MT_12", "SCN_MT_2"];
        assert_eq!(result.resolved_names, strings(&[&selected[..], &matched[..]].concat()));
        assert_eq!(result.only_in_reference, strings(&["SCN_OLD"]));
        assert_eq!(result.only_in_new, strings(&["SCN_MT_2"]));
        assert_eq!(result.not_found, strings(&["SCN_GONE"]));
        assert_eq!(result.identical, strings(&["SCN_MT_1", "SCN_MT_12"]));

        assert_eq!(result.different.len(), 1);
        let core = &result.different[0];
        assert_eq!(core.name, "SCN_CORE_VMIN");
        assert_eq!(core.kind, InstanceKind::Test);
        assert_eq!(core.diff_keys, strings(&["Retries", "Timeout"]));
        assert_eq!(core.ref_fields["Timeout"], "5");
        assert_eq!(core.new_fields["Timeout"], "7");
    }

    #[test]
    fn unreadable_side_compares_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let new = dir.path().join("new.mtpl");
        fs::write(&new, NEW_MTPL).unwrap();

        let result = compare_instances(
            &dir.path().join("absent.mtpl"),
            &new,
            &strings(&["SCN_CORE_VMIN"]),
            &[],
        );
        assert!(result.load_error_reference.is_some());
        assert!(result.load_error_new.is_none());
        assert_eq!(result.only_in_new, strings(&["SCN_CORE_VMIN"]));
    }
}
