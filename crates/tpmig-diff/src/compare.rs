//! File-level comparisons.
//!
//! Each function loads both files, normalizes them to a keyed view, and
//! classifies the keys. None of them fail: a file that cannot be loaded sets
//! the matching `load_error_*` field and the comparison stops there.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde_json::{Map, Value};
use tpmig_types::{ConsistencyIssue, DiffResult, DiffStats, IssueKind, NamedEntry};
use tracing::{debug, warn};

use crate::canonical::{objects_equal, values_equal};
use crate::error::Result;
use crate::keyed_diff::classify;
use crate::lenient::load_lenient;
use crate::patmod::load_named_entries;
use crate::pattern::NamePatterns;
use crate::shape::{name_of, ConfigShape};

/// Load both sides, recording the first failure on `result`.
fn load_pair<T, V>(
    result: &mut DiffResult<V>,
    reference_path: &Path,
    new_path: &Path,
    load: impl Fn(&Path) -> Result<T>,
) -> Option<(T, T)> {
    let reference = match load(reference_path) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "reference file failed to load");
            result.load_error_reference = Some(e.to_string());
            return None;
        }
    };
    let new = match load(new_path) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "new file failed to load");
            result.load_error_new = Some(e.to_string());
            return None;
        }
    };
    Some((reference, new))
}

fn sorted(map: Map<String, Value>) -> BTreeMap<String, Value> {
    map.into_iter().collect()
}

/// Flat key/value comparison (shmoo configs and similar).
///
/// Object roots are compared key by key; array roots are keyed by each
/// element's `Name` (or index); any other root is a single `__root__` key.
pub fn compare_flat(reference_path: &Path, new_path: &Path) -> DiffResult {
    let mut result = DiffResult::new(reference_path, new_path);
    let Some((reference, new)) = load_pair(&mut result, reference_path, new_path, load_lenient)
    else {
        return result;
    };

    let reference = sorted(ConfigShape::classify(reference).into_flat_map());
    let new = sorted(ConfigShape::classify(new).into_flat_map());
    result.stats = DiffStats {
        reference_total: reference.len(),
        new_total: new.len(),
        ..DiffStats::default()
    };

    classify(&mut result, &reference, &new, values_equal);
    debug!(
        changes = result.change_count(),
        identical = result.identical.len(),
        "flat comparison done"
    );
    result
}

/// Compare patmod entries by name, keeping only names matched by `patterns`
/// (all names when `patterns` is empty). Only the entry objects are
/// compared; leading comments are carried along for display.
pub fn compare_named_entries<S: AsRef<str>>(
    reference_path: &Path,
    new_path: &Path,
    patterns: &[S],
) -> DiffResult<NamedEntry> {
    let mut result = DiffResult::new(reference_path, new_path);
    let Some((reference, new)) =
        load_pair(&mut result, reference_path, new_path, load_named_entries)
    else {
        return result;
    };

    let patterns = NamePatterns::new(patterns);
    let filter = |entries: Vec<NamedEntry>| -> BTreeMap<String, NamedEntry> {
        let mut kept = BTreeMap::new();
        for entry in entries.into_iter().filter(|e| patterns.matches(&e.name)) {
            kept.entry(entry.name.clone()).or_insert(entry);
        }
        kept
    };

    let reference_total = reference.len();
    let new_total = new.len();
    let reference = filter(reference);
    let new = filter(new);
    result.stats = DiffStats {
        reference_total,
        new_total,
        reference_matched: Some(reference.len()),
        new_matched: Some(new.len()),
    };

    classify(&mut result, &reference, &new, |a, b| {
        objects_equal(&a.entry, &b.entry)
    });
    debug!(
        reference_total,
        new_total,
        changes = result.change_count(),
        "patmod comparison done"
    );
    result
}

/// Compare UTP setpoint files keyed by `Name`.
///
/// When `consistency_names` is non-empty, every `Configurations` item of every
/// entry in the *new* file is also checked: a `Configuration` or
/// `ElementName` value missing from the set is reported as an issue.
pub fn compare_keyed_by_name(
    reference_path: &Path,
    new_path: &Path,
    consistency_names: Option<&BTreeSet<String>>,
) -> (DiffResult, Vec<ConsistencyIssue>) {
    let mut result = DiffResult::new(reference_path, new_path);
    let Some((reference, new)) = load_pair(&mut result, reference_path, new_path, load_lenient)
    else {
        return (result, Vec::new());
    };

    let reference = ConfigShape::classify(reference).into_name_keyed();
    let new = ConfigShape::classify(new).into_name_keyed();

    let issues = match consistency_names {
        Some(names) if !names.is_empty() => consistency_issues(&new, names),
        _ => Vec::new(),
    };

    let reference = sorted(reference);
    let new = sorted(new);
    result.stats = DiffStats {
        reference_total: reference.len(),
        new_total: new.len(),
        ..DiffStats::default()
    };
    classify(&mut result, &reference, &new, values_equal);
    debug!(
        changes = result.change_count(),
        issues = issues.len(),
        "keyed comparison done"
    );
    (result, issues)
}

/// Walk `Configurations` of each entry, in file order.
pub fn consistency_issues(
    entries: &Map<String, Value>,
    names: &BTreeSet<String>,
) -> Vec<ConsistencyIssue> {
    let mut issues = Vec::new();

    for (utp_name, entry) in entries {
        let Some(Value::Array(configurations)) = entry.get("Configurations") else {
            continue;
        };
        for item in configurations {
            let configuration = text_field(item, "Configuration");
            let element = text_field(item, "ElementName");

            if !configuration.is_empty() && !names.contains(&configuration) {
                issues.push(ConsistencyIssue {
                    utp_entry_name: utp_name.clone(),
                    configuration_reference: configuration.clone(),
                    element_name: element.clone(),
                    issue_kind: IssueKind::ConfigurationNotFound,
                });
            }
            if !element.is_empty() && !names.contains(&element) {
                issues.push(ConsistencyIssue {
                    utp_entry_name: utp_name.clone(),
                    configuration_reference: configuration.clone(),
                    element_name: element.clone(),
                    issue_kind: IssueKind::ElementNotFound,
                });
            }
        }
    }

    issues
}

fn text_field(item: &Value, key: &str) -> String {
    match item.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(value) => name_of(value),
    }
}
