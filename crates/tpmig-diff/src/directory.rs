//! Directory-pair comparison (defeature-tracking files).
//!
//! Lists matching files on each side, reports filenames unique to one side,
//! and tree-diffs every filename present on both. A directory that cannot be
//! listed is recorded on its side only; a file that cannot be parsed is
//! recorded on its pair only.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use tpmig_types::{DirectoryDiff, FilePairDiff};
use tracing::{debug, warn};

use crate::error::{DiffError, Result};
use crate::lenient::load_lenient;
use crate::tree_diff::diff_json_trees;

/// Case-insensitive filename predicate: contains `needle` and ends with `suffix`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilenameFilter {
    needle: String,
    suffix: String,
}

impl FilenameFilter {
    pub fn new(needle: &str, suffix: &str) -> Self {
        Self {
            needle: needle.to_lowercase(),
            suffix: suffix.to_lowercase(),
        }
    }

    /// `*DefeatureTracking*.json`
    pub fn defeature_tracking() -> Self {
        Self::new("defeaturetracking", ".json")
    }

    pub fn matches(&self, filename: &str) -> bool {
        let lower = filename.to_lowercase();
        lower.contains(&self.needle) && lower.ends_with(&self.suffix)
    }
}

impl Default for FilenameFilter {
    fn default() -> Self {
        Self::defeature_tracking()
    }
}

/// Compare the matching files of two directories.
pub fn compare_directory_pairs(
    reference_dir: &Path,
    new_dir: &Path,
    filter: &FilenameFilter,
) -> DirectoryDiff {
    let mut result = DirectoryDiff {
        reference_dir: reference_dir.to_path_buf(),
        new_dir: new_dir.to_path_buf(),
        ..DirectoryDiff::default()
    };

    let reference_files = list_matching(reference_dir, filter).unwrap_or_else(|e| {
        warn!(error = %e, "reference directory not listed");
        result.reference_error = Some(e.to_string());
        BTreeMap::new()
    });
    let new_files = list_matching(new_dir, filter).unwrap_or_else(|e| {
        warn!(error = %e, "new directory not listed");
        result.new_error = Some(e.to_string());
        BTreeMap::new()
    });

    let reference_names: BTreeSet<&String> = reference_files.keys().collect();
    let new_names: BTreeSet<&String> = new_files.keys().collect();

    result.files_only_in_reference = reference_names
        .difference(&new_names)
        .map(|s| s.to_string())
        .collect();
    result.files_only_in_new = new_names
        .difference(&reference_names)
        .map(|s| s.to_string())
        .collect();

    for name in reference_names.intersection(&new_names) {
        result
            .files_in_both
            .push(compare_pair(name, &reference_files[*name], &new_files[*name]));
    }

    debug!(
        only_in_reference = result.files_only_in_reference.len(),
        only_in_new = result.files_only_in_new.len(),
        in_both = result.files_in_both.len(),
        "directory comparison done"
    );
    result
}

pub(crate) fn list_matching(
    dir: &Path,
    filter: &FilenameFilter,
) -> Result<BTreeMap<String, PathBuf>> {
    let list_err = |source| DiffError::ListDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut found = BTreeMap::new();
    for entry in fs::read_dir(dir).map_err(list_err)? {
        let entry = entry.map_err(list_err)?;
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if filter.matches(&name) {
            found.insert(name, entry.path());
        }
    }
    Ok(found)
}

fn compare_pair(filename: &str, reference_path: &Path, new_path: &Path) -> FilePairDiff {
    let mut pair = FilePairDiff {
        filename: filename.to_string(),
        reference_path: reference_path.to_path_buf(),
        new_path: new_path.to_path_buf(),
        error: None,
        identical: false,
        changes: Vec::new(),
    };

    let reference = match load_lenient(reference_path) {
        Ok(value) => value,
        Err(e) => {
            pair.error = Some(format!("ref load error: {e}"));
            return pair;
        }
    };
    let new = match load_lenient(new_path) {
        Ok(value) => value,
        Err(e) => {
            pair.error = Some(format!("new load error: {e}"));
            return pair;
        }
    };

    pair.changes = diff_json_trees(&reference, &new);
    pair.identical = pair.changes.is_empty();
    pair
}
