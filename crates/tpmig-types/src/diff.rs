//! Comparison result types.
//!
//! A [`DiffResult`] sorts the keys of two documents into four disjoint
//! buckets. When either file cannot be loaded at all, the matching
//! `load_error_*` field is set and every bucket stays empty.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A key present only in the reference document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OnlyInReference<V = Value> {
    pub key: String,
    pub ref_value: V,
}

/// A key present only in the new document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OnlyInNew<V = Value> {
    pub key: String,
    pub new_value: V,
}

/// A key present on both sides with differing values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Different<V = Value> {
    pub key: String,
    pub ref_value: V,
    pub new_value: V,
}

/// Entry counts observed while building a [`DiffResult`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    /// Keys or entries parsed from the reference file.
    pub reference_total: usize,
    /// Keys or entries parsed from the new file.
    pub new_total: usize,
    /// Reference entries left after name-pattern filtering, if a filter ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_matched: Option<usize>,
    /// New entries left after name-pattern filtering, if a filter ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_matched: Option<usize>,
}

/// The outcome of comparing a reference file against a new file.
///
/// Built fresh per comparison and never mutated after it is returned.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiffResult<V = Value> {
    pub reference_path: PathBuf,
    pub new_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_error_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_error_new: Option<String>,
    pub only_in_reference: Vec<OnlyInReference<V>>,
    pub only_in_new: Vec<OnlyInNew<V>>,
    pub different: Vec<Different<V>>,
    pub identical: Vec<String>,
    #[serde(default)]
    pub stats: DiffStats,
}

impl<V> DiffResult<V> {
    /// An empty result for the given pair of files.
    pub fn new(reference_path: impl Into<PathBuf>, new_path: impl Into<PathBuf>) -> Self {
        Self {
            reference_path: reference_path.into(),
            new_path: new_path.into(),
            load_error_reference: None,
            load_error_new: None,
            only_in_reference: Vec::new(),
            only_in_new: Vec::new(),
            different: Vec::new(),
            identical: Vec::new(),
            stats: DiffStats::default(),
        }
    }

    /// Returns `true` if either side failed to load.
    pub fn has_load_error(&self) -> bool {
        self.load_error_reference.is_some() || self.load_error_new.is_some()
    }

    /// Returns `true` if both files loaded and every shared key is identical.
    pub fn is_clean(&self) -> bool {
        !self.has_load_error()
            && self.only_in_reference.is_empty()
            && self.only_in_new.is_empty()
            && self.different.is_empty()
    }

    /// Number of keys that need attention (added, removed, or changed).
    pub fn change_count(&self) -> usize {
        self.only_in_reference.len() + self.only_in_new.len() + self.different.len()
    }
}

/// One named object from a patmod-style file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NamedEntry {
    pub name: String,
    pub entry: Map<String, Value>,
    /// The closest `/* ... */` comment preceding the entry, if any.
    pub leading_comments: Vec<String>,
}

/// A single change produced by the recursive JSON tree diff.
///
/// Serializes as `{"path": .., "status": "added"|"removed"|"changed", ..}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TreeChange {
    /// The path exists only in the new tree.
    Added { path: String, new_value: Value },
    /// The path exists only in the reference tree.
    Removed { path: String, ref_value: Value },
    /// The path exists in both trees with different values.
    Changed {
        path: String,
        ref_value: Value,
        new_value: Value,
    },
}

impl TreeChange {
    /// The dotted/bracketed path this change applies to.
    pub fn path(&self) -> &str {
        match self {
            Self::Added { path, .. } | Self::Removed { path, .. } | Self::Changed { path, .. } => {
                path
            }
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Added { .. } => "added",
            Self::Removed { .. } => "removed",
            Self::Changed { .. } => "changed",
        }
    }
}

/// Comparison of one filename present in both directories.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilePairDiff {
    pub filename: String,
    pub reference_path: PathBuf,
    pub new_path: PathBuf,
    /// Set when either file of the pair could not be parsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub identical: bool,
    pub changes: Vec<TreeChange>,
}

/// File-level comparison of two directories.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectoryDiff {
    pub reference_dir: PathBuf,
    pub new_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_error: Option<String>,
    pub files_only_in_reference: Vec<String>,
    pub files_only_in_new: Vec<String>,
    pub files_in_both: Vec<FilePairDiff>,
}

/// Why a UTP setpoint reference failed the consistency check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    ConfigurationNotFound,
    ElementNotFound,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigurationNotFound => write!(f, "Configuration not found in patmod"),
            Self::ElementNotFound => write!(f, "ElementName not found in patmod"),
        }
    }
}

/// A UTP `Configurations` item referencing a name the patmod file lacks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyIssue {
    pub utp_entry_name: String,
    pub configuration_reference: String,
    pub element_name: String,
    pub issue_kind: IssueKind,
}
