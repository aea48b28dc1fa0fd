//! Comparison results for the free-text TP sources.
//!
//! Env files, `.plist` folders, the plist XML index and MTPL instance files
//! are not JSON, so their comparisons carry source-specific shapes instead of
//! a [`DiffResult`](crate::DiffResult).

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where a pattern search path points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PathKind {
    /// `~`-prefixed, inside the TP.
    Internal,
    /// `\\server\share` network path.
    ExternalUnc,
    /// Drive-letter path such as `C:\pats`.
    Local,
    /// Starts with a `$` variable.
    Var,
    Other,
}

impl fmt::Display for PathKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Internal => "INTERNAL",
            Self::ExternalUnc => "EXTERNAL_UNC",
            Self::Local => "LOCAL",
            Self::Var => "VAR",
            Self::Other => "OTHER",
        };
        f.write_str(label)
    }
}

/// One entry of an env file's pattern path list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: PathKind,
}

/// Pattern path lists of two env files, compared as sets in file order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvDiff {
    pub reference_path: PathBuf,
    pub new_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_error_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_error_new: Option<String>,
    pub reference_paths: Vec<PathEntry>,
    pub new_paths: Vec<PathEntry>,
    pub only_in_reference: Vec<PathEntry>,
    pub only_in_new: Vec<PathEntry>,
    pub in_both: Vec<PathEntry>,
}

/// A plist block present in both files with different text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlistBlockDiff {
    pub name: String,
    pub ref_block: String,
    pub new_block: String,
}

/// Block-level comparison of one `.plist` filename present in both folders.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlistFileDiff {
    pub filename: String,
    pub reference_path: PathBuf,
    pub new_path: PathBuf,
    /// Read failure of either file; the block lists are then empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub only_in_reference: Vec<String>,
    pub only_in_new: Vec<String>,
    pub different: Vec<PlistBlockDiff>,
    pub identical: Vec<String>,
}

/// Comparison of two `.plist` folders.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlistFolderDiff {
    pub reference_dir: PathBuf,
    pub new_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_error: Option<String>,
    pub files_only_in_reference: Vec<String>,
    pub files_only_in_new: Vec<String>,
    pub files_in_both: Vec<PlistFileDiff>,
}

/// Names referenced by two plist XML index files, cross-checked against the
/// blocks actually defined in the new `.plist` folder.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct XmlPlistDiff {
    pub reference_xml: PathBuf,
    pub new_xml: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_error_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_error_new: Option<String>,
    pub reference_names: Vec<String>,
    pub new_names: Vec<String>,
    pub only_in_reference: Vec<String>,
    pub only_in_new: Vec<String>,
    pub in_both: Vec<String>,
    /// Referenced by the new XML but defined in no new `.plist` file.
    pub missing_from_new_dir: Vec<String>,
    /// Defined in the new `.plist` folder but not referenced by the new XML.
    pub unreferenced_in_new: Vec<String>,
    /// The new `.plist` folder could not be listed; the cross-check is empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plist_dir_error: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstanceKind {
    Test,
    MultiTrialTest,
}

impl fmt::Display for InstanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Test => f.write_str("Test"),
            Self::MultiTrialTest => f.write_str("MultiTrialTest"),
        }
    }
}

/// One `Test` or `MultiTrialTest` block of an MTPL file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MtplInstance {
    pub name: String,
    pub kind: InstanceKind,
    pub raw_block: String,
    /// `key = value;` pairs, value without the semicolon.
    pub fields: BTreeMap<String, String>,
}

/// An instance present in both files whose fields differ.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceDiff {
    pub name: String,
    pub kind: InstanceKind,
    pub ref_fields: BTreeMap<String, String>,
    pub new_fields: BTreeMap<String, String>,
    /// Keys whose value differs or that exist on one side only.
    pub diff_keys: Vec<String>,
}

/// Per-instance comparison of two MTPL files over a selected set of names.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MtplDiff {
    pub reference_path: PathBuf,
    pub new_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_error_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_error_new: Option<String>,
    /// The selected names, in selection order.
    pub resolved_names: Vec<String>,
    pub only_in_reference: Vec<String>,
    pub only_in_new: Vec<String>,
    pub different: Vec<InstanceDiff>,
    pub identical: Vec<String>,
    /// Selected names found in neither file.
    pub not_found: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn path_entry_uses_type_field() {
        let entry = PathEntry {
            path: r"\\srv\pats".into(),
            kind: PathKind::ExternalUnc,
        };
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({"path": "\\\\srv\\pats", "type": "EXTERNAL_UNC"})
        );
        assert_eq!(PathKind::Var.to_string(), "VAR");
    }

    #[test]
    fn instance_kind_round_trips_by_name() {
        let kind: InstanceKind = serde_json::from_value(json!("MultiTrialTest")).unwrap();
        assert_eq!(kind, InstanceKind::MultiTrialTest);
        assert_eq!(kind.to_string(), "MultiTrialTest");
    }
}
