//! Patch requests and their outcomes.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request to mutate one target file.
///
/// Target files that belong to the new test program are looked up in a
/// [`crate::ResolvedPaths`] map at dispatch time; only paths that vary per
/// request travel inside the action itself. The original UI action names and
/// field names are accepted as aliases.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PatchAction {
    /// Insert a pattern-path line into the new env file.
    #[serde(alias = "add_env_path")]
    InsertPathEntry { path_entry: String },

    /// Append a named block from a reference text file to a target text file.
    #[serde(alias = "copy_plist_entry")]
    CopyBlockEntry {
        #[serde(alias = "ref_plist_fp")]
        reference_file: PathBuf,
        #[serde(alias = "new_plist_fp")]
        target_file: PathBuf,
        #[serde(alias = "plist_name")]
        block_name: String,
    },

    /// Set a key (or merge into a named element) of the new shmoo config.
    #[serde(alias = "apply_shmoo_key")]
    UpsertKeyedValue {
        key: String,
        #[serde(alias = "ref_value")]
        value: Value,
    },

    /// Copy a named entry, with its leading comment, into the new patmod file.
    AddPatmodEntry { entry_name: String },

    /// Copy a named entry into the new UTP setpoints file.
    AddUtpEntry { entry_name: String },

    /// Copy a whole reference file into the new input-files directory.
    #[serde(alias = "copy_defeature_file")]
    CopyWholeFile {
        #[serde(alias = "ref_fp")]
        reference_file: PathBuf,
    },

    /// Rewrite one `field = value;` line inside a named instance block.
    #[serde(alias = "update_mtpl_key")]
    UpdateKeyedField {
        instance_name: String,
        #[serde(alias = "key")]
        field_name: String,
        #[serde(alias = "ref_value")]
        value: String,
    },

    /// Any action type this build does not recognise.
    #[serde(other)]
    Unknown,
}

impl PatchAction {
    /// Stable snake_case name of the action kind, as written to the change log.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InsertPathEntry { .. } => "insert_path_entry",
            Self::CopyBlockEntry { .. } => "copy_block_entry",
            Self::UpsertKeyedValue { .. } => "upsert_keyed_value",
            Self::AddPatmodEntry { .. } => "add_patmod_entry",
            Self::AddUtpEntry { .. } => "add_utp_entry",
            Self::CopyWholeFile { .. } => "copy_whole_file",
            Self::UpdateKeyedField { .. } => "update_keyed_field",
            Self::Unknown => "unknown",
        }
    }
}

/// The outcome of one [`PatchAction`].
///
/// Failures are values, not errors: `message` is shown to the user verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchResult {
    pub succeeded: bool,
    pub message: String,
    /// Copy of the target as it was before the action, when one was taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<PathBuf>,
}

impl PatchResult {
    pub fn success(message: impl Into<String>, backup_path: Option<PathBuf>) -> Self {
        Self {
            succeeded: true,
            message: message.into(),
            backup_path,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            message: message.into(),
            backup_path: None,
        }
    }
}
