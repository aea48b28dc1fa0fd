//! Applier settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Text anchors used by the free-text operations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextAnchors {
    /// Placeholder line in the env file; new path lines go right before it.
    pub placeholder_token: String,
    /// Env-file block that holds the pattern paths (`<block> = ... ;`).
    pub path_block: String,
    /// Keyword that opens a named block in plist files.
    pub block_keyword: String,
    /// Declaration keywords of named instance blocks in MTPL files.
    pub instance_keywords: Vec<String>,
}

impl Default for TextAnchors {
    fn default() -> Self {
        Self {
            placeholder_token: "$TORCH_AUTO_PAT_PATH".into(),
            path_block: "HDST_PAT_PATH".into(),
            block_keyword: "GlobalPList".into(),
            instance_keywords: vec!["Test".into(), "MultiTrialTest".into()],
        }
    }
}

/// Where the applier keeps its side effects.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplierConfig {
    /// Session folders are created under this directory.
    pub backup_root: PathBuf,
    /// JSON array of [`tpmig_types::ChangeLogEntry`] records.
    pub change_log_path: PathBuf,
    #[serde(default)]
    pub anchors: TextAnchors,
}

impl Default for ApplierConfig {
    fn default() -> Self {
        Self {
            backup_root: PathBuf::from("backups"),
            change_log_path: PathBuf::from("output/change_log.json"),
            anchors: TextAnchors::default(),
        }
    }
}

impl ApplierConfig {
    /// Settings that keep backups and the change log under `dir`.
    pub fn rooted_at(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            backup_root: dir.join("backups"),
            change_log_path: dir.join("output").join("change_log.json"),
            anchors: TextAnchors::default(),
        }
    }
}
