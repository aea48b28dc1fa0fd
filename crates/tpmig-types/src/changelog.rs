use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One persisted change-log record.
///
/// Field names on disk follow the existing `change_log.json` files.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    /// Local time of the change, ISO 8601.
    pub timestamp: String,
    /// Backup session the change belongs to.
    #[serde(rename = "session")]
    pub session_id: String,
    #[serde(rename = "action")]
    pub action_kind: String,
    pub description: String,
    #[serde(rename = "affected_files")]
    pub affected_file_paths: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}
