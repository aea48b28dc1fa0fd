//! Persistent change log.
//!
//! The log is a single JSON array on disk. Each append reads the whole array,
//! pushes one record, and writes the array back.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tpmig_types::ChangeLogEntry;
use tracing::warn;

use crate::error::{ApplyError, Result};
use crate::fsio::atomic_write;

#[derive(Debug, Clone)]
pub struct ChangeLog {
    path: PathBuf,
}

impl ChangeLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record. A missing or unreadable log starts a new array.
    pub fn append(&self, entry: &ChangeLogEntry) -> Result<()> {
        let mut records = self.load_raw();
        records.push(serde_json::to_value(entry).map_err(ApplyError::Serialize)?);

        let text = serde_json::to_string_pretty(&records).map_err(ApplyError::Serialize)?;
        atomic_write(&self.path, text.as_bytes())
    }

    /// Every record in file order. Records that do not fit the entry shape
    /// are skipped.
    pub fn entries(&self) -> Vec<ChangeLogEntry> {
        self.load_raw()
            .into_iter()
            .filter_map(|record| match serde_json::from_value(record) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "skipping malformed change-log record");
                    None
                }
            })
            .collect()
    }

    /// The `limit` most recent records, newest first.
    pub fn recent(&self, limit: usize) -> Vec<ChangeLogEntry> {
        let mut entries = self.entries();
        entries.reverse();
        entries.truncate(limit);
        entries
    }

    fn load_raw(&self) -> Vec<Value> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_str(&raw) {
            Ok(Value::Array(records)) => records,
            Ok(_) => {
                warn!(
                    path = %self.path.display(),
                    "change log is not a JSON array; starting over"
                );
                Vec::new()
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "change log unreadable; starting over"
                );
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(action: &str) -> ChangeLogEntry {
        ChangeLogEntry {
            timestamp: "2026-01-02T03:04:05.000000".into(),
            session_id: "20260102_030405".into(),
            action_kind: action.into(),
            description: format!("did {action}"),
            affected_file_paths: vec![PathBuf::from("/tp/new/file.json")],
            details: Some(json!({"key": "Vmin"})),
        }
    }

    #[test]
    fn appends_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = ChangeLog::new(dir.path().join("output").join("change_log.json"));

        log.append(&entry("first")).unwrap();
        log.append(&entry("second")).unwrap();

        let kinds: Vec<String> = log.entries().into_iter().map(|e| e.action_kind).collect();
        assert_eq!(kinds, vec!["first", "second"]);

        let on_disk: Value = serde_json::from_str(&fs::read_to_string(log.path()).unwrap()).unwrap();
        assert_eq!(on_disk[0]["session"], json!("20260102_030405"));
        assert_eq!(on_disk[1]["affected_files"], json!(["/tp/new/file.json"]));
    }

    #[test]
    fn recent_is_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let log = ChangeLog::new(dir.path().join("log.json"));
        for action in ["a", "b", "c"] {
            log.append(&entry(action)).unwrap();
        }
        let recent: Vec<String> = log.recent(2).into_iter().map(|e| e.action_kind).collect();
        assert_eq!(recent, vec!["c", "b"]);
    }

    #[test]
    fn corrupt_log_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");
        fs::write(&path, "{ not a log").unwrap();

        let log = ChangeLog::new(&path);
        assert!(log.entries().is_empty());
        log.append(&entry("fresh")).unwrap();
        assert_eq!(log.entries().len(), 1);
    }

    #[test]
    fn foreign_records_are_kept_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");
        fs::write(&path, r#"[{"note": "hand-written"}]"#).unwrap();

        let log = ChangeLog::new(&path);
        log.append(&entry("next")).unwrap();

        let on_disk: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk.as_array().unwrap().len(), 2);
        assert_eq!(log.entries().len(), 1);
    }
}
