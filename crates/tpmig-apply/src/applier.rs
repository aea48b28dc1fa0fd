//! The patch operations.
//!
//! Every operation checks its inputs and locates its anchor before touching
//! anything, then backs the target up, writes it, and records one change-log
//! entry. Expected misses come back as failed [`PatchResult`]s with a
//! user-facing message; anything else is rendered as `"Exception: <error>"`.

use std::path::{Path, PathBuf};

use chrono::Local;
use serde_json::{json, Value};
use tpmig_diff::{locate_entry_block, parse_lenient};
use tpmig_types::{ChangeLogEntry, PatchResult};
use tracing::{info, warn};

use crate::backup::BackupSession;
use crate::changelog::ChangeLog;
use crate::config::{ApplierConfig, TextAnchors};
use crate::error::{ApplyError, Result};
use crate::fsio::{atomic_write, copy_preserving, read_text};
use crate::json_edit::{find_named, replace_named, upsert_keyed};
use crate::splice::{
    append_block, extract_named_block, format_path_line, insert_path_line, replace_field_value,
    splice_array_entry, FieldEdit,
};

/// How [`MigrationApplier::add_named_entry`] writes the entry into the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedEntryFormat {
    /// Text splice of the raw entry, leading comments included.
    Patmod,
    /// Parsed JSON array, rewritten whole.
    Utp,
}

impl NamedEntryFormat {
    fn label(self) -> &'static str {
        match self {
            Self::Patmod => "patmod",
            Self::Utp => "UTP",
        }
    }

    fn action_kind(self) -> &'static str {
        match self {
            Self::Patmod => "add_patmod_entry",
            Self::Utp => "add_utp_entry",
        }
    }
}

/// Applies patch actions to the files of a new test program.
#[derive(Debug)]
pub struct MigrationApplier {
    pub(crate) session: BackupSession,
    changelog: ChangeLog,
    anchors: TextAnchors,
}

impl MigrationApplier {
    pub fn new(config: ApplierConfig) -> Self {
        Self {
            session: BackupSession::new(config.backup_root),
            changelog: ChangeLog::new(config.change_log_path),
            anchors: config.anchors,
        }
    }

    /// Start a new backup session; later backups go to a fresh folder.
    pub fn reset_session(&mut self) -> &str {
        self.session.reset()
    }

    pub fn session(&self) -> &BackupSession {
        &self.session
    }

    pub fn changelog(&self) -> &ChangeLog {
        &self.changelog
    }

    pub fn anchors(&self) -> &TextAnchors {
        &self.anchors
    }

    /// Insert a pattern-path line into an env file.
    pub fn insert_path_entry(&self, env_file: &Path, path_entry: &str) -> PatchResult {
        settle(self.try_insert_path_entry(env_file, path_entry))
    }

    /// Append the named block of `reference_file` to `target_file`.
    pub fn copy_block_entry(
        &self,
        reference_file: &Path,
        target_file: &Path,
        block_name: &str,
    ) -> PatchResult {
        settle(self.try_copy_block_entry(reference_file, target_file, block_name))
    }

    /// Set or merge `key` in a JSON file.
    pub fn upsert_keyed_value(&self, target_file: &Path, key: &str, value: &Value) -> PatchResult {
        settle(self.try_upsert_keyed_value(target_file, key, value))
    }

    /// Copy the entry `entry_name` from a reference file into the target.
    pub fn add_named_entry(
        &self,
        reference_file: &Path,
        target_file: &Path,
        entry_name: &str,
        format: NamedEntryFormat,
    ) -> PatchResult {
        let result = match format {
            NamedEntryFormat::Patmod => {
                self.try_add_patmod_entry(reference_file, target_file, entry_name)
            }
            NamedEntryFormat::Utp => {
                self.try_add_utp_entry(reference_file, target_file, entry_name)
            }
        };
        settle(result)
    }

    /// Copy `reference_file` into `target_dir` under its own name, backing up
    /// any file it replaces.
    pub fn copy_whole_file(&self, reference_file: &Path, target_dir: &Path) -> PatchResult {
        settle(self.try_copy_whole_file(reference_file, target_dir))
    }

    /// Rewrite `field_name = ...;` inside the instance block `instance_name`.
    pub fn update_keyed_field(
        &self,
        target_file: &Path,
        instance_name: &str,
        field_name: &str,
        value: &str,
    ) -> PatchResult {
        settle(self.try_update_keyed_field(target_file, instance_name, field_name, value))
    }

    pub(crate) fn try_insert_path_entry(
        &self,
        env_file: &Path,
        path_entry: &str,
    ) -> Result<PatchResult> {
        if !env_file.is_file() {
            return Ok(PatchResult::failure(format!(
                "File not found: {}",
                env_file.display()
            )));
        }
        let content = read_text(env_file)?;
        let line = format_path_line(path_entry);
        let Some(updated) = insert_path_line(&content, &line, &self.anchors)? else {
            return Ok(PatchResult::failure("Could not find insertion point in env file"));
        };

        let backup = self.session.backup_file(env_file)?;
        atomic_write(env_file, updated.as_bytes())?;
        self.record(
            "insert_path_entry",
            format!("Added path: {path_entry}"),
            vec![env_file.to_path_buf()],
            Some(json!({ "path_entry": path_entry })),
        );
        Ok(done("Added path entry", Some(backup)))
    }

    pub(crate) fn try_copy_block_entry(
        &self,
        reference_file: &Path,
        target_file: &Path,
        block_name: &str,
    ) -> Result<PatchResult> {
        if !reference_file.is_file() {
            return Ok(PatchResult::failure(format!(
                "Ref plist not found: {}",
                reference_file.display()
            )));
        }
        if !target_file.is_file() {
            return Ok(PatchResult::failure(format!(
                "New plist not found: {}",
                target_file.display()
            )));
        }

        let keyword = &self.anchors.block_keyword;
        let reference = read_text(reference_file)?;
        let Some(block) = extract_named_block(&reference, keyword, block_name)? else {
            return Ok(PatchResult::failure(format!(
                "{keyword} '{block_name}' not found in ref"
            )));
        };

        let target = read_text(target_file)?;
        let backup = self.session.backup_file(target_file)?;
        atomic_write(target_file, append_block(&target, block).as_bytes())?;
        self.record(
            "copy_block_entry",
            format!("Copied {keyword}: {block_name}"),
            vec![target_file.to_path_buf()],
            Some(json!({
                "block_name": block_name,
                "source": reference_file.display().to_string(),
            })),
        );
        Ok(done(format!("Copied {keyword} '{block_name}'"), Some(backup)))
    }

    pub(crate) fn try_upsert_keyed_value(
        &self,
        target_file: &Path,
        key: &str,
        value: &Value,
    ) -> Result<PatchResult> {
        if !target_file.is_file() {
            return Ok(PatchResult::failure(format!(
                "File not found: {}",
                target_file.display()
            )));
        }
        let mut root = parse_json(target_file)?;
        if !upsert_keyed(&mut root, key, value.clone()) {
            return Ok(PatchResult::failure(format!(
                "Cannot apply key '{key}': {} is neither an object nor a list",
                target_file.display()
            )));
        }

        let backup = self.session.backup_file(target_file)?;
        write_json(target_file, &root)?;
        self.record(
            "upsert_keyed_value",
            format!("Applied shmoo key: {key}"),
            vec![target_file.to_path_buf()],
            Some(json!({ "key": key })),
        );
        Ok(done(format!("Applied key '{key}'"), Some(backup)))
    }

    pub(crate) fn try_add_patmod_entry(
        &self,
        reference_file: &Path,
        target_file: &Path,
        entry_name: &str,
    ) -> Result<PatchResult> {
        if let Some(missing) = missing_pair(reference_file, target_file, NamedEntryFormat::Patmod) {
            return Ok(missing);
        }

        let reference = read_text(reference_file)?;
        let Some(range) = locate_entry_block(&reference, entry_name) else {
            return Ok(PatchResult::failure(format!(
                "Entry '{entry_name}' not found in ref patmod"
            )));
        };
        let block = reference[range].trim();

        let target = read_text(target_file)?;
        let Some(updated) = splice_array_entry(&target, block) else {
            return Ok(PatchResult::failure(format!(
                "No closing ']' found in new patmod: {}",
                target_file.display()
            )));
        };

        let backup = self.session.backup_file(target_file)?;
        atomic_write(target_file, updated.as_bytes())?;
        self.record_entry_added(
            NamedEntryFormat::Patmod,
            reference_file,
            target_file,
            entry_name,
        );
        Ok(done(format!("Added patmod entry '{entry_name}'"), Some(backup)))
    }

    pub(crate) fn try_add_utp_entry(
        &self,
        reference_file: &Path,
        target_file: &Path,
        entry_name: &str,
    ) -> Result<PatchResult> {
        if let Some(missing) = missing_pair(reference_file, target_file, NamedEntryFormat::Utp) {
            return Ok(missing);
        }

        let reference = match parse_json(reference_file) {
            Ok(value) => value,
            Err(e) => return Ok(PatchResult::failure(format!("Could not parse ref UTP: {e}"))),
        };
        let Some(entry) = find_named(&reference, entry_name).cloned() else {
            return Ok(PatchResult::failure(format!(
                "Entry '{entry_name}' not found in ref UTP"
            )));
        };
        let target = match parse_json(target_file) {
            Ok(value) => value,
            Err(e) => return Ok(PatchResult::failure(format!("Could not parse new UTP: {e}"))),
        };

        let backup = self.session.backup_file(target_file)?;
        write_json(target_file, &replace_named(target, entry_name, entry))?;
        self.record_entry_added(
            NamedEntryFormat::Utp,
            reference_file,
            target_file,
            entry_name,
        );
        Ok(done(format!("Added UTP entry '{entry_name}'"), Some(backup)))
    }

    pub(crate) fn try_copy_whole_file(
        &self,
        reference_file: &Path,
        target_dir: &Path,
    ) -> Result<PatchResult> {
        if !reference_file.is_file() {
            return Ok(PatchResult::failure(format!(
                "Ref file not found: {}",
                reference_file.display()
            )));
        }
        if !target_dir.is_dir() {
            return Ok(PatchResult::failure(format!(
                "New directory not found: {}",
                target_dir.display()
            )));
        }

        let file_name = reference_file
            .file_name()
            .ok_or_else(|| ApplyError::NoFileName(reference_file.to_path_buf()))?;
        let dest = target_dir.join(file_name);
        let backup = if dest.is_file() {
            Some(self.session.backup_file(&dest)?)
        } else {
            None
        };

        copy_preserving(reference_file, &dest)?;
        let shown = file_name.to_string_lossy();
        self.record(
            "copy_whole_file",
            format!("Copied defeature file: {shown}"),
            vec![dest.clone()],
            Some(json!({ "source": reference_file.display().to_string() })),
        );
        Ok(done(format!("Copied '{shown}' to new InputFiles"), backup))
    }

    pub(crate) fn try_update_keyed_field(
        &self,
        target_file: &Path,
        instance_name: &str,
        field_name: &str,
        value: &str,
    ) -> Result<PatchResult> {
        if !target_file.is_file() {
            return Ok(PatchResult::failure(format!(
                "New MTPL not found: {}",
                target_file.display()
            )));
        }

        let content = read_text(target_file)?;
        let updated = match replace_field_value(
            &content,
            &self.anchors.instance_keywords,
            instance_name,
            field_name,
            value,
        )? {
            FieldEdit::Updated(updated) => updated,
            FieldEdit::NoInstance => {
                return Ok(PatchResult::failure(format!(
                    "Instance '{instance_name}' not found in new MTPL"
                )))
            }
            FieldEdit::NoField => {
                return Ok(PatchResult::failure(format!(
                    "Key '{field_name}' not found in instance '{instance_name}'"
                )))
            }
        };

        let backup = self.session.backup_file(target_file)?;
        atomic_write(target_file, updated.as_bytes())?;
        self.record(
            "update_keyed_field",
            format!("Updated {instance_name}.{field_name} = {value}"),
            vec![target_file.to_path_buf()],
            Some(json!({ "instance": instance_name, "key": field_name, "value": value })),
        );
        Ok(done(
            format!("Updated '{field_name}' in '{instance_name}'"),
            Some(backup),
        ))
    }

    fn record_entry_added(
        &self,
        format: NamedEntryFormat,
        reference_file: &Path,
        target_file: &Path,
        entry_name: &str,
    ) {
        self.record(
            format.action_kind(),
            format!("Added {} entry: {entry_name}", format.label()),
            vec![target_file.to_path_buf()],
            Some(json!({
                "entry_name": entry_name,
                "source": reference_file.display().to_string(),
            })),
        )
    }

    fn record(
        &self,
        action_kind: &str,
        description: String,
        affected_file_paths: Vec<PathBuf>,
        details: Option<Value>,
    ) {
        let entry = ChangeLogEntry {
            timestamp: Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            session_id: self.session.session_id().to_string(),
            action_kind: action_kind.to_string(),
            description,
            affected_file_paths,
            details,
        };
        // Best effort once the target has been rewritten.
        if let Err(e) = self.changelog.append(&entry) {
            warn!(
                error = %e,
                log = %self.changelog.path().display(),
                action = action_kind,
                "change log not updated"
            );
        }
    }
}

/// Render an unexpected error as a failed result.
pub(crate) fn settle(result: Result<PatchResult>) -> PatchResult {
    match result {
        Ok(outcome) => {
            if !outcome.succeeded {
                warn!(message = %outcome.message, "patch action failed");
            }
            outcome
        }
        Err(e) => {
            warn!(error = %e, "patch action raised");
            PatchResult::failure(format!("Exception: {e}"))
        }
    }
}

fn done(message: impl Into<String>, backup: Option<PathBuf>) -> PatchResult {
    let result = PatchResult::success(message, backup);
    info!(
        message = %result.message,
        backup = ?result.backup_path,
        "patch action applied"
    );
    result
}

fn missing_pair(
    reference_file: &Path,
    target_file: &Path,
    format: NamedEntryFormat,
) -> Option<PatchResult> {
    if !reference_file.is_file() {
        return Some(PatchResult::failure(format!(
            "Ref {} not found: {}",
            format.label(),
            reference_file.display()
        )));
    }
    if !target_file.is_file() {
        return Some(PatchResult::failure(format!(
            "New {} not found: {}",
            format.label(),
            target_file.display()
        )));
    }
    None
}

fn parse_json(path: &Path) -> Result<Value> {
    let raw = read_text(path)?;
    parse_lenient(&raw).map_err(|source| ApplyError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json(path: &Path, value: &Value) -> Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(ApplyError::Serialize)?;
    atomic_write(path, text.as_bytes())
}
