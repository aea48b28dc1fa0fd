//! Batch dispatch of patch actions.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tpmig_types::{PatchAction, PatchResult, ResolvedPaths};
use tracing::info;

use crate::applier::{settle, MigrationApplier};
use crate::error::{ApplyError, Result};

/// Logical path names an action may look up in [`ResolvedPaths`].
pub mod keys {
    pub const NEW_ENV_FILE: &str = "new_env_file";
    pub const NEW_SHMOO_CONFIG: &str = "new_shmoo_config";
    pub const REF_PATMOD_FILE: &str = "ref_patmod_file";
    pub const NEW_PATMOD_FILE: &str = "new_patmod_file";
    pub const REF_UTP_SETPOINTS: &str = "ref_utp_setpoints";
    pub const NEW_UTP_SETPOINTS: &str = "new_utp_setpoints";
    pub const NEW_INPUT_FILES: &str = "new_input_files";
    pub const NEW_MTPL_FILE: &str = "new_mtpl_file";
}

/// Outcome of one [`MigrationApplier::apply_batch`] call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// One result per action, in input order.
    pub results: Vec<PatchResult>,
    /// The session's backup folder, set only when some action succeeded.
    pub backup_folder: Option<PathBuf>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.succeeded).count()
    }

    /// `"<ok>/<total> actions applied successfully."`
    pub fn summary(&self) -> String {
        format!(
            "{}/{} actions applied successfully.",
            self.succeeded(),
            self.results.len()
        )
    }
}

impl MigrationApplier {
    /// Run `actions` in order under one fresh backup session.
    ///
    /// A failing action, expected or not, only fails its own result.
    pub fn apply_batch(
        &mut self,
        actions: &[PatchAction],
        resolved: &ResolvedPaths,
    ) -> BatchReport {
        self.session.reset();
        let results = actions
            .iter()
            .map(|action| settle(self.dispatch(action, resolved)))
            .collect();
        self.finish(results)
    }

    /// [`apply_batch`](Self::apply_batch) over actions still in JSON form.
    ///
    /// Each element is decoded on its own; one that does not decode fails
    /// its slot with `"Exception: invalid action: ..."` and the rest still run.
    pub fn apply_json_batch(&mut self, actions: &[Value], resolved: &ResolvedPaths) -> BatchReport {
        self.session.reset();
        let results = actions
            .iter()
            .map(|raw| {
                settle(
                    PatchAction::deserialize(raw)
                        .map_err(ApplyError::Action)
                        .and_then(|action| self.dispatch(&action, resolved)),
                )
            })
            .collect();
        self.finish(results)
    }

    fn finish(&self, results: Vec<PatchResult>) -> BatchReport {
        let report = BatchReport {
            backup_folder: results
                .iter()
                .any(|r| r.succeeded)
                .then(|| self.session.folder()),
            results,
        };
        info!(
            session = %self.session.session_id(),
            summary = %report.summary(),
            "batch applied"
        );
        report
    }

    fn dispatch(&self, action: &PatchAction, resolved: &ResolvedPaths) -> Result<PatchResult> {
        match action {
            PatchAction::InsertPathEntry { path_entry } => {
                self.try_insert_path_entry(resolved.require(keys::NEW_ENV_FILE)?, path_entry)
            }
            PatchAction::CopyBlockEntry {
                reference_file,
                target_file,
                block_name,
            } => self.try_copy_block_entry(reference_file, target_file, block_name),
            PatchAction::UpsertKeyedValue { key, value } => {
                self.try_upsert_keyed_value(resolved.require(keys::NEW_SHMOO_CONFIG)?, key, value)
            }
            PatchAction::AddPatmodEntry { entry_name } => self.try_add_patmod_entry(
                resolved.require(keys::REF_PATMOD_FILE)?,
                resolved.require(keys::NEW_PATMOD_FILE)?,
                entry_name,
            ),
            PatchAction::AddUtpEntry { entry_name } => self.try_add_utp_entry(
                resolved.require(keys::REF_UTP_SETPOINTS)?,
                resolved.require(keys::NEW_UTP_SETPOINTS)?,
                entry_name,
            ),
            PatchAction::CopyWholeFile { reference_file } => {
                self.try_copy_whole_file(reference_file, resolved.require(keys::NEW_INPUT_FILES)?)
            }
            PatchAction::UpdateKeyedField {
                instance_name,
                field_name,
                value,
            } => self.try_update_keyed_field(
                resolved.require(keys::NEW_MTPL_FILE)?,
                instance_name,
                field_name,
                value,
            ),
            PatchAction::Unknown => Ok(PatchResult::failure("Unknown action type")),
        }
    }
}
