//! Applier for TP migration.
//!
//! Mutates files of the new test program to match selected reference values.
//! Every mutation is preceded by a backup into a session folder and followed
//! by one change-log record; failures come back as [`PatchResult`] values.
//!
//! # Key Types
//!
//! - [`MigrationApplier`] -- Owns the backup session and change log; runs single actions
//! - [`BatchReport`] -- Results of [`MigrationApplier::apply_batch`] plus the backup folder
//! - [`BackupSession`] -- `<backup_root>/<session_id>/` bookkeeping
//! - [`ChangeLog`] -- Read-modify-write JSON array of [`ChangeLogEntry`] records
//! - [`ApplierConfig`] / [`TextAnchors`] -- Side-effect locations and free-text anchors
//!
//! [`PatchResult`]: tpmig_types::PatchResult
//! [`ChangeLogEntry`]: tpmig_types::ChangeLogEntry

pub mod applier;
pub mod backup;
pub mod batch;
pub mod changelog;
pub mod config;
pub mod error;
pub mod fsio;
pub mod json_edit;
pub mod splice;

pub use applier::{MigrationApplier, NamedEntryFormat};
pub use backup::BackupSession;
pub use batch::{keys, BatchReport};
pub use changelog::ChangeLog;
pub use config::{ApplierConfig, TextAnchors};
pub use error::{ApplyError, Result};
