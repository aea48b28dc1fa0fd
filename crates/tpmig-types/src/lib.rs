//! Shared types for the TP migration toolkit.
//!
//! Comparison results, patch requests, and audit records exchanged between the
//! comparator, the applier, and whatever front-end drives them. Every type here
//! serializes to JSON so a UI can render it directly.
//!
//! # Key Types
//!
//! - [`DiffResult`] -- Four-bucket classification of two keyed documents
//! - [`NamedEntry`] -- A named object parsed from a patmod file, with its leading comment
//! - [`TreeChange`] -- A single path-addressed change from a recursive JSON diff
//! - [`DirectoryDiff`] -- File-level pairing of two directories plus per-pair tree diffs
//! - [`ConsistencyIssue`] -- UTP setpoint reference missing from the patmod names
//! - [`EnvDiff`], [`PlistFolderDiff`], [`XmlPlistDiff`], [`MtplDiff`] -- Results for the free-text sources
//! - [`PatchAction`] / [`PatchResult`] -- A requested file mutation and its outcome
//! - [`ChangeLogEntry`] -- Persisted audit record of an executed action
//! - [`ResolvedPaths`] -- Logical path names mapped to concrete files

pub mod changelog;
pub mod diff;
pub mod error;
pub mod patch;
pub mod resolved;
pub mod text_diff;

pub use changelog::ChangeLogEntry;
pub use diff::{
    ConsistencyIssue, DiffResult, DiffStats, Different, DirectoryDiff, FilePairDiff, IssueKind,
    NamedEntry, OnlyInNew, OnlyInReference, TreeChange,
};
pub use error::TypesError;
pub use patch::{PatchAction, PatchResult};
pub use resolved::ResolvedPaths;
pub use text_diff::{
    EnvDiff, InstanceDiff, InstanceKind, MtplDiff, MtplInstance, PathEntry, PathKind,
    PlistBlockDiff, PlistFileDiff, PlistFolderDiff, XmlPlistDiff,
};
