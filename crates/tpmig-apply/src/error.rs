//! Error types for the applier.

use std::io;
use std::path::PathBuf;

use tpmig_types::TypesError;

/// Unexpected failures inside a patch operation.
///
/// Expected failures (missing file, name not found) are returned as failed
/// [`tpmig_types::PatchResult`]s. These errors are the remainder; the public
/// operations render them as `"Exception: <error>"`.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("io error on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid action: {0}")]
    Action(#[source] serde_json::Error),

    #[error("cannot serialize JSON: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error(transparent)]
    Paths(#[from] TypesError),

    #[error("{0} has no file name")]
    NoFileName(PathBuf),

    #[error("invalid search pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl ApplyError {
    pub(crate) fn io(path: &std::path::Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Convenience alias for applier results.
pub type Result<T> = std::result::Result<T, ApplyError>;
