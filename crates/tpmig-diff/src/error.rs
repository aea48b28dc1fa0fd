//! Error types for the diff crate.

use std::path::PathBuf;

/// Errors that can occur while loading comparison inputs.
///
/// Public comparison functions never return these; they are rendered into
/// the `load_error_*` / `error` fields of the result instead.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// The file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file is not JSON even after comment and trailing-comma cleanup.
    #[error("invalid JSON in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// A directory could not be listed.
    #[error("cannot list {}: {source}", path.display())]
    ListDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A search pattern built from a configured anchor did not compile.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Convenience alias for diff results.
pub type Result<T> = std::result::Result<T, DiffError>;
