use thiserror::Error;

/// Errors produced by shared-type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("missing resolved path '{0}'")]
    MissingPath(String),

    #[error("resolved path '{0}' is empty")]
    EmptyPath(String),
}
