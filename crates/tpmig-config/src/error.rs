//! Error types for configuration handling.

use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot access config {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("invalid JSON config {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid TOML config {}: {source}", path.display())]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("cannot serialize config as JSON: {0}")]
    SerializeJson(#[source] serde_json::Error),

    #[error("cannot serialize config as TOML: {0}")]
    SerializeToml(#[source] toml::ser::Error),
}

/// Convenience alias for configuration results.
pub type Result<T> = std::result::Result<T, ConfigError>;
