//! Project configuration for TP migration.
//!
//! A project file names the reference and new TP roots, the sub-paths of each
//! content area beneath them, and where the applier keeps its backups and
//! change log. [`resolve_paths`] turns it into the [`ResolvedPaths`] map the
//! comparator and applier consume.
//!
//! [`ResolvedPaths`]: tpmig_types::ResolvedPaths

pub mod error;
pub mod paths;
pub mod project;

pub use error::{ConfigError, Result};
pub use paths::{normalize, resolve_paths, validate_paths, PathStatus};
pub use project::{
    load_config, save_config, MigrationConfig, SidePaths, SubPaths, WorkspaceSettings,
    DEFAULT_CONFIG_FILE,
};
