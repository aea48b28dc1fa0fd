//! The project configuration file.
//!
//! JSON (`config.json`) is the native format; a path ending in `.toml` is
//! read and written as TOML instead.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tpmig_apply::{ApplierConfig, TextAnchors};
use tracing::debug;

use crate::error::{ConfigError, Result};

/// Default project file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Reference and new TP roots plus where each content area lives under them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationConfig {
    pub ref_tp_path: PathBuf,
    pub new_tp_path: PathBuf,
    #[serde(default)]
    pub sub_paths: SubPaths,
    /// Name patterns for the patmod comparison; empty compares everything.
    #[serde(default)]
    pub patmod_patterns: Vec<String>,
    /// MTPL instances compared by exact name.
    #[serde(default)]
    pub mtpl_instances: Vec<String>,
    /// MTPL instance name patterns; `{X}` stands for any run of digits.
    #[serde(default)]
    pub mtpl_instance_patterns: Vec<String>,
    #[serde(default)]
    pub workspace: WorkspaceSettings,
    #[serde(default)]
    pub anchors: TextAnchors,
}

/// Sub-paths relative to the TP roots. An empty path means "not configured".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubPaths {
    pub env_file: SidePaths,
    pub plist_xml: SidePaths,
    pub supersede_plist: PathBuf,
    pub mtpl_file: PathBuf,
    pub input_files: PathBuf,
    pub shmoo_config: PathBuf,
    pub patmod_file: PathBuf,
    pub utp_setpoints: PathBuf,
}

impl SubPaths {
    /// Sub-paths shared by both TPs, with their logical names.
    pub fn shared(&self) -> [(&'static str, &Path); 6] {
        [
            ("supersede_plist", self.supersede_plist.as_path()),
            ("mtpl_file", self.mtpl_file.as_path()),
            ("input_files", self.input_files.as_path()),
            ("shmoo_config", self.shmoo_config.as_path()),
            ("patmod_file", self.patmod_file.as_path()),
            ("utp_setpoints", self.utp_setpoints.as_path()),
        ]
    }
}

/// A sub-path that differs between the reference and the new TP.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SidePaths {
    #[serde(rename = "ref")]
    pub reference: PathBuf,
    pub new: PathBuf,
}

/// Where backups and the change log go.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceSettings {
    pub backup_root: PathBuf,
    pub change_log: PathBuf,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        let defaults = ApplierConfig::default();
        Self {
            backup_root: defaults.backup_root,
            change_log: defaults.change_log_path,
        }
    }
}

impl MigrationConfig {
    /// Applier settings, with relative workspace paths taken from `base_dir`.
    pub fn applier_config(&self, base_dir: &Path) -> ApplierConfig {
        ApplierConfig {
            backup_root: base_dir.join(&self.workspace.backup_root),
            change_log_path: base_dir.join(&self.workspace.change_log),
            anchors: self.anchors.clone(),
        }
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}

/// Read a project file.
pub fn load_config(path: &Path) -> Result<MigrationConfig> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = if is_toml(path) {
        toml::from_str(&raw).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?
    };
    debug!(path = %path.display(), "loaded project config");
    Ok(config)
}

/// Write a project file (2-space indented JSON, or TOML).
pub fn save_config(path: &Path, config: &MigrationConfig) -> Result<()> {
    let text = if is_toml(path) {
        toml::to_string_pretty(config).map_err(ConfigError::SerializeToml)?
    } else {
        serde_json::to_string_pretty(config).map_err(ConfigError::SerializeJson)?
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, text).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
