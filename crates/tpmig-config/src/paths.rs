//! Resolving configured sub-paths into concrete file paths.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tpmig_types::ResolvedPaths;

use crate::project::MigrationConfig;

/// Existence check result for one resolved path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PathStatus {
    pub path: PathBuf,
    pub exists: bool,
}

/// Join every configured sub-path onto its TP root.
///
/// Produces `ref_tp_path`, `new_tp_path`, `ref_/new_env_file`,
/// `ref_/new_plist_xml`, and `ref_<name>`/`new_<name>` for each shared
/// sub-path. Joined paths are normalized lexically; an unset sub-path
/// resolves to an empty path.
pub fn resolve_paths(config: &MigrationConfig) -> ResolvedPaths {
    let reference = &config.ref_tp_path;
    let new = &config.new_tp_path;
    let sub = &config.sub_paths;

    let mut resolved = ResolvedPaths::new()
        .with("ref_tp_path", reference.clone())
        .with("new_tp_path", new.clone())
        .with("ref_env_file", join(reference, &sub.env_file.reference))
        .with("new_env_file", join(new, &sub.env_file.new))
        .with("ref_plist_xml", join(reference, &sub.plist_xml.reference))
        .with("new_plist_xml", join(new, &sub.plist_xml.new));

    for (name, rel) in sub.shared() {
        resolved.insert(format!("ref_{name}"), join(reference, rel));
        resolved.insert(format!("new_{name}"), join(new, rel));
    }
    resolved
}

/// Which resolved paths exist on disk. Empty paths never exist.
pub fn validate_paths(resolved: &ResolvedPaths) -> BTreeMap<String, PathStatus> {
    resolved
        .iter()
        .map(|(key, path)| {
            let exists = !path.as_os_str().is_empty() && path.exists();
            (
                key.to_string(),
                PathStatus {
                    path: path.to_path_buf(),
                    exists,
                },
            )
        })
        .collect()
}

fn join(base: &Path, rel: &Path) -> PathBuf {
    if rel.as_os_str().is_empty() {
        PathBuf::new()
    } else {
        normalize(&base.join(rel))
    }
}

/// Collapse `.` and `..` components without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}
