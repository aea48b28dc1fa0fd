use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::TypesError;

/// Logical file names (`new_env_file`, `ref_patmod_file`, ...) mapped to
/// concrete paths.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolvedPaths(BTreeMap<String, PathBuf>);

impl ResolvedPaths {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, path: impl Into<PathBuf>) {
        self.0.insert(key.into(), path.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.insert(key, path);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Path> {
        self.0.get(key).map(PathBuf::as_path)
    }

    /// Look up a path that an operation cannot run without.
    pub fn require(&self, key: &str) -> Result<&Path, TypesError> {
        match self.0.get(key) {
            None => Err(TypesError::MissingPath(key.to_string())),
            Some(path) if path.as_os_str().is_empty() => {
                Err(TypesError::EmptyPath(key.to_string()))
            }
            Some(path) => Ok(path),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_path()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, PathBuf)> for ResolvedPaths {
    fn from_iter<I: IntoIterator<Item = (String, PathBuf)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
