//! Session-scoped backups.
//!
//! Every file touched by the applier is first copied into
//! `<backup_root>/<session_id>/`. One session covers everything between two
//! [`BackupSession::reset`] calls, so a whole batch can be restored from a
//! single folder.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::debug;

use crate::error::{ApplyError, Result};
use crate::fsio::copy_preserving;

/// Backup folder bookkeeping for one applier.
#[derive(Debug)]
pub struct BackupSession {
    root: PathBuf,
    session_id: String,
}

impl BackupSession {
    /// Start a session under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let session_id = fresh_session_id(&root);
        Self { root, session_id }
    }

    /// Begin a new session: a local timestamp to the second, suffixed with
    /// `_<n>` when a folder of that name already exists.
    pub fn reset(&mut self) -> &str {
        self.session_id = fresh_session_id(&self.root);
        debug!(session = %self.session_id, "backup session reset");
        &self.session_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The folder this session's backups go to. It exists once the first
    /// backup has been taken.
    pub fn folder(&self) -> PathBuf {
        self.root.join(&self.session_id)
    }

    /// Copy `path` into the session folder and return the copy's path.
    ///
    /// A name already used in this session gets `_1`, `_2`, ... inserted
    /// before its extension.
    pub fn backup_file(&self, path: &Path) -> Result<PathBuf> {
        let folder = self.folder();
        fs::create_dir_all(&folder).map_err(ApplyError::io(&folder))?;

        let file_name = path
            .file_name()
            .ok_or_else(|| ApplyError::NoFileName(path.to_path_buf()))?;
        let mut dest = folder.join(file_name);

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let mut counter = 1;
        while dest.exists() {
            dest = folder.join(format!("{stem}_{counter}{extension}"));
            counter += 1;
        }

        copy_preserving(path, &dest)?;
        debug!(source = %path.display(), backup = %dest.display(), "backed up file");
        Ok(dest)
    }
}

fn fresh_session_id(root: &Path) -> String {
    let base = Local::now().format("%Y%m%d_%H%M%S").to_string();
    if !root.join(&base).exists() {
        return base;
    }
    (1..)
        .map(|n| format!("{base}_{n}"))
        .find(|candidate| !root.join(candidate).exists())
        .unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_copies_content() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("config.json");
        fs::write(&target, "{\"a\": 1}").unwrap();

        let session = BackupSession::new(dir.path().join("backups"));
        let backup = session.backup_file(&target).unwrap();

        assert_eq!(backup, session.folder().join("config.json"));
        assert_eq!(fs::read_to_string(&backup).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn repeated_names_get_counters() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::create_dir_all(dir.path().join("b")).unwrap();
        let first = dir.path().join("a").join("x.patmod.json");
        let second = dir.path().join("b").join("x.patmod.json");
        fs::write(&first, "1").unwrap();
        fs::write(&second, "2").unwrap();

        let session = BackupSession::new(dir.path().join("backups"));
        let b1 = session.backup_file(&first).unwrap();
        let b2 = session.backup_file(&second).unwrap();
        let b3 = session.backup_file(&first).unwrap();

        assert_eq!(b1.file_name().unwrap(), "x.patmod.json");
        assert_eq!(b2.file_name().unwrap(), "x.patmod_1.json");
        assert_eq!(b3.file_name().unwrap(), "x.patmod_2.json");
        assert_eq!(fs::read_to_string(b2).unwrap(), "2");
    }

    #[test]
    fn reset_never_reuses_an_existing_folder() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("t.txt");
        fs::write(&target, "x").unwrap();

        let mut session = BackupSession::new(dir.path().join("backups"));
        session.backup_file(&target).unwrap();
        let first = session.folder();

        session.reset();
        assert_ne!(session.folder(), first);
    }

    #[test]
    fn missing_source_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let session = BackupSession::new(dir.path());
        assert!(session.backup_file(&dir.path().join("absent.txt")).is_err());
    }
}
