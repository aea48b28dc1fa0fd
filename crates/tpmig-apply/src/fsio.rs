//! File helpers shared by the patch operations.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{ApplyError, Result};

/// Read a file as text, replacing invalid UTF-8 sequences.
pub fn read_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(ApplyError::io(path))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Replace `path` with `contents` via a temp file in the same directory.
///
/// The rename is the only step visible to readers: either the old content or
/// the new content is on disk, never a partial write. An existing target's
/// permissions carry over to the replacement.
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(ApplyError::io(dir))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(ApplyError::io(dir))?;
    tmp.write_all(contents).map_err(ApplyError::io(tmp.path()))?;
    tmp.as_file().sync_all().map_err(ApplyError::io(tmp.path()))?;

    if let Ok(meta) = fs::metadata(path) {
        tmp.as_file()
            .set_permissions(meta.permissions())
            .map_err(ApplyError::io(path))?;
    }

    tmp.persist(path).map_err(|e| ApplyError::Io {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

/// Copy `from` to `to`, keeping permissions and modification time.
pub fn copy_preserving(from: &Path, to: &Path) -> Result<()> {
    fs::copy(from, to).map_err(ApplyError::io(from))?;
    let modified = fs::metadata(from)
        .and_then(|meta| meta.modified())
        .map_err(ApplyError::io(from))?;
    File::options()
        .write(true)
        .open(to)
        .and_then(|file| file.set_modified(modified))
        .map_err(ApplyError::io(to))?;
    Ok(())
}
