//! Filesystem write primitives.
//!
//! `write_if_different` is the only way generated artifacts are written: the
//! target is left untouched when its bytes already match, and a read-only
//! target is made writable for the duration of the write.

use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::trace;

use crate::platform::permissions::{PermissionError, is_readonly, set_readonly};

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
  #[error("failed to write {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  Permission(#[from] PermissionError),
}

/// Write `content` to `path` unless the file already holds exactly those bytes.
///
/// Parent directories are created as needed. When the existing file is
/// read-only, the flag is cleared for the write and restored afterwards.
/// Returns `true` when the file was written.
pub fn write_if_different(path: &Path, content: &[u8]) -> Result<bool, WriteError> {
  if let Ok(existing) = fs::read(path)
    && existing == content
  {
    trace!(path = %path.display(), "content unchanged");
    return Ok(false);
  }

  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    fs::create_dir_all(parent).map_err(|e| WriteError::Io {
      path: parent.display().to_string(),
      source: e,
    })?;
  }

  let was_readonly = is_readonly(path);
  if was_readonly {
    set_readonly(path, false)?;
  }

  fs::write(path, content).map_err(|e| WriteError::Io {
    path: path.display().to_string(),
    source: e,
  })?;

  if was_readonly {
    set_readonly(path, true)?;
  }

  trace!(path = %path.display(), bytes = content.len(), "wrote file");
  Ok(true)
}

/// Write `content` to `path` atomically via a sibling temp file and rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<(), WriteError> {
  let dir = path.parent().unwrap_or_else(|| Path::new("."));
  fs::create_dir_all(dir).map_err(|e| WriteError::Io {
    path: dir.display().to_string(),
    source: e,
  })?;

  let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| WriteError::Io {
    path: dir.display().to_string(),
    source: e,
  })?;
  temp.write_all(content).map_err(|e| WriteError::Io {
    path: temp.path().display().to_string(),
    source: e,
  })?;
  temp.persist(path).map_err(|e| WriteError::Io {
    path: path.display().to_string(),
    source: e.error,
  })?;
  Ok(())
}
