//! File permission management for generated artifacts.
//!
//! Generated files may be left read-only so that hand edits are discouraged.
//! Writers temporarily lift the flag and restore it afterwards.
//!
//! ## Platform Behavior
//!
//! - **Unix**: toggles the owner/group/other write bits, applies mode specs
//!   such as `+x`, `-x` or `0755`
//! - **Windows**: toggles the read-only attribute; mode specs are ignored

use std::path::Path;

use tracing::debug;

/// Error during permission operations.
#[derive(Debug, thiserror::Error)]
pub enum PermissionError {
  #[error("failed to set permissions on {path}: {source}")]
  SetPermissions {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to read metadata for {path}: {source}")]
  Metadata {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid permission spec '{0}' (expected +x, -x, +w, -w or an octal mode)")]
  InvalidSpec(String),
}

/// Returns whether the file at `path` is read-only. Missing files are not.
pub fn is_readonly(path: &Path) -> bool {
  std::fs::metadata(path)
    .map(|m| m.permissions().readonly())
    .unwrap_or(false)
}

/// Set or clear the read-only flag on `path`.
pub fn set_readonly(path: &Path, readonly: bool) -> Result<(), PermissionError> {
  let metadata = std::fs::metadata(path).map_err(|e| PermissionError::Metadata {
    path: path.display().to_string(),
    source: e,
  })?;

  let mut perms = metadata.permissions();
  if perms.readonly() == readonly {
    return Ok(());
  }

  debug!(path = %path.display(), readonly, "toggling read-only flag");

  set_readonly_bits(&mut perms, readonly);
  std::fs::set_permissions(path, perms).map_err(|e| PermissionError::SetPermissions {
    path: path.display().to_string(),
    source: e,
  })
}

#[cfg(unix)]
fn set_readonly_bits(perms: &mut std::fs::Permissions, readonly: bool) {
  use std::os::unix::fs::PermissionsExt;

  let mode = perms.mode();
  let new_mode = if readonly { mode & !0o222 } else { mode | 0o200 };
  perms.set_mode(new_mode);
}

#[cfg(not(unix))]
fn set_readonly_bits(perms: &mut std::fs::Permissions, readonly: bool) {
  perms.set_readonly(readonly);
}

/// A permission change requested by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeSpec {
  /// Add the executable bits where the read bits are set.
  AddExecutable,
  /// Remove all executable bits.
  RemoveExecutable,
  /// Add the owner write bit.
  AddWritable,
  /// Remove all write bits.
  RemoveWritable,
  /// Replace the permission bits.
  Octal(u32),
}

impl std::str::FromStr for ModeSpec {
  type Err = PermissionError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim() {
      "+x" => Ok(ModeSpec::AddExecutable),
      "-x" => Ok(ModeSpec::RemoveExecutable),
      "+w" => Ok(ModeSpec::AddWritable),
      "-w" => Ok(ModeSpec::RemoveWritable),
      other => u32::from_str_radix(other.trim_start_matches("0o"), 8)
        .ok()
        .filter(|mode| *mode <= 0o7777)
        .map(ModeSpec::Octal)
        .ok_or_else(|| PermissionError::InvalidSpec(s.to_string())),
    }
  }
}

/// Apply a mode spec to `path`. Returns whether the permissions changed.
#[cfg(unix)]
pub fn apply_mode(path: &Path, spec: ModeSpec) -> Result<bool, PermissionError> {
  use std::os::unix::fs::PermissionsExt;

  let metadata = std::fs::metadata(path).map_err(|e| PermissionError::Metadata {
    path: path.display().to_string(),
    source: e,
  })?;

  let mut perms = metadata.permissions();
  let current = perms.mode() & 0o7777;
  let new_mode = match spec {
    ModeSpec::AddExecutable => current | ((current & 0o444) >> 2),
    ModeSpec::RemoveExecutable => current & !0o111,
    ModeSpec::AddWritable => current | 0o200,
    ModeSpec::RemoveWritable => current & !0o222,
    ModeSpec::Octal(mode) => mode,
  };

  if new_mode == current {
    return Ok(false);
  }

  perms.set_mode(new_mode);
  std::fs::set_permissions(path, perms).map_err(|e| PermissionError::SetPermissions {
    path: path.display().to_string(),
    source: e,
  })?;
  Ok(true)
}

#[cfg(not(unix))]
pub fn apply_mode(_path: &Path, _spec: ModeSpec) -> Result<bool, PermissionError> {
  Ok(false)
}
