//! Locations of the three configuration roots and the cache directory.
//!
//! ```text
//! $DDB_PROJECT_HOME   (default: current directory)
//! $DDB_HOME           (default: ~/.docker-devbox)
//! ├── cache/          # persistent caches
//! └── $DDB_DDB_HOME   (default: $DDB_HOME/ddb)
//! ```

use std::path::PathBuf;

use crate::consts::ENV_PREFIX;

/// Returns the user's home directory
#[cfg(windows)]
pub fn home_dir() -> PathBuf {
  std::env::var("USERPROFILE")
    .map(PathBuf::from)
    .unwrap_or_else(|_| PathBuf::from("."))
}

/// Returns the user's home directory
#[cfg(not(windows))]
pub fn home_dir() -> PathBuf {
  std::env::var("HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|_| PathBuf::from("."))
}

fn env_path(suffix: &str) -> Option<PathBuf> {
  std::env::var(format!("{}_{}", ENV_PREFIX, suffix))
    .ok()
    .filter(|v| !v.is_empty())
    .map(PathBuf::from)
}

/// Returns the project directory: `$DDB_PROJECT_HOME` or the working directory.
pub fn project_home() -> PathBuf {
  env_path("PROJECT_HOME")
    .or_else(|| std::env::current_dir().ok())
    .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns the tool's home directory: `$DDB_HOME` or `~/.docker-devbox`.
pub fn ddb_user_home() -> PathBuf {
  env_path("HOME").unwrap_or_else(|| home_dir().join(".docker-devbox"))
}

/// Returns the tool's installation directory: `$DDB_DDB_HOME` or `<home>/ddb`.
pub fn ddb_install_home() -> PathBuf {
  env_path("DDB_HOME").unwrap_or_else(|| ddb_user_home().join("ddb"))
}

/// Returns the directory holding persistent caches.
pub fn cache_dir() -> PathBuf {
  ddb_user_home().join("cache")
}
