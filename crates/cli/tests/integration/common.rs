//! Shared test helpers for CLI integration tests.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Isolated test environment.
///
/// Each test gets its own project directory and its own tool home, so
/// configuration and caches never leak between tests or from the host.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  /// Create a project whose `ddb.yml` holds `config`.
  pub fn new(config: &str) -> Self {
    let env = Self {
      temp: TempDir::new().unwrap(),
    };
    env.write_file("ddb.yml", config);
    env
  }

  /// Project directory, canonicalized so paths printed by `ddb` compare equal.
  pub fn project_path(&self) -> PathBuf {
    let p = self.temp.path().join("project");
    std::fs::create_dir_all(&p).unwrap();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  /// Tool home holding the user configuration and the caches.
  pub fn home_path(&self) -> PathBuf {
    let p = self.temp.path().join("home");
    std::fs::create_dir_all(&p).unwrap();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  /// Write a file relative to the project directory.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.project_path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  pub fn read_file(&self, relative_path: &str) -> String {
    std::fs::read_to_string(self.project_path().join(relative_path))
      .unwrap_or_else(|e| panic!("Failed to read {}: {}", relative_path, e))
  }

  pub fn exists(&self, relative_path: &str) -> bool {
    std::fs::symlink_metadata(self.project_path().join(relative_path)).is_ok()
  }

  pub fn remove_file(&self, relative_path: &str) {
    std::fs::remove_file(self.project_path().join(relative_path)).unwrap();
  }

  /// A `ddb` command running in the project with isolated homes.
  pub fn ddb_cmd(&self) -> Command {
    ddb_cmd_in(&self.project_path(), &self.home_path())
  }
}

pub fn ddb_cmd_in(project: &Path, home: &Path) -> Command {
  let mut cmd = cargo_bin_cmd!("ddb");
  cmd
    .current_dir(project)
    .env("DDB_PROJECT_HOME", project)
    .env("DDB_HOME", home)
    .env("DDB_DDB_HOME", home.join("ddb"))
    .env_remove("DDB_SHELL_ENVIRON_BACKUP")
    .env_remove("RUST_LOG");
  cmd
}
