//! Configuration loading.
//!
//! Files are merged in a fixed order, later files overriding earlier ones:
//!
//! ```text
//! $DDB_DDB_HOME/ddb.yml, ddb.yaml, ddb.local.yml, ddb.local.yaml
//! $DDB_HOME/...
//! $DDB_PROJECT_HOME/...
//! ```

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, info};

use super::{Config, ConfigError, env, merge, migrations};
use crate::consts::{CONFIG_EXTENSIONS, CONFIG_FILENAMES};
use crate::platform::paths;

/// The three directories configuration is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRoots {
  pub ddb_home: PathBuf,
  pub home: PathBuf,
  pub project: PathBuf,
}

impl ConfigRoots {
  /// Roots located through `DDB_*` environment variables.
  pub fn from_env() -> Self {
    Self {
      ddb_home: paths::ddb_install_home(),
      home: paths::ddb_user_home(),
      project: paths::project_home(),
    }
  }

  /// Every root pointing at `dir`. Used for self-contained projects and tests.
  pub fn single(dir: &Path) -> Self {
    Self {
      ddb_home: dir.to_path_buf(),
      home: dir.to_path_buf(),
      project: dir.to_path_buf(),
    }
  }

  /// Roots in merge order.
  pub fn ordered(&self) -> [&Path; 3] {
    [self.ddb_home.as_path(), self.home.as_path(), self.project.as_path()]
  }
}

/// Candidate configuration files under the roots, in merge order.
pub fn candidate_files(roots: &ConfigRoots) -> Vec<PathBuf> {
  let mut files: Vec<PathBuf> = Vec::new();
  for root in roots.ordered() {
    for name in CONFIG_FILENAMES {
      for ext in CONFIG_EXTENSIONS {
        let file = root.join(format!("{}.{}", name, ext));
        if !files.contains(&file) {
          files.push(file);
        }
      }
    }
  }
  files
}

/// Load configuration using the process environment, then export the
/// top-level `env` mapping into it.
pub fn load(roots: &ConfigRoots) -> Result<Config, ConfigError> {
  let config = load_with(roots, &|name| std::env::var(name).ok(), migrations::builtin())?;
  env::export(config.exports());
  Ok(config)
}

/// Load configuration with an explicit environment lookup and migration set.
///
/// The top-level `env` mapping is removed from the tree and kept in
/// [`Config::exports`]; the process environment is left untouched.
pub fn load_with(
  roots: &ConfigRoots,
  lookup: &dyn Fn(&str) -> Option<String>,
  migrations: Vec<super::Migration>,
) -> Result<Config, ConfigError> {
  let mut tree = Value::Object(Map::new());
  let mut loaded: Vec<PathBuf> = Vec::new();

  for file in candidate_files(roots) {
    if !file.is_file() {
      continue;
    }
    let canonical = dunce::canonicalize(&file).unwrap_or_else(|_| file.clone());
    if loaded.contains(&canonical) {
      continue;
    }

    let document = read_file(&file)?;
    merge::merge(&mut tree, document)?;
    debug!(path = %file.display(), "configuration file merged");
    loaded.push(canonical);
  }

  let exports = env::take_env(&mut tree);

  let overridden = env::apply_overrides(&mut tree, lookup);
  if !overridden.is_empty() {
    debug!(count = overridden.len(), "environment overrides applied");
  }

  let applied: Vec<super::Migration> = migrations::apply(&mut tree, &migrations)
    .into_iter()
    .cloned()
    .collect();

  let config = Config::new(tree)
    .with_migrations(migrations)
    .with_sources(loaded, roots.clone())
    .with_exports(exports);
  for migration in &applied {
    config.warn_deprecated(migration, "configuration");
  }

  info!(files = config.files().len(), "configuration loaded");
  Ok(config)
}

fn read_file(path: &Path) -> Result<Value, ConfigError> {
  let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
    path: path.display().to_string(),
    source: e,
  })?;
  let value: Value = serde_yaml::from_str(&raw).map_err(|e| ConfigError::Parse {
    path: path.display().to_string(),
    source: e,
  })?;
  match value {
    Value::Null => Ok(Value::Object(Map::new())),
    Value::Object(_) => Ok(value),
    _ => Err(ConfigError::NotAMapping {
      path: path.display().to_string(),
    }),
  }
}
