//! The effective configuration tree.
//!
//! Configuration is loaded from YAML files under three roots (see
//! [`loader`]), merged, overridden from the environment and migrated. The
//! result is a [`Config`] offering dotted-key access such as
//! `config.get_str("core.env.current")`.
//!
//! Reads are migration aware: a key that only exists under its deprecated or
//! its replacement name still resolves, with a one-time deprecation warning.

pub mod env;
pub mod loader;
pub mod merge;
pub mod migrations;
pub mod path;
pub mod schema;

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::warn;

pub use loader::{ConfigRoots, load, load_with};
pub use migrations::Migration;
pub use schema::{FieldError, Schema};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("failed to read {path}: {source}")]
  Read {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse {path}: {source}")]
  Parse {
    path: String,
    #[source]
    source: serde_yaml::Error,
  },

  #[error("{path} must contain a mapping at the top level")]
  NotAMapping { path: String },

  #[error("invalid merge strategy '{0}'")]
  InvalidMergeStrategy(String),

  #[error("invalid configuration key '{key}': {source}")]
  Path {
    key: String,
    #[source]
    source: path::PathError,
  },

  #[error("configuration key '{key}' has an unexpected type: {source}")]
  Type {
    key: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("invalid configuration for '{namespace}':{errors}")]
  Schema { namespace: String, errors: FieldErrors },
}

/// Field errors rendered as an enumerated list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(pub Vec<FieldError>);

impl fmt::Display for FieldErrors {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, error) in self.0.iter().enumerate() {
      write!(f, "\n  {}. {}", i + 1, error)?;
    }
    Ok(())
  }
}

/// The merged configuration.
#[derive(Debug, Default)]
pub struct Config {
  tree: Value,
  files: Vec<PathBuf>,
  roots: Option<ConfigRoots>,
  migrations: Vec<Migration>,
  exports: Vec<(String, String)>,
  warned: RefCell<HashSet<(String, String)>>,
}

/// A key the read path can resolve through a migration.
struct Alias<'a> {
  /// Key the value is stored under.
  from: &'a str,
  /// Key the caller asked for.
  to: &'a str,
  migration: &'a Migration,
  forward: bool,
}

impl Config {
  /// Wrap an already merged tree.
  pub fn new(tree: Value) -> Self {
    Self {
      tree: if tree.is_null() { Value::Object(Map::new()) } else { tree },
      ..Self::default()
    }
  }

  pub fn with_migrations(mut self, migrations: Vec<Migration>) -> Self {
    self.migrations = migrations;
    self
  }

  pub(crate) fn with_sources(mut self, files: Vec<PathBuf>, roots: ConfigRoots) -> Self {
    self.files = files;
    self.roots = Some(roots);
    self
  }

  pub(crate) fn with_exports(mut self, exports: Vec<(String, String)>) -> Self {
    self.exports = exports;
    self
  }

  /// Variables from the top-level `env` mapping, in file order.
  pub fn exports(&self) -> &[(String, String)] {
    &self.exports
  }

  pub fn tree(&self) -> &Value {
    &self.tree
  }

  /// Files that contributed to this configuration, in merge order.
  pub fn files(&self) -> &[PathBuf] {
    &self.files
  }

  pub fn roots(&self) -> Option<&ConfigRoots> {
    self.roots.as_ref()
  }

  pub fn migrations(&self) -> &[Migration] {
    &self.migrations
  }

  /// Whether `path` is one of the loaded configuration files.
  pub fn is_config_file(&self, path: &Path) -> bool {
    let candidate = dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    self.files.iter().any(|f| *f == candidate || f == path)
  }

  /// The value at `key`, resolving migration aliases.
  pub fn get(&self, key: &str) -> Option<Value> {
    if key.is_empty() {
      return Some(self.tree.clone());
    }

    let segments = path::parse(key);
    if let Some(value) = path::lookup(&self.tree, &segments) {
      let mut value = value.clone();
      if value.is_object() {
        self.reconstruct(key, &mut value);
      }
      return Some(value);
    }

    for alias in self.aliases() {
      let Some(source) = path::lookup(&self.tree, &path::parse(alias.from)) else {
        continue;
      };
      if alias.to == key {
        self.warn_once(alias.from, alias.to, key);
        return Some(self.alias_value(&alias, source));
      }
      if let Some(rest) = key.strip_prefix(alias.to).and_then(|r| r.strip_prefix(['.', '[']).map(|_| r))
        && let Some(found) = path::lookup(&self.alias_value(&alias, source), &path::parse(rest))
      {
        self.warn_once(alias.from, alias.to, key);
        return Some(found.clone());
      }
    }

    let mut parent = Value::Object(Map::new());
    self.reconstruct(key, &mut parent).then_some(parent)
  }

  /// Deserialize the value at `key`.
  pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
    self
      .get(key)
      .map(|value| {
        serde_json::from_value(value).map_err(|e| ConfigError::Type {
          key: key.to_string(),
          source: e,
        })
      })
      .transpose()
  }

  /// The value at `key` rendered as a string. Mappings and lists are `None`.
  pub fn get_str(&self, key: &str) -> Option<String> {
    match self.get(key)? {
      Value::String(s) => Some(s),
      Value::Bool(b) => Some(b.to_string()),
      Value::Number(n) => Some(n.to_string()),
      _ => None,
    }
  }

  pub fn get_bool(&self, key: &str) -> Option<bool> {
    match self.get(key)? {
      Value::Bool(b) => Some(b),
      Value::String(s) => match s.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
      },
      Value::Number(n) => n.as_i64().map(|i| i != 0),
      _ => None,
    }
  }

  pub fn contains(&self, key: &str) -> bool {
    self.get(key).is_some()
  }

  pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<(), ConfigError> {
    path::insert(&mut self.tree, &path::parse(key), value.into()).map_err(|e| ConfigError::Path {
      key: key.to_string(),
      source: e,
    })
  }

  pub fn remove(&mut self, key: &str) -> Option<Value> {
    path::remove(&mut self.tree, &path::parse(key))
  }

  /// Deprecated keys reported so far, as `(old key, source)` pairs.
  pub fn deprecations(&self) -> Vec<(String, String)> {
    let mut reported: Vec<_> = self.warned.borrow().iter().cloned().collect();
    reported.sort();
    reported
  }

  /// Log a deprecation once per `(old_key, source)`.
  pub(crate) fn warn_deprecated(&self, migration: &Migration, source: &str) {
    let first = self
      .warned
      .borrow_mut()
      .insert((migration.old_key.clone(), source.to_string()));
    if first {
      warn!(
        old = %migration.old_key,
        new = %migration.new_key,
        source,
        "configuration key '{}' is deprecated, use '{}' instead",
        migration.old_key,
        migration.new_key
      );
    }
  }

  fn warn_once(&self, from: &str, to: &str, key: &str) {
    let Some(migration) = self
      .migrations
      .iter()
      .find(|m| (m.old_key == from && m.new_key == to) || (m.old_key == to && m.new_key == from))
    else {
      return;
    };
    let first = self.warned.borrow_mut().insert((key.to_string(), "read".to_string()));
    if first {
      warn!(
        old = %migration.old_key,
        new = %migration.new_key,
        key,
        "configuration key '{}' is deprecated, use '{}' instead",
        migration.old_key,
        migration.new_key
      );
    }
  }

  /// Forward aliases (old → new) followed by backward ones (new → old).
  fn aliases(&self) -> impl Iterator<Item = Alias<'_>> {
    let forward = self.migrations.iter().map(|m| Alias {
      from: &m.old_key,
      to: &m.new_key,
      migration: m,
      forward: true,
    });
    let backward = self.migrations.iter().map(|m| Alias {
      from: &m.new_key,
      to: &m.old_key,
      migration: m,
      forward: false,
    });
    forward.chain(backward)
  }

  fn alias_value(&self, alias: &Alias<'_>, source: &Value) -> Value {
    if alias.forward {
      alias.migration.transform(source)
    } else {
      source.clone()
    }
  }

  /// Fill children of the mapping at `key` that only exist under a deprecated
  /// name. Returns whether anything was added.
  fn reconstruct(&self, key: &str, node: &mut Value) -> bool {
    let mut changed = false;
    for alias in self.aliases().filter(|a| a.forward) {
      let Some(relative) = alias.to.strip_prefix(key).and_then(|r| r.strip_prefix('.')) else {
        continue;
      };
      let relative = path::parse(relative);
      if path::lookup(node, &relative).is_some() {
        continue;
      }
      let Some(source) = path::lookup(&self.tree, &path::parse(alias.from)) else {
        continue;
      };
      if path::insert(node, &relative, self.alias_value(&alias, source)).is_ok() {
        self.warn_once(alias.from, alias.to, alias.to);
        changed = true;
      }
    }
    changed
  }
}
