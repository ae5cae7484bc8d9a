//! Renamed configuration keys.
//!
//! A [`Migration`] moves a value from a deprecated key to its replacement at
//! load time. [`Config`](super::Config) also consults migrations on reads so
//! either key keeps resolving.

use serde_json::Value;

use super::path;

pub type Transformer = fn(&Value) -> Value;

#[derive(Debug, Clone)]
pub struct Migration {
  pub old_key: String,
  pub new_key: String,
  pub transformer: Option<Transformer>,
}

impl Migration {
  pub fn new(old_key: &str, new_key: &str) -> Self {
    Self {
      old_key: old_key.to_string(),
      new_key: new_key.to_string(),
      transformer: None,
    }
  }

  pub fn with_transformer(mut self, transformer: Transformer) -> Self {
    self.transformer = Some(transformer);
    self
  }

  /// The value stored under the new key for an old-key `value`.
  pub fn transform(&self, value: &Value) -> Value {
    match self.transformer {
      Some(transformer) => transformer(value),
      None => value.clone(),
    }
  }
}

/// Migrations shipped with the tool.
pub fn builtin() -> Vec<Migration> {
  vec![
    Migration::new("docker.build_image_tag", "jsonnet.docker.build.image_tag"),
    Migration::new("docker.compose.project_name", "jsonnet.docker.compose.project_name"),
    Migration::new("core.env.current_env", "core.env.current"),
  ]
}

/// Move every deprecated key present in `tree` to its replacement.
///
/// The old key is removed. When the new key is already set it wins and the
/// old value is dropped. Returns the migrations that matched.
pub fn apply<'a>(tree: &mut Value, migrations: &'a [Migration]) -> Vec<&'a Migration> {
  let mut applied = Vec::new();
  for migration in migrations {
    let old = path::parse(&migration.old_key);
    let Some(value) = path::remove(tree, &old) else {
      continue;
    };
    let new = path::parse(&migration.new_key);
    if path::lookup(tree, &new).is_none() {
      // The insert only fails when a parent of the new key is a scalar.
      if path::insert(tree, &new, migration.transform(&value)).is_err() {
        let _ = path::insert(tree, &old, value);
        continue;
      }
    }
    prune_empty_parents(tree, &old);
    applied.push(migration);
  }
  applied
}

fn prune_empty_parents(tree: &mut Value, segments: &[path::Segment]) {
  for depth in (1..segments.len()).rev() {
    let parent = &segments[..depth];
    let empty = path::lookup(tree, parent)
      .and_then(Value::as_object)
      .is_some_and(|map| map.is_empty());
    if !empty {
      break;
    }
    path::remove(tree, parent);
  }
}
