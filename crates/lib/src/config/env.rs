//! Environment variable overrides and exports.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::path::{self, Segment};
use crate::consts::{ENV_OVERRIDE_PREFIX, ENV_PREFIX};

/// Name of the variable overriding the node at `segments`.
///
/// `core.env.available[0]` with prefix `DDB` → `DDB_CORE_ENV_AVAILABLE[0]`.
pub fn variable_name(prefix: &str, segments: &[Segment]) -> String {
  let mut name = prefix.to_string();
  for segment in segments {
    match segment {
      Segment::Key(key) => {
        name.push('_');
        name.push_str(&key.to_uppercase().replace(['.', '-'], "_"));
      }
      Segment::Index(index) => name.push_str(&format!("[{}]", index)),
    }
  }
  name
}

/// Replace every node whose override variable is set.
///
/// Nodes are visited pre-order; `DDB_OVERRIDE_*` wins over `DDB_*`. A
/// replaced node is not descended into. Returns the variables applied.
pub fn apply_overrides(tree: &mut Value, lookup: &dyn Fn(&str) -> Option<String>) -> Vec<String> {
  let mut applied = Vec::new();
  visit(tree, &mut Vec::new(), lookup, &mut applied);
  applied
}

fn visit(
  node: &mut Value,
  segments: &mut Vec<Segment>,
  lookup: &dyn Fn(&str) -> Option<String>,
  applied: &mut Vec<String>,
) {
  if !segments.is_empty() {
    let mut replacement = None;
    for prefix in [ENV_PREFIX, ENV_OVERRIDE_PREFIX] {
      let name = variable_name(prefix, segments);
      if let Some(raw) = lookup(&name) {
        debug!(variable = %name, key = %path::format(segments), "configuration overridden from environment");
        replacement = Some(coerce(node, &raw, &name));
        applied.push(name);
      }
    }
    if let Some(value) = replacement {
      *node = value;
      return;
    }
  }

  match node {
    Value::Object(map) => {
      for (key, child) in map.iter_mut() {
        segments.push(Segment::Key(key.clone()));
        visit(child, segments, lookup, applied);
        segments.pop();
      }
    }
    Value::Array(items) => {
      for (index, child) in items.iter_mut().enumerate() {
        segments.push(Segment::Index(index));
        visit(child, segments, lookup, applied);
        segments.pop();
      }
    }
    _ => {}
  }
}

/// Convert `raw` to the type of the node it replaces.
fn coerce(current: &Value, raw: &str, variable: &str) -> Value {
  match current {
    Value::Bool(_) => match raw.trim().to_lowercase().as_str() {
      "1" | "true" | "yes" | "on" => Value::Bool(true),
      "0" | "false" | "no" | "off" | "" => Value::Bool(false),
      _ => {
        warn!(variable, value = raw, "expected a boolean, keeping the raw string");
        Value::String(raw.to_string())
      }
    },
    Value::Number(_) => {
      let trimmed = raw.trim();
      if let Ok(i) = trimmed.parse::<i64>() {
        Value::from(i)
      } else if let Some(n) = trimmed.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
        Value::Number(n)
      } else {
        warn!(variable, value = raw, "expected a number, keeping the raw string");
        Value::String(raw.to_string())
      }
    }
    Value::Object(_) | Value::Array(_) => match serde_yaml::from_str::<Value>(raw) {
      Ok(value) => value,
      Err(e) => {
        warn!(variable, error = %e, "override is not valid YAML, keeping the raw string");
        Value::String(raw.to_string())
      }
    },
    Value::String(_) | Value::Null => Value::String(raw.to_string()),
  }
}

/// Remove the top-level `env` mapping and return its entries as strings.
pub fn take_env(tree: &mut Value) -> Vec<(String, String)> {
  let Some(map) = tree.as_object_mut() else {
    return Vec::new();
  };
  let Some(env) = map.shift_remove("env") else {
    return Vec::new();
  };
  match env {
    Value::Object(entries) => entries.into_iter().map(|(k, v)| (k, scalar_to_string(&v))).collect(),
    other => {
      warn!(value = %other, "ignoring non-mapping 'env' configuration");
      Vec::new()
    }
  }
}

/// Export variables into the process environment. Only [`super::load`]
/// calls this, once, from the main thread.
pub fn export(vars: &[(String, String)]) {
  for (key, value) in vars {
    debug!(variable = %key, "exporting environment variable");
    // SAFETY: no other thread exists yet when configuration is loaded.
    unsafe { std::env::set_var(key, value) };
  }
}

/// Render a configuration value the way it appears in environment variables.
pub fn scalar_to_string(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    Value::Null => String::new(),
    other => other.to_string(),
  }
}

/// Flatten a tree into `(KEY, value)` pairs suitable for `export`-style output.
pub fn to_variables(prefix: &str, tree: &Value) -> Map<String, Value> {
  path::flatten(tree)
    .into_iter()
    .map(|(key, value)| {
      (
        variable_name(prefix, &path::parse(&key)),
        Value::String(scalar_to_string(value)),
      )
    })
    .collect()
}
