//! Typed feature configuration.
//!
//! Every feature owns a namespace of the configuration tree and describes it
//! with a [`Schema`]. Sanitizing deserializes the namespace with defaults
//! applied, validates it and writes the normalized values back, so later
//! readers of the raw tree see the defaults too.

use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::trace;

use super::{Config, ConfigError, FieldErrors, path};

/// A validation failure for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
  pub field: String,
  pub message: String,
}

impl FieldError {
  pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      field: field.into(),
      message: message.into(),
    }
  }
}

impl fmt::Display for FieldError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.field.is_empty() {
      write!(f, "{}", self.message)
    } else {
      write!(f, "{}: {}", self.field, self.message)
    }
  }
}

/// Configuration of one feature namespace.
pub trait Schema: Serialize + DeserializeOwned + Default {
  /// Checks that cannot be expressed through types alone.
  fn validate(&self) -> Vec<FieldError> {
    Vec::new()
  }
}

impl Config {
  /// Deserialize, validate and normalize the `namespace` subtree.
  ///
  /// Keys unknown to `S` are kept in the tree untouched.
  pub fn sanitize<S: Schema>(&mut self, namespace: &str) -> Result<S, ConfigError> {
    let raw = match self.get(namespace) {
      None | Some(Value::Null) => Value::Object(serde_json::Map::new()),
      Some(value) => value,
    };

    let typed: S = serde_json::from_value(raw).map_err(|e| ConfigError::Schema {
      namespace: namespace.to_string(),
      errors: FieldErrors(vec![FieldError::new("", e.to_string())]),
    })?;

    let errors = typed.validate();
    if !errors.is_empty() {
      return Err(ConfigError::Schema {
        namespace: namespace.to_string(),
        errors: FieldErrors(errors),
      });
    }

    let normalized = serde_json::to_value(&typed).map_err(|e| ConfigError::Type {
      key: namespace.to_string(),
      source: e,
    })?;
    self.write_back(namespace, normalized)?;

    trace!(namespace, "configuration sanitized");
    Ok(typed)
  }

  fn write_back(&mut self, namespace: &str, normalized: Value) -> Result<(), ConfigError> {
    let segments = path::parse(namespace);
    let merged = match (path::lookup(self.tree(), &segments).cloned(), normalized) {
      (Some(Value::Object(mut existing)), Value::Object(normalized)) => {
        for (key, value) in normalized {
          existing.insert(key, value);
        }
        Value::Object(existing)
      }
      (_, normalized) => normalized,
    };
    self.set(namespace, merged)
  }
}
