//! Deep merge of configuration trees.
//!
//! Mappings merge recursively. Lists are replaced unless the incoming value
//! is a merge sentinel:
//!
//! ```yaml
//! services:
//!   merge: append_if_missing
//!   value: [web, db]
//! ```
//!
//! Sentinels never survive into the merged tree.

use std::str::FromStr;

use serde_json::Value;

use super::ConfigError;

/// How an incoming list combines with an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStrategy {
  Append,
  Prepend,
  AppendIfMissing,
  PrependIfMissing,
  Insert(usize),
  InsertIfMissing(usize),
  Override,
}

impl FromStr for ListStrategy {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let invalid = || ConfigError::InvalidMergeStrategy(s.to_string());
    let indexed = |prefix: &str| -> Result<Option<usize>, ConfigError> {
      match s.strip_prefix(prefix) {
        None => Ok(None),
        Some(rest) => rest
          .strip_prefix('[')
          .and_then(|r| r.strip_suffix(']'))
          .and_then(|i| i.trim().parse().ok())
          .map(Some)
          .ok_or_else(invalid),
      }
    };

    match s {
      "append" => return Ok(ListStrategy::Append),
      "prepend" => return Ok(ListStrategy::Prepend),
      "append_if_missing" => return Ok(ListStrategy::AppendIfMissing),
      "prepend_if_missing" => return Ok(ListStrategy::PrependIfMissing),
      "override" => return Ok(ListStrategy::Override),
      _ => {}
    }

    if let Some(index) = indexed("insert_if_missing")? {
      return Ok(ListStrategy::InsertIfMissing(index));
    }
    if let Some(index) = indexed("insert")? {
      return Ok(ListStrategy::Insert(index));
    }
    Err(invalid())
  }
}

impl ListStrategy {
  /// Combine `incoming` into `base`.
  pub fn apply(self, base: &mut Vec<Value>, incoming: Vec<Value>) {
    match self {
      ListStrategy::Override => *base = incoming,
      ListStrategy::Append => base.extend(incoming),
      ListStrategy::Prepend => {
        let mut merged = incoming;
        merged.append(base);
        *base = merged;
      }
      ListStrategy::AppendIfMissing => {
        for item in incoming {
          if !base.contains(&item) {
            base.push(item);
          }
        }
      }
      ListStrategy::PrependIfMissing => {
        let mut missing: Vec<Value> = Vec::new();
        for item in incoming {
          if !base.contains(&item) && !missing.contains(&item) {
            missing.push(item);
          }
        }
        missing.append(base);
        *base = missing;
      }
      ListStrategy::Insert(index) => {
        let at = index.min(base.len());
        base.splice(at..at, incoming);
      }
      ListStrategy::InsertIfMissing(index) => {
        let at = index.min(base.len());
        let missing: Vec<Value> = incoming.into_iter().filter(|item| !base.contains(item)).collect();
        base.splice(at..at, missing);
      }
    }
  }
}

/// Returns the strategy and list of a `{merge, value}` sentinel.
fn sentinel(value: &Value) -> Result<Option<(ListStrategy, &Vec<Value>)>, ConfigError> {
  let Some(map) = value.as_object() else {
    return Ok(None);
  };
  if map.len() != 2 {
    return Ok(None);
  }
  match (map.get("merge").and_then(Value::as_str), map.get("value")) {
    (Some(strategy), Some(Value::Array(list))) => Ok(Some((strategy.parse()?, list))),
    _ => Ok(None),
  }
}

/// Remove every merge sentinel from `value`, keeping the sentinel's list.
pub fn strip_sentinels(value: Value) -> Result<Value, ConfigError> {
  if let Some((_, list)) = sentinel(&value)? {
    return strip_sentinels(Value::Array(list.clone()));
  }
  Ok(match value {
    Value::Object(map) => Value::Object(
      map
        .into_iter()
        .map(|(k, v)| Ok((k, strip_sentinels(v)?)))
        .collect::<Result<_, ConfigError>>()?,
    ),
    Value::Array(items) => Value::Array(items.into_iter().map(strip_sentinels).collect::<Result<_, _>>()?),
    other => other,
  })
}

/// Deep-merge `incoming` into `base`.
pub fn merge(base: &mut Value, incoming: Value) -> Result<(), ConfigError> {
  if let Some((strategy, list)) = sentinel(&incoming)? {
    let items = match strip_sentinels(Value::Array(list.clone()))? {
      Value::Array(items) => items,
      _ => Vec::new(),
    };
    match base {
      Value::Array(existing) => strategy.apply(existing, items),
      _ => *base = Value::Array(items),
    }
    return Ok(());
  }

  match (base, incoming) {
    (Value::Object(existing), Value::Object(incoming)) => {
      for (key, value) in incoming {
        match existing.get_mut(&key) {
          Some(slot) => merge(slot, value)?,
          None => {
            existing.insert(key, strip_sentinels(value)?);
          }
        }
      }
    }
    (base, incoming) => *base = strip_sentinels(incoming)?,
  }
  Ok(())
}
