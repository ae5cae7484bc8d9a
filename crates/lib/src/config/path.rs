//! Dotted key paths such as `core.env.available[0]`.

use std::fmt;

use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  Key(String),
  Index(usize),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PathError {
  #[error("'{0}' is not a mapping")]
  NotAMapping(String),

  #[error("'{0}' is not a list")]
  NotAList(String),

  #[error("index {index} is out of range for '{path}' (length {len})")]
  OutOfRange { path: String, index: usize, len: usize },

  #[error("empty key")]
  Empty,
}

/// Split a dotted key into segments. `a.b[1].c` → `a`, `b`, `1`, `c`.
pub fn parse(key: &str) -> Vec<Segment> {
  let mut segments = Vec::new();
  for part in key.split('.').filter(|p| !p.is_empty()) {
    let name_end = part.find('[').unwrap_or(part.len());
    if name_end > 0 {
      segments.push(Segment::Key(part[..name_end].to_string()));
    }

    let mut rest = &part[name_end..];
    while let Some(open) = rest.strip_prefix('[') {
      let Some(close) = open.find(']') else {
        segments.push(Segment::Key(rest.to_string()));
        break;
      };
      match open[..close].trim().parse::<usize>() {
        Ok(index) => segments.push(Segment::Index(index)),
        Err(_) => segments.push(Segment::Key(open[..close].to_string())),
      }
      rest = &open[close + 1..];
    }
  }
  segments
}

/// Render segments back to dotted form.
pub fn format(segments: &[Segment]) -> String {
  let mut out = String::new();
  for segment in segments {
    match segment {
      Segment::Key(key) => {
        if !out.is_empty() {
          out.push('.');
        }
        out.push_str(key);
      }
      Segment::Index(index) => {
        out.push_str(&format!("[{}]", index));
      }
    }
  }
  out
}

impl fmt::Display for Segment {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Segment::Key(key) => write!(f, "{}", key),
      Segment::Index(index) => write!(f, "[{}]", index),
    }
  }
}

pub fn lookup<'a>(tree: &'a Value, segments: &[Segment]) -> Option<&'a Value> {
  segments.iter().try_fold(tree, |node, segment| match segment {
    Segment::Key(key) => node.as_object()?.get(key),
    Segment::Index(index) => node.as_array()?.get(*index),
  })
}

/// Set the node at `segments`, creating intermediate mappings as needed.
///
/// A list index may address an existing element or the position right after
/// the last one (append).
pub fn insert(tree: &mut Value, segments: &[Segment], value: Value) -> Result<(), PathError> {
  let Some((last, parents)) = segments.split_last() else {
    return Err(PathError::Empty);
  };

  let mut node = tree;
  for (depth, segment) in parents.iter().enumerate() {
    let next_is_index = matches!(segments[depth + 1], Segment::Index(_));
    node = child_mut(node, segment, &segments[..depth], next_is_index)?;
  }

  match last {
    Segment::Key(key) => {
      if node.is_null() {
        *node = Value::Object(Map::new());
      }
      let map = node
        .as_object_mut()
        .ok_or_else(|| PathError::NotAMapping(format(parents)))?;
      map.insert(key.clone(), value);
    }
    Segment::Index(index) => {
      if node.is_null() {
        *node = Value::Array(Vec::new());
      }
      let list = node
        .as_array_mut()
        .ok_or_else(|| PathError::NotAList(format(parents)))?;
      if *index < list.len() {
        list[*index] = value;
      } else if *index == list.len() {
        list.push(value);
      } else {
        return Err(PathError::OutOfRange {
          path: format(parents),
          index: *index,
          len: list.len(),
        });
      }
    }
  }
  Ok(())
}

fn child_mut<'a>(
  node: &'a mut Value,
  segment: &Segment,
  parent: &[Segment],
  next_is_index: bool,
) -> Result<&'a mut Value, PathError> {
  let placeholder = || {
    if next_is_index {
      Value::Array(Vec::new())
    } else {
      Value::Object(Map::new())
    }
  };

  match segment {
    Segment::Key(key) => {
      if node.is_null() {
        *node = Value::Object(Map::new());
      }
      let map = node
        .as_object_mut()
        .ok_or_else(|| PathError::NotAMapping(format(parent)))?;
      let child = map.entry(key.clone()).or_insert_with(placeholder);
      if child.is_null() {
        *child = placeholder();
      }
      Ok(child)
    }
    Segment::Index(index) => {
      let list = node
        .as_array_mut()
        .ok_or_else(|| PathError::NotAList(format(parent)))?;
      if *index == list.len() {
        list.push(placeholder());
      }
      let len = list.len();
      list.get_mut(*index).ok_or_else(|| PathError::OutOfRange {
        path: format(parent),
        index: *index,
        len,
      })
    }
  }
}

/// Remove and return the node at `segments`.
pub fn remove(tree: &mut Value, segments: &[Segment]) -> Option<Value> {
  let (last, parents) = segments.split_last()?;
  let mut node = tree;
  for segment in parents {
    node = match segment {
      Segment::Key(key) => node.as_object_mut()?.get_mut(key)?,
      Segment::Index(index) => node.as_array_mut()?.get_mut(*index)?,
    };
  }
  match last {
    Segment::Key(key) => node.as_object_mut()?.shift_remove(key),
    Segment::Index(index) => {
      let list = node.as_array_mut()?;
      (*index < list.len()).then(|| list.remove(*index))
    }
  }
}

/// Every scalar leaf as `(dotted key, value)`, in document order.
pub fn flatten(tree: &Value) -> Vec<(String, &Value)> {
  fn visit<'a>(node: &'a Value, path: &mut Vec<Segment>, out: &mut Vec<(String, &'a Value)>) {
    match node {
      Value::Object(map) => {
        for (key, child) in map {
          path.push(Segment::Key(key.clone()));
          visit(child, path, out);
          path.pop();
        }
      }
      Value::Array(items) => {
        for (index, child) in items.iter().enumerate() {
          path.push(Segment::Index(index));
          visit(child, path, out);
          path.pop();
        }
      }
      _ => {
        if !path.is_empty() {
          out.push((format(path), node));
        }
      }
    }
  }

  let mut out = Vec::new();
  visit(tree, &mut Vec::new(), &mut out);
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn parse_keys_and_indices() {
    assert_eq!(
      parse("a.b[1].c"),
      vec![
        Segment::Key("a".into()),
        Segment::Key("b".into()),
        Segment::Index(1),
        Segment::Key("c".into()),
      ]
    );
    assert_eq!(parse("list[0][2]").len(), 3);
    assert!(parse("").is_empty());
  }

  #[test]
  fn format_round_trips() {
    for key in ["a", "a.b", "a.b[1].c", "list[0][2]"] {
      assert_eq!(format(&parse(key)), key);
    }
  }

  #[test]
  fn lookup_nested() {
    let tree = json!({"a": {"b": [{"c": 1}, {"c": 2}]}});
    assert_eq!(lookup(&tree, &parse("a.b[1].c")), Some(&json!(2)));
    assert_eq!(lookup(&tree, &parse("a.b[5]")), None);
    assert_eq!(lookup(&tree, &parse("a.x")), None);
  }

  #[test]
  fn insert_creates_intermediate_nodes() {
    let mut tree = json!({});
    insert(&mut tree, &parse("a.b.c"), json!("x")).unwrap();
    insert(&mut tree, &parse("a.list[0]"), json!(1)).unwrap();
    insert(&mut tree, &parse("a.list[1]"), json!(2)).unwrap();
    assert_eq!(tree, json!({"a": {"b": {"c": "x"}, "list": [1, 2]}}));

    let err = insert(&mut tree, &parse("a.list[5]"), json!(3)).unwrap_err();
    assert!(matches!(err, PathError::OutOfRange { .. }));

    let err = insert(&mut tree, &parse("a.b.c.d"), json!(3)).unwrap_err();
    assert_eq!(err, PathError::NotAMapping("a.b.c".into()));
  }

  #[test]
  fn remove_returns_node() {
    let mut tree = json!({"a": {"b": 1, "c": [1, 2]}});
    assert_eq!(remove(&mut tree, &parse("a.b")), Some(json!(1)));
    assert_eq!(remove(&mut tree, &parse("a.c[0]")), Some(json!(1)));
    assert_eq!(remove(&mut tree, &parse("a.missing")), None);
    assert_eq!(tree, json!({"a": {"c": [2]}}));
  }

  #[test]
  fn flatten_lists_leaves() {
    let tree = json!({"a": {"b": 1, "c": ["x", "y"]}, "d": true});
    let flat: Vec<String> = flatten(&tree).into_iter().map(|(k, _)| k).collect();
    assert_eq!(flat, vec!["a.b", "a.c[0]", "a.c[1]", "d"]);
  }
}
