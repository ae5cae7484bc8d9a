//! Per-run bookkeeping of rendered templates.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::debug;

/// Who last produced a target during the current run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Producer {
  pub source: PathBuf,
  pub action: String,
  pub priority: i32,
}

/// Processed `(source, target)` pairs and the producer of each target.
///
/// Cleared at the start of every command so each run renders every template
/// at most once per target.
#[derive(Debug, Default)]
pub struct ProcessedSets {
  pairs: HashSet<(PathBuf, PathBuf)>,
  producers: HashMap<PathBuf, Producer>,
}

impl ProcessedSets {
  pub fn is_processed(&self, source: &Path, target: &Path) -> bool {
    self.pairs.contains(&(source.to_path_buf(), target.to_path_buf()))
  }

  pub fn mark(&mut self, source: &Path, target: &Path) {
    self.pairs.insert((source.to_path_buf(), target.to_path_buf()));
  }

  /// Record `action` as the producer of `target`.
  ///
  /// Returns `false`, leaving the record untouched, when another source
  /// already produced the target with a higher priority.
  pub fn claim(&mut self, target: &Path, source: &Path, action: &str, priority: i32) -> bool {
    if let Some(existing) = self.producers.get(target)
      && existing.source != source
      && existing.priority > priority
    {
      debug!(
        target = %target.display(),
        kept = %existing.source.display(),
        skipped = %source.display(),
        "target already produced by a higher priority template"
      );
      return false;
    }
    self.producers.insert(
      target.to_path_buf(),
      Producer {
        source: source.to_path_buf(),
        action: action.to_string(),
        priority,
      },
    );
    true
  }

  pub fn producer(&self, target: &Path) -> Option<&Producer> {
    self.producers.get(target)
  }

  /// Forget everything recorded about `path`, as source or as target.
  pub fn forget(&mut self, path: &Path) {
    self.pairs.retain(|(source, target)| source != path && target != path);
    self.producers.retain(|target, producer| target != path && producer.source != path);
  }

  pub fn clear(&mut self) {
    self.pairs.clear();
    self.producers.clear();
  }

  pub fn len(&self) -> usize {
    self.pairs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.pairs.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mark_and_forget() {
    let mut sets = ProcessedSets::default();
    sets.mark(Path::new("a.jinja"), Path::new("a"));
    assert!(sets.is_processed(Path::new("a.jinja"), Path::new("a")));

    sets.forget(Path::new("a"));
    assert!(!sets.is_processed(Path::new("a.jinja"), Path::new("a")));
    assert!(sets.is_empty());
  }

  #[test]
  fn lower_priority_does_not_replace_higher() {
    let mut sets = ProcessedSets::default();
    assert!(sets.claim(Path::new("app.yml"), Path::new("app.yml.jsonnet"), "jsonnet", 30));
    assert!(!sets.claim(Path::new("app.yml"), Path::new("app.yml.jinja"), "jinja", 10));
    assert_eq!(sets.producer(Path::new("app.yml")).unwrap().action, "jsonnet");
  }

  #[test]
  fn higher_or_equal_priority_replaces() {
    let mut sets = ProcessedSets::default();
    assert!(sets.claim(Path::new("app.yml"), Path::new("app.yml.jinja"), "jinja", 10));
    assert!(sets.claim(Path::new("app.yml"), Path::new("app.yml.jsonnet"), "jsonnet", 30));
    assert!(sets.claim(Path::new("app.yml"), Path::new("app.yml.jsonnet"), "jsonnet", 30));
    assert_eq!(sets.producer(Path::new("app.yml")).unwrap().action, "jsonnet");
  }

  #[test]
  fn clear_resets_everything() {
    let mut sets = ProcessedSets::default();
    sets.mark(Path::new("a"), Path::new("b"));
    sets.claim(Path::new("b"), Path::new("a"), "x", 0);
    sets.clear();
    assert!(sets.is_empty());
    assert!(sets.producer(Path::new("b")).is_none());
  }
}
