//! Template discovery: files whose name carries a template suffix.

use std::path::{Path, PathBuf};

use super::{FileWalker, WalkError, WalkOptions, default_includes};

/// Target of `path` after removing the first matching suffix.
///
/// A suffix matches either at the end of the file name
/// (`app.yml.jinja` → `app.yml`) or right before the final extension
/// (`app.jinja.yml` → `app.yml`). Returns `None` when no suffix matches.
pub fn strip_suffix(path: &Path, suffixes: &[String]) -> Option<PathBuf> {
  let name = path.file_name()?.to_str()?;

  for suffix in suffixes.iter().filter(|s| !s.is_empty()) {
    if let Some(stem) = name.strip_suffix(suffix.as_str())
      && !stem.is_empty()
    {
      return Some(path.with_file_name(stem));
    }

    if let Some(dot) = name.rfind('.')
      && dot > 0
    {
      let (base, extension) = name.split_at(dot);
      if let Some(stem) = base.strip_suffix(suffix.as_str())
        && !stem.is_empty()
      {
        return Some(path.with_file_name(format!("{}{}", stem, extension)));
      }
    }
  }
  None
}

/// A walker over template sources, mapping each to its target.
#[derive(Debug, Clone)]
pub struct TemplateFinder {
  walker: FileWalker,
  suffixes: Vec<String>,
}

impl TemplateFinder {
  /// A finder under `root`. Empty `includes` default to the pattern built
  /// from `suffixes` and `extensions`.
  pub fn new(
    root: &Path,
    suffixes: Vec<String>,
    extensions: &[String],
    includes: Vec<String>,
    excludes: Vec<String>,
  ) -> Result<Self, WalkError> {
    let includes = if includes.is_empty() {
      vec![default_includes(&suffixes, extensions)]
    } else {
      includes
    };
    let mut options = WalkOptions::new(root).includes(includes);
    if !excludes.is_empty() {
      options = options.excludes(excludes);
    }
    Ok(Self {
      walker: FileWalker::new(options)?,
      suffixes,
    })
  }

  pub fn suffixes(&self) -> &[String] {
    &self.suffixes
  }

  pub fn walker(&self) -> &FileWalker {
    &self.walker
  }

  /// Target of `source` if it is a template this finder accepts.
  pub fn target_of(&self, source: &Path) -> Option<PathBuf> {
    if !self.walker.accepts(source) {
      return None;
    }
    strip_suffix(source, &self.suffixes)
  }

  /// Every `(template, target)` pair under the root.
  pub fn templates(&self) -> Result<Vec<(PathBuf, PathBuf)>, WalkError> {
    Ok(
      self
        .walker
        .walk()?
        .into_iter()
        .filter_map(|source| strip_suffix(&source, &self.suffixes).map(|target| (source, target)))
        .collect(),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use tempfile::TempDir;

  fn suffixes(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn strips_trailing_suffix() {
    assert_eq!(
      strip_suffix(Path::new("dir/test.txt.jinja"), &suffixes(&[".jinja"])),
      Some(PathBuf::from("dir/test.txt"))
    );
  }

  #[test]
  fn strips_infix_suffix() {
    assert_eq!(
      strip_suffix(Path::new("test.jinja.yml"), &suffixes(&[".jinja"])),
      Some(PathBuf::from("test.yml"))
    );
    assert_eq!(
      strip_suffix(Path::new("test.dev.yml"), &suffixes(&[".dev"])),
      Some(PathBuf::from("test.yml"))
    );
  }

  #[test]
  fn first_matching_suffix_wins() {
    assert_eq!(
      strip_suffix(Path::new("a.yml.jsonnet"), &suffixes(&[".jinja", ".jsonnet", ".yml.jsonnet"])),
      Some(PathBuf::from("a.yml"))
    );
  }

  #[test]
  fn no_match_is_not_a_template() {
    assert_eq!(strip_suffix(Path::new("test.txt"), &suffixes(&[".jinja"])), None);
    assert_eq!(strip_suffix(Path::new(".jinja"), &suffixes(&[".jinja"])), None);
    assert_eq!(strip_suffix(Path::new("test.dev.yml.jinja"), &suffixes(&[".dev"])), None);
  }

  #[test]
  fn finder_pairs_templates_with_targets() {
    let temp = TempDir::new().unwrap();
    for file in ["a.txt.jinja", "b.jinja.yml", "plain.txt", "_skip.txt.jinja"] {
      fs::write(temp.path().join(file), "").unwrap();
    }
    let finder = TemplateFinder::new(
      temp.path(),
      suffixes(&[".jinja"]),
      &suffixes(&[".*", ""]),
      Vec::new(),
      Vec::new(),
    )
    .unwrap();

    let pairs = finder.templates().unwrap();
    assert_eq!(
      pairs,
      vec![
        (temp.path().join("a.txt.jinja"), temp.path().join("a.txt")),
        (temp.path().join("b.jinja.yml"), temp.path().join("b.yml")),
      ]
    );
    assert_eq!(
      finder.target_of(&temp.path().join("new.conf.jinja")),
      Some(temp.path().join("new.conf"))
    );
    assert_eq!(finder.target_of(&temp.path().join("plain.txt")), None);
  }
}
