//! File discovery.
//!
//! [`FileWalker`] walks a directory tree pre-order, pruning excluded
//! directories before descending into them. Patterns are brace-expanded and
//! matched against paths relative to the walk root, in both their native
//! and `/`-separated forms.

pub mod braces;
pub mod finder;
pub mod processed;

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{trace, warn};
use walkdir::WalkDir;

pub use finder::{TemplateFinder, strip_suffix};
pub use processed::ProcessedSets;

/// Directories and files skipped unless a walker is given its own excludes.
pub const DEFAULT_EXCLUDES: [&str; 4] = ["**/_*", "**/.git", "**/node_modules", "**/vendor"];

#[derive(Debug, thiserror::Error)]
pub enum WalkError {
  #[error("invalid glob pattern '{pattern}': {source}")]
  Pattern {
    pattern: String,
    #[source]
    source: globset::Error,
  },

  #[error("walk root {0} does not exist")]
  MissingRoot(String),
}

/// Include pattern matching files ending in one of `suffixes` optionally
/// followed by one of `extensions`.
///
/// `default_includes(&[".jinja"], &[".*", ""])` → `*{.jinja}{.*,}`.
pub fn default_includes(suffixes: &[String], extensions: &[String]) -> String {
  let extensions = if extensions.is_empty() {
    String::new()
  } else {
    format!("{{{}}}", extensions.join(","))
  };
  format!("*{{{}}}{}", suffixes.join(","), extensions)
}

/// Compile brace-expanded patterns into one matcher.
pub fn compile(patterns: &[String]) -> Result<GlobSet, WalkError> {
  let mut builder = GlobSetBuilder::new();
  for pattern in patterns {
    for expanded in braces::expand(pattern) {
      let glob = Glob::new(&expanded).map_err(|e| WalkError::Pattern {
        pattern: pattern.clone(),
        source: e,
      })?;
      builder.add(glob);
    }
  }
  builder.build().map_err(|e| WalkError::Pattern {
    pattern: patterns.join(", "),
    source: e,
  })
}

#[derive(Debug, Clone)]
pub struct WalkOptions {
  pub root: PathBuf,
  /// Empty means every file.
  pub includes: Vec<String>,
  pub excludes: Vec<String>,
  pub recursive: bool,
}

impl WalkOptions {
  pub fn new(root: &Path) -> Self {
    Self {
      root: root.to_path_buf(),
      includes: Vec::new(),
      excludes: DEFAULT_EXCLUDES.iter().map(|e| e.to_string()).collect(),
      recursive: true,
    }
  }

  pub fn includes(mut self, includes: Vec<String>) -> Self {
    self.includes = includes;
    self
  }

  pub fn excludes(mut self, excludes: Vec<String>) -> Self {
    self.excludes = excludes;
    self
  }

  pub fn recursive(mut self, recursive: bool) -> Self {
    self.recursive = recursive;
    self
  }
}

#[derive(Debug, Clone)]
pub struct FileWalker {
  root: PathBuf,
  includes: Option<GlobSet>,
  excludes: GlobSet,
  recursive: bool,
}

impl FileWalker {
  pub fn new(options: WalkOptions) -> Result<Self, WalkError> {
    let includes = if options.includes.is_empty() {
      None
    } else {
      Some(compile(&options.includes)?)
    };
    Ok(Self {
      root: options.root,
      includes,
      excludes: compile(&options.excludes)?,
      recursive: options.recursive,
    })
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  fn relative<'a>(&self, path: &'a Path) -> Option<&'a Path> {
    match path.strip_prefix(&self.root) {
      Ok(rel) => Some(rel),
      Err(_) if !path.is_absolute() => Some(path),
      Err(_) => None,
    }
  }

  fn matches(set: &GlobSet, relative: &Path) -> bool {
    if set.is_match(relative) {
      return true;
    }
    let posix = relative.to_string_lossy().replace('\\', "/");
    set.is_match(posix.as_str())
  }

  pub fn is_excluded(&self, path: &Path) -> bool {
    self
      .relative(path)
      .is_some_and(|rel| Self::matches(&self.excludes, rel))
  }

  pub fn is_included(&self, path: &Path) -> bool {
    match (&self.includes, self.relative(path)) {
      (_, None) => false,
      (None, Some(_)) => true,
      (Some(set), Some(rel)) => Self::matches(set, rel),
    }
  }

  /// Whether a walk would report `path`: under the root, included, and
  /// neither it nor any ancestor excluded. The file need not exist.
  pub fn accepts(&self, path: &Path) -> bool {
    let Some(rel) = self.relative(path) else {
      return false;
    };
    if rel.as_os_str().is_empty() || !self.is_included(path) {
      return false;
    }
    if !self.recursive && rel.components().count() > 1 {
      return false;
    }
    let mut current = Some(rel);
    while let Some(p) = current {
      if !p.as_os_str().is_empty() && Self::matches(&self.excludes, p) {
        return false;
      }
      current = p.parent();
    }
    true
  }

  /// Every reported file, as absolute paths in walk order.
  pub fn walk(&self) -> Result<Vec<PathBuf>, WalkError> {
    if !self.root.exists() {
      return Err(WalkError::MissingRoot(self.root.display().to_string()));
    }

    let max_depth = if self.recursive { usize::MAX } else { 1 };
    let walker = WalkDir::new(&self.root)
      .sort_by_file_name()
      .max_depth(max_depth)
      .into_iter()
      .filter_entry(|entry| entry.depth() == 0 || !self.is_excluded(entry.path()));

    let mut files = Vec::new();
    for entry in walker {
      let entry = match entry {
        Ok(entry) => entry,
        Err(e) => {
          warn!(error = %e, "skipping unreadable entry");
          continue;
        }
      };
      if entry.file_type().is_dir() {
        continue;
      }
      if self.is_included(entry.path()) {
        trace!(path = %entry.path().display(), "found");
        files.push(entry.into_path());
      }
    }
    Ok(files)
  }
}
