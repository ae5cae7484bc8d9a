//! Managed blocks in `.gitignore` files.
//!
//! Generated files are listed between two marker lines:
//!
//! ```text
//! node_modules/
//! ###> ddb ###
//! /docker-compose.yml
//! /test.txt
//! ###< ddb ###
//! ```
//!
//! Only the block is ever edited. It is kept sorted and removed, markers
//! included, once it becomes empty.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::platform::permissions::is_readonly;
use crate::util::fs::{WriteError, write_if_different};

#[derive(Debug, thiserror::Error)]
pub enum GitignoreError {
  #[error("failed to read {path}: {source}")]
  Read {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  Write(#[from] WriteError),
}

/// A parsed `.gitignore` split around its managed block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitignoreFile {
  path: PathBuf,
  marker: String,
  before: Vec<String>,
  block: Vec<String>,
  after: Vec<String>,
}

impl GitignoreFile {
  /// Load `path`, or start empty when it does not exist.
  pub fn load(path: &Path, marker: &str) -> Result<Self, GitignoreError> {
    let content = match fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
      Err(e) => {
        return Err(GitignoreError::Read {
          path: path.display().to_string(),
          source: e,
        });
      }
    };
    Ok(Self::parse(path, &content, marker))
  }

  pub fn parse(path: &Path, content: &str, marker: &str) -> Self {
    let lines: Vec<String> = content.lines().map(str::to_string).collect();
    let open = opening(marker);
    let close = closing(marker);

    let start = lines.iter().position(|l| l.trim() == open);
    let end = start.and_then(|s| lines[s + 1..].iter().position(|l| l.trim() == close).map(|e| s + 1 + e));

    let (before, block, after) = match (start, end) {
      (Some(s), Some(e)) => (
        lines[..s].to_vec(),
        lines[s + 1..e].iter().filter(|l| !l.trim().is_empty()).cloned().collect(),
        lines[e + 1..].to_vec(),
      ),
      _ => (lines, Vec::new(), Vec::new()),
    };

    Self {
      path: path.to_path_buf(),
      marker: marker.to_string(),
      before,
      block,
      after,
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Entries of the managed block.
  pub fn entries(&self) -> &[String] {
    &self.block
  }

  /// Whether `entry`, or its negation, appears anywhere in the file.
  pub fn is_ignored(&self, entry: &str) -> bool {
    let negated = format!("!{}", entry);
    self
      .before
      .iter()
      .chain(&self.block)
      .chain(&self.after)
      .map(|l| l.trim())
      .any(|l| l == entry || l == negated)
  }

  /// Add `entry` to the managed block. Returns whether the file changed.
  pub fn add(&mut self, entry: &str) -> bool {
    if self.is_ignored(entry) {
      return false;
    }
    self.block.push(entry.to_string());
    self.block.sort();
    true
  }

  /// Remove `entry` from the managed block. Returns whether the file changed.
  pub fn remove(&mut self, entry: &str) -> bool {
    let before = self.block.len();
    self.block.retain(|l| l.trim() != entry);
    self.block.len() != before
  }

  pub fn render(&self) -> String {
    let mut lines: Vec<&str> = self.before.iter().map(String::as_str).collect();
    let open = opening(&self.marker);
    let close = closing(&self.marker);
    if !self.block.is_empty() {
      lines.push(&open);
      lines.extend(self.block.iter().map(String::as_str));
      lines.push(&close);
    }
    lines.extend(self.after.iter().map(String::as_str));

    if lines.is_empty() {
      String::new()
    } else {
      let mut content = lines.join("\n");
      content.push('\n');
      content
    }
  }

  /// Write the file if its content changed. Emptying an existing file
  /// leaves it in place; an empty file is never created.
  pub fn save(&self) -> Result<bool, GitignoreError> {
    let content = self.render();
    if content.is_empty() {
      if !self.path.exists() {
        return Ok(false);
      }
      debug!(path = %self.path.display(), "gitignore emptied");
    }
    Ok(write_if_different(&self.path, content.as_bytes())?)
  }
}

fn opening(marker: &str) -> String {
  format!("###> {} ###", marker)
}

fn closing(marker: &str) -> String {
  format!("###< {} ###", marker)
}

/// The `.gitignore` responsible for `target`: the nearest writable one in
/// the directories from the target up to `project`, else `<project>/.gitignore`.
pub fn find_gitignore(target: &Path, project: &Path) -> PathBuf {
  let mut dir = target.parent();
  while let Some(current) = dir {
    if !current.starts_with(project) {
      break;
    }
    let candidate = current.join(".gitignore");
    if candidate.is_file() && !is_readonly(&candidate) {
      return candidate;
    }
    if current == project {
      break;
    }
    dir = current.parent();
  }
  project.join(".gitignore")
}

/// Entry for `target` in the `.gitignore` at `gitignore`: `/` followed by
/// the `/`-separated path relative to the gitignore's directory.
pub fn entry_for(gitignore: &Path, target: &Path) -> Option<String> {
  let dir = gitignore.parent()?;
  let relative = target.strip_prefix(dir).ok()?;
  let posix: Vec<String> = relative
    .components()
    .map(|c| c.as_os_str().to_string_lossy().to_string())
    .collect();
  if posix.is_empty() {
    return None;
  }
  Some(format!("/{}", posix.join("/")))
}
