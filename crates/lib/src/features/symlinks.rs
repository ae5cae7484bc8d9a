//! The `symlinks` feature: links environment specific files to their
//! generic name, e.g. `app.dev.yml` → `app.yml` when the current
//! environment is `dev`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::action::Action;
use crate::config::{Config, ConfigError, Schema};
use crate::feature::{Feature, OPTIONAL};
use crate::kernel::Kernel;
use crate::template::{RenderError, Rendered, Renderer, TemplateAction};

use super::strings;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SymlinksSchema {
  /// Empty means `.<current environment>`.
  pub suffixes: Vec<String>,
  pub extensions: Vec<String>,
  pub includes: Vec<String>,
  pub excludes: Vec<String>,
  pub autofix: bool,
}

impl Default for SymlinksSchema {
  fn default() -> Self {
    Self {
      suffixes: Vec::new(),
      extensions: strings(&[".*", ""]),
      includes: Vec::new(),
      excludes: Vec::new(),
      autofix: false,
    }
  }
}

impl Schema for SymlinksSchema {}

pub struct SymlinksFeature;

impl Feature for SymlinksFeature {
  fn name(&self) -> &str {
    "symlinks"
  }

  /// Template features go first so their outputs can be linked.
  fn dependencies(&self) -> Vec<String> {
    let mut dependencies = strings(&["core", "file"]);
    for renderer in ["jinja", "jsonnet", "ytt"] {
      dependencies.push(format!("{}{}", renderer, OPTIONAL));
    }
    dependencies
  }

  fn configure(&self, config: &mut Config) -> Result<(), ConfigError> {
    let settings: SymlinksSchema = config.sanitize("symlinks")?;
    if settings.suffixes.is_empty() {
      let environment = config
        .get_str("core.env.current")
        .unwrap_or_else(|| "dev".to_string());
      config.set("symlinks.suffixes", vec![format!(".{}", environment)])?;
    }
    Ok(())
  }

  fn actions(&self) -> Vec<Rc<dyn Action>> {
    vec![Rc::new(TemplateAction::new("symlinks", SymlinksRenderer))]
  }
}

pub struct SymlinksRenderer;

impl SymlinksRenderer {
  /// Link value for `template` placed at `target`: a bare file name when both
  /// live in the same directory.
  fn link_value(template: &Path, target: &Path) -> PathBuf {
    match (template.parent(), target.parent(), template.file_name()) {
      (Some(a), Some(b), Some(name)) if a == b => PathBuf::from(name),
      _ => template.to_path_buf(),
    }
  }
}

impl Renderer for SymlinksRenderer {
  fn name(&self) -> &str {
    "symlinks"
  }

  fn render(&self, _kernel: &Kernel, template: &Path, target: &Path) -> Result<Vec<(Rendered, PathBuf)>, RenderError> {
    let io_error = |e: io::Error| RenderError::Io {
      path: target.display().to_string(),
      source: e,
    };

    let link = Self::link_value(template, target);
    if fs::read_link(target).is_ok_and(|current| current == link) {
      debug!(target = %target.display(), "symlink up to date");
      return Ok(vec![(Rendered::Produced, target.to_path_buf())]);
    }
    if fs::symlink_metadata(target).is_ok() {
      fs::remove_file(target).map_err(io_error)?;
    }
    create_symlink(&link, target).map_err(io_error)?;
    info!(target = %target.display(), link = %link.display(), "symlink created");
    Ok(vec![(Rendered::Produced, target.to_path_buf())])
  }

  fn fingerprint(&self, target: &Path) -> Option<Vec<u8>> {
    fs::read_link(target)
      .ok()
      .map(|link| link.to_string_lossy().into_owned().into_bytes())
  }
}

#[cfg(unix)]
fn create_symlink(link: &Path, target: &Path) -> io::Result<()> {
  std::os::unix::fs::symlink(link, target)
}

#[cfg(windows)]
fn create_symlink(link: &Path, target: &Path) -> io::Result<()> {
  std::os::windows::fs::symlink_file(link, target)
}
