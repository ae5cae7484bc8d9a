//! The `jsonnet` feature: renders `*.jsonnet` templates with the `jsonnet`
//! binary.
//!
//! Every configuration leaf is passed as `--ext-str key=value`, so templates
//! read settings with `std.extVar("core.env.current")`. Targets ending in
//! `.yml` or `.yaml` get the JSON output converted to YAML.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::action::Action;
use crate::config::{Config, ConfigError, Schema, env, path};
use crate::feature::Feature;
use crate::kernel::Kernel;
use crate::template::{RenderError, Rendered, Renderer, TemplateAction};

use super::strings;

/// Prefix of rewritten templates; the default walker excludes `_*`.
const AUTOFIX_PREFIX: &str = "_ddb-autofix-";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonnetSchema {
  pub suffixes: Vec<String>,
  pub extensions: Vec<String>,
  pub includes: Vec<String>,
  pub excludes: Vec<String>,
  pub autofix: bool,
  pub binary: String,
}

impl Default for JsonnetSchema {
  fn default() -> Self {
    Self {
      suffixes: strings(&[".jsonnet"]),
      extensions: strings(&[".*", ""]),
      includes: Vec::new(),
      excludes: Vec::new(),
      autofix: false,
      binary: "jsonnet".to_string(),
    }
  }
}

impl Schema for JsonnetSchema {}

pub struct JsonnetFeature;

impl Feature for JsonnetFeature {
  fn name(&self) -> &str {
    "jsonnet"
  }

  fn dependencies(&self) -> Vec<String> {
    strings(&["core", "file"])
  }

  fn configure(&self, config: &mut Config) -> Result<(), ConfigError> {
    config.sanitize::<JsonnetSchema>("jsonnet")?;
    Ok(())
  }

  fn actions(&self) -> Vec<Rc<dyn Action>> {
    vec![Rc::new(TemplateAction::new("jsonnet", JsonnetRenderer))]
  }
}

pub struct JsonnetRenderer;

impl JsonnetRenderer {
  fn arguments(config: &Config, template: &Path) -> Vec<String> {
    let mut args = Vec::new();
    for (key, value) in path::flatten(config.tree()) {
      args.push("--ext-str".to_string());
      args.push(format!("{}={}", key, env::scalar_to_string(value)));
    }
    args.push(template.display().to_string());
    args
  }
}

impl Renderer for JsonnetRenderer {
  fn name(&self) -> &str {
    "jsonnet"
  }

  fn priority(&self) -> i32 {
    30
  }

  fn render(&self, kernel: &Kernel, template: &Path, target: &Path) -> Result<Vec<(Rendered, PathBuf)>, RenderError> {
    let (binary, args) = {
      let config = kernel.config();
      let binary = config
        .get_str("jsonnet.binary")
        .unwrap_or_else(|| "jsonnet".to_string());
      (binary, Self::arguments(&config, template))
    };

    let output = kernel
      .runner()
      .run(&binary, &args, template.parent(), None)
      .map_err(|e| RenderError::Process {
        template: template.display().to_string(),
        source: e,
      })?;
    let json = output.stdout_text();

    let is_yaml = matches!(
      target.extension().and_then(|e| e.to_str()),
      Some("yml") | Some("yaml")
    );
    let text = if is_yaml {
      to_yaml(&json).map_err(|message| RenderError::Output {
        template: template.display().to_string(),
        message,
      })?
    } else {
      json
    };
    Ok(vec![(Rendered::Text(text), target.to_path_buf())])
  }

  /// Rewrite `std.extVar` lookups of deprecated keys to their replacement.
  fn autofix_render_error(
    &self,
    kernel: &Kernel,
    template: &Path,
    _target: &Path,
    original: &Path,
    _error: &RenderError,
  ) -> Result<Option<PathBuf>, RenderError> {
    let io_error = |path: &Path, e: std::io::Error| RenderError::Io {
      path: path.display().to_string(),
      source: e,
    };

    let source = fs::read_to_string(template).map_err(|e| io_error(template, e))?;
    let config = kernel.config();
    let mut fixed = source.clone();
    for migration in config.migrations() {
      let mut hit = false;
      for quote in ['"', '\''] {
        let old = format!("std.extVar({q}{}{q})", migration.old_key, q = quote);
        if fixed.contains(&old) {
          let new = format!("std.extVar({q}{}{q})", migration.new_key, q = quote);
          fixed = fixed.replace(&old, &new);
          hit = true;
        }
      }
      if hit {
        config.warn_deprecated(migration, &original.display().to_string());
      }
    }
    if fixed == source {
      return Ok(None);
    }

    let directory = template.parent().unwrap_or_else(|| Path::new("."));
    let mut file = tempfile::Builder::new()
      .prefix(AUTOFIX_PREFIX)
      .suffix(".jsonnet")
      .tempfile_in(directory)
      .map_err(|e| io_error(directory, e))?;
    file.write_all(fixed.as_bytes()).map_err(|e| io_error(file.path(), e))?;
    let (_, path) = file.keep().map_err(|e| io_error(directory, e.error))?;
    debug!(template = %original.display(), fixed = %path.display(), "deprecated keys rewritten");
    Ok(Some(path))
  }
}

fn to_yaml(json: &str) -> Result<String, String> {
  let value: Value = serde_json::from_str(json).map_err(|e| format!("not JSON: {}", e))?;
  serde_yaml::to_string(&value).map_err(|e| e.to_string())
}
