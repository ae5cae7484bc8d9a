//! The `ytt` feature: renders `*.ytt` YAML templates with the `ytt` binary,
//! exposing the configuration as data values.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::config::{Config, ConfigError, Schema};
use crate::feature::Feature;
use crate::kernel::Kernel;
use crate::template::{RenderError, Rendered, Renderer, TemplateAction};

use super::strings;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YttSchema {
  pub suffixes: Vec<String>,
  pub extensions: Vec<String>,
  pub includes: Vec<String>,
  pub excludes: Vec<String>,
  pub autofix: bool,
  pub binary: String,
}

impl Default for YttSchema {
  fn default() -> Self {
    Self {
      suffixes: strings(&[".ytt"]),
      extensions: strings(&[".yaml", ".yml", ""]),
      includes: Vec::new(),
      excludes: Vec::new(),
      autofix: false,
      binary: "ytt".to_string(),
    }
  }
}

impl Schema for YttSchema {}

pub struct YttFeature;

impl Feature for YttFeature {
  fn name(&self) -> &str {
    "ytt"
  }

  fn dependencies(&self) -> Vec<String> {
    strings(&["core", "file"])
  }

  fn configure(&self, config: &mut Config) -> Result<(), ConfigError> {
    config.sanitize::<YttSchema>("ytt")?;
    Ok(())
  }

  fn actions(&self) -> Vec<Rc<dyn Action>> {
    vec![Rc::new(TemplateAction::new("ytt", YttRenderer))]
  }
}

pub struct YttRenderer;

impl Renderer for YttRenderer {
  fn name(&self) -> &str {
    "ytt"
  }

  fn priority(&self) -> i32 {
    20
  }

  fn render(&self, kernel: &Kernel, template: &Path, target: &Path) -> Result<Vec<(Rendered, PathBuf)>, RenderError> {
    let template_name = template.display().to_string();
    let output_error = |message: String| RenderError::Output {
      template: template_name.clone(),
      message,
    };

    let (binary, values) = {
      let config = kernel.config();
      let binary = config.get_str("ytt.binary").unwrap_or_else(|| "ytt".to_string());
      let values = serde_yaml::to_string(config.tree()).map_err(|e| output_error(e.to_string()))?;
      (binary, values)
    };

    let mut file = tempfile::Builder::new()
      .prefix("ddb-ytt-values-")
      .suffix(".yml")
      .tempfile()
      .map_err(|e| RenderError::Io {
        path: std::env::temp_dir().display().to_string(),
        source: e,
      })?;
    write!(file, "#@data/values\n---\n{}", values).map_err(|e| RenderError::Io {
      path: file.path().display().to_string(),
      source: e,
    })?;

    let args = vec![
      "-f".to_string(),
      template_name.clone(),
      "-f".to_string(),
      file.path().display().to_string(),
    ];
    let output = kernel
      .runner()
      .run(&binary, &args, template.parent(), None)
      .map_err(|e| RenderError::Process {
        template: template_name.clone(),
        source: e,
      })?;
    Ok(vec![(Rendered::Text(output.stdout_text()), target.to_path_buf())])
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::event::Event;
  use crate::features::core::CoreFeature;
  use crate::features::file::FileFeature;
  use crate::kernel::KernelOptions;
  use crate::process::CommandOutput;
  use crate::util::testutil::ScriptedRunner;
  use serde_json::json;
  use std::cell::RefCell;
  use std::fs;
  use tempfile::TempDir;

  #[test]
  fn configuration_is_passed_as_data_values() {
    let project = TempDir::new().unwrap();
    let template = project.path().join("deploy.ytt.yaml");
    fs::write(&template, "#@ load(\"@ytt:data\", \"data\")\nenv: #@ data.values.core.env.current\n").unwrap();

    let values = Rc::new(RefCell::new(String::new()));
    let seen = values.clone();
    let runner = Rc::new(ScriptedRunner::new(move |invocation| {
      *seen.borrow_mut() = fs::read_to_string(&invocation.args[3]).unwrap_or_default();
      Ok(CommandOutput {
        status: 0,
        stdout: b"env: dev\n".to_vec(),
        stderr: Vec::new(),
      })
    }));

    let config = Config::new(json!({"core": {"path": {"project_home": project.path()}}}));
    let kernel = Kernel::new(config, KernelOptions::default())
      .unwrap()
      .with_runner(runner.clone());
    kernel
      .load_features(vec![Rc::new(CoreFeature), Rc::new(FileFeature), Rc::new(YttFeature)])
      .unwrap();
    kernel.emit(&Event::FileFound(template.clone())).unwrap();

    assert_eq!(fs::read_to_string(project.path().join("deploy.yaml")).unwrap(), "env: dev\n");
    let calls = runner.calls.borrow();
    assert_eq!(calls[0].program, "ytt");
    assert_eq!(calls[0].args[..2], ["-f".to_string(), template.display().to_string()]);
    let values = values.borrow();
    assert!(values.starts_with("#@data/values\n---\n"), "{values}");
    assert!(values.contains("current: dev"), "{values}");
  }
}
