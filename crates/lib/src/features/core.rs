//! The `core` feature: project identity, environments and the base commands.

use std::path::PathBuf;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::action::{Action, ActionError, FnAction};
use crate::command::{Command, Phase, PhaseArgument};
use crate::config::{Config, ConfigError, FieldError, Schema, env};
use crate::consts::{APP_NAME, AUTOFIX_MAX_RETRIES, ENV_PREFIX, VERSION};
use crate::event::{Event, topics};
use crate::feature::Feature;
use crate::kernel::Kernel;

use super::strings;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreSchema {
  pub project: ProjectSettings,
  pub env: EnvSettings,
  pub fail_fast: bool,
  pub eject: bool,
  pub autofix_max_retries: usize,
  pub path: PathSettings,
}

impl Default for CoreSchema {
  fn default() -> Self {
    Self {
      project: ProjectSettings::default(),
      env: EnvSettings::default(),
      fail_fast: false,
      eject: false,
      autofix_max_retries: AUTOFIX_MAX_RETRIES,
      path: PathSettings::default(),
    }
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvSettings {
  pub current: String,
  pub available: Vec<String>,
}

impl Default for EnvSettings {
  fn default() -> Self {
    Self {
      current: "dev".to_string(),
      available: strings(&["prod", "stage", "ci", "dev"]),
    }
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub project_home: Option<PathBuf>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub home: Option<PathBuf>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub ddb_home: Option<PathBuf>,
}

impl Schema for CoreSchema {
  fn validate(&self) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if self.env.available.is_empty() {
      errors.push(FieldError::new("env.available", "at least one environment is required"));
    } else if !self.env.available.contains(&self.env.current) {
      errors.push(FieldError::new(
        "env.current",
        format!(
          "'{}' is not one of the available environments ({})",
          self.env.current,
          self.env.available.join(", ")
        ),
      ));
    }
    errors
  }
}

const PHASES: [(&str, &str); 10] = [
  ("init", "Initialize the project"),
  ("configure", "Generate project files from templates"),
  ("create", "Create the project environment"),
  ("up", "Start the project environment"),
  ("start", "Start the project services"),
  ("stop", "Stop the project services"),
  ("down", "Stop and remove the project environment"),
  ("info", "Show project information"),
  ("config", "Show the effective configuration"),
  ("features", "List available features"),
];

pub struct CoreFeature;

impl Feature for CoreFeature {
  fn name(&self) -> &str {
    "core"
  }

  fn configure(&self, config: &mut Config) -> Result<(), ConfigError> {
    let mut core: CoreSchema = config.sanitize("core")?;

    let roots = config.roots().cloned();
    let project = core
      .path
      .project_home
      .clone()
      .or_else(|| roots.as_ref().map(|r| r.project.clone()))
      .or_else(|| std::env::current_dir().ok())
      .unwrap_or_default();
    core.path.project_home = Some(project.clone());
    if let Some(roots) = roots {
      core.path.home.get_or_insert(roots.home);
      core.path.ddb_home.get_or_insert(roots.ddb_home);
    }

    let name = core.project.name.clone().unwrap_or_else(|| {
      project
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| APP_NAME.to_string())
    });
    config.set("core.project.name", name)?;

    let paths = [
      ("project_home", &core.path.project_home),
      ("home", &core.path.home),
      ("ddb_home", &core.path.ddb_home),
    ];
    for (key, value) in paths {
      if let Some(value) = value {
        config.set(&format!("core.path.{}", key), value.display().to_string())?;
      }
    }
    Ok(())
  }

  fn phases(&self) -> Vec<Phase> {
    PHASES
      .iter()
      .map(|(name, description)| {
        let phase = Phase::new(name, description);
        if *name == "config" {
          phase.with_argument(PhaseArgument::flag("variables", "Print as environment variables"))
        } else {
          phase
        }
      })
      .collect()
  }

  fn commands(&self) -> Vec<Command> {
    self.phases().iter().map(Command::single).collect()
  }

  fn actions(&self) -> Vec<Rc<dyn Action>> {
    vec![
      Rc::new(FnAction::new("core.features", &topics::phase("features"), list_features)),
      Rc::new(FnAction::new("core.config", &topics::phase("config"), show_config)),
      Rc::new(FnAction::new("core.info", &topics::phase("info"), show_info)),
      Rc::new(FnAction::new("core.version", topics::MAIN_VERSION, show_version)),
    ]
  }
}

fn list_features(kernel: &Kernel, _event: &Event) -> Result<(), ActionError> {
  let features = kernel.features().all();
  for feature in features {
    let status = if feature.disabled(&kernel.config()) {
      "disabled"
    } else {
      "enabled"
    };
    let dependencies = feature.dependencies();
    let line = if dependencies.is_empty() {
      format!("{} ({})", feature.name(), status)
    } else {
      format!("{} ({}), requires {}", feature.name(), status, dependencies.join(", "))
    };
    kernel.print(&line)?;
  }
  Ok(())
}

fn show_config(kernel: &Kernel, _event: &Event) -> Result<(), ActionError> {
  let tree = kernel.config().tree().clone();
  if kernel.flag("variables") {
    for (key, value) in env::to_variables(ENV_PREFIX, &tree) {
      kernel.print(&format!("{}={}", key, value.as_str().unwrap_or_default()))?;
    }
    return Ok(());
  }
  let yaml = serde_yaml::to_string(&tree)
    .map_err(|e| ActionError::Failed(format!("failed to render configuration: {}", e)))?;
  kernel.print(yaml.trim_end())
}

fn show_info(kernel: &Kernel, _event: &Event) -> Result<(), ActionError> {
  let (name, environment, files) = {
    let config = kernel.config();
    (
      config.get_str("core.project.name").unwrap_or_default(),
      config.get_str("core.env.current").unwrap_or_default(),
      config.files().to_vec(),
    )
  };
  kernel.print(&format!("project:     {}", name))?;
  kernel.print(&format!("environment: {}", environment))?;
  kernel.print(&format!("home:        {}", kernel.project_home().display()))?;
  for file in files {
    kernel.print(&format!("config:      {}", file.display()))?;
  }
  for binary in kernel.binaries().names() {
    kernel.print(&format!("binary:      {}", binary))?;
  }
  Ok(())
}

fn show_version(kernel: &Kernel, _event: &Event) -> Result<(), ActionError> {
  kernel.print(&format!("{} {}", APP_NAME, VERSION))
}
