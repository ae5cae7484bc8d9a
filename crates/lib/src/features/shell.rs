//! The `shell` feature: project environment activation and binary shims.
//!
//! `ddb activate` prints `export`/`unset` lines that put the project's
//! binary directories first on `PATH`. The environment seen before activation
//! is saved (hex encoded JSON) in `DDB_SHELL_ENVIRON_BACKUP` so that
//! `ddb deactivate` can restore it exactly.

use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::action::{Action, ActionError, FnAction};
use crate::binary::shell_quote;
use crate::command::{Command, Phase};
use crate::config::{Config, ConfigError, Schema};
use crate::consts::SHELL_ENVIRON_BACKUP;
use crate::event::{Event, topics};
use crate::feature::{Feature, OPTIONAL};
use crate::kernel::Kernel;
use crate::platform::permissions::{ModeSpec, apply_mode};
use crate::util::fs::write_if_different;

use super::strings;

const PROJECT_HOME_VARIABLE: &str = "DDB_PROJECT_HOME";

#[cfg(windows)]
const PATH_SEPARATOR: &str = ";";
#[cfg(not(windows))]
const PATH_SEPARATOR: &str = ":";

type Environ = BTreeMap<String, String>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellSchema {
  pub path: ShellPath,
  /// Directory, relative to the project, receiving one shim per binary.
  pub shims: String,
  /// Variables never exported, restored or saved.
  pub envignore: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellPath {
  /// Project directories prepended to `PATH`, first wins.
  pub directories: Vec<String>,
}

impl Default for ShellPath {
  fn default() -> Self {
    Self {
      directories: strings(&[".bin", "bin"]),
    }
  }
}

impl Default for ShellSchema {
  fn default() -> Self {
    Self {
      path: ShellPath::default(),
      shims: ".bin".to_string(),
      envignore: strings(&["PWD", "OLDPWD", "SHLVL", "_"]),
    }
  }
}

impl Schema for ShellSchema {}

const PHASES: [(&str, &str); 3] = [
  ("activate", "Print the commands activating the project environment"),
  ("deactivate", "Print the commands restoring the environment"),
  ("check-activated", "Fail unless the project environment is active"),
];

pub struct ShellFeature;

impl Feature for ShellFeature {
  fn name(&self) -> &str {
    "shell"
  }

  fn dependencies(&self) -> Vec<String> {
    vec!["core".to_string(), format!("run{}", OPTIONAL)]
  }

  fn configure(&self, config: &mut Config) -> Result<(), ConfigError> {
    config.sanitize::<ShellSchema>("shell")?;
    Ok(())
  }

  fn phases(&self) -> Vec<Phase> {
    PHASES.iter().map(|(name, description)| Phase::new(name, description)).collect()
  }

  fn commands(&self) -> Vec<Command> {
    self.phases().iter().map(Command::single).collect()
  }

  fn actions(&self) -> Vec<Rc<dyn Action>> {
    vec![
      Rc::new(FnAction::new("shell.activate", &topics::phase("activate"), activate)),
      Rc::new(FnAction::new("shell.deactivate", &topics::phase("deactivate"), deactivate)),
      Rc::new(FnAction::new(
        "shell.check-activated",
        &topics::phase("check-activated"),
        check_activated,
      )),
      Rc::new(FnAction::new("shell.shim", topics::BINARY_REGISTERED, write_shim)),
    ]
  }
}

fn settings(kernel: &Kernel) -> Result<ShellSchema, ActionError> {
  Ok(kernel.config().get_as("shell")?.unwrap_or_default())
}

fn current_environ() -> Environ {
  std::env::vars().collect()
}

fn encode(environ: &Environ) -> Result<String, ActionError> {
  let json = serde_json::to_vec(environ)
    .map_err(|e| ActionError::Failed(format!("failed to save the environment: {}", e)))?;
  Ok(hex::encode(json))
}

fn decode(backup: &str) -> Result<Environ, ActionError> {
  let invalid = |message: String| ActionError::Failed(format!("invalid {}: {}", SHELL_ENVIRON_BACKUP, message));
  let bytes = hex::decode(backup.trim()).map_err(|e| invalid(e.to_string()))?;
  serde_json::from_slice(&bytes).map_err(|e| invalid(e.to_string()))
}

/// Print the commands turning `from` into `to`. Ignored variables are left
/// alone.
fn print_diff(kernel: &Kernel, from: &Environ, to: &Environ, ignored: &[String]) -> Result<(), ActionError> {
  let ignored = |name: &String| ignored.contains(name);
  for (name, value) in to {
    if !ignored(name) && from.get(name) != Some(value) {
      kernel.print(&format!("export {}={}", name, shell_quote(value)))?;
    }
  }
  for name in from.keys() {
    if !ignored(name) && !to.contains_key(name) {
      kernel.print(&format!("unset {}", name))?;
    }
  }
  Ok(())
}

fn activate(kernel: &Kernel, _event: &Event) -> Result<(), ActionError> {
  let settings = settings(kernel)?;
  let current = current_environ();

  // Re-activating starts over from the environment saved the first time.
  let base = match current.get(SHELL_ENVIRON_BACKUP) {
    Some(backup) => decode(backup)?,
    None => current
      .iter()
      .filter(|(name, _)| !settings.envignore.contains(name))
      .map(|(name, value)| (name.clone(), value.clone()))
      .collect(),
  };

  let project = kernel.project_home();
  let mut path: Vec<String> = settings
    .path
    .directories
    .iter()
    .map(|directory| project.join(directory).display().to_string())
    .collect();
  if let Some(existing) = base.get("PATH").filter(|p| !p.is_empty()) {
    path.push(existing.clone());
  }

  let mut activated = base.clone();
  activated.insert("PATH".to_string(), path.join(PATH_SEPARATOR));
  activated.insert(PROJECT_HOME_VARIABLE.to_string(), project.display().to_string());
  activated.insert(SHELL_ENVIRON_BACKUP.to_string(), encode(&base)?);

  info!(project = %project.display(), "activating project environment");
  print_diff(kernel, &current, &activated, &settings.envignore)
}

fn deactivate(kernel: &Kernel, _event: &Event) -> Result<(), ActionError> {
  let settings = settings(kernel)?;
  let current = current_environ();
  let Some(backup) = current.get(SHELL_ENVIRON_BACKUP) else {
    warn!("project environment is not activated");
    return Ok(());
  };
  let restored = decode(backup)?;
  print_diff(kernel, &current, &restored, &settings.envignore)
}

fn check_activated(kernel: &Kernel, _event: &Event) -> Result<(), ActionError> {
  let current = current_environ();
  let project = kernel.project_home().display().to_string();
  let active = current.contains_key(SHELL_ENVIRON_BACKUP)
    && current.get(PROJECT_HOME_VARIABLE).is_some_and(|home| *home == project);
  if active {
    Ok(())
  } else {
    Err(ActionError::Failed("project is not activated".to_string()))
  }
}

fn shim_content(command: &[String], workdir: Option<&Path>) -> String {
  let command = command.iter().map(|word| shell_quote(word)).collect::<Vec<_>>().join(" ");
  let mut content = String::from("#!/usr/bin/env sh\n");
  if let Some(workdir) = workdir {
    content.push_str(&format!("cd {} || exit 1\n", shell_quote(&workdir.display().to_string())));
  }
  content.push_str(&format!("exec {} \"$@\"\n", command));
  content
}

/// Write an executable shim for a newly registered binary.
fn write_shim(kernel: &Kernel, event: &Event) -> Result<(), ActionError> {
  let Event::BinaryRegistered(name) = event else {
    return Ok(());
  };
  let content = {
    let binaries = kernel.binaries();
    let binary = binaries.get(name)?;
    shim_content(&binary.command, binary.workdir.as_deref())
  };

  let path = kernel.project_home().join(settings(kernel)?.shims).join(name);
  let written = write_if_different(&path, content.as_bytes())?;
  apply_mode(&path, ModeSpec::AddExecutable)?;
  if written {
    info!(binary = %name, shim = %path.display(), "shim written");
  }
  if written || kernel.eject() {
    kernel.emit(&Event::FileGenerated {
      source: path.clone(),
      target: path,
    })?;
  }
  Ok(())
}
