//! The `run` feature: project binaries and the `run` command.
//!
//! `ddb run <name> [args...]` prints the command line of a configured binary
//! so a shell can evaluate it:
//!
//! ```yaml
//! run:
//!   binaries:
//!     npm:
//!       command: [docker, compose, exec, node, npm]
//!       workdir: /app
//! ```

use std::path::PathBuf;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::action::{Action, ActionError, FnAction};
use crate::binary::{Binary, shell_quote};
use crate::command::{Command, Phase, PhaseArgument};
use crate::config::{Config, ConfigError, FieldError, Schema};
use crate::event::{Event, topics};
use crate::feature::Feature;
use crate::kernel::Kernel;

use super::strings;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSchema {
  pub binaries: IndexMap<String, BinarySettings>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BinarySettings {
  pub command: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub workdir: Option<PathBuf>,
}

impl Schema for RunSchema {
  fn validate(&self) -> Vec<FieldError> {
    self
      .binaries
      .iter()
      .filter(|(_, settings)| settings.command.is_empty())
      .map(|(name, _)| FieldError::new(format!("binaries.{}.command", name), "must not be empty"))
      .collect()
  }
}

pub struct RunFeature;

impl RunFeature {
  fn phase() -> Phase {
    Phase::new("run", "Print the command line of a project binary")
      .with_argument(PhaseArgument::positional("name", "Binary to run"))
      .with_argument(PhaseArgument::trailing("args", "Arguments passed to the binary"))
  }
}

impl Feature for RunFeature {
  fn name(&self) -> &str {
    "run"
  }

  fn dependencies(&self) -> Vec<String> {
    strings(&["core"])
  }

  fn configure(&self, config: &mut Config) -> Result<(), ConfigError> {
    config.sanitize::<RunSchema>("run")?;
    Ok(())
  }

  fn phases(&self) -> Vec<Phase> {
    vec![Self::phase()]
  }

  fn commands(&self) -> Vec<Command> {
    vec![Command::single(&Self::phase())]
  }

  fn actions(&self) -> Vec<Rc<dyn Action>> {
    vec![Rc::new(FnAction::new("run.run", &topics::phase("run"), run))]
  }

  fn binaries(&self, config: &Config) -> Vec<Binary> {
    let settings: RunSchema = config.get_as("run").ok().flatten().unwrap_or_default();
    settings
      .binaries
      .into_iter()
      .map(|(name, settings)| {
        let binary = Binary::new(&name, settings.command);
        match settings.workdir {
          Some(workdir) => binary.with_workdir(workdir),
          None => binary,
        }
      })
      .collect()
  }
}

fn run(kernel: &Kernel, _event: &Event) -> Result<(), ActionError> {
  let name = kernel
    .argument("name")
    .and_then(|values| values.into_iter().next())
    .ok_or_else(|| ActionError::Failed("no binary name given".to_string()))?;
  let args = kernel.argument("args").unwrap_or_default();

  let line = {
    let binaries = kernel.binaries();
    let binary = binaries.get(&name)?;
    let command = binary
      .command_line(&args)
      .iter()
      .map(|word| shell_quote(word))
      .collect::<Vec<_>>()
      .join(" ");
    match &binary.workdir {
      Some(workdir) => format!("cd {} && {}", shell_quote(&workdir.display().to_string()), command),
      None => command,
    }
  };
  kernel.print(&line)
}
