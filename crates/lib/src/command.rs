//! Commands and the phases they run.
//!
//! A [`Command`] is what the user invokes (`ddb configure`). Running it emits
//! one `phase:<name>` event per phase, in declaration order.

use crate::registry::Named;

/// A command-line argument contributed by a phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseArgument {
  pub name: String,
  pub help: String,
  /// Positional arguments are collected in declaration order.
  pub positional: bool,
  /// Consumes every remaining argument.
  pub trailing: bool,
  pub required: bool,
}

impl PhaseArgument {
  pub fn positional(name: &str, help: &str) -> Self {
    Self {
      name: name.to_string(),
      help: help.to_string(),
      positional: true,
      trailing: false,
      required: true,
    }
  }

  pub fn flag(name: &str, help: &str) -> Self {
    Self {
      name: name.to_string(),
      help: help.to_string(),
      positional: false,
      trailing: false,
      required: false,
    }
  }

  pub fn trailing(name: &str, help: &str) -> Self {
    Self {
      name: name.to_string(),
      help: help.to_string(),
      positional: true,
      trailing: true,
      required: false,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase {
  pub name: String,
  pub description: String,
  pub arguments: Vec<PhaseArgument>,
}

impl Phase {
  pub fn new(name: &str, description: &str) -> Self {
    Self {
      name: name.to_string(),
      description: description.to_string(),
      arguments: Vec::new(),
    }
  }

  pub fn with_argument(mut self, argument: PhaseArgument) -> Self {
    self.arguments.push(argument);
    self
  }
}

impl Named for Phase {
  fn name(&self) -> &str {
    &self.name
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
  pub name: String,
  pub description: String,
  /// Names of the phases to run, in order.
  pub phases: Vec<String>,
  pub parent: Option<String>,
}

impl Command {
  pub fn new(name: &str, description: &str, phases: &[&str]) -> Self {
    Self {
      name: name.to_string(),
      description: description.to_string(),
      phases: phases.iter().map(|p| p.to_string()).collect(),
      parent: None,
    }
  }

  /// A command running the single phase of the same name.
  pub fn single(phase: &Phase) -> Self {
    Self::new(&phase.name, &phase.description, &[&phase.name])
  }

  pub fn with_parent(mut self, parent: &str) -> Self {
    self.parent = Some(parent.to_string());
    self
  }
}

impl Named for Command {
  fn name(&self) -> &str {
    &self.name
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn single_phase_command() {
    let phase = Phase::new("configure", "Generate artifacts");
    let command = Command::single(&phase);
    assert_eq!(command.name, "configure");
    assert_eq!(command.phases, vec!["configure"]);
    assert_eq!(command.description, "Generate artifacts");
  }

  #[test]
  fn phase_arguments() {
    let phase = Phase::new("run", "Run a binary")
      .with_argument(PhaseArgument::positional("name", "Binary name"))
      .with_argument(PhaseArgument::trailing("args", "Arguments"));
    assert_eq!(phase.arguments.len(), 2);
    assert!(phase.arguments[1].trailing);
    assert!(!phase.arguments[1].required);
  }
}
