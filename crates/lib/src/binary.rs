//! Project binaries: named command lines exposed through `ddb run` and shims.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::registry::Named;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binary {
  pub name: String,
  /// Program followed by its leading arguments.
  pub command: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub workdir: Option<PathBuf>,
}

impl Binary {
  pub fn new(name: &str, command: Vec<String>) -> Self {
    Self {
      name: name.to_string(),
      command,
      workdir: None,
    }
  }

  pub fn with_workdir(mut self, workdir: PathBuf) -> Self {
    self.workdir = Some(workdir);
    self
  }

  /// The full command line for an invocation with `args`.
  pub fn command_line(&self, args: &[String]) -> Vec<String> {
    self.command.iter().chain(args).cloned().collect()
  }
}

impl Named for Binary {
  fn name(&self) -> &str {
    &self.name
  }
}

/// Quote `word` for POSIX shells when it contains anything but safe characters.
pub fn shell_quote(word: &str) -> String {
  let safe = !word.is_empty()
    && word
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
  if safe {
    word.to_string()
  } else {
    format!("'{}'", word.replace('\'', r"'\''"))
  }
}
