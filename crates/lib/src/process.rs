//! Blocking execution of external programs.
//!
//! Renderers and actions never spawn processes directly; they go through a
//! [`CommandRunner`] so tests can substitute canned output.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
  #[error("failed to spawn '{program}': {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  #[error("'{program}' exited with status {status}: {}", String::from_utf8_lossy(.stderr).trim())]
  Failed {
    program: String,
    status: i32,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
  },
}

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
  pub status: i32,
  pub stdout: Vec<u8>,
  pub stderr: Vec<u8>,
}

impl CommandOutput {
  pub fn stdout_text(&self) -> String {
    String::from_utf8_lossy(&self.stdout).to_string()
  }
}

pub trait CommandRunner {
  /// Run `program` to completion. A non-zero exit is
  /// [`ProcessError::Failed`] carrying both output streams.
  fn run(
    &self,
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
    stdin: Option<&[u8]>,
  ) -> Result<CommandOutput, ProcessError>;
}

/// Runs programs with `std::process`, inheriting the environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
  fn run(
    &self,
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
    stdin: Option<&[u8]>,
  ) -> Result<CommandOutput, ProcessError> {
    info!(program, args = ?args, "executing command");

    let spawn_error = |e| ProcessError::Spawn {
      program: program.to_string(),
      source: e,
    };

    let mut command = Command::new(program);
    command
      .args(args)
      .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
      .stdout(Stdio::piped())
      .stderr(Stdio::piped());
    if let Some(cwd) = cwd {
      command.current_dir(cwd);
    }

    let mut child = command.spawn().map_err(spawn_error)?;
    if let Some(input) = stdin
      && let Some(mut pipe) = child.stdin.take()
    {
      pipe.write_all(input).map_err(spawn_error)?;
    }
    let output = child.wait_with_output().map_err(spawn_error)?;

    let status = output.status.code().unwrap_or(-1);
    if !output.stderr.is_empty() {
      debug!(stderr = %String::from_utf8_lossy(&output.stderr), "command stderr");
    }

    if !output.status.success() {
      return Err(ProcessError::Failed {
        program: program.to_string(),
        status,
        stdout: output.stdout,
        stderr: output.stderr,
      });
    }

    Ok(CommandOutput {
      status,
      stdout: output.stdout,
      stderr: output.stderr,
    })
  }
}
