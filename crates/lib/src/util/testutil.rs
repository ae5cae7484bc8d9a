//! Test utilities for ddb-lib.
//!
//! Cross-platform helpers for tests that spawn external programs, plus a
//! scripted command runner for renderer tests.

use std::cell::RefCell;
use std::path::Path;

use crate::process::{CommandOutput, CommandRunner, ProcessError};

/// Returns the shell command and args to execute a shell script.
#[cfg(unix)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("/bin/sh", vec!["-c".to_string(), script.to_string()])
}

#[cfg(windows)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("cmd.exe", vec!["/C".to_string(), script.to_string()])
}

/// Returns the command and args to echo a message.
#[cfg(unix)]
pub fn echo_msg(msg: &str) -> (&'static str, Vec<String>) {
  ("/bin/echo", vec![msg.to_string()])
}

#[cfg(windows)]
pub fn echo_msg(msg: &str) -> (&'static str, Vec<String>) {
  ("cmd.exe", vec!["/C".to_string(), format!("echo {}", msg)])
}

/// A recorded invocation of [`ScriptedRunner`].
#[derive(Debug, Clone)]
pub struct Invocation {
  pub program: String,
  pub args: Vec<String>,
  pub stdin: Option<Vec<u8>>,
}

/// Command runner that answers every call with a canned closure result.
pub struct ScriptedRunner {
  pub calls: RefCell<Vec<Invocation>>,
  respond: Box<dyn Fn(&Invocation) -> Result<CommandOutput, ProcessError>>,
}

impl ScriptedRunner {
  pub fn new(respond: impl Fn(&Invocation) -> Result<CommandOutput, ProcessError> + 'static) -> Self {
    Self {
      calls: RefCell::new(Vec::new()),
      respond: Box::new(respond),
    }
  }

  /// Runner that always succeeds with `stdout`.
  pub fn stdout(stdout: &str) -> Self {
    let stdout = stdout.as_bytes().to_vec();
    Self::new(move |_| {
      Ok(CommandOutput {
        status: 0,
        stdout: stdout.clone(),
        stderr: Vec::new(),
      })
    })
  }
}

impl CommandRunner for ScriptedRunner {
  fn run(
    &self,
    program: &str,
    args: &[String],
    _cwd: Option<&Path>,
    stdin: Option<&[u8]>,
  ) -> Result<CommandOutput, ProcessError> {
    let invocation = Invocation {
      program: program.to_string(),
      args: args.to_vec(),
      stdin: stdin.map(|s| s.to_vec()),
    };
    let result = (self.respond)(&invocation);
    self.calls.borrow_mut().push(invocation);
    result
  }
}
