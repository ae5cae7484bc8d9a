//! CLI output formatting utilities.
//!
//! Standard output belongs to the commands (shell exports, `run` command
//! lines), so every status message goes to standard error.

use std::time::Duration;

use ddb_lib::action::ActionFailure;
use owo_colors::{OwoColorize, Stream};

pub mod symbols {
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
}

pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  let millis = duration.subsec_millis();

  if secs >= 60 {
    format!("{}m {}s", secs / 60, secs % 60)
  } else if secs > 0 {
    format!("{}.{:02}s", secs, millis / 10)
  } else {
    format!("{}ms", millis)
  }
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  eprintln!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stderr, |s| s.blue()),
    message
  );
}

/// Summarize the failures recorded during a run.
pub fn print_failures(failures: &[ActionFailure]) {
  print_warning(&failure_summary(failures.len()));
  for failure in failures {
    eprintln!(
      "  {} {} {}",
      failure.action.if_supports_color(Stream::Stderr, |s| s.bold()),
      symbols::ARROW.if_supports_color(Stream::Stderr, |s| s.dimmed()),
      failure.message
    );
    eprintln!(
      "    {}",
      format!("while handling {}", failure.event).if_supports_color(Stream::Stderr, |s| s.dimmed())
    );
  }
}

fn failure_summary(count: usize) -> String {
  match count {
    1 => "1 action failed".to_string(),
    n => format!("{} actions failed", n),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_format_duration() {
    assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
    assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    assert_eq!(format_duration(Duration::from_secs(65)), "1m 5s");
  }

  #[test]
  fn test_failure_summary() {
    assert_eq!(failure_summary(1), "1 action failed");
    assert_eq!(failure_summary(3), "3 actions failed");
  }
}
