//! Events and the bus that carries them.
//!
//! Every emission is an [`Event`] value. Its topic string (see [`topics`])
//! selects the listeners; the variant carries the payload.

pub mod bus;
pub mod topics;

use std::fmt;
use std::path::{Path, PathBuf};

pub use bus::{EventBus, Listener, ListenerId};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Event {
  /// A command phase is running.
  Phase(String),
  /// A file was discovered, created or modified.
  FileFound(PathBuf),
  /// A file vanished.
  FileDeleted(PathBuf),
  /// `target` was generated from `source`.
  FileGenerated { source: PathBuf, target: PathBuf },
  /// A binary was added to the binaries registry.
  BinaryRegistered(String),
  ConfigReloaded,
  MainStart,
  MainTerminate,
  MainVersion,
  /// Any other topic, with string arguments.
  Custom { topic: String, args: Vec<String> },
}

impl Event {
  pub fn phase(name: &str) -> Self {
    Event::Phase(name.to_string())
  }

  pub fn custom(topic: &str, args: &[&str]) -> Self {
    Event::Custom {
      topic: topic.to_string(),
      args: args.iter().map(|a| a.to_string()).collect(),
    }
  }

  pub fn topic(&self) -> String {
    match self {
      Event::Phase(name) => topics::phase(name),
      Event::FileFound(_) => topics::FILE_FOUND.to_string(),
      Event::FileDeleted(_) => topics::FILE_DELETED.to_string(),
      Event::FileGenerated { .. } => topics::FILE_GENERATED.to_string(),
      Event::BinaryRegistered(_) => topics::BINARY_REGISTERED.to_string(),
      Event::ConfigReloaded => topics::CONFIG_RELOADED.to_string(),
      Event::MainStart => topics::MAIN_START.to_string(),
      Event::MainTerminate => topics::MAIN_TERMINATE.to_string(),
      Event::MainVersion => topics::MAIN_VERSION.to_string(),
      Event::Custom { topic, .. } => topic.clone(),
    }
  }

  /// The file an event is about. For `file:generated` this is the target.
  pub fn path(&self) -> Option<&Path> {
    match self {
      Event::FileFound(path) | Event::FileDeleted(path) => Some(path),
      Event::FileGenerated { target, .. } => Some(target),
      _ => None,
    }
  }
}

impl fmt::Display for Event {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Event::FileFound(path) | Event::FileDeleted(path) => write!(f, "{}({})", self.topic(), path.display()),
      Event::FileGenerated { source, target } => {
        write!(f, "{}({} -> {})", self.topic(), source.display(), target.display())
      }
      Event::BinaryRegistered(name) => write!(f, "{}({})", self.topic(), name),
      Event::Custom { topic, args } if !args.is_empty() => write!(f, "{}({})", topic, args.join(", ")),
      _ => write!(f, "{}", self.topic()),
    }
  }
}
