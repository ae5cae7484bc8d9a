//! Actions: units of work bound to events.
//!
//! An [`Action`] declares [`EventBinding`]s. Registering it with the kernel
//! subscribes one runner per binding (see [`runner`]), which handles
//! initialization, event processors, failure recording and the action
//! context stack.

pub mod runner;

use std::fmt;
use std::rc::Rc;

use crate::cache::CacheError;
use crate::config::{Config, ConfigError};
use crate::event::Event;
use crate::gitignore::GitignoreError;
use crate::kernel::Kernel;
use crate::platform::permissions::PermissionError;
use crate::process::ProcessError;
use crate::registry::RegistryError;
use crate::template::RenderError;
use crate::util::fs::WriteError;
use crate::walker::WalkError;

/// Error returned by action code.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
  #[error(transparent)]
  Render(#[from] RenderError),

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Cache(#[from] CacheError),

  #[error(transparent)]
  Registry(#[from] RegistryError),

  #[error(transparent)]
  Process(#[from] ProcessError),

  #[error(transparent)]
  Gitignore(#[from] GitignoreError),

  #[error(transparent)]
  Walk(#[from] WalkError),

  #[error(transparent)]
  Write(#[from] WriteError),

  #[error(transparent)]
  Permission(#[from] PermissionError),

  #[error("I/O error on {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("{0}")]
  Failed(String),
}

/// What an event processor decided for one emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Processed {
  /// Skip this binding for the emission.
  Veto,
  /// Hand the event to the call target unchanged.
  Pass,
  /// Hand a different event to the call target.
  Rewrite(Event),
}

pub type CallTarget = Rc<dyn Fn(&Kernel, &Event) -> Result<(), ActionError>>;
pub type Processor = Rc<dyn Fn(&Kernel, &Event) -> Processed>;

/// Subscription of an action to one topic.
#[derive(Clone)]
pub struct EventBinding {
  pub event: String,
  /// Defaults to [`Action::execute`].
  pub call: Option<CallTarget>,
  pub processor: Option<Processor>,
}

impl EventBinding {
  pub fn new(event: &str) -> Self {
    Self {
      event: event.to_string(),
      call: None,
      processor: None,
    }
  }

  pub fn call(mut self, call: impl Fn(&Kernel, &Event) -> Result<(), ActionError> + 'static) -> Self {
    self.call = Some(Rc::new(call));
    self
  }

  pub fn processor(mut self, processor: impl Fn(&Kernel, &Event) -> Processed + 'static) -> Self {
    self.processor = Some(Rc::new(processor));
    self
  }
}

impl From<&str> for EventBinding {
  fn from(event: &str) -> Self {
    EventBinding::new(event)
  }
}

impl From<String> for EventBinding {
  fn from(event: String) -> Self {
    EventBinding::new(&event)
  }
}

impl fmt::Debug for EventBinding {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("EventBinding")
      .field("event", &self.event)
      .field("call", &self.call.is_some())
      .field("processor", &self.processor.is_some())
      .finish()
  }
}

pub trait Action {
  fn name(&self) -> &str;

  /// Events this action reacts to. Receives the shared handle so call
  /// targets can capture it.
  fn bindings(self: Rc<Self>) -> Vec<EventBinding>;

  /// Position among the listeners of the same topic; lower runs first.
  fn order(&self) -> i32 {
    0
  }

  fn disabled(&self, _config: &Config) -> bool {
    false
  }

  /// Whether [`initialize`](Action::initialize) must run before the first
  /// invocation.
  fn initializable(&self) -> bool {
    false
  }

  fn initialize(&self, _kernel: &Kernel) -> Result<(), ActionError> {
    Ok(())
  }

  fn destroy(&self, _kernel: &Kernel) -> Result<(), ActionError> {
    Ok(())
  }

  fn execute(&self, _kernel: &Kernel, event: &Event) -> Result<(), ActionError> {
    Err(ActionError::Failed(format!(
      "action '{}' has no handler for {}",
      self.name(),
      event.topic()
    )))
  }
}

pub type Handler = fn(&Kernel, &Event) -> Result<(), ActionError>;

/// An action whose work is a plain function of the kernel and the event.
pub struct FnAction {
  name: String,
  events: Vec<String>,
  order: i32,
  handler: Handler,
}

impl FnAction {
  pub fn new(name: &str, event: &str, handler: Handler) -> Self {
    Self {
      name: name.to_string(),
      events: vec![event.to_string()],
      order: 0,
      handler,
    }
  }

  /// Also run on `event`.
  pub fn on(mut self, event: &str) -> Self {
    self.events.push(event.to_string());
    self
  }

  pub fn with_order(mut self, order: i32) -> Self {
    self.order = order;
    self
  }
}

impl Action for FnAction {
  fn name(&self) -> &str {
    &self.name
  }

  fn bindings(self: Rc<Self>) -> Vec<EventBinding> {
    self.events.iter().map(|e| EventBinding::new(e)).collect()
  }

  fn order(&self) -> i32 {
    self.order
  }

  fn execute(&self, kernel: &Kernel, event: &Event) -> Result<(), ActionError> {
    (self.handler)(kernel, event)
  }
}

/// A failed action invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionFailure {
  pub action: String,
  pub event: String,
  pub message: String,
}

impl fmt::Display for ActionFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({}): {}", self.action, self.event, self.message)
  }
}
