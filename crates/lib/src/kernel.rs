//! The kernel: configuration, registries, caches and the event bus of one run.
//!
//! Everything lives behind `RefCell`s so actions can reach the kernel through
//! a shared reference while an emission is in progress. Borrows are kept to
//! single statements; nothing holds one across [`Kernel::emit`].

use std::cell::{Ref, RefCell, RefMut};
use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{debug, info, trace, warn};

use crate::action::runner::{self, ActionHandle};
use crate::action::{Action, ActionError, ActionFailure};
use crate::binary::Binary;
use crate::cache::{CacheError, Caches, SharedCache};
use crate::command::{Command, Phase};
use crate::config::{Config, ConfigError};
use crate::consts::AUTOFIX_MAX_RETRIES;
use crate::event::{Event, EventBus};
use crate::feature::{self, Feature, FeatureError};
use crate::process::{CommandRunner, SystemRunner};
use crate::registry::{Registry, RegistryError};
use crate::service::Service;
use crate::walker::ProcessedSets;

#[derive(Debug, thiserror::Error)]
pub enum KernelError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Feature(#[from] FeatureError),

  #[error(transparent)]
  Registry(#[from] RegistryError),

  #[error(transparent)]
  Cache(#[from] CacheError),

  #[error(transparent)]
  Action(#[from] ActionError),

  #[error("unknown command '{0}'")]
  UnknownCommand(String),
}

#[derive(Debug, Clone, Default)]
pub struct KernelOptions {
  /// Stop at the first failing action.
  pub fail_fast: bool,
  /// Announce generated files even when their content did not change.
  pub eject: bool,
  /// Empty every cache when it is opened.
  pub clear_cache: bool,
  /// Where caches persist. `None` keeps them in memory.
  pub cache_dir: Option<PathBuf>,
}

/// In-memory sink for [`Kernel::print`], cloneable so callers keep a handle.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer(Rc<RefCell<Vec<u8>>>);

impl OutputBuffer {
  pub fn contents(&self) -> String {
    String::from_utf8_lossy(&self.0.borrow()).to_string()
  }
}

impl Write for OutputBuffer {
  fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
    self.0.borrow_mut().extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> std::io::Result<()> {
    Ok(())
  }
}

/// Pops the action context when dropped.
pub struct ContextGuard<'a> {
  kernel: &'a Kernel,
}

impl Drop for ContextGuard<'_> {
  fn drop(&mut self) {
    self.kernel.context.borrow_mut().pop();
  }
}

pub struct Kernel {
  config: RefCell<Config>,
  options: KernelOptions,
  bus: EventBus<Kernel>,
  features: RefCell<Registry<Rc<dyn Feature>>>,
  phases: RefCell<Registry<Phase>>,
  commands: RefCell<Registry<Command>>,
  actions: RefCell<Registry<Rc<ActionHandle>>>,
  binaries: RefCell<Registry<Binary>>,
  services: RefCell<Registry<Service>>,
  caches: Caches,
  processed: RefCell<ProcessedSets>,
  context: RefCell<Vec<String>>,
  failures: RefCell<Vec<ActionFailure>>,
  arguments: RefCell<BTreeMap<String, Vec<String>>>,
  runner: Rc<dyn CommandRunner>,
  output: RefCell<Box<dyn Write>>,
}

impl Kernel {
  pub fn new(config: Config, options: KernelOptions) -> Result<Self, KernelError> {
    let project = config
      .roots()
      .map(|roots| roots.project.clone())
      .or_else(|| std::env::current_dir().ok())
      .unwrap_or_default();
    let caches = match &options.cache_dir {
      Some(dir) => Caches::new(dir, &project, options.clear_cache),
      None => Caches::in_memory(),
    };

    let mut binaries = Registry::new("binary");
    binaries.set_cache(caches.open("binaries", false)?)?;

    Ok(Self {
      config: RefCell::new(config),
      options,
      bus: EventBus::new(),
      features: RefCell::new(Registry::new("feature")),
      phases: RefCell::new(Registry::new("phase")),
      commands: RefCell::new(Registry::new("command")),
      actions: RefCell::new(Registry::new("action")),
      binaries: RefCell::new(binaries),
      services: RefCell::new(Registry::new("service")),
      caches,
      processed: RefCell::new(ProcessedSets::default()),
      context: RefCell::new(Vec::new()),
      failures: RefCell::new(Vec::new()),
      arguments: RefCell::new(BTreeMap::new()),
      runner: Rc::new(SystemRunner),
      output: RefCell::new(Box::new(std::io::stdout())),
    })
  }

  pub fn with_runner(mut self, runner: Rc<dyn CommandRunner>) -> Self {
    self.runner = runner;
    self
  }

  /// Send [`Kernel::print`] output to `output` instead of stdout.
  pub fn with_output(self, output: impl Write + 'static) -> Self {
    *self.output.borrow_mut() = Box::new(output);
    self
  }

  pub fn options(&self) -> &KernelOptions {
    &self.options
  }

  pub fn config(&self) -> Ref<'_, Config> {
    self.config.borrow()
  }

  pub fn config_mut(&self) -> RefMut<'_, Config> {
    self.config.borrow_mut()
  }

  /// Project root: `core.path.project_home`, else the configuration's
  /// project root, else the working directory.
  pub fn project_home(&self) -> PathBuf {
    let config = self.config();
    if let Some(home) = config.get_str("core.path.project_home") {
      return PathBuf::from(home);
    }
    config
      .roots()
      .map(|roots| roots.project.clone())
      .or_else(|| std::env::current_dir().ok())
      .unwrap_or_default()
  }

  pub fn bus(&self) -> &EventBus<Kernel> {
    &self.bus
  }

  pub fn emit(&self, event: &Event) -> Result<(), ActionError> {
    trace!(event = %event, "emit");
    self.bus.emit(self, event)
  }

  pub fn caches(&self) -> &Caches {
    &self.caches
  }

  /// Project cache for `namespace`.
  pub fn cache(&self, namespace: &str) -> Result<SharedCache, CacheError> {
    self.caches.open(namespace, false)
  }

  pub fn global_cache(&self, namespace: &str) -> Result<SharedCache, CacheError> {
    self.caches.open(namespace, true)
  }

  pub fn processed(&self) -> RefMut<'_, ProcessedSets> {
    self.processed.borrow_mut()
  }

  pub fn runner(&self) -> Rc<dyn CommandRunner> {
    self.runner.clone()
  }

  /// Write one line of user-facing output.
  pub fn print(&self, line: &str) -> Result<(), ActionError> {
    writeln!(self.output.borrow_mut(), "{}", line).map_err(|e| ActionError::Io {
      path: "<output>".to_string(),
      source: e,
    })
  }

  pub fn enter_action(&self, name: &str) -> ContextGuard<'_> {
    self.context.borrow_mut().push(name.to_string());
    ContextGuard { kernel: self }
  }

  /// Names of the actions currently running, outermost first.
  pub fn context(&self) -> Vec<String> {
    self.context.borrow().clone()
  }

  pub fn record_failure(&self, failure: ActionFailure) {
    self.failures.borrow_mut().push(failure);
  }

  pub fn failures(&self) -> Vec<ActionFailure> {
    self.failures.borrow().clone()
  }

  pub fn has_failures(&self) -> bool {
    !self.failures.borrow().is_empty()
  }

  pub fn fail_fast(&self) -> bool {
    self.options.fail_fast || self.config().get_bool("core.fail_fast").unwrap_or(false)
  }

  pub fn eject(&self) -> bool {
    self.options.eject || self.config().get_bool("core.eject").unwrap_or(false)
  }

  pub fn autofix_max_retries(&self) -> usize {
    self
      .config()
      .get_as::<usize>("core.autofix_max_retries")
      .ok()
      .flatten()
      .unwrap_or(AUTOFIX_MAX_RETRIES)
  }

  pub fn features(&self) -> Ref<'_, Registry<Rc<dyn Feature>>> {
    self.features.borrow()
  }

  pub fn phases(&self) -> Ref<'_, Registry<Phase>> {
    self.phases.borrow()
  }

  pub fn commands(&self) -> Ref<'_, Registry<Command>> {
    self.commands.borrow()
  }

  pub fn actions(&self) -> Ref<'_, Registry<Rc<ActionHandle>>> {
    self.actions.borrow()
  }

  pub fn binaries(&self) -> Ref<'_, Registry<Binary>> {
    self.binaries.borrow()
  }

  pub fn services(&self) -> Ref<'_, Registry<Service>> {
    self.services.borrow()
  }

  pub fn register_service(&self, service: Service) -> Result<(), KernelError> {
    debug!(service = %service.name, feature = %service.feature, "registering service");
    self.services.borrow_mut().register(service)?;
    Ok(())
  }

  /// Arguments of the running command, keyed by phase argument name.
  pub fn set_arguments(&self, arguments: BTreeMap<String, Vec<String>>) {
    *self.arguments.borrow_mut() = arguments;
  }

  pub fn argument(&self, name: &str) -> Option<Vec<String>> {
    self.arguments.borrow().get(name).cloned()
  }

  pub fn flag(&self, name: &str) -> bool {
    self
      .arguments
      .borrow()
      .get(name)
      .is_some_and(|values| values.iter().any(|v| v == "true"))
  }

  /// Subscribe `action` to each of its bindings. Disabled actions are skipped.
  pub fn register_action(&self, action: Rc<dyn Action>) -> Result<(), KernelError> {
    if action.disabled(&self.config()) {
      debug!(action = %action.name(), "action disabled");
      return Ok(());
    }

    let name = action.name().to_string();
    let handle = ActionHandle::new(action.clone());
    self.actions.borrow_mut().register_as(&name, handle.clone())?;

    let order = action.order();
    for binding in action.bindings() {
      trace!(action = %name, event = %binding.event, order, "subscribing");
      let topic = binding.event.clone();
      self.bus.subscribe(&topic, order, runner::listener(handle.clone(), binding));
    }
    Ok(())
  }

  /// Add or replace a binary, then announce it.
  pub fn register_binary(&self, binary: Binary) -> Result<(), ActionError> {
    let name = binary.name.clone();
    {
      let mut binaries = self.binaries.borrow_mut();
      if binaries.has(&name) {
        binaries.unregister(&name)?;
      }
      binaries.register(binary)?;
    }
    debug!(binary = %name, "binary registered");
    self.emit(&Event::BinaryRegistered(name))
  }

  /// Load `features` in dependency order.
  ///
  /// Every feature is registered and configured; only enabled ones
  /// contribute phases, commands, actions and binaries.
  pub fn load_features(&self, features: Vec<Rc<dyn Feature>>) -> Result<(), KernelError> {
    let extra: IndexMap<String, Vec<String>> = self.config().get_as("dependencies")?.unwrap_or_default();
    let sorted = feature::sort(features, &extra)?;

    for feature in &sorted {
      self.features.borrow_mut().register_as(feature.name(), feature.clone())?;
    }
    for feature in &sorted {
      feature.before_load(self)?;
    }
    for feature in &sorted {
      feature
        .configure(&mut self.config_mut())
        .map_err(|source| FeatureError::Config {
          feature: feature.name().to_string(),
          source,
        })?;
    }

    let enabled: Vec<Rc<dyn Feature>> = sorted
      .iter()
      .filter(|feature| {
        let disabled = feature.disabled(&self.config());
        if disabled {
          info!(feature = %feature.name(), "feature disabled");
        }
        !disabled
      })
      .cloned()
      .collect();

    for feature in &enabled {
      for phase in feature.phases() {
        self.phases.borrow_mut().register(phase)?;
      }
      for command in feature.commands() {
        self.commands.borrow_mut().register(command)?;
      }
      for service in feature.services() {
        self.register_service(service)?;
      }
    }
    for feature in &enabled {
      for action in feature.actions() {
        self.register_action(action)?;
      }
    }

    let configured: Vec<Binary> = enabled
      .iter()
      .flat_map(|feature| feature.binaries(&self.config()))
      .collect();
    let names: HashSet<&str> = configured.iter().map(|b| b.name.as_str()).collect();
    let stale: Vec<String> = self
      .binaries
      .borrow()
      .names()
      .into_iter()
      .filter(|name| !names.contains(name.as_str()))
      .collect();
    for name in stale {
      debug!(binary = %name, "dropping binary no longer configured");
      self.binaries.borrow_mut().unregister(&name)?;
    }
    for binary in configured {
      self.register_binary(binary)?;
    }

    for feature in &enabled {
      feature.after_load(self)?;
    }

    info!(
      loaded = enabled.len(),
      disabled = sorted.len() - enabled.len(),
      "features loaded"
    );
    Ok(())
  }

  /// Run every phase of command `name`, then flush the caches.
  pub fn execute_command(&self, name: &str) -> Result<(), KernelError> {
    let phases = {
      let commands = self.commands();
      commands
        .get(name)
        .map_err(|_| KernelError::UnknownCommand(name.to_string()))?
        .phases
        .clone()
    };

    info!(command = %name, "running command");
    self.processed.borrow_mut().clear();
    for phase in &phases {
      self.run_phase(phase)?;
    }
    self.caches.flush_all()?;
    Ok(())
  }

  pub fn run_phase(&self, phase: &str) -> Result<(), ActionError> {
    debug!(phase = %phase, "phase");
    self.emit(&Event::phase(phase))
  }

  /// Destroy initialized actions and close every cache.
  pub fn shutdown(&self) -> Result<(), KernelError> {
    let handles = self.actions.borrow().all();
    for handle in handles.iter().filter(|h| h.is_initialized()) {
      if let Err(e) = handle.action.destroy(self) {
        warn!(action = %handle.action.name(), error = %e, "failed to destroy action");
      }
    }
    self.caches.close_all()?;
    Ok(())
  }
}
