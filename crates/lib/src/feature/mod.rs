//! Features: bundles of configuration, actions, phases, commands, binaries
//! and services.

pub mod loader;

use std::rc::Rc;

use crate::action::Action;
use crate::binary::Binary;
use crate::command::{Command, Phase};
use crate::config::{Config, ConfigError};
use crate::kernel::Kernel;
use crate::registry::RegistryError;
use crate::service::Service;

pub use loader::{Dependency, sort};

/// Suffix marking a dependency as optional in [`Feature::dependencies`].
pub const OPTIONAL: &str = "[optional]";

#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
  #[error("feature '{feature}' requires '{dependency}', which is not available")]
  MissingDependency { feature: String, dependency: String },

  #[error("dependency cycle between features: {}", .features.join(", "))]
  Cycle { features: Vec<String> },

  #[error("feature '{feature}': {source}")]
  Config {
    feature: String,
    #[source]
    source: ConfigError,
  },

  #[error(transparent)]
  Registry(#[from] RegistryError),

  #[error("feature '{feature}' failed to load: {message}")]
  Hook { feature: String, message: String },
}

pub trait Feature {
  fn name(&self) -> &str;

  /// Names of features that must load first. A name ending in
  /// `[optional]` only orders the two when the dependency is present.
  fn dependencies(&self) -> Vec<String> {
    Vec::new()
  }

  fn before_load(&self, _kernel: &Kernel) -> Result<(), FeatureError> {
    Ok(())
  }

  /// Validate and normalize this feature's configuration namespace.
  fn configure(&self, _config: &mut Config) -> Result<(), ConfigError> {
    Ok(())
  }

  fn after_load(&self, _kernel: &Kernel) -> Result<(), FeatureError> {
    Ok(())
  }

  fn disabled(&self, config: &Config) -> bool {
    config.get_bool(&format!("{}.disabled", self.name())).unwrap_or(false)
  }

  fn actions(&self) -> Vec<Rc<dyn Action>> {
    Vec::new()
  }

  fn phases(&self) -> Vec<Phase> {
    Vec::new()
  }

  fn commands(&self) -> Vec<Command> {
    Vec::new()
  }

  fn binaries(&self, _config: &Config) -> Vec<Binary> {
    Vec::new()
  }

  fn services(&self) -> Vec<Service> {
    Vec::new()
  }
}
