//! The `permissions` feature: applies configured modes to matching files.

use std::rc::Rc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::action::{Action, ActionError, FnAction};
use crate::config::{Config, ConfigError, FieldError, Schema};
use crate::event::{Event, topics};
use crate::feature::Feature;
use crate::kernel::Kernel;
use crate::platform::permissions::{ModeSpec, apply_mode};
use crate::walker;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionsSchema {
  /// Glob relative to the project root → mode (`+x`, `-x`, `+w`, `-w` or octal).
  pub specs: IndexMap<String, String>,
}

impl Schema for PermissionsSchema {
  fn validate(&self) -> Vec<FieldError> {
    let mut errors = Vec::new();
    for (pattern, spec) in &self.specs {
      if let Err(e) = spec.parse::<ModeSpec>() {
        errors.push(FieldError::new(format!("specs.{}", pattern), e.to_string()));
      }
      if let Err(e) = walker::compile(std::slice::from_ref(pattern)) {
        errors.push(FieldError::new(format!("specs.{}", pattern), e.to_string()));
      }
    }
    errors
  }
}

pub struct PermissionsFeature;

impl Feature for PermissionsFeature {
  fn name(&self) -> &str {
    "permissions"
  }

  fn dependencies(&self) -> Vec<String> {
    vec!["core".to_string(), "file".to_string()]
  }

  fn configure(&self, config: &mut Config) -> Result<(), ConfigError> {
    config.sanitize::<PermissionsSchema>("permissions")?;
    Ok(())
  }

  fn actions(&self) -> Vec<Rc<dyn Action>> {
    vec![Rc::new(
      FnAction::new("permissions.update", topics::FILE_GENERATED, update)
        .on(topics::FILE_FOUND)
        .with_order(100),
    )]
  }
}

fn update(kernel: &Kernel, event: &Event) -> Result<(), ActionError> {
  let Some(path) = event.path() else {
    return Ok(());
  };
  let specs: IndexMap<String, String> = kernel.config().get_as("permissions.specs")?.unwrap_or_default();
  if specs.is_empty() || !path.is_file() {
    return Ok(());
  }
  let project = kernel.project_home();
  let Ok(relative) = path.strip_prefix(&project) else {
    return Ok(());
  };

  for (pattern, spec) in &specs {
    let matcher = walker::compile(std::slice::from_ref(pattern))?;
    if !matcher.is_match(relative) {
      continue;
    }
    if apply_mode(path, spec.parse()?)? {
      info!(path = %path.display(), mode = %spec, "permissions updated");
    }
  }
  Ok(())
}
