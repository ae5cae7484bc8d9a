//! The `gitignore` feature: keeps generated files out of version control.

use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::action::{Action, ActionError, FnAction};
use crate::config::{Config, ConfigError, FieldError, Schema};
use crate::consts::GITIGNORE_MARKER;
use crate::event::{Event, topics};
use crate::feature::Feature;
use crate::gitignore::{GitignoreFile, entry_for, find_gitignore};
use crate::kernel::Kernel;

const CACHE_NAMESPACE: &str = "gitignore";
const ENFORCED_KEY: &str = "enforce";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitignoreSchema {
  pub marker: String,
  /// Entries always present in the project `.gitignore`.
  pub enforce: Vec<String>,
}

impl Default for GitignoreSchema {
  fn default() -> Self {
    Self {
      marker: GITIGNORE_MARKER.to_string(),
      enforce: Vec::new(),
    }
  }
}

impl Schema for GitignoreSchema {
  fn validate(&self) -> Vec<FieldError> {
    if self.marker.trim().is_empty() {
      vec![FieldError::new("marker", "must not be empty")]
    } else {
      Vec::new()
    }
  }
}

pub struct GitignoreFeature;

impl Feature for GitignoreFeature {
  fn name(&self) -> &str {
    "gitignore"
  }

  fn dependencies(&self) -> Vec<String> {
    vec!["core".to_string(), "file".to_string()]
  }

  fn configure(&self, config: &mut Config) -> Result<(), ConfigError> {
    config.sanitize::<GitignoreSchema>("gitignore")?;
    Ok(())
  }

  fn actions(&self) -> Vec<Rc<dyn Action>> {
    vec![
      Rc::new(FnAction::new("gitignore.update", topics::FILE_GENERATED, update).on(topics::FILE_DELETED)),
      Rc::new(FnAction::new("gitignore.enforce", &topics::phase("configure"), enforce).with_order(-10)),
    ]
  }
}

fn marker(kernel: &Kernel) -> String {
  kernel
    .config()
    .get_str("gitignore.marker")
    .unwrap_or_else(|| GITIGNORE_MARKER.to_string())
}

/// Add generated files to the managed block and drop deleted ones.
fn update(kernel: &Kernel, event: &Event) -> Result<(), ActionError> {
  let Some(path) = event.path() else {
    return Ok(());
  };
  let project = kernel.project_home();
  if !path.starts_with(&project) {
    debug!(path = %path.display(), "outside the project, not ignoring");
    return Ok(());
  }

  let gitignore = find_gitignore(path, &project);
  let Some(entry) = entry_for(&gitignore, path) else {
    return Ok(());
  };
  let mut file = GitignoreFile::load(&gitignore, &marker(kernel))?;

  match event {
    Event::FileGenerated { .. } => {
      if file.add(&entry) {
        file.save()?;
        info!(entry = %entry, gitignore = %gitignore.display(), "added to gitignore");
      }
    }
    Event::FileDeleted(_) => {
      if file.remove(&entry) {
        file.save()?;
        info!(entry = %entry, gitignore = %gitignore.display(), "removed from gitignore");
      }
    }
    _ => {}
  }
  Ok(())
}

/// Reconcile configured entries with the project `.gitignore`, removing
/// entries that were enforced by the previous run but no longer are.
fn enforce(kernel: &Kernel, _event: &Event) -> Result<(), ActionError> {
  let entries: Vec<String> = kernel.config().get_as("gitignore.enforce")?.unwrap_or_default();
  let cache = kernel.cache(CACHE_NAMESPACE)?;
  let previous: Vec<String> = cache.borrow().get_json(ENFORCED_KEY)?.unwrap_or_default();

  let gitignore = kernel.project_home().join(".gitignore");
  let mut file = GitignoreFile::load(&gitignore, &marker(kernel))?;
  let mut changed = false;
  for entry in &entries {
    changed |= file.add(entry);
  }
  for stale in previous.iter().filter(|p| !entries.contains(p)) {
    changed |= file.remove(stale);
  }
  if changed {
    file.save()?;
    info!(gitignore = %gitignore.display(), "enforced entries updated");
  }

  cache.borrow_mut().set_json(ENFORCED_KEY, &entries)?;
  Ok(())
}
