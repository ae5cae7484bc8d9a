//! The `file` feature: walks the project on `configure` and announces files.

use std::collections::HashSet;
use std::path::PathBuf;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::action::{Action, ActionError, FnAction};
use crate::config::{Config, ConfigError, Schema};
use crate::event::{Event, topics};
use crate::feature::Feature;
use crate::kernel::Kernel;
use crate::walker::{FileWalker, WalkOptions};

const CACHE_NAMESPACE: &str = "file";
const FOUND_KEY: &str = "found";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSchema {
  /// Empty means every file.
  pub includes: Vec<String>,
  /// Empty means the default excludes.
  pub excludes: Vec<String>,
}

impl Schema for FileSchema {}

pub struct FileFeature;

impl Feature for FileFeature {
  fn name(&self) -> &str {
    "file"
  }

  fn dependencies(&self) -> Vec<String> {
    vec!["core".to_string()]
  }

  fn configure(&self, config: &mut Config) -> Result<(), ConfigError> {
    config.sanitize::<FileSchema>("file")?;
    Ok(())
  }

  fn actions(&self) -> Vec<Rc<dyn Action>> {
    vec![Rc::new(FnAction::new("file.walk", &topics::phase("configure"), walk))]
  }
}

fn walker(kernel: &Kernel) -> Result<FileWalker, ActionError> {
  let settings: FileSchema = kernel.config().get_as("file")?.unwrap_or_default();
  let mut options = WalkOptions::new(&kernel.project_home()).includes(settings.includes);
  if !settings.excludes.is_empty() {
    options = options.excludes(settings.excludes);
  }
  Ok(FileWalker::new(options)?)
}

/// Emit `file:deleted` for files seen by the previous walk that are gone,
/// then `file:found` for every file present now.
fn walk(kernel: &Kernel, _event: &Event) -> Result<(), ActionError> {
  let files = walker(kernel)?.walk()?;
  let cache = kernel.cache(CACHE_NAMESPACE)?;
  let previous: Vec<PathBuf> = cache.borrow().get_json(FOUND_KEY)?.unwrap_or_default();
  debug!(files = files.len(), previous = previous.len(), "project walked");

  let current: HashSet<&PathBuf> = files.iter().collect();
  for gone in previous.iter().filter(|p| !current.contains(p) && !p.exists()) {
    kernel.emit(&Event::FileDeleted(gone.clone()))?;
  }
  for file in files.iter().filter(|f| f.exists()) {
    kernel.emit(&Event::FileFound(file.clone()))?;
  }

  let remaining: Vec<&PathBuf> = files.iter().filter(|f| f.exists()).collect();
  cache.borrow_mut().set_json(FOUND_KEY, &remaining)?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::features::core::CoreFeature;
  use crate::kernel::KernelOptions;
  use serde_json::json;
  use std::cell::RefCell;
  use std::fs;
  use tempfile::TempDir;

  fn kernel(project: &TempDir, log: &Rc<RefCell<Vec<String>>>) -> Kernel {
    let config = Config::new(json!({"core": {"path": {"project_home": project.path()}}}));
    let kernel = Kernel::new(config, KernelOptions::default()).unwrap();
    kernel
      .load_features(vec![Rc::new(CoreFeature), Rc::new(FileFeature)])
      .unwrap();
    for topic in [topics::FILE_FOUND, topics::FILE_DELETED] {
      let sink = log.clone();
      let root = project.path().to_path_buf();
      kernel.bus().subscribe(
        topic,
        0,
        Rc::new(move |_k: &Kernel, event: &Event| {
          let path = event.path().and_then(|p| p.strip_prefix(&root).ok()).map(|p| p.display().to_string());
          sink.borrow_mut().push(format!("{} {}", event.topic(), path.unwrap_or_default()));
          Ok(())
        }),
      );
    }
    kernel
  }

  #[test]
  fn walk_announces_files_in_order() {
    let project = TempDir::new().unwrap();
    fs::create_dir_all(project.path().join("sub")).unwrap();
    fs::write(project.path().join("b.txt"), "").unwrap();
    fs::write(project.path().join("sub/a.txt"), "").unwrap();
    fs::create_dir_all(project.path().join("node_modules")).unwrap();
    fs::write(project.path().join("node_modules/x.js"), "").unwrap();

    let log = Rc::new(RefCell::new(Vec::new()));
    let kernel = kernel(&project, &log);
    kernel.execute_command("configure").unwrap();
    assert_eq!(*log.borrow(), ["file:found b.txt", "file:found sub/a.txt"]);
  }

  #[test]
  fn vanished_files_are_announced_once() {
    let project = TempDir::new().unwrap();
    fs::write(project.path().join("keep.txt"), "").unwrap();
    fs::write(project.path().join("gone.txt"), "").unwrap();

    let log = Rc::new(RefCell::new(Vec::new()));
    let kernel = kernel(&project, &log);
    kernel.execute_command("configure").unwrap();

    fs::remove_file(project.path().join("gone.txt")).unwrap();
    log.borrow_mut().clear();
    kernel.execute_command("configure").unwrap();
    assert_eq!(*log.borrow(), ["file:deleted gone.txt", "file:found keep.txt"]);

    log.borrow_mut().clear();
    kernel.execute_command("configure").unwrap();
    assert_eq!(*log.borrow(), ["file:found keep.txt"]);
  }
}
