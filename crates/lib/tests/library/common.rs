//! Shared helpers for library integration tests.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use ddb_lib::config::{self, Config, ConfigRoots, migrations};
use ddb_lib::event::Event;
use ddb_lib::features::builtin_features;
use ddb_lib::kernel::{Kernel, KernelOptions, OutputBuffer};
use tempfile::TempDir;

/// A throwaway project directory holding a `ddb.yml`.
pub struct TestProject {
  pub temp: TempDir,
}

impl TestProject {
  pub fn new(config: &str) -> Self {
    let project = Self {
      temp: TempDir::new().unwrap(),
    };
    project.write("ddb.yml", config);
    project
  }

  pub fn path(&self) -> &Path {
    self.temp.path()
  }

  pub fn join(&self, relative: &str) -> PathBuf {
    self.temp.path().join(relative)
  }

  pub fn write(&self, relative: &str, content: &str) {
    let path = self.join(relative);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
  }

  pub fn read(&self, relative: &str) -> String {
    fs::read_to_string(self.join(relative)).unwrap_or_else(|e| panic!("failed to read {}: {}", relative, e))
  }

  pub fn exists(&self, relative: &str) -> bool {
    fs::symlink_metadata(self.join(relative)).is_ok()
  }

  pub fn remove(&self, relative: &str) {
    fs::remove_file(self.join(relative)).unwrap();
  }

  /// Entries of the managed `.gitignore` block, in file order.
  pub fn ignored(&self) -> Vec<String> {
    let Ok(content) = fs::read_to_string(self.join(".gitignore")) else {
      return Vec::new();
    };
    content
      .lines()
      .skip_while(|line| *line != "###> ddb ###")
      .skip(1)
      .take_while(|line| *line != "###< ddb ###")
      .map(str::to_string)
      .collect()
  }

  /// Configuration loaded from the project only, without environment overrides.
  pub fn config(&self) -> Config {
    config::load_with(&ConfigRoots::single(self.path()), &|_| None, migrations::builtin()).unwrap()
  }

  /// A kernel with every built-in feature and in-memory caches.
  pub fn kernel(&self) -> Kernel {
    self.kernel_with(KernelOptions::default())
  }

  pub fn kernel_with(&self, options: KernelOptions) -> Kernel {
    let kernel = Kernel::new(self.config(), options).unwrap();
    kernel.load_features(builtin_features()).unwrap();
    kernel
  }

  /// A kernel persisting its caches under `cache_dir`.
  pub fn persistent_kernel(&self, cache_dir: &Path) -> Kernel {
    self.kernel_with(KernelOptions {
      cache_dir: Some(cache_dir.to_path_buf()),
      ..KernelOptions::default()
    })
  }
}

/// Kernel output captured in memory.
pub fn with_output(kernel: Kernel) -> (Kernel, OutputBuffer) {
  let output = OutputBuffer::default();
  (kernel.with_output(output.clone()), output)
}

/// Record every `file:generated` target, relative to `root`, before any
/// other listener reacts to it.
pub fn record_generated(kernel: &Kernel, root: &Path) -> Rc<RefCell<Vec<String>>> {
  let log = Rc::new(RefCell::new(Vec::new()));
  let sink = log.clone();
  let root = root.to_path_buf();
  kernel.bus().subscribe(
    ddb_lib::event::topics::FILE_GENERATED,
    -1000,
    Rc::new(move |_kernel: &Kernel, event: &Event| {
      if let Some(path) = event.path() {
        let relative = path.strip_prefix(&root).unwrap_or(path);
        sink.borrow_mut().push(relative.display().to_string());
      }
      Ok(())
    }),
  );
  log
}
