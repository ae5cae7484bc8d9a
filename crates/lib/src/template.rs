//! Template rendering actions.
//!
//! A [`TemplateAction`] pairs a [`Renderer`] with the file events:
//!
//! - `file:found` renders the file when it is a template source
//! - `file:generated` does the same, so one renderer's output can feed another
//! - `file:deleted` removes the target, unless it was edited by hand
//!
//! Rendered bytes are remembered per target in the `templates.<renderer>`
//! cache; a target is only deleted when it still holds exactly those bytes.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::Deserialize;
use tracing::{debug, info, trace, warn};

use crate::action::{Action, ActionError, EventBinding};
use crate::cache::SharedCache;
use crate::event::{Event, topics};
use crate::kernel::Kernel;
use crate::platform::permissions::set_readonly;
use crate::process::ProcessError;
use crate::util::fs::write_if_different;
use crate::walker::TemplateFinder;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
  #[error("failed to read template {path}: {source}")]
  Read {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("{template}: {message}")]
  Syntax { template: String, message: String },

  #[error("{template}: '{name}' is undefined")]
  Undefined { template: String, name: String },

  #[error("{template}: {source}")]
  Process {
    template: String,
    #[source]
    source: ProcessError,
  },

  #[error("{template}: invalid output: {message}")]
  Output { template: String, message: String },

  #[error("{path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },
}

/// One output of a render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
  Text(String),
  Binary(Vec<u8>),
  /// The destination was created as a side effect (e.g. a symlink).
  Produced,
}

pub trait Renderer {
  /// Short name, used in action names and cache namespaces.
  fn name(&self) -> &str;

  /// Producers with a higher priority keep a target claimed by several
  /// templates.
  fn priority(&self) -> i32 {
    0
  }

  /// Render `template`, whose default destination is `target`.
  fn render(&self, kernel: &Kernel, template: &Path, target: &Path) -> Result<Vec<(Rendered, PathBuf)>, RenderError>;

  /// Offer a rewritten copy of `template` that may render where `error`
  /// occurred. `original` is the template the render started from.
  fn autofix_render_error(
    &self,
    _kernel: &Kernel,
    _template: &Path,
    _target: &Path,
    _original: &Path,
    _error: &RenderError,
  ) -> Result<Option<PathBuf>, RenderError> {
    Ok(None)
  }

  /// Bytes identifying what is currently at `target`.
  fn fingerprint(&self, target: &Path) -> Option<Vec<u8>> {
    fs::read(target).ok()
  }
}

/// Template settings shared by every renderer feature namespace.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TemplateSettings {
  pub suffixes: Vec<String>,
  pub extensions: Vec<String>,
  pub includes: Vec<String>,
  pub excludes: Vec<String>,
  pub autofix: bool,
}

struct TemplateState {
  finder: TemplateFinder,
  autofix: bool,
  cache: SharedCache,
}

pub struct TemplateAction<R> {
  name: String,
  namespace: String,
  renderer: R,
  state: RefCell<Option<Rc<TemplateState>>>,
}

impl<R: Renderer + 'static> TemplateAction<R> {
  /// Action reading its settings from the `namespace` configuration.
  pub fn new(namespace: &str, renderer: R) -> Self {
    Self {
      name: format!("{}.render", namespace),
      namespace: namespace.to_string(),
      renderer,
      state: RefCell::new(None),
    }
  }

  pub fn renderer(&self) -> &R {
    &self.renderer
  }

  fn state(&self) -> Result<Rc<TemplateState>, ActionError> {
    self
      .state
      .borrow()
      .clone()
      .ok_or_else(|| ActionError::Failed(format!("{} used before initialization", self.name)))
  }

  fn cache_key(target: &Path) -> String {
    target.to_string_lossy().to_string()
  }

  fn on_found(&self, kernel: &Kernel, source: &Path) -> Result<(), ActionError> {
    let state = self.state()?;
    let Some(target) = state.finder.target_of(source) else {
      return Ok(());
    };
    if !source.exists() {
      return Ok(());
    }
    self.render_pair(kernel, &state, source, &target)
  }

  fn render_pair(&self, kernel: &Kernel, state: &TemplateState, template: &Path, target: &Path) -> Result<(), ActionError> {
    if kernel.config().is_config_file(target) {
      warn!(target = %target.display(), "refusing to overwrite a configuration file");
      return Ok(());
    }
    if kernel.processed().is_processed(template, target) {
      trace!(template = %template.display(), "already processed");
      return Ok(());
    }
    if !kernel
      .processed()
      .claim(target, template, &self.name, self.renderer.priority())
    {
      return Ok(());
    }

    let max_retries = kernel.autofix_max_retries();
    let mut current = template.to_path_buf();
    let mut retries = 0;
    let outputs = loop {
      match self.renderer.render(kernel, &current, target) {
        Ok(outputs) => break outputs,
        Err(error) => {
          if retries >= max_retries {
            warn!(template = %template.display(), retries, "giving up autofix");
            self.discard_fixed(template, &current);
            return Err(error.into());
          }
          match self
            .renderer
            .autofix_render_error(kernel, &current, target, template, &error)
          {
            Ok(Some(fixed)) => {
              debug!(template = %template.display(), fixed = %fixed.display(), "retrying with autofixed template");
              self.discard_fixed(template, &current);
              current = fixed;
              retries += 1;
            }
            Ok(None) => {
              self.discard_fixed(template, &current);
              return Err(error.into());
            }
            Err(autofix_error) => {
              debug!(error = %autofix_error, "autofix failed");
              self.discard_fixed(template, &current);
              return Err(error.into());
            }
          }
        }
      }
    };

    if current != template {
      if state.autofix {
        fs::copy(&current, template).map_err(|e| ActionError::Io {
          path: template.display().to_string(),
          source: e,
        })?;
        info!(template = %template.display(), "template autofixed");
      }
      self.discard_fixed(template, &current);
    }

    self.write_outputs(kernel, state, template, outputs)
  }

  fn discard_fixed(&self, template: &Path, current: &Path) {
    if current != template {
      let _ = fs::remove_file(current);
    }
  }

  fn write_outputs(
    &self,
    kernel: &Kernel,
    state: &TemplateState,
    template: &Path,
    outputs: Vec<(Rendered, PathBuf)>,
  ) -> Result<(), ActionError> {
    for (content, destination) in outputs {
      if kernel.config().is_config_file(&destination) {
        warn!(target = %destination.display(), "refusing to overwrite a configuration file");
        continue;
      }

      let (written, produced, fingerprint) = match content {
        Rendered::Text(text) => {
          let bytes = text.into_bytes();
          (write_if_different(&destination, &bytes)?, false, Some(bytes))
        }
        Rendered::Binary(bytes) => (write_if_different(&destination, &bytes)?, false, Some(bytes)),
        Rendered::Produced => (false, true, self.renderer.fingerprint(&destination)),
      };

      if let Some(fingerprint) = fingerprint {
        state
          .cache
          .borrow_mut()
          .set(&Self::cache_key(&destination), fingerprint);
      }
      kernel.processed().mark(template, &destination);

      if written {
        info!(target = %destination.display(), template = %template.display(), "generated");
      } else if !produced {
        debug!(target = %destination.display(), "up to date");
      }

      if written || produced || kernel.eject() {
        kernel.emit(&Event::FileGenerated {
          source: template.to_path_buf(),
          target: destination,
        })?;
      }
    }
    Ok(())
  }

  fn on_deleted(&self, kernel: &Kernel, source: &Path) -> Result<(), ActionError> {
    let state = self.state()?;
    let Some(target) = state.finder.target_of(source) else {
      return Ok(());
    };

    let key = Self::cache_key(&target);
    let Some(cached) = state.cache.borrow().get(&key).map(<[u8]>::to_vec) else {
      return Ok(());
    };

    match self.renderer.fingerprint(&target) {
      Some(current) if current != cached => {
        info!(target = %target.display(), "target was modified since it was generated, keeping it");
        return Ok(());
      }
      Some(_) => {
        let _ = set_readonly(&target, false);
        fs::remove_file(&target).map_err(|e| ActionError::Io {
          path: target.display().to_string(),
          source: e,
        })?;
        info!(target = %target.display(), "removed");
      }
      None => debug!(target = %target.display(), "target already gone"),
    }

    state.cache.borrow_mut().pop(&key);
    kernel.processed().forget(&target);
    kernel.emit(&Event::FileDeleted(target))
  }
}

impl<R: Renderer + 'static> Action for TemplateAction<R> {
  fn name(&self) -> &str {
    &self.name
  }

  fn bindings(self: Rc<Self>) -> Vec<EventBinding> {
    let found = self.clone();
    let generated = self.clone();
    let deleted = self;
    vec![
      EventBinding::new(topics::FILE_FOUND).call(move |kernel, event| match event.path() {
        Some(path) => found.on_found(kernel, path),
        None => Ok(()),
      }),
      EventBinding::new(topics::FILE_GENERATED).call(move |kernel, event| match event.path() {
        Some(path) => generated.on_found(kernel, path),
        None => Ok(()),
      }),
      EventBinding::new(topics::FILE_DELETED).call(move |kernel, event| match event.path() {
        Some(path) => deleted.on_deleted(kernel, path),
        None => Ok(()),
      }),
    ]
  }

  fn initializable(&self) -> bool {
    true
  }

  fn initialize(&self, kernel: &Kernel) -> Result<(), ActionError> {
    let settings: TemplateSettings = kernel.config().get_as(&self.namespace)?.unwrap_or_default();
    let finder = TemplateFinder::new(
      &kernel.project_home(),
      settings.suffixes,
      &settings.extensions,
      settings.includes,
      settings.excludes,
    )?;
    let cache = kernel.cache(&format!("templates.{}", self.renderer.name()))?;
    *self.state.borrow_mut() = Some(Rc::new(TemplateState {
      finder,
      autofix: settings.autofix,
      cache,
    }));
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::Config;
  use crate::kernel::KernelOptions;
  use serde_json::json;
  use std::cell::Cell;
  use tempfile::TempDir;

  /// Fails every render and always offers one more rewritten candidate.
  struct Stubborn {
    renders: Rc<Cell<usize>>,
    fixes: Rc<Cell<usize>>,
  }

  impl Renderer for Stubborn {
    fn name(&self) -> &str {
      "stub"
    }

    fn render(&self, _kernel: &Kernel, template: &Path, _target: &Path) -> Result<Vec<(Rendered, PathBuf)>, RenderError> {
      self.renders.set(self.renders.get() + 1);
      Err(RenderError::Syntax {
        template: template.display().to_string(),
        message: "still broken".to_string(),
      })
    }

    fn autofix_render_error(
      &self,
      _kernel: &Kernel,
      template: &Path,
      _target: &Path,
      _original: &Path,
      _error: &RenderError,
    ) -> Result<Option<PathBuf>, RenderError> {
      self.fixes.set(self.fixes.get() + 1);
      let dir = template.parent().unwrap_or(Path::new("."));
      let candidate = dir.join(format!("_candidate-{}.tmpl", self.fixes.get()));
      fs::write(&candidate, "rewritten").map_err(|e| RenderError::Io {
        path: candidate.display().to_string(),
        source: e,
      })?;
      Ok(Some(candidate))
    }
  }

  fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
      .unwrap()
      .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
      .collect();
    names.sort();
    names
  }

  #[test]
  fn autofix_gives_up_after_the_configured_retries() {
    let project = TempDir::new().unwrap();
    let template = project.path().join("a.txt.tmpl");
    fs::write(&template, "broken").unwrap();

    let config = Config::new(json!({
      "core": {
        "autofix_max_retries": 3,
        "path": {"project_home": project.path().display().to_string()},
      },
      "stub": {"suffixes": [".tmpl"], "extensions": [".*", ""]},
    }));
    let kernel = Kernel::new(config, KernelOptions::default()).unwrap();
    let renders = Rc::new(Cell::new(0));
    let fixes = Rc::new(Cell::new(0));
    let renderer = Stubborn {
      renders: renders.clone(),
      fixes: fixes.clone(),
    };
    kernel
      .register_action(Rc::new(TemplateAction::new("stub", renderer)))
      .unwrap();

    kernel.emit(&Event::FileFound(template.clone())).unwrap();

    assert_eq!(fixes.get(), 3);
    assert_eq!(renders.get(), 4);
    let failures = kernel.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].action, "stub.render");
    assert!(failures[0].message.contains("still broken"), "{}", failures[0].message);
    assert_eq!(entries(project.path()), ["a.txt.tmpl"]);
    assert_eq!(fs::read_to_string(&template).unwrap(), "broken");
  }

  #[test]
  fn autofix_is_off_without_a_retry_budget() {
    let project = TempDir::new().unwrap();
    let template = project.path().join("a.txt.tmpl");
    fs::write(&template, "broken").unwrap();

    let config = Config::new(json!({
      "core": {
        "autofix_max_retries": 0,
        "path": {"project_home": project.path().display().to_string()},
      },
      "stub": {"suffixes": [".tmpl"], "extensions": [".*", ""]},
    }));
    let kernel = Kernel::new(config, KernelOptions::default()).unwrap();
    let renders = Rc::new(Cell::new(0));
    let fixes = Rc::new(Cell::new(0));
    let renderer = Stubborn {
      renders: renders.clone(),
      fixes: fixes.clone(),
    };
    kernel
      .register_action(Rc::new(TemplateAction::new("stub", renderer)))
      .unwrap();

    kernel.emit(&Event::FileFound(template)).unwrap();

    assert_eq!((renders.get(), fixes.get()), (1, 0));
    assert!(kernel.has_failures());
    assert_eq!(entries(project.path()), ["a.txt.tmpl"]);
  }
}
