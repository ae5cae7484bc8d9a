//! Persistent key → bytes stores.
//!
//! Each cache is one JSON document holding hex-encoded values, so arbitrary
//! bytes round-trip exactly. Writes go through a temp file and rename.
//!
//! ```text
//! <home>/cache/
//! ├── <slug>/             # per-project caches
//! │   ├── binaries.json
//! │   └── templates.jinja.json
//! └── global/             # caches shared by every project
//! ```

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::consts::CACHE_FORMAT_VERSION;
use crate::util::fs::{WriteError, atomic_write};
use crate::util::hash::project_slug;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
  #[error("failed to read cache {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("cache {path} is corrupt and was deleted: {reason}")]
  Corrupt { path: String, reason: String },

  #[error("failed to persist cache: {0}")]
  Write(#[from] WriteError),

  #[error("failed to encode cache value for key '{key}': {source}")]
  Encode {
    key: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to decode cache value for key '{key}': {source}")]
  Decode {
    key: String,
    #[source]
    source: serde_json::Error,
  },
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
  version: u32,
  entries: BTreeMap<String, String>,
}

/// A single namespace of persisted entries.
#[derive(Debug)]
pub struct Cache {
  namespace: String,
  path: Option<PathBuf>,
  entries: BTreeMap<String, Vec<u8>>,
  dirty: bool,
}

/// Caches are shared between the kernel and the actions that use them.
pub type SharedCache = Rc<RefCell<Cache>>;

impl Cache {
  /// A cache that lives only as long as the process.
  pub fn in_memory(namespace: &str) -> Self {
    Self {
      namespace: namespace.to_string(),
      path: None,
      entries: BTreeMap::new(),
      dirty: false,
    }
  }

  /// Open the cache persisted at `path`, starting empty if the file is absent.
  ///
  /// A file that cannot be decoded is deleted and [`CacheError::Corrupt`]
  /// returned; opening again yields an empty cache.
  pub fn open(namespace: &str, path: &Path) -> Result<Self, CacheError> {
    let mut cache = Self {
      namespace: namespace.to_string(),
      path: Some(path.to_path_buf()),
      entries: BTreeMap::new(),
      dirty: false,
    };

    let raw = match fs::read(path) {
      Ok(raw) => raw,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(cache),
      Err(e) => {
        return Err(CacheError::Io {
          path: path.display().to_string(),
          source: e,
        });
      }
    };

    match decode_file(&raw) {
      Ok(entries) => {
        cache.entries = entries;
        debug!(namespace, entries = cache.entries.len(), "cache loaded");
        Ok(cache)
      }
      Err(reason) => {
        let _ = fs::remove_file(path);
        Err(CacheError::Corrupt {
          path: path.display().to_string(),
          reason,
        })
      }
    }
  }

  pub fn namespace(&self) -> &str {
    &self.namespace
  }

  pub fn path(&self) -> Option<&Path> {
    self.path.as_deref()
  }

  pub fn get(&self, key: &str) -> Option<&[u8]> {
    self.entries.get(key).map(Vec::as_slice)
  }

  pub fn get_or(&self, key: &str, default: &[u8]) -> Vec<u8> {
    self.get(key).unwrap_or(default).to_vec()
  }

  pub fn contains(&self, key: &str) -> bool {
    self.entries.contains_key(key)
  }

  pub fn set(&mut self, key: &str, value: impl Into<Vec<u8>>) {
    self.entries.insert(key.to_string(), value.into());
    self.dirty = true;
  }

  pub fn pop(&mut self, key: &str) -> Option<Vec<u8>> {
    let value = self.entries.remove(key);
    if value.is_some() {
      self.dirty = true;
    }
    value
  }

  /// Keys in sorted order.
  pub fn keys(&self) -> Vec<String> {
    self.entries.keys().cloned().collect()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn clear(&mut self) {
    if !self.entries.is_empty() {
      self.entries.clear();
    }
    self.dirty = true;
  }

  /// Decode a JSON value stored under `key`.
  pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
    self
      .get(key)
      .map(|raw| {
        serde_json::from_slice(raw).map_err(|e| CacheError::Decode {
          key: key.to_string(),
          source: e,
        })
      })
      .transpose()
  }

  /// Store `value` as JSON under `key`.
  pub fn set_json<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<(), CacheError> {
    let raw = serde_json::to_vec(value).map_err(|e| CacheError::Encode {
      key: key.to_string(),
      source: e,
    })?;
    self.set(key, raw);
    Ok(())
  }

  /// Persist pending changes. In-memory caches only reset their dirty flag.
  pub fn flush(&mut self) -> Result<(), CacheError> {
    if !self.dirty {
      return Ok(());
    }
    if let Some(path) = &self.path {
      let file = CacheFile {
        version: CACHE_FORMAT_VERSION,
        entries: self
          .entries
          .iter()
          .map(|(k, v)| (k.clone(), hex::encode(v)))
          .collect(),
      };
      let raw = serde_json::to_vec_pretty(&file).map_err(|e| CacheError::Encode {
        key: self.namespace.clone(),
        source: e,
      })?;
      atomic_write(path, &raw)?;
    }
    self.dirty = false;
    Ok(())
  }

  pub fn close(&mut self) -> Result<(), CacheError> {
    self.flush()
  }
}

fn decode_file(raw: &[u8]) -> Result<BTreeMap<String, Vec<u8>>, String> {
  let file: CacheFile = serde_json::from_slice(raw).map_err(|e| e.to_string())?;
  if file.version != CACHE_FORMAT_VERSION {
    return Err(format!(
      "unsupported format version {} (expected {})",
      file.version, CACHE_FORMAT_VERSION
    ));
  }
  file
    .entries
    .into_iter()
    .map(|(k, v)| match hex::decode(&v) {
      Ok(bytes) => Ok((k, bytes)),
      Err(e) => Err(format!("invalid value for key '{}': {}", k, e)),
    })
    .collect()
}

/// Every cache opened by one kernel.
#[derive(Debug)]
pub struct Caches {
  project_dir: Option<PathBuf>,
  global_dir: Option<PathBuf>,
  clear_on_open: bool,
  open: RefCell<IndexMap<String, SharedCache>>,
}

impl Caches {
  /// Caches persisted under `root`, with per-project caches in the
  /// directory named by the slug of `project`.
  pub fn new(root: &Path, project: &Path, clear_on_open: bool) -> Self {
    Self {
      project_dir: Some(root.join(project_slug(project))),
      global_dir: Some(root.join("global")),
      clear_on_open,
      open: RefCell::new(IndexMap::new()),
    }
  }

  /// Caches that are never written to disk.
  pub fn in_memory() -> Self {
    Self {
      project_dir: None,
      global_dir: None,
      clear_on_open: false,
      open: RefCell::new(IndexMap::new()),
    }
  }

  pub fn project_dir(&self) -> Option<&Path> {
    self.project_dir.as_deref()
  }

  /// Open (or return the already open) cache for `namespace`.
  pub fn open(&self, namespace: &str, global: bool) -> Result<SharedCache, CacheError> {
    let key = if global {
      format!("global/{}", namespace)
    } else {
      namespace.to_string()
    };

    if let Some(cache) = self.open.borrow().get(&key) {
      return Ok(cache.clone());
    }

    let dir = if global { &self.global_dir } else { &self.project_dir };
    let mut cache = match dir {
      None => Cache::in_memory(namespace),
      Some(dir) => {
        let path = dir.join(format!("{}.json", namespace));
        match Cache::open(namespace, &path) {
          Err(CacheError::Corrupt { path, reason }) => {
            warn!(path = %path, reason = %reason, "cache corrupt, starting cold");
            Cache::open(namespace, Path::new(&path))?
          }
          other => other?,
        }
      }
    };

    if self.clear_on_open {
      cache.clear();
      cache.flush()?;
    }

    let shared = Rc::new(RefCell::new(cache));
    self.open.borrow_mut().insert(key, shared.clone());
    Ok(shared)
  }

  /// Empty every open cache and persist the result.
  pub fn clear_all(&self) -> Result<(), CacheError> {
    for cache in self.open.borrow().values() {
      let mut cache = cache.borrow_mut();
      cache.clear();
      cache.flush()?;
    }
    info!("all caches cleared");
    Ok(())
  }

  pub fn flush_all(&self) -> Result<(), CacheError> {
    for cache in self.open.borrow().values() {
      cache.borrow_mut().flush()?;
    }
    Ok(())
  }

  /// Flush and forget every open cache.
  pub fn close_all(&self) -> Result<(), CacheError> {
    let caches: Vec<SharedCache> = self.open.borrow_mut().drain(..).map(|(_, c)| c).collect();
    for cache in caches {
      cache.borrow_mut().close()?;
    }
    Ok(())
  }

  pub fn open_namespaces(&self) -> Vec<String> {
    self.open.borrow().keys().cloned().collect()
  }
}
