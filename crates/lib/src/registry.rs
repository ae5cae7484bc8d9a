//! Ordered named collections.
//!
//! A [`Registry`] keeps objects by unique name in registration order. A
//! registry of serializable objects can be mirrored to a [`Cache`]: it is
//! hydrated from the cache when attached, and every later mutation is written
//! through and flushed.
//!
//! [`Cache`]: crate::cache::Cache

use std::rc::Rc;

use indexmap::IndexMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::cache::{CacheError, SharedCache};

/// Objects that carry their own registration name.
pub trait Named {
  fn name(&self) -> &str;
}

impl<T: Named + ?Sized> Named for Rc<T> {
  fn name(&self) -> &str {
    (**self).name()
  }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
  #[error("{kind} '{name}' is already registered")]
  AlreadyRegistered { kind: &'static str, name: String },

  #[error("{kind} '{name}' is not registered")]
  NotRegistered { kind: &'static str, name: String },

  #[error("failed to mirror {kind} '{name}' to cache: {source}")]
  Encode {
    kind: &'static str,
    name: String,
    #[source]
    source: serde_json::Error,
  },

  #[error(transparent)]
  Cache(#[from] CacheError),
}

struct Mirror<T> {
  cache: SharedCache,
  encode: fn(&T) -> serde_json::Result<Vec<u8>>,
}

/// A named, insertion-ordered collection of `T`.
pub struct Registry<T> {
  kind: &'static str,
  entries: IndexMap<String, T>,
  mirror: Option<Mirror<T>>,
}

impl<T> Registry<T> {
  /// Create an empty registry. `kind` names the element type in errors.
  pub fn new(kind: &'static str) -> Self {
    Self {
      kind,
      entries: IndexMap::new(),
      mirror: None,
    }
  }

  pub fn kind(&self) -> &'static str {
    self.kind
  }

  /// Register `object` under an explicit name.
  pub fn register_as(&mut self, name: &str, object: T) -> Result<(), RegistryError> {
    if self.entries.contains_key(name) {
      return Err(RegistryError::AlreadyRegistered {
        kind: self.kind,
        name: name.to_string(),
      });
    }

    if let Some(mirror) = &self.mirror {
      let raw = (mirror.encode)(&object).map_err(|e| RegistryError::Encode {
        kind: self.kind,
        name: name.to_string(),
        source: e,
      })?;
      let mut cache = mirror.cache.borrow_mut();
      cache.set(name, raw);
      cache.flush()?;
    }

    trace!(kind = self.kind, name, "registered");
    self.entries.insert(name.to_string(), object);
    Ok(())
  }

  /// Remove and return the object registered under `name`.
  pub fn unregister(&mut self, name: &str) -> Result<T, RegistryError> {
    let object = self
      .entries
      .shift_remove(name)
      .ok_or_else(|| RegistryError::NotRegistered {
        kind: self.kind,
        name: name.to_string(),
      })?;

    if let Some(mirror) = &self.mirror {
      let mut cache = mirror.cache.borrow_mut();
      cache.pop(name);
      cache.flush()?;
    }

    trace!(kind = self.kind, name, "unregistered");
    Ok(object)
  }

  pub fn get(&self, name: &str) -> Result<&T, RegistryError> {
    self.entries.get(name).ok_or_else(|| RegistryError::NotRegistered {
      kind: self.kind,
      name: name.to_string(),
    })
  }

  pub fn has(&self, name: &str) -> bool {
    self.entries.contains_key(name)
  }

  pub fn iter(&self) -> impl Iterator<Item = &T> {
    self.entries.values()
  }

  pub fn names(&self) -> Vec<String> {
    self.entries.keys().cloned().collect()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Remove every object, and every mirrored cache entry.
  pub fn clear(&mut self) -> Result<(), RegistryError> {
    self.entries.clear();
    if let Some(mirror) = &self.mirror {
      let mut cache = mirror.cache.borrow_mut();
      cache.clear();
      cache.flush()?;
    }
    Ok(())
  }
}

impl<T: Clone> Registry<T> {
  /// Snapshot of every object in registration order.
  pub fn all(&self) -> Vec<T> {
    self.entries.values().cloned().collect()
  }
}

impl<T: Named> Registry<T> {
  /// Register `object` under its own name.
  pub fn register(&mut self, object: T) -> Result<(), RegistryError> {
    let name = object.name().to_string();
    self.register_as(&name, object)
  }
}

impl<T: Serialize + DeserializeOwned> Registry<T> {
  /// Mirror this registry to `cache`.
  ///
  /// Entries persisted in the cache but not yet registered are loaded first,
  /// then every registered object is written back so both sides agree.
  pub fn set_cache(&mut self, cache: SharedCache) -> Result<(), RegistryError> {
    {
      let mut guard = cache.borrow_mut();
      for key in guard.keys() {
        if self.entries.contains_key(&key) {
          continue;
        }
        match guard.get_json::<T>(&key) {
          Ok(Some(object)) => {
            self.entries.insert(key, object);
          }
          Ok(None) => {}
          Err(e) => {
            debug!(kind = self.kind, key = %key, error = %e, "dropping undecodable cache entry");
            guard.pop(&key);
          }
        }
      }

      for (name, object) in &self.entries {
        guard.set_json(name, object)?;
      }
      guard.flush()?;
    }

    self.mirror = Some(Mirror {
      cache,
      encode: |object| serde_json::to_vec(object),
    });
    Ok(())
  }
}
