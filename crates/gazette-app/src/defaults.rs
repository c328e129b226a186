//! A small persisted key/value store for launch flags.
//!
//! Values live in one JSON object on disk. Every write replaces the whole
//! file through a temporary sibling and a rename.

use std::{
  collections::BTreeMap,
  fs,
  path::{Path, PathBuf},
  sync::{Mutex, PoisonError},
};

use serde_json::Value;
use tracing::debug;

use crate::Result;

pub struct Defaults {
  path:   Option<PathBuf>,
  values: Mutex<BTreeMap<String, Value>>,
}

impl Defaults {
  /// Load the flag file at `path`, or start empty if it does not exist yet.
  pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
    let path = path.into();
    let values = match fs::read(&path) {
      Ok(bytes) => serde_json::from_slice(&bytes)?,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
      Err(e) => return Err(e.into()),
    };
    Ok(Self { path: Some(path), values: Mutex::new(values) })
  }

  /// A flag store that is never written to disk.
  pub fn in_memory() -> Self { Self { path: None, values: Mutex::default() } }

  pub fn path(&self) -> Option<&Path> { self.path.as_deref() }

  /// The boolean at `key`; `false` when absent or not a boolean.
  pub fn bool(&self, key: &str) -> bool {
    self
      .values
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .get(key)
      .and_then(Value::as_bool)
      .unwrap_or(false)
  }

  pub fn set_bool(&self, key: &str, value: bool) -> Result<()> {
    let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
    let previous = values.insert(key.to_owned(), Value::Bool(value));
    if let Err(e) = self.persist(&values) {
      match previous {
        Some(old) => values.insert(key.to_owned(), old),
        None => values.remove(key),
      };
      return Err(e);
    }
    debug!(key, value, "flag stored");
    Ok(())
  }

  fn persist(&self, values: &BTreeMap<String, Value>) -> Result<()> {
    let Some(path) = &self.path else {
      return Ok(());
    };
    if let Some(dir) = path.parent() {
      fs::create_dir_all(dir)?;
    }
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, serde_json::to_vec_pretty(values)?)?;
    fs::rename(&staging, path)?;
    Ok(())
  }
}
