//! [`ObjectStore`] — the shareable store file and its configuration.

use std::{
  fmt,
  path::{Path, PathBuf},
  sync::{Arc, Mutex},
};

use gazette_core::Entity;
use tracing::info;

use crate::{Error, Result, StoreHandle};

const OBJECTS_TREE: &str = "objects";
const SCHEMA_VERSION_KEY: &[u8] = b"schema_version";
const KEY_SEPARATOR: char = '\u{1f}';

/// Runs inside a write transaction when the configured schema version is
/// newer than the stored one. Receives the stored (old) version.
pub type MigrationBlock = Arc<dyn Fn(&StoreHandle, u64) -> Result<()> + Send + Sync>;

// ─── Configuration ───────────────────────────────────────────────────────────

pub struct ObjectStoreConfig {
  /// Store directory; `None` opens a temporary store removed on drop.
  pub path:           Option<PathBuf>,
  pub schema_version: u64,
  /// Names of the entity types this store accepts.
  pub object_types:   Vec<&'static str>,
  pub migration:      Option<MigrationBlock>,
}

impl ObjectStoreConfig {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path:           Some(path.into()),
      schema_version: 0,
      object_types:   Vec::new(),
      migration:      None,
    }
  }

  pub fn temporary() -> Self {
    Self { path: None, schema_version: 0, object_types: Vec::new(), migration: None }
  }

  /// Store location for `name` inside `dir`.
  pub fn location(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.store"))
  }

  pub fn register<E: Entity>(mut self) -> Self {
    if !self.object_types.contains(&E::NAME) {
      self.object_types.push(E::NAME);
    }
    self
  }

  pub fn schema_version(mut self, version: u64) -> Self {
    self.schema_version = version;
    self
  }

  pub fn migration(
    mut self,
    block: impl Fn(&StoreHandle, u64) -> Result<()> + Send + Sync + 'static,
  ) -> Self {
    self.migration = Some(Arc::new(block));
    self
  }
}

impl fmt::Debug for ObjectStoreConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ObjectStoreConfig")
      .field("path", &self.path)
      .field("schema_version", &self.schema_version)
      .field("object_types", &self.object_types)
      .field("migration", &self.migration.is_some())
      .finish()
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

struct Inner {
  db:           sled::Db,
  objects:      sled::Tree,
  object_types: Vec<&'static str>,
  /// Serialises write transactions across handles.
  write_lock:   Mutex<()>,
}

/// An open object store. Cloning is cheap and clones share the same file.
///
/// The store itself is `Send + Sync`; access its contents through a
/// [`StoreHandle`] created on the thread that will use it.
#[derive(Clone)]
pub struct ObjectStore {
  inner: Arc<Inner>,
}

impl ObjectStore {
  pub fn open(config: ObjectStoreConfig) -> Result<Self> {
    let db = match &config.path {
      Some(path) => sled::Config::new().path(path).open()?,
      None => sled::Config::new().temporary(true).open()?,
    };
    let objects = db.open_tree(OBJECTS_TREE)?;

    let store = Self {
      inner: Arc::new(Inner {
        db,
        objects,
        object_types: config.object_types,
        write_lock: Mutex::new(()),
      }),
    };
    store.apply_schema_version(config.schema_version, config.migration.as_ref())?;
    Ok(store)
  }

  /// Open a handle bound to the calling thread.
  pub fn handle(&self) -> StoreHandle { StoreHandle::new(self.clone()) }

  pub fn is_registered(&self, entity: &str) -> bool {
    self.inner.object_types.iter().any(|name| *name == entity)
  }

  pub fn schema_version(&self) -> Result<Option<u64>> {
    self
      .inner
      .db
      .get(SCHEMA_VERSION_KEY)?
      .map(|bytes| decode_version(&bytes))
      .transpose()
  }

  fn apply_schema_version(
    &self,
    configured: u64,
    migration: Option<&MigrationBlock>,
  ) -> Result<()> {
    match self.schema_version()? {
      Some(stored) if stored > configured => {
        return Err(Error::SchemaDowngrade { stored, configured });
      }
      Some(stored) if stored == configured => return Ok(()),
      Some(stored) => {
        if let Some(block) = migration {
          let handle = self.handle();
          handle.write(|h| block(h, stored))?;
        }
        info!(from = stored, to = configured, "object store schema migrated");
      }
      None => {}
    }

    self
      .inner
      .db
      .insert(SCHEMA_VERSION_KEY, configured.to_be_bytes().to_vec())?;
    Ok(())
  }

  pub(crate) fn write_lock(&self) -> &Mutex<()> { &self.inner.write_lock }

  pub(crate) fn get_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
    Ok(self.inner.objects.get(key)?.map(|v| v.to_vec()))
  }

  pub(crate) fn scan_raw(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
    self
      .inner
      .objects
      .scan_prefix(prefix)
      .map(|entry| {
        let (k, v) = entry?;
        Ok((k.to_vec(), v.to_vec()))
      })
      .collect()
  }

  /// Apply staged writes atomically. `None` values are removals.
  pub(crate) fn commit(
    &self,
    staged: impl IntoIterator<Item = (Vec<u8>, Option<Vec<u8>>)>,
  ) -> Result<()> {
    let mut batch = sled::Batch::default();
    for (key, value) in staged {
      match value {
        Some(value) => batch.insert(key, value),
        None => batch.remove(key),
      }
    }
    self.inner.objects.apply_batch(batch)?;
    Ok(())
  }

  pub(crate) fn flush(&self) -> Result<()> {
    self.inner.db.flush()?;
    Ok(())
  }
}

// ─── Keys ────────────────────────────────────────────────────────────────────

pub(crate) fn object_prefix(entity: &str) -> Vec<u8> {
  format!("{entity}{KEY_SEPARATOR}").into_bytes()
}

pub(crate) fn object_key(entity: &str, primary_key: &str) -> Vec<u8> {
  format!("{entity}{KEY_SEPARATOR}{primary_key}").into_bytes()
}

fn decode_version(bytes: &[u8]) -> Result<u64> {
  <[u8; 8]>::try_from(bytes)
    .map(u64::from_be_bytes)
    .map_err(|_| Error::CorruptMetadata(format!("schema version has {} bytes", bytes.len())))
}
