//! Thread-bound access to an [`ObjectStore`].
//!
//! A handle is neither `Send` nor `Sync`: using it from a thread other than
//! the one that created it is rejected at compile time. Everything a handle
//! returns is a detached snapshot; to refer to an object from another thread,
//! take a [`ThreadSafeReference`] and resolve it on a handle there.

use std::{
  cell::RefCell,
  collections::BTreeMap,
  marker::PhantomData,
  sync::PoisonError,
};

use gazette_core::{Entity, KeyedFields, Predicate};

use crate::{
  Error, ObjectStore, Result, ThreadSafeReference,
  store::{object_key, object_prefix},
};

/// Writes staged by the current transaction. `None` marks a removal.
type Staged = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

/// What to do when an object with the same primary key already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Update {
  /// Fail with [`Error::AlreadyExists`].
  Error,
  /// Write only if at least one field differs from the stored object.
  Modified,
  /// Always overwrite the given fields.
  All,
}

pub struct StoreHandle {
  store:         ObjectStore,
  staged:        RefCell<Option<Staged>>,
  _thread_bound: PhantomData<*const ()>,
}

impl StoreHandle {
  pub(crate) fn new(store: ObjectStore) -> Self {
    Self { store, staged: RefCell::new(None), _thread_bound: PhantomData }
  }

  // ── Transactions ──────────────────────────────────────────────────────────

  pub fn is_in_write_transaction(&self) -> bool { self.staged.borrow().is_some() }

  /// Run `block` inside a write transaction.
  ///
  /// If a transaction is already open on this handle, `block` joins it
  /// instead of starting a new one. The outermost call commits everything
  /// atomically on success and discards everything on error.
  pub fn write<R>(&self, block: impl FnOnce(&Self) -> Result<R>) -> Result<R> {
    if self.is_in_write_transaction() {
      return block(self);
    }

    let _guard = self
      .store
      .write_lock()
      .lock()
      .unwrap_or_else(PoisonError::into_inner);
    *self.staged.borrow_mut() = Some(Staged::new());

    let result = block(self);
    let staged = self.staged.borrow_mut().take().unwrap_or_default();

    let value = result?;
    self.store.commit(staged)?;
    Ok(value)
  }

  fn stage(&self, key: Vec<u8>, value: Option<Vec<u8>>) -> Result<()> {
    let mut staged = self.staged.borrow_mut();
    let staged = staged.as_mut().ok_or(Error::NotInWriteTransaction)?;
    staged.insert(key, value);
    Ok(())
  }

  fn ensure_registered<E: Entity>(&self) -> Result<()> {
    if self.store.is_registered(E::NAME) {
      Ok(())
    } else {
      Err(gazette_core::Error::WrongModel(E::NAME.to_owned()).into())
    }
  }

  // ── Mutations ─────────────────────────────────────────────────────────────

  /// Create an object from keyed fields, or update the existing object with
  /// the same primary key according to `update`.
  pub fn create<E: Entity>(&self, fields: &KeyedFields, update: Update) -> Result<E> {
    self.ensure_registered::<E>()?;
    if !self.is_in_write_transaction() {
      return Err(Error::NotInWriteTransaction);
    }

    let key = fields.text(E::PRIMARY_KEY).ok_or_else(|| {
      gazette_core::Error::invalid_field(E::NAME, E::PRIMARY_KEY, "primary key is required")
    })?;

    let object = match self.object::<E>(key)? {
      Some(_) if update == Update::Error => {
        return Err(Error::AlreadyExists {
          entity: E::NAME.to_owned(),
          key:    key.to_owned(),
        });
      }
      Some(mut existing) => {
        existing.apply(fields)?;
        existing
      }
      None => E::from_fields(fields)?,
    };

    self.add(&object, update)?;
    Ok(object)
  }

  /// Insert or replace a whole object.
  pub fn add<E: Entity>(&self, object: &E, update: Update) -> Result<()> {
    self.ensure_registered::<E>()?;
    let fields = object.to_fields();

    match (self.object::<E>(object.primary_key())?, update) {
      (Some(_), Update::Error) => Err(Error::AlreadyExists {
        entity: E::NAME.to_owned(),
        key:    object.primary_key().to_owned(),
      }),
      (Some(current), Update::Modified) if current.to_fields() == fields => {
        // Still a write; fail the same way outside a transaction.
        if self.is_in_write_transaction() {
          Ok(())
        } else {
          Err(Error::NotInWriteTransaction)
        }
      }
      _ => self.stage(
        object_key(E::NAME, object.primary_key()),
        Some(serde_json::to_vec(&fields)?),
      ),
    }
  }

  pub fn delete<E: Entity>(&self, objects: &[E]) -> Result<()> {
    self.ensure_registered::<E>()?;
    for object in objects {
      self.stage(object_key(E::NAME, object.primary_key()), None)?;
    }
    Ok(())
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  /// The object with primary key `key`, including uncommitted writes of the
  /// current transaction.
  pub fn object<E: Entity>(&self, key: &str) -> Result<Option<E>> {
    self.ensure_registered::<E>()?;
    let key = object_key(E::NAME, key);

    if let Some(staged) = self.staged.borrow().as_ref()
      && let Some(entry) = staged.get(&key)
    {
      return entry.as_deref().map(decode::<E>).transpose();
    }

    self.store.get_raw(&key)?.as_deref().map(decode::<E>).transpose()
  }

  /// All objects of type `E`, ordered by primary key.
  pub fn objects<E: Entity>(&self) -> Result<Results<E>> {
    self.ensure_registered::<E>()?;
    let prefix = object_prefix(E::NAME);

    let mut rows: BTreeMap<Vec<u8>, Vec<u8>> =
      self.store.scan_raw(&prefix)?.into_iter().collect();

    if let Some(staged) = self.staged.borrow().as_ref() {
      for (key, value) in staged.iter().filter(|(k, _)| k.starts_with(&prefix)) {
        match value {
          Some(value) => rows.insert(key.clone(), value.clone()),
          None => rows.remove(key),
        };
      }
    }

    let items = rows
      .values()
      .map(|bytes| decode::<E>(bytes))
      .collect::<Result<Vec<_>>>()?;
    Ok(Results { items })
  }

  // ── Thread handoff ────────────────────────────────────────────────────────

  pub fn thread_safe_reference<E: Entity>(&self, object: &E) -> ThreadSafeReference<E> {
    ThreadSafeReference::new(object.primary_key())
  }

  /// Re-read the referenced object on this handle's thread. `None` if it has
  /// been deleted since the reference was taken.
  pub fn resolve<E: Entity>(&self, reference: &ThreadSafeReference<E>) -> Result<Option<E>> {
    self.object::<E>(reference.key())
  }

  pub fn flush(&self) -> Result<()> { self.store.flush() }
}

fn decode<E: Entity>(bytes: &[u8]) -> Result<E> {
  let fields: KeyedFields = serde_json::from_slice(bytes)?;
  Ok(E::from_fields(&fields)?)
}

// ─── Results ─────────────────────────────────────────────────────────────────

/// A snapshot of query results.
#[derive(Debug, Clone)]
pub struct Results<E> {
  items: Vec<E>,
}

impl<E: Entity> Results<E> {
  pub fn filter(self, predicate: &Predicate) -> Self {
    Self {
      items: self
        .items
        .into_iter()
        .filter(|item| predicate.matches_entity(item))
        .collect(),
    }
  }

  pub fn len(&self) -> usize { self.items.len() }

  pub fn is_empty(&self) -> bool { self.items.is_empty() }

  pub fn first(&self) -> Option<&E> { self.items.first() }

  pub fn as_slice(&self) -> &[E] { &self.items }

  pub fn iter(&self) -> std::slice::Iter<'_, E> { self.items.iter() }

  pub fn into_vec(self) -> Vec<E> { self.items }
}

impl<E> IntoIterator for Results<E> {
  type Item = E;
  type IntoIter = std::vec::IntoIter<E>;

  fn into_iter(self) -> Self::IntoIter { self.items.into_iter() }
}
