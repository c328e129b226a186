//! Managed contexts: scratch pads of pending changes chained to a store.
//!
//! A context records upserts and deletes in a [`ChangeSet`]. Saving a
//! context hands its changes to its parent: another context, or the
//! [`SqliteStore`] itself, which writes them in one transaction. A fetch sees
//! the store overlaid with every pending change from the root down to the
//! context it runs in.
//!
//! Locks are only ever taken child before parent.

use std::{
  collections::{BTreeMap, BTreeSet},
  fmt,
  sync::Arc,
};

use gazette_core::{KeyedFields, Predicate};
use tokio::sync::Mutex;
use tracing::debug;

use crate::{Result, SqliteStore, schema::EntityDescription};

// ─── Changes ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey {
  pub entity: &'static str,
  pub key:    String,
}

impl ObjectKey {
  pub fn new(entity: &'static str, key: impl Into<String>) -> Self {
    Self { entity, key: key.into() }
  }
}

/// Pending changes. A key is either upserted or deleted, never both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
  upserts: BTreeMap<ObjectKey, KeyedFields>,
  deletes: BTreeSet<ObjectKey>,
}

impl ChangeSet {
  pub fn is_empty(&self) -> bool { self.upserts.is_empty() && self.deletes.is_empty() }

  pub fn len(&self) -> usize { self.upserts.len() + self.deletes.len() }

  /// Record the full field set of an object.
  pub fn upsert(&mut self, key: ObjectKey, fields: KeyedFields) {
    self.deletes.remove(&key);
    self.upserts.insert(key, fields);
  }

  pub fn delete(&mut self, key: ObjectKey) {
    self.upserts.remove(&key);
    self.deletes.insert(key);
  }

  /// Fold a child's changes into this set; the child's win.
  pub fn absorb(&mut self, child: ChangeSet) {
    for key in child.deletes {
      self.delete(key);
    }
    for (key, fields) in child.upserts {
      self.upsert(key, fields);
    }
  }

  pub fn upserts(&self) -> impl Iterator<Item = (&ObjectKey, &KeyedFields)> {
    self.upserts.iter()
  }

  pub fn deletes(&self) -> impl Iterator<Item = &ObjectKey> { self.deletes.iter() }

  pub fn clear(&mut self) {
    self.upserts.clear();
    self.deletes.clear();
  }

  fn for_entity(&self, entity: &str) -> ChangeSet {
    ChangeSet {
      upserts: self
        .upserts
        .iter()
        .filter(|(k, _)| k.entity == entity)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect(),
      deletes: self.deletes.iter().filter(|k| k.entity == entity).cloned().collect(),
    }
  }

  /// Apply this set on top of `rows` (keyed by primary key). Upserted rows
  /// that no longer match `predicate` drop out of the result.
  fn overlay(
    &self,
    rows: &mut BTreeMap<String, KeyedFields>,
    predicate: Option<&Predicate>,
  ) {
    for key in &self.deletes {
      rows.remove(&key.key);
    }
    for (key, fields) in &self.upserts {
      if predicate.is_none_or(|p| p.matches(fields)) {
        rows.insert(key.key.clone(), fields.clone());
      } else {
        rows.remove(&key.key);
      }
    }
  }
}

// ─── Contexts ────────────────────────────────────────────────────────────────

/// The queue a context is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextRole {
  /// Private context attached directly to the store.
  Root,
  /// The consumer-facing context.
  Main,
  /// Private context for background writes.
  Background,
}

impl fmt::Display for ContextRole {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Root => "root",
      Self::Main => "main",
      Self::Background => "background",
    })
  }
}

enum Parent {
  Context(Arc<ManagedContext>),
  Store(SqliteStore),
}

pub struct ManagedContext {
  role:    ContextRole,
  parent:  Parent,
  pending: Mutex<ChangeSet>,
}

impl ManagedContext {
  /// A context that saves straight into `store`.
  pub fn attached(role: ContextRole, store: SqliteStore) -> Arc<Self> {
    Arc::new(Self { role, parent: Parent::Store(store), pending: Mutex::default() })
  }

  /// A context that saves into `parent`.
  pub fn child(role: ContextRole, parent: &Arc<Self>) -> Arc<Self> {
    Arc::new(Self {
      role,
      parent: Parent::Context(parent.clone()),
      pending: Mutex::default(),
    })
  }

  pub fn role(&self) -> ContextRole { self.role }

  pub fn parent(&self) -> Option<&Arc<ManagedContext>> {
    match &self.parent {
      Parent::Context(parent) => Some(parent),
      Parent::Store(_) => None,
    }
  }

  /// The store at the root of the chain.
  pub fn store(&self) -> &SqliteStore {
    match &self.parent {
      Parent::Context(parent) => parent.store(),
      Parent::Store(store) => store,
    }
  }

  pub async fn has_changes(&self) -> bool { !self.pending.lock().await.is_empty() }

  /// Wait for work already queued on this context to finish.
  pub async fn enter(&self) { drop(self.pending.lock().await); }

  /// Stage changes under this context's lock.
  pub async fn perform<R>(&self, block: impl FnOnce(&mut ChangeSet) -> R) -> R {
    block(&mut *self.pending.lock().await)
  }

  /// Discard pending changes.
  pub async fn rollback(&self) { self.pending.lock().await.clear(); }

  /// Rows of `entity` matching `predicate` as seen from this context,
  /// ordered by primary key.
  pub async fn fetch(
    &self,
    entity: EntityDescription,
    predicate: Option<&Predicate>,
  ) -> Result<Vec<KeyedFields>> {
    // Snapshot pending changes leaf first and read the store last, so a save
    // racing with this fetch is seen at least once and never lost.
    let mut layers = Vec::new();
    let mut current: &ManagedContext = self;
    let store = loop {
      layers.push(current.pending.lock().await.for_entity(entity.name));
      match &current.parent {
        Parent::Context(parent) => current = parent.as_ref(),
        Parent::Store(store) => break store,
      }
    };

    let mut rows: BTreeMap<String, KeyedFields> = store
      .fetch(entity, predicate)
      .await?
      .into_iter()
      .filter_map(|fields| {
        let key = fields.text(entity.primary_key)?.to_owned();
        Some((key, fields))
      })
      .collect();

    for layer in layers.iter().rev() {
      layer.overlay(&mut rows, predicate);
    }
    Ok(rows.into_values().collect())
  }

  /// Push pending changes one level up. Returns `false` when there was
  /// nothing to save.
  ///
  /// If the store rejects the changes they stay pending here.
  pub async fn save(&self) -> Result<bool> {
    let mut pending = self.pending.lock().await;
    if pending.is_empty() {
      debug!(context = %self.role, "no changes to save");
      return Ok(false);
    }

    let count = pending.len();
    match &self.parent {
      Parent::Context(parent) => {
        parent.pending.lock().await.absorb(std::mem::take(&mut *pending));
      }
      Parent::Store(store) => {
        store.commit(&pending).await?;
        pending.clear();
      }
    }

    debug!(context = %self.role, count, "saved context");
    Ok(true)
  }
}

impl fmt::Debug for ManagedContext {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ManagedContext")
      .field("role", &self.role)
      .field("parent", &self.parent().map(|p| p.role()))
      .finish_non_exhaustive()
  }
}
