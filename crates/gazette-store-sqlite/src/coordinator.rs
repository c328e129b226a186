//! [`ManagedCoordinator`] — the [`DatabaseCoordinator`] over a context chain.
//!
//! Mutations are staged in the write context and reach the file when
//! [`DatabaseCoordinator::save_context`] folds the chain from the write
//! context down to the store. Fetches run in the read context.

use std::{collections::BTreeMap, path::Path, sync::Arc};

use gazette_core::{
  DatabaseCoordinator, Entity, KeyedFields, Predicate, Result as CoreResult,
};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
  ContextRole, EntityDescription, ManagedContext, ManagedModel, ObjectKey, Result,
  SqliteStore, StoreOptions,
};

/// Shape of the context chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
  /// One main context attached to the store.
  #[default]
  Single,
  /// Background → main → root → store.
  Cascading,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorOptions {
  pub topology:         Topology,
  /// Save the whole chain after every mutation.
  pub save_after_write: bool,
  pub store:            StoreOptions,
}

pub struct ManagedCoordinator {
  store:   SqliteStore,
  write:   Arc<ManagedContext>,
  read:    Arc<ManagedContext>,
  options: CoordinatorOptions,
  /// Serialises mutations and saves.
  writer:  Mutex<()>,
}

impl ManagedCoordinator {
  /// Open `<dir>/<ModelName>.sqlite`.
  pub async fn open(
    dir: impl AsRef<Path>,
    model: ManagedModel,
    options: CoordinatorOptions,
  ) -> Result<Self> {
    let store = SqliteStore::open_in(dir, model, options.store).await?;
    Ok(Self::new(store, options))
  }

  pub async fn open_in_memory(model: ManagedModel, options: CoordinatorOptions) -> Result<Self> {
    let store = SqliteStore::open_in_memory(model, options.store).await?;
    Ok(Self::new(store, options))
  }

  pub fn new(store: SqliteStore, options: CoordinatorOptions) -> Self {
    let (write, read) = match options.topology {
      Topology::Single => {
        let main = ManagedContext::attached(ContextRole::Main, store.clone());
        (main.clone(), main)
      }
      Topology::Cascading => {
        let root = ManagedContext::attached(ContextRole::Root, store.clone());
        let main = ManagedContext::child(ContextRole::Main, &root);
        (ManagedContext::child(ContextRole::Background, &main), main)
      }
    };
    Self { store, write, read, options, writer: Mutex::new(()) }
  }

  pub fn store(&self) -> &SqliteStore { &self.store }

  pub fn write_context(&self) -> &Arc<ManagedContext> { &self.write }

  pub fn read_context(&self) -> &Arc<ManagedContext> { &self.read }

  pub fn options(&self) -> CoordinatorOptions { self.options }

  /// Whether any context in the chain holds unsaved changes.
  pub async fn has_changes(&self) -> bool {
    let mut current = Some(&self.write);
    while let Some(context) = current {
      if context.has_changes().await {
        return true;
      }
      current = context.parent();
    }
    false
  }

  fn entity<E: Entity>(&self) -> CoreResult<EntityDescription> {
    self
      .store
      .model()
      .entity(E::NAME)
      .copied()
      .ok_or_else(|| gazette_core::Error::WrongModel(E::NAME.to_owned()))
  }

  async fn fetch_in<E: Entity>(
    context: &ManagedContext,
    entity: EntityDescription,
    predicate: Option<&Predicate>,
  ) -> Result<Vec<E>> {
    let rows = context.fetch(entity, predicate).await?;
    Ok(
      rows
        .iter()
        .map(E::from_fields)
        .collect::<gazette_core::Result<Vec<E>>>()?,
    )
  }

  /// Save every context from the write context down to the store.
  async fn save_chain(&self) -> CoreResult<()> {
    let mut current = Some(&self.write);
    while let Some(context) = current {
      let saved = context.save().await;
      self.deliver(context, "save", saved).await?;
      current = context.parent();
    }
    Ok(())
  }

  async fn after_write(&self) -> CoreResult<()> {
    if self.options.save_after_write {
      self.save_chain().await
    } else {
      Ok(())
    }
  }

  /// Hand `result` back to the caller. Failures on the background context
  /// are delivered through the main context.
  async fn deliver<T>(
    &self,
    context: &ManagedContext,
    operation: &str,
    result: Result<T>,
  ) -> CoreResult<T> {
    match result {
      Ok(value) => Ok(value),
      Err(error) => {
        if context.role() == ContextRole::Background {
          self.read.enter().await;
        }
        let role = context.role();
        warn!(context = %role, operation, %error, "relational store operation failed");
        Err(error.into_core(format!("{role} context")))
      }
    }
  }
}

// ─── DatabaseCoordinator impl ────────────────────────────────────────────────

impl DatabaseCoordinator for ManagedCoordinator {
  async fn create<E: Entity>(&self, records: Vec<KeyedFields>) -> CoreResult<Vec<E>> {
    let entity = self.entity::<E>()?;
    let _writer = self.writer.lock().await;

    let mut batch: BTreeMap<String, E> = BTreeMap::new();
    let mut order = Vec::with_capacity(records.len());
    for fields in &records {
      let key = fields.text(E::PRIMARY_KEY).ok_or_else(|| {
        gazette_core::Error::invalid_field(E::NAME, E::PRIMARY_KEY, "primary key is required")
      })?;

      let object = match batch.remove(key) {
        Some(mut pending) => {
          pending.apply(fields)?;
          pending
        }
        None => {
          let existing = Self::fetch_in::<E>(
            &self.write,
            entity,
            Some(&Predicate::key::<E>(key)),
          )
          .await;
          match self.deliver(&self.write, "create", existing).await?.pop() {
            Some(mut current) => {
              current.apply(fields)?;
              current
            }
            None => E::from_fields(fields)?,
          }
        }
      };
      if !order.iter().any(|seen: &String| seen == object.primary_key()) {
        order.push(object.primary_key().to_owned());
      }
      batch.insert(object.primary_key().to_owned(), object);
    }

    self
      .write
      .perform(|changes| {
        for (key, object) in &batch {
          changes.upsert(ObjectKey::new(E::NAME, key.clone()), object.to_fields());
        }
      })
      .await;
    debug!(entity = E::NAME, count = batch.len(), "staged create");

    self.after_write().await?;
    Ok(order.iter().filter_map(|key| batch.get(key).cloned()).collect())
  }

  async fn update<E: Entity>(
    &self,
    predicate: Predicate,
    fields: KeyedFields,
  ) -> CoreResult<Vec<E>> {
    let entity = self.entity::<E>()?;
    predicate.validate::<E>()?;
    let _writer = self.writer.lock().await;

    let matching = Self::fetch_in::<E>(&self.write, entity, Some(&predicate)).await;
    let mut updated = self.deliver(&self.write, "update", matching).await?;
    for object in &mut updated {
      object.apply_update(&fields)?;
    }

    self
      .write
      .perform(|changes| {
        for object in &updated {
          changes.upsert(ObjectKey::new(E::NAME, object.primary_key()), object.to_fields());
        }
      })
      .await;
    debug!(entity = E::NAME, count = updated.len(), "staged update");

    self.after_write().await?;
    Ok(updated)
  }

  async fn delete<E: Entity>(&self, predicate: Option<Predicate>) -> CoreResult<Vec<E>> {
    let entity = self.entity::<E>()?;
    if let Some(p) = &predicate {
      p.validate::<E>()?;
    }
    let _writer = self.writer.lock().await;

    let doomed = Self::fetch_in::<E>(&self.write, entity, predicate.as_ref()).await;
    let doomed = self.deliver(&self.write, "delete", doomed).await?;

    self
      .write
      .perform(|changes| {
        for object in &doomed {
          changes.delete(ObjectKey::new(E::NAME, object.primary_key()));
        }
      })
      .await;
    debug!(entity = E::NAME, count = doomed.len(), "staged delete");

    self.after_write().await?;
    Ok(doomed)
  }

  async fn fetch<E: Entity>(&self, predicate: Option<Predicate>) -> CoreResult<Vec<E>> {
    let entity = self.entity::<E>()?;
    if let Some(p) = &predicate {
      p.validate::<E>()?;
    }
    let fetched = Self::fetch_in::<E>(&self.read, entity, predicate.as_ref()).await;
    self.deliver(&self.read, "fetch", fetched).await
  }

  async fn save_context(&self) -> CoreResult<()> {
    let _writer = self.writer.lock().await;
    self.save_chain().await
  }
}
