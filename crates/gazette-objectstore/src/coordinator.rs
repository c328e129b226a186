//! [`ObjectStoreCoordinator`] — the async [`DatabaseCoordinator`] over an
//! [`ObjectStore`].
//!
//! The coordinator owns a single [`StoreHandle`] living on a dedicated
//! worker thread. Every operation is shipped to that thread as a closure and
//! its result comes back over a oneshot channel, so operations are executed
//! one at a time and the caller's thread never blocks.

use std::{sync::mpsc, thread};

use gazette_core::{
  DatabaseCoordinator, Entity, KeyedFields, Predicate, Result as CoreResult,
};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::{
  Error, ObjectStore, ObjectStoreConfig, Result, StoreHandle, ThreadSafeReference,
  Update,
};

type Job = Box<dyn FnOnce(&StoreHandle) + Send>;

/// Cloning is cheap; all clones feed the same worker. The worker exits once
/// every clone has been dropped.
#[derive(Clone)]
pub struct ObjectStoreCoordinator {
  store: ObjectStore,
  jobs:  mpsc::Sender<Job>,
}

impl ObjectStoreCoordinator {
  pub fn open(config: ObjectStoreConfig) -> Result<Self> {
    Self::new(ObjectStore::open(config)?)
  }

  pub fn new(store: ObjectStore) -> Result<Self> {
    let (jobs, queue) = mpsc::channel::<Job>();
    let worker_store = store.clone();

    thread::Builder::new()
      .name("objectstore-worker".into())
      .spawn(move || {
        let handle = worker_store.handle();
        while let Ok(job) = queue.recv() {
          job(&handle);
        }
        debug!("object store worker stopped");
      })?;

    Ok(Self { store, jobs })
  }

  pub fn store(&self) -> &ObjectStore { &self.store }

  /// Run `function` against the worker's handle and await its result.
  pub async fn call<F, R>(&self, function: F) -> Result<R>
  where
    F: FnOnce(&StoreHandle) -> Result<R> + Send + 'static,
    R: Send + 'static,
  {
    let (sender, receiver) = oneshot::channel();
    self
      .jobs
      .send(Box::new(move |handle| {
        let _ = sender.send(function(handle));
      }))
      .map_err(|_| Error::WorkerGone)?;

    receiver.await.map_err(|_| Error::WorkerGone)?
  }

  /// A sendable reference to the object with primary key `key`, if present.
  pub async fn reference<E: Entity>(
    &self,
    key: impl Into<String>,
  ) -> CoreResult<Option<ThreadSafeReference<E>>> {
    let key = key.into();
    let found = self
      .call(move |h| Ok(h.object::<E>(&key)?.map(|obj| h.thread_safe_reference(&obj))))
      .await;
    deliver("reference", E::NAME, found)
  }

  /// Resolve `reference` on the worker thread and hand back a snapshot.
  pub async fn resolve<E: Entity>(
    &self,
    reference: ThreadSafeReference<E>,
  ) -> CoreResult<Option<E>> {
    let resolved = self.call(move |h| h.resolve(&reference)).await;
    deliver("resolve", E::NAME, resolved)
  }
}

fn deliver<T>(operation: &str, entity: &str, result: Result<T>) -> CoreResult<T> {
  match result {
    Ok(value) => {
      debug!(operation, entity, "object store operation completed");
      Ok(value)
    }
    Err(error) => {
      warn!(operation, entity, %error, "object store operation failed");
      Err(error.into())
    }
  }
}

// ─── DatabaseCoordinator impl ────────────────────────────────────────────────

impl DatabaseCoordinator for ObjectStoreCoordinator {
  async fn create<E: Entity>(&self, records: Vec<KeyedFields>) -> CoreResult<Vec<E>> {
    let created = self
      .call(move |h| {
        h.write(|h| {
          // One entity per url, at its first position, in its final state.
          let mut created: Vec<E> = Vec::with_capacity(records.len());
          for fields in &records {
            let object = h.create::<E>(fields, Update::All)?;
            match created.iter_mut().find(|c| c.primary_key() == object.primary_key()) {
              Some(slot) => *slot = object,
              None => created.push(object),
            }
          }
          Ok(created)
        })
      })
      .await;
    deliver("create", E::NAME, created)
  }

  async fn update<E: Entity>(
    &self,
    predicate: Predicate,
    fields: KeyedFields,
  ) -> CoreResult<Vec<E>> {
    let updated = self
      .call(move |h| {
        predicate.validate::<E>()?;
        h.write(|h| {
          h.objects::<E>()?
            .filter(&predicate)
            .into_iter()
            .map(|mut object| -> Result<E> {
              object.apply_update(&fields)?;
              h.add(&object, Update::Modified)?;
              Ok(object)
            })
            .collect::<Result<Vec<E>>>()
        })
      })
      .await;
    deliver("update", E::NAME, updated)
  }

  async fn delete<E: Entity>(&self, predicate: Option<Predicate>) -> CoreResult<Vec<E>> {
    let deleted = self
      .call(move |h| {
        if let Some(p) = &predicate {
          p.validate::<E>()?;
        }
        h.write(|h| {
          let mut doomed = h.objects::<E>()?;
          if let Some(p) = &predicate {
            doomed = doomed.filter(p);
          }
          h.delete(doomed.as_slice())?;
          Ok(doomed.into_vec())
        })
      })
      .await;
    deliver("delete", E::NAME, deleted)
  }

  async fn fetch<E: Entity>(&self, predicate: Option<Predicate>) -> CoreResult<Vec<E>> {
    let fetched = self
      .call(move |h| {
        let results = h.objects::<E>()?;
        Ok(match &predicate {
          Some(p) => {
            p.validate::<E>()?;
            results.filter(p).into_vec()
          }
          None => results.into_vec(),
        })
      })
      .await;
    deliver("fetch", E::NAME, fetched)
  }

  /// Writes commit with their transaction, so this only flushes to disk.
  async fn save_context(&self) -> CoreResult<()> {
    let flushed = self.call(|h| h.flush()).await;
    deliver("save_context", "*", flushed)
  }
}
