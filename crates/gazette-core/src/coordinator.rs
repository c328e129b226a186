//! The `DatabaseCoordinator` trait: one CRUD surface over both engines.
//!
//! The trait is implemented by both storage engines
//! (`gazette-objectstore`, `gazette-store-sqlite`). Higher layers (the
//! migration pipeline, the favorites service, the CLI) depend on this
//! abstraction, not on any concrete engine.

use std::future::Future;

use crate::{Entity, KeyedFields, Predicate, Result};

/// Abstraction over a storage engine.
///
/// Every operation is asynchronous and never blocks the caller; engine
/// failures come back through the returned `Result`. Absence is an empty
/// list, not an error. Implementations serialise access to their underlying
/// engine internally, so one coordinator may be shared by many callers.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait DatabaseCoordinator: Send + Sync {
  /// Create one entity per keyed-field map. Existing primary keys are
  /// updated in place.
  fn create<E: Entity>(
    &self,
    records: Vec<KeyedFields>,
  ) -> impl Future<Output = Result<Vec<E>>> + Send + '_;

  /// Apply `fields` to every entity matching `predicate` and return the
  /// updated entities.
  fn update<E: Entity>(
    &self,
    predicate: Predicate,
    fields: KeyedFields,
  ) -> impl Future<Output = Result<Vec<E>>> + Send + '_;

  /// Delete entities matching `predicate`, or all entities of the type when
  /// `predicate` is `None`. Returns snapshots of what was deleted.
  fn delete<E: Entity>(
    &self,
    predicate: Option<Predicate>,
  ) -> impl Future<Output = Result<Vec<E>>> + Send + '_;

  /// Fetch entities matching `predicate`, or all of them.
  fn fetch<E: Entity>(
    &self,
    predicate: Option<Predicate>,
  ) -> impl Future<Output = Result<Vec<E>>> + Send + '_;

  fn fetch_all<E: Entity>(&self) -> impl Future<Output = Result<Vec<E>>> + Send + '_ {
    self.fetch::<E>(None)
  }

  /// Commit pending changes. Succeeds without doing anything when nothing is
  /// pending.
  fn save_context(&self) -> impl Future<Output = Result<()>> + Send + '_;
}
