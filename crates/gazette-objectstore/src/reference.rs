use std::{fmt, marker::PhantomData};

use gazette_core::Entity;

/// A token for an object that can be sent to another thread and resolved
/// there with [`StoreHandle::resolve`](crate::StoreHandle::resolve).
///
/// It carries only the entity type and primary key, never object state.
pub struct ThreadSafeReference<E> {
  key:     String,
  _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> ThreadSafeReference<E> {
  pub(crate) fn new(key: &str) -> Self {
    Self { key: key.to_owned(), _entity: PhantomData }
  }

  pub fn key(&self) -> &str { &self.key }
}

impl<E> Clone for ThreadSafeReference<E> {
  fn clone(&self) -> Self {
    Self { key: self.key.clone(), _entity: PhantomData }
  }
}

impl<E: Entity> fmt::Debug for ThreadSafeReference<E> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ThreadSafeReference")
      .field("entity", &E::NAME)
      .field("key", &self.key)
      .finish()
  }
}
