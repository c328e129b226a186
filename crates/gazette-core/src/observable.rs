//! Single-value broadcast channels.
//!
//! [`Observable`] delivers every notified value to its subscribers.
//! [`StateObserver`] holds a current value and only notifies on change.
//!
//! Subscribers are keyed by the identity of an owning `Arc`, not by value:
//! subscribing the same owner twice keeps the first handler. The registry
//! holds the owner weakly and drops its entry once the owner is gone, so
//! forgetting to unsubscribe never leaks a handler past its owner.

use std::{
  any::Any,
  collections::HashMap,
  sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Identity of a subscriber: the address of its owning allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(usize);

impl ObserverId {
  pub fn of<O: ?Sized>(owner: &Arc<O>) -> Self {
    Self(Arc::as_ptr(owner) as *const () as usize)
  }
}

struct Observer<T> {
  owner:   Weak<dyn Any + Send + Sync>,
  handler: Handler<T>,
}

pub struct Observable<T> {
  observers: Mutex<HashMap<ObserverId, Observer<T>>>,
}

impl<T> Default for Observable<T> {
  fn default() -> Self { Self { observers: Mutex::new(HashMap::new()) } }
}

impl<T> Observable<T> {
  pub fn new() -> Self { Self::default() }

  fn observers(&self) -> MutexGuard<'_, HashMap<ObserverId, Observer<T>>> {
    self.observers.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Register `handler` for `owner`. Returns `false` if `owner` is already
  /// subscribed, in which case the existing handler is kept.
  pub fn subscribe<O>(
    &self,
    owner: &Arc<O>,
    handler: impl Fn(&T) + Send + Sync + 'static,
  ) -> bool
  where
    O: Any + Send + Sync,
  {
    let id = ObserverId::of(owner);
    let mut observers = self.observers();

    // A dead entry at the same address belongs to a previous allocation.
    if observers
      .get(&id)
      .is_some_and(|existing| existing.owner.strong_count() > 0)
    {
      return false;
    }

    let owner: Weak<O> = Arc::downgrade(owner);
    let owner: Weak<dyn Any + Send + Sync> = owner;
    observers.insert(id, Observer { owner, handler: Arc::new(handler) });
    true
  }

  pub fn unsubscribe<O: ?Sized>(&self, owner: &Arc<O>) {
    self.observers().remove(&ObserverId::of(owner));
  }

  /// Deliver `value` to every live subscriber.
  ///
  /// Handlers run on a snapshot taken under the lock, with the lock
  /// released, so a handler may subscribe or unsubscribe freely. Owners are
  /// kept alive until every handler has run.
  pub fn notify(&self, value: &T) {
    let snapshot: Vec<(Arc<dyn Any + Send + Sync>, Handler<T>)> = {
      let mut observers = self.observers();
      observers.retain(|_, observer| observer.owner.strong_count() > 0);
      observers
        .values()
        .filter_map(|o| o.owner.upgrade().map(|owner| (owner, o.handler.clone())))
        .collect()
    };

    for (_owner, handler) in &snapshot {
      handler(value);
    }
  }

  /// Number of subscribers whose owner is still alive.
  pub fn subscriber_count(&self) -> usize {
    self
      .observers()
      .values()
      .filter(|o| o.owner.strong_count() > 0)
      .count()
  }
}

// ─── State ───────────────────────────────────────────────────────────────────

/// A current value plus an [`Observable`] that fires only when it changes.
///
/// Changes are delivered one at a time, in the order they were made, so the
/// last notification a subscriber sees is always the current value. A
/// handler must not change the same observer it is subscribed to.
pub struct StateObserver<T> {
  state:      Mutex<T>,
  /// Held from the change until its notification is delivered.
  delivery:   Mutex<()>,
  observable: Observable<T>,
}

impl<T: Default> Default for StateObserver<T> {
  fn default() -> Self { Self::new(T::default()) }
}

impl<T> StateObserver<T> {
  pub fn new(initial: T) -> Self {
    Self {
      state:      Mutex::new(initial),
      delivery:   Mutex::new(()),
      observable: Observable::new(),
    }
  }

  pub fn subscribe<O>(
    &self,
    owner: &Arc<O>,
    handler: impl Fn(&T) + Send + Sync + 'static,
  ) -> bool
  where
    O: Any + Send + Sync,
  {
    self.observable.subscribe(owner, handler)
  }

  pub fn unsubscribe<O: ?Sized>(&self, owner: &Arc<O>) {
    self.observable.unsubscribe(owner)
  }
}

impl<T: Clone + PartialEq> StateObserver<T> {
  pub fn get(&self) -> T {
    self.state.lock().unwrap_or_else(PoisonError::into_inner).clone()
  }

  /// Replace the current value. Subscribers are notified, and `true`
  /// returned, only if the value actually changed.
  pub fn set(&self, value: T) -> bool { self.transition(|_| true, value) }

  /// Replace the current value only if it equals `expected`. Returns whether
  /// the value was replaced; of several racing callers at most one wins.
  pub fn set_if(&self, expected: &T, value: T) -> bool {
    self.transition(|current| current == expected, value)
  }

  fn transition(&self, accept: impl FnOnce(&T) -> bool, value: T) -> bool {
    let _delivery = self.delivery.lock().unwrap_or_else(PoisonError::into_inner);
    {
      let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
      if !accept(&*state) || *state == value {
        return false;
      }
      *state = value.clone();
    }
    self.observable.notify(&value);
    true
  }
}
