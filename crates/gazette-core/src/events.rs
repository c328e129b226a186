//! Process-wide state and event channels.
//!
//! An [`EventHub`] is constructed once at startup and handed to every
//! consumer explicitly; there is no global instance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Article,
  observable::{Observable, StateObserver},
};

// ─── Migration ───────────────────────────────────────────────────────────────

/// Progress of the one-shot storage migration within this process.
///
/// `NotBegun → Begun → Ended`; `Ended` is reached on failure too and is
/// final for the process lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationState {
  #[default]
  NotBegun,
  Begun,
  Ended,
}

// ─── Auth ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
  pub id:         Uuid,
  pub name:       String,
  pub login_time: DateTime<Utc>,
}

impl User {
  pub fn new(name: impl Into<String>) -> Self {
    Self { id: Uuid::new_v4(), name: name.into(), login_time: Utc::now() }
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AuthState {
  #[default]
  NotAuthorized,
  Authorized { user: User },
}

/// Two authorized states are equal when they refer to the same user id.
impl PartialEq for AuthState {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (Self::NotAuthorized, Self::NotAuthorized) => true,
      (Self::Authorized { user: a }, Self::Authorized { user: b }) => a.id == b.id,
      _ => false,
    }
  }
}

impl Eq for AuthState {}

// ─── Favorites ───────────────────────────────────────────────────────────────

/// Keeps independent article lists in sync without coupling them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FavoriteEvent {
  /// An article was favorited or unfavorited from the main list. The
  /// article carries its new `is_favorite` value.
  Toggled(Article),
  /// An article was removed from the favorites list.
  RemovedFromFavorites(Article),
}

// ─── Hub ─────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct EventHub {
  pub migration: StateObserver<MigrationState>,
  pub auth:      StateObserver<AuthState>,
  pub favorites: Observable<FavoriteEvent>,
}

impl EventHub {
  pub fn new() -> Self { Self::default() }
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use super::*;

  #[test]
  fn auth_equality_is_by_user_id() {
    let user = User::new("ada");
    let mut renamed = user.clone();
    renamed.name = "countess".into();

    assert_eq!(
      AuthState::Authorized { user: user.clone() },
      AuthState::Authorized { user: renamed }
    );
    assert_ne!(
      AuthState::Authorized { user },
      AuthState::Authorized { user: User::new("ada") }
    );
  }

  #[test]
  fn migration_state_sequence_is_observed() {
    let hub = EventHub::new();
    let screen = Arc::new(());
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sink = seen.clone();
    hub.migration.subscribe(&screen, move |state| {
      sink.lock().unwrap().push(*state);
    });

    hub.migration.set(MigrationState::Begun);
    hub.migration.set(MigrationState::Begun);
    hub.migration.set(MigrationState::Ended);

    assert_eq!(
      *seen.lock().unwrap(),
      vec![MigrationState::Begun, MigrationState::Ended]
    );
  }
}
