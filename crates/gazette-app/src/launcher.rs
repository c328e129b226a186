//! Runs the storage migration once at launch.
//!
//! The persisted flag [`MIGRATED_FLAG`] short-circuits the whole thing after
//! the first success. Otherwise the migration state goes `Begun` → `Ended`
//! around the pipeline, and the flag is set only when the pipeline succeeds,
//! so a failed run is retried on the next launch.

use std::sync::Arc;

use gazette_core::{DatabaseCoordinator, MigrationError, events::{EventHub, MigrationState}};
use tracing::{error, info};

use crate::{Defaults, MigrationReport, MigrationService};

pub const MIGRATED_FLAG: &str = "isMigratedStorageModels";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupOutcome {
  /// Migration already ran (or is running) in this process.
  Skipped,
  /// The flag says a previous launch migrated everything.
  AlreadyMigrated,
  Migrated(MigrationReport),
  Failed(MigrationError),
}

pub struct StartupMigration<A, B> {
  service:  Arc<MigrationService<A, B>>,
  defaults: Arc<Defaults>,
  events:   Arc<EventHub>,
}

impl<A, B> StartupMigration<A, B>
where
  A: DatabaseCoordinator + 'static,
  B: DatabaseCoordinator + 'static,
{
  pub fn new(
    service: Arc<MigrationService<A, B>>,
    defaults: Arc<Defaults>,
    events: Arc<EventHub>,
  ) -> Self {
    Self { service, defaults, events }
  }

  pub async fn run(&self) -> StartupOutcome {
    if self.events.migration.get() != MigrationState::NotBegun {
      return StartupOutcome::Skipped;
    }

    if self.defaults.bool(MIGRATED_FLAG) {
      info!("storage models already migrated");
      return StartupOutcome::AlreadyMigrated;
    }

    // Sequencers sharing an event hub race here; only one leaves `NotBegun`.
    if !self.events.migration.set_if(&MigrationState::NotBegun, MigrationState::Begun) {
      return StartupOutcome::Skipped;
    }

    let outcome = match self.service.migrate_storage_models().await {
      Ok(report) => match self.defaults.set_bool(MIGRATED_FLAG, true) {
        Ok(()) => StartupOutcome::Migrated(report),
        Err(e) => {
          error!(error = %e, "failed to persist migration flag");
          StartupOutcome::Failed(MigrationError::Failed(e.to_string()))
        }
      },
      Err(e) => StartupOutcome::Failed(e),
    };

    self.events.migration.set(MigrationState::Ended);
    outcome
  }
}
