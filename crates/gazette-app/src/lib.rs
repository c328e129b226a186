//! Application services for Gazette.
//!
//! Everything here is written against
//! [`DatabaseCoordinator`](gazette_core::DatabaseCoordinator); the concrete
//! engines are only chosen in [`Persistence`], which builds them once at
//! startup and hands them out explicitly.

pub mod config;
pub mod container;
pub mod defaults;
pub mod error;
pub mod favorites;
pub mod launcher;
pub mod migration;

pub use config::AppConfig;
pub use container::Persistence;
pub use defaults::Defaults;
pub use error::{AppError, Result};
pub use favorites::FavoritesService;
pub use launcher::{MIGRATED_FLAG, StartupMigration, StartupOutcome};
pub use migration::{MigrationReport, MigrationService};

#[cfg(test)]
mod tests;
