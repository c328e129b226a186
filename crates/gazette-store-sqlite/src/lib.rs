//! SQLite backend for Gazette — the managed relational store.
//!
//! A [`ManagedModel`] describes the entities; [`SqliteStore`] binds it to one
//! file named after the model and migrates additive changes on open. Changes
//! are staged in a chain of [`ManagedContext`]s and reach the file only when
//! the chain is saved down to the store. [`ManagedCoordinator`] exposes the
//! whole thing through [`DatabaseCoordinator`](gazette_core::DatabaseCoordinator).
//!
//! All database access runs on the [`tokio_rusqlite`] connection thread
//! without blocking the async runtime.

mod context;
mod coordinator;
mod encode;
mod schema;
mod store;

pub mod error;

pub use context::{ChangeSet, ContextRole, ManagedContext, ObjectKey};
pub use coordinator::{CoordinatorOptions, ManagedCoordinator, Topology};
pub use error::{Error, Result};
pub use schema::{EntityDescription, ManagedModel, StoreOptions};
pub use store::SqliteStore;
