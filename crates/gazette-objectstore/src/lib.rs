//! Embedded object store for Gazette, built on [`sled`].
//!
//! An [`ObjectStore`] is the shareable file. Every read and write goes
//! through a [`StoreHandle`], which is bound to the thread that opened it and
//! cannot be sent elsewhere. Objects cross threads only as detached
//! snapshots or as [`ThreadSafeReference`] tokens that are resolved again on
//! the receiving side.
//!
//! [`ObjectStoreCoordinator`] owns one handle on a dedicated worker thread
//! and exposes it through the async
//! [`DatabaseCoordinator`](gazette_core::DatabaseCoordinator) contract.

mod coordinator;
mod handle;
mod reference;
mod store;

pub mod error;

pub use coordinator::ObjectStoreCoordinator;
pub use error::{Error, Result};
pub use handle::{Results, StoreHandle, Update};
pub use reference::ThreadSafeReference;
pub use store::{MigrationBlock, ObjectStore, ObjectStoreConfig};
