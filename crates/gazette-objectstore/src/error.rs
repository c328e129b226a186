//! Error type for `gazette-objectstore`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] gazette_core::Error),

  #[error("sled error: {0}")]
  Sled(#[from] sled::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("store schema version {stored} is newer than configured version {configured}")]
  SchemaDowngrade { stored: u64, configured: u64 },

  #[error("corrupt store metadata: {0}")]
  CorruptMetadata(String),

  /// Mutations are only allowed inside [`StoreHandle::write`](crate::StoreHandle::write).
  #[error("attempted to modify the store outside of a write transaction")]
  NotInWriteTransaction,

  #[error("{entity} with primary key {key:?} already exists")]
  AlreadyExists { entity: String, key: String },

  #[error("object store worker has shut down")]
  WorkerGone,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for gazette_core::Error {
  fn from(error: Error) -> Self {
    match error {
      Error::Core(e) => e,
      other => gazette_core::Error::store("object store", other),
    }
  }
}
