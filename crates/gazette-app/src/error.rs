//! Error type for `gazette-app`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("object store error: {0}")]
  ObjectStore(#[from] gazette_objectstore::Error),

  #[error("relational store error: {0}")]
  Relational(#[from] gazette_store_sqlite::Error),

  #[error(transparent)]
  Core(#[from] gazette_core::Error),
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
