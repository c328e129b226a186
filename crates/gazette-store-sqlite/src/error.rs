//! Error type for `gazette-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] gazette_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  /// The stored schema differs from the model and automatic lightweight
  /// migration is disabled or cannot express the change.
  #[error("store is incompatible with model `{model}`: {reason}")]
  IncompatibleModel { model: String, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  /// Convert into the coordinator taxonomy, naming `context` as the place the
  /// failure happened.
  pub fn into_core(self, context: impl Into<String>) -> gazette_core::Error {
    match self {
      Self::Core(inner) => inner,
      other => gazette_core::Error::store(context, other),
    }
  }
}

impl From<Error> for gazette_core::Error {
  fn from(error: Error) -> Self { error.into_core("relational store") }
}
