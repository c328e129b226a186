//! Error types for `gazette-core`.
//!
//! [`Error`] is the taxonomy every coordinator reports through its completion
//! path. The migration pipeline collapses it into [`MigrationError`].

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
  /// The entity type is not part of the engine's model.
  #[error("entity `{0}` is not part of this store's model")]
  WrongModel(String),

  /// A keyed-field assignment could not be applied to a typed entity.
  #[error("invalid field `{field}` on {entity}: {reason}")]
  InvalidField {
    entity: String,
    field:  String,
    reason: String,
  },

  /// An engine-specific I/O, transaction or save failure.
  #[error("store failure in {context}: {message}")]
  Store { context: String, message: String },

  #[error("unknown error: {0}")]
  Unknown(String),
}

impl Error {
  pub fn store(context: impl Into<String>, message: impl ToString) -> Self {
    Self::Store {
      context: context.into(),
      message: message.to_string(),
    }
  }

  pub fn invalid_field(
    entity: &str,
    field: &str,
    reason: impl Into<String>,
  ) -> Self {
    Self::InvalidField {
      entity: entity.to_owned(),
      field:  field.to_owned(),
      reason: reason.into(),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The single failure the migration pipeline reports to its caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MigrationError {
  #[error("migration failed: {0}")]
  Failed(String),
}

impl From<Error> for MigrationError {
  fn from(error: Error) -> Self { Self::Failed(error.to_string()) }
}
