//! Declarative filters over entity fields.
//!
//! Engines either evaluate a [`Predicate`] in memory ([`Predicate::matches`])
//! or compile it to their native query language. Equality on the primary key
//! is by far the most common shape.

use crate::{Entity, Error, FieldValue, KeyedFields, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
  Eq { field: String, value: FieldValue },
  And(Vec<Predicate>),
  Or(Vec<Predicate>),
  Not(Box<Predicate>),
}

impl Predicate {
  pub fn eq(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
    Self::Eq { field: field.into(), value: value.into() }
  }

  /// Equality on `E`'s primary key.
  pub fn key<E: Entity>(key: impl Into<String>) -> Self {
    Self::eq(E::PRIMARY_KEY, key.into())
  }

  pub fn and(self, other: Predicate) -> Self {
    match self {
      Self::And(mut all) => {
        all.push(other);
        Self::And(all)
      }
      first => Self::And(vec![first, other]),
    }
  }

  pub fn or(self, other: Predicate) -> Self {
    match self {
      Self::Or(mut any) => {
        any.push(other);
        Self::Or(any)
      }
      first => Self::Or(vec![first, other]),
    }
  }

  pub fn negate(self) -> Self { Self::Not(Box::new(self)) }

  /// Evaluate against a field map. Absent fields compare as `Null`.
  pub fn matches(&self, fields: &KeyedFields) -> bool {
    match self {
      Self::Eq { field, value } => {
        fields.get(field).unwrap_or(&FieldValue::Null) == value
      }
      Self::And(all) => all.iter().all(|p| p.matches(fields)),
      Self::Or(any) => any.iter().any(|p| p.matches(fields)),
      Self::Not(inner) => !inner.matches(fields),
    }
  }

  pub fn matches_entity<E: Entity>(&self, entity: &E) -> bool {
    self.matches(&entity.to_fields())
  }

  /// Reject predicates that name fields `E` does not have.
  pub fn validate<E: Entity>(&self) -> Result<()> {
    match self {
      Self::Eq { field, .. } => match E::field_spec(field) {
        Some(_) => Ok(()),
        None => Err(Error::invalid_field(E::NAME, field, "unknown field in predicate")),
      },
      Self::And(list) | Self::Or(list) => {
        list.iter().try_for_each(|p| p.validate::<E>())
      }
      Self::Not(inner) => inner.validate::<E>(),
    }
  }
}
