//! Keyed fields: build or patch an entity without a fully typed literal.
//!
//! A [`KeyedFields`] map is applied to a typed entity through
//! [`Entity::set`](crate::Entity::set), which rejects unknown keys and
//! mismatched value kinds instead of silently ignoring them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Values ──────────────────────────────────────────────────────────────────

/// A single field value. Only the shapes the models need are supported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
  Null,
  Bool(bool),
  Text(String),
}

impl FieldValue {
  pub fn is_null(&self) -> bool { matches!(self, Self::Null) }

  pub fn as_text(&self) -> Option<&str> {
    match self {
      Self::Text(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_bool(&self) -> Option<bool> {
    match self {
      Self::Bool(b) => Some(*b),
      _ => None,
    }
  }

  /// Convert into a required text value for `entity.field`.
  pub fn into_text(self, entity: &str, field: &str) -> Result<String> {
    match self {
      Self::Text(s) => Ok(s),
      Self::Null => Err(Error::invalid_field(entity, field, "value is required")),
      Self::Bool(_) => Err(Error::invalid_field(entity, field, "expected text")),
    }
  }

  /// Convert into an optional text value for `entity.field`.
  pub fn into_optional_text(
    self,
    entity: &str,
    field: &str,
  ) -> Result<Option<String>> {
    match self {
      Self::Text(s) => Ok(Some(s)),
      Self::Null => Ok(None),
      Self::Bool(_) => Err(Error::invalid_field(entity, field, "expected text")),
    }
  }

  /// Convert into a boolean value for `entity.field`.
  pub fn into_bool(self, entity: &str, field: &str) -> Result<bool> {
    match self {
      Self::Bool(b) => Ok(b),
      _ => Err(Error::invalid_field(entity, field, "expected a boolean")),
    }
  }
}

impl From<bool> for FieldValue {
  fn from(b: bool) -> Self { Self::Bool(b) }
}

impl From<String> for FieldValue {
  fn from(s: String) -> Self { Self::Text(s) }
}

impl From<&str> for FieldValue {
  fn from(s: &str) -> Self { Self::Text(s.to_owned()) }
}

impl From<Option<String>> for FieldValue {
  fn from(s: Option<String>) -> Self { s.map_or(Self::Null, Self::Text) }
}

// ─── Field descriptions ──────────────────────────────────────────────────────

/// Storage kind of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
  Text,
  Bool,
}

/// Static description of one entity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
  pub name:     &'static str,
  pub kind:     FieldKind,
  pub optional: bool,
}

impl FieldSpec {
  pub const fn text(name: &'static str) -> Self {
    Self { name, kind: FieldKind::Text, optional: false }
  }

  pub const fn optional_text(name: &'static str) -> Self {
    Self { name, kind: FieldKind::Text, optional: true }
  }

  pub const fn boolean(name: &'static str) -> Self {
    Self { name, kind: FieldKind::Bool, optional: false }
  }
}

// ─── Keyed fields ────────────────────────────────────────────────────────────

/// A field-name → value mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyedFields(BTreeMap<String, FieldValue>);

impl KeyedFields {
  pub fn new() -> Self { Self::default() }

  /// Builder-style insert.
  pub fn with(
    mut self,
    name: impl Into<String>,
    value: impl Into<FieldValue>,
  ) -> Self {
    self.insert(name, value);
    self
  }

  pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
    self.0.insert(name.into(), value.into());
  }

  pub fn get(&self, name: &str) -> Option<&FieldValue> { self.0.get(name) }

  pub fn text(&self, name: &str) -> Option<&str> {
    self.get(name).and_then(FieldValue::as_text)
  }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
    self.0.iter().map(|(k, v)| (k.as_str(), v))
  }
}

impl FromIterator<(String, FieldValue)> for KeyedFields {
  fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
    Self(iter.into_iter().collect())
  }
}

impl IntoIterator for KeyedFields {
  type Item = (String, FieldValue);
  type IntoIter = std::collections::btree_map::IntoIter<String, FieldValue>;

  fn into_iter(self) -> Self::IntoIter { self.0.into_iter() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn untagged_serde_keeps_value_kinds() {
    let fields = KeyedFields::new()
      .with("url", "https://a.example")
      .with("isFavorite", true)
      .with("author", None::<String>);

    let json = serde_json::to_string(&fields).unwrap();
    assert_eq!(
      json,
      r#"{"author":null,"isFavorite":true,"url":"https://a.example"}"#
    );

    let back: KeyedFields = serde_json::from_str(&json).unwrap();
    assert_eq!(back, fields);
  }

  #[test]
  fn required_text_rejects_null() {
    let err = FieldValue::Null.into_text("Article", "title").unwrap_err();
    assert!(matches!(err, Error::InvalidField { .. }));
  }

  #[test]
  fn bool_rejects_text() {
    assert!(FieldValue::from("yes").into_bool("Article", "isFavorite").is_err());
    assert!(FieldValue::from(false).into_bool("Article", "isFavorite").is_ok());
  }
}
