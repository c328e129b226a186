//! The [`Entity`] trait — a typed record that both engines can store.
//!
//! Entities describe their fields statically so that each engine can derive
//! its native layout (object-store documents, relational columns) without
//! reflection. Dynamic assignment goes through [`Entity::set`].

use crate::{Error, FieldSpec, FieldValue, KeyedFields, Result};

pub trait Entity: Clone + Send + Sync + 'static {
  /// Type name; must be registered in an engine's model to be stored there.
  const NAME: &'static str;
  /// Name of the primary-key field. Always a required text field.
  const PRIMARY_KEY: &'static str;
  /// Every stored field, primary key included.
  const FIELDS: &'static [FieldSpec];

  /// A blank instance that [`Entity::from_fields`] fills in.
  fn empty() -> Self;

  fn primary_key(&self) -> &str;

  /// Read a field by name. `None` means the entity has no such field.
  fn get(&self, field: &str) -> Option<FieldValue>;

  /// Assign a field by name. Unknown names and mismatched kinds are errors.
  fn set(&mut self, field: &str, value: FieldValue) -> Result<()>;

  fn apply(&mut self, fields: &KeyedFields) -> Result<()> {
    for (name, value) in fields.iter() {
      self.set(name, value.clone())?;
    }
    Ok(())
  }

  /// [`Entity::apply`] for an already stored entity: the primary key may be
  /// restated but not changed.
  fn apply_update(&mut self, fields: &KeyedFields) -> Result<()> {
    let rekeyed = fields
      .get(Self::PRIMARY_KEY)
      .is_some_and(|value| value.as_text() != Some(self.primary_key()));
    if rekeyed {
      return Err(Error::invalid_field(
        Self::NAME,
        Self::PRIMARY_KEY,
        "primary key cannot be changed by an update",
      ));
    }
    self.apply(fields)
  }

  fn from_fields(fields: &KeyedFields) -> Result<Self> {
    let mut entity = Self::empty();
    entity.apply(fields)?;
    if entity.primary_key().is_empty() {
      return Err(Error::invalid_field(
        Self::NAME,
        Self::PRIMARY_KEY,
        "primary key must not be empty",
      ));
    }
    Ok(entity)
  }

  fn to_fields(&self) -> KeyedFields {
    Self::FIELDS
      .iter()
      .filter_map(|spec| self.get(spec.name).map(|v| (spec.name.to_owned(), v)))
      .collect()
  }

  fn field_spec(name: &str) -> Option<&'static FieldSpec> {
    Self::FIELDS.iter().find(|spec| spec.name == name)
  }
}

/// Error for an unknown field name on `E`.
pub fn unknown_field<E: Entity>(field: &str) -> Error {
  Error::invalid_field(E::NAME, field, "no such field")
}
