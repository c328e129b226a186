//! Conversions between field values and SQLite values, and compilation of
//! predicates into `WHERE` clauses.
//!
//! Text fields are stored as `TEXT`, booleans as `INTEGER` 0/1. Identifiers
//! are always double-quoted; values are always bound as parameters.

use gazette_core::{FieldKind, FieldSpec, FieldValue, KeyedFields, Predicate};
use rusqlite::types::{Type, Value, ValueRef};

use crate::{Result, schema::EntityDescription};

pub fn quote(identifier: &str) -> String {
  format!("\"{}\"", identifier.replace('"', "\"\""))
}

// ─── Values ──────────────────────────────────────────────────────────────────

pub fn encode_value(value: &FieldValue) -> Value {
  match value {
    FieldValue::Null => Value::Null,
    FieldValue::Bool(b) => Value::Integer(i64::from(*b)),
    FieldValue::Text(s) => Value::Text(s.clone()),
  }
}

pub fn decode_value(
  spec: &FieldSpec,
  index: usize,
  raw: ValueRef<'_>,
) -> rusqlite::Result<FieldValue> {
  let mismatch = |found: Type| {
    rusqlite::Error::InvalidColumnType(index, spec.name.to_owned(), found)
  };

  match (spec.kind, raw) {
    (_, ValueRef::Null) => Ok(FieldValue::Null),
    (FieldKind::Bool, ValueRef::Integer(i)) => Ok(FieldValue::Bool(i != 0)),
    (FieldKind::Text, ValueRef::Text(bytes)) => std::str::from_utf8(bytes)
      .map(|s| FieldValue::Text(s.to_owned()))
      .map_err(rusqlite::Error::Utf8Error),
    (_, other) => Err(mismatch(other.data_type())),
  }
}

/// Read one row laid out as [`EntityDescription::columns`].
pub fn read_row(
  entity: &EntityDescription,
  row: &rusqlite::Row<'_>,
) -> rusqlite::Result<KeyedFields> {
  let mut fields = KeyedFields::new();
  for (index, spec) in entity.attributes.iter().enumerate() {
    fields.insert(spec.name, decode_value(spec, index, row.get_ref(index)?)?);
  }
  Ok(fields)
}

// ─── Predicates ──────────────────────────────────────────────────────────────

/// A SQL fragment with its positional parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clause {
  pub sql:    String,
  pub params: Vec<Value>,
}

/// Compile `predicate` into a `WHERE` condition for `entity`.
pub fn where_clause(entity: &EntityDescription, predicate: &Predicate) -> Result<Clause> {
  let mut params = Vec::new();
  let sql = condition(entity, predicate, &mut params)?;
  Ok(Clause { sql, params })
}

fn condition(
  entity: &EntityDescription,
  predicate: &Predicate,
  params: &mut Vec<Value>,
) -> Result<String> {
  Ok(match predicate {
    Predicate::Eq { field, value } => {
      if entity.attribute(field).is_none() {
        return Err(
          gazette_core::Error::invalid_field(entity.name, field, "unknown field in predicate")
            .into(),
        );
      }
      if value.is_null() {
        format!("{} IS NULL", quote(field))
      } else {
        params.push(encode_value(value));
        format!("{} = ?{}", quote(field), params.len())
      }
    }
    Predicate::And(all) => join(entity, all, " AND ", "1", params)?,
    Predicate::Or(any) => join(entity, any, " OR ", "0", params)?,
    Predicate::Not(inner) => format!("NOT ({})", condition(entity, inner, params)?),
  })
}

fn join(
  entity: &EntityDescription,
  predicates: &[Predicate],
  separator: &str,
  empty: &str,
  params: &mut Vec<Value>,
) -> Result<String> {
  if predicates.is_empty() {
    return Ok(empty.to_owned());
  }
  let parts = predicates
    .iter()
    .map(|p| condition(entity, p, params).map(|sql| format!("({sql})")))
    .collect::<Result<Vec<_>>>()?;
  Ok(parts.join(separator))
}

#[cfg(test)]
mod tests {
  use gazette_core::models::ArticleEntity;

  use super::*;

  #[test]
  fn quote_escapes_embedded_quotes() {
    assert_eq!(quote("url"), "\"url\"");
    assert_eq!(quote("we\"ird"), "\"we\"\"ird\"");
  }

  #[test]
  fn compiles_nested_predicates() {
    let entity = EntityDescription::of::<ArticleEntity>();
    let predicate = Predicate::key::<ArticleEntity>("a")
      .and(Predicate::eq("is_favorite", true).or(Predicate::eq("author", FieldValue::Null)))
      .and(Predicate::eq("title", "x").negate());

    let clause = where_clause(&entity, &predicate).unwrap();
    assert_eq!(
      clause.sql,
      "(\"url\" = ?1) AND ((\"is_favorite\" = ?2) OR (\"author\" IS NULL)) AND (NOT (\"title\" = ?3))"
    );
    assert_eq!(clause.params, vec![
      Value::Text("a".into()),
      Value::Integer(1),
      Value::Text("x".into()),
    ]);
  }

  #[test]
  fn unknown_field_is_rejected() {
    let entity = EntityDescription::of::<ArticleEntity>();
    assert!(where_clause(&entity, &Predicate::eq("imageURL", "x")).is_err());
  }
}
