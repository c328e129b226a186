//! The managed model and its mapping onto SQLite tables.
//!
//! Each entity becomes one table named after the entity, with one column per
//! field and the primary key as the table's `PRIMARY KEY`. On open the store
//! compares the tables it finds with the model and plans a lightweight
//! migration: missing tables are created and missing columns are added.
//! Anything else is reported as incompatible.

use std::{
  collections::BTreeMap,
  path::{Path, PathBuf},
};

use gazette_core::{Entity, FieldKind, FieldSpec};

use crate::{Error, Result, encode::quote};

pub const PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
";

// ─── Entity descriptions ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDescription {
  pub name:        &'static str,
  pub primary_key: &'static str,
  pub attributes:  &'static [FieldSpec],
}

impl EntityDescription {
  pub fn of<E: Entity>() -> Self {
    Self { name: E::NAME, primary_key: E::PRIMARY_KEY, attributes: E::FIELDS }
  }

  pub fn attribute(&self, name: &str) -> Option<&'static FieldSpec> {
    self.attributes.iter().find(|spec| spec.name == name)
  }

  pub fn table(&self) -> String { quote(self.name) }

  /// Column list in attribute order, quoted.
  pub fn columns(&self) -> String {
    self
      .attributes
      .iter()
      .map(|spec| quote(spec.name))
      .collect::<Vec<_>>()
      .join(", ")
  }

  fn column_definition(&self, spec: &FieldSpec) -> String {
    let column = quote(spec.name);
    if spec.name == self.primary_key {
      return format!("{column} TEXT PRIMARY KEY NOT NULL");
    }
    match (spec.kind, spec.optional) {
      (FieldKind::Text, true) => format!("{column} TEXT"),
      (FieldKind::Text, false) => format!("{column} TEXT NOT NULL DEFAULT ''"),
      (FieldKind::Bool, _) => format!("{column} INTEGER NOT NULL DEFAULT 0"),
    }
  }

  fn create_table(&self) -> String {
    let columns = self
      .attributes
      .iter()
      .map(|spec| format!("  {}", self.column_definition(spec)))
      .collect::<Vec<_>>()
      .join(",\n");
    format!("CREATE TABLE IF NOT EXISTS {} (\n{columns}\n)", self.table())
  }

  fn add_column(&self, spec: &FieldSpec) -> String {
    format!("ALTER TABLE {} ADD COLUMN {}", self.table(), self.column_definition(spec))
  }
}

// ─── Model ───────────────────────────────────────────────────────────────────

/// The schema descriptor for one relational store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedModel {
  pub name:     String,
  pub entities: Vec<EntityDescription>,
}

impl ManagedModel {
  pub fn new(name: impl Into<String>) -> Self {
    Self { name: name.into(), entities: Vec::new() }
  }

  pub fn with_entity<E: Entity>(mut self) -> Self {
    if !self.contains(E::NAME) {
      self.entities.push(EntityDescription::of::<E>());
    }
    self
  }

  pub fn entity(&self, name: &str) -> Option<&EntityDescription> {
    self.entities.iter().find(|e| e.name == name)
  }

  pub fn contains(&self, name: &str) -> bool { self.entity(name).is_some() }

  /// The store file for this model inside `dir`.
  pub fn store_location(&self, dir: &Path) -> PathBuf {
    dir.join(format!("{}.sqlite", self.name))
  }
}

/// Options applied when a store is opened against a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
  pub migrate_automatically: bool,
  pub infer_mapping_model:   bool,
}

impl Default for StoreOptions {
  fn default() -> Self { Self { migrate_automatically: true, infer_mapping_model: true } }
}

impl StoreOptions {
  pub fn lightweight_migration(&self) -> bool {
    self.migrate_automatically && self.infer_mapping_model
  }
}

// ─── Migration planning ──────────────────────────────────────────────────────

/// Columns currently present, by table name. Tables that do not exist are
/// absent from the map.
pub type ExistingTables = BTreeMap<String, Vec<String>>;

/// DDL that brings the store in line with `model`.
///
/// Creating a table is always allowed. Adding columns to an existing table
/// requires lightweight migration; a table that lacks its primary-key column
/// cannot be migrated at all.
pub fn plan_migration(
  model: &ManagedModel,
  existing: &ExistingTables,
  options: StoreOptions,
) -> Result<Vec<String>> {
  let mut statements = Vec::new();

  for entity in &model.entities {
    let Some(columns) = existing.get(entity.name) else {
      statements.push(entity.create_table());
      continue;
    };

    let missing: Vec<&FieldSpec> = entity
      .attributes
      .iter()
      .filter(|spec| !columns.iter().any(|c| c == spec.name))
      .collect();
    if missing.is_empty() {
      continue;
    }

    let names = missing.iter().map(|s| s.name).collect::<Vec<_>>().join(", ");
    if missing.iter().any(|spec| spec.name == entity.primary_key) {
      return Err(Error::IncompatibleModel {
        model:  model.name.clone(),
        reason: format!("table {} has no primary key column", entity.name),
      });
    }
    if !options.lightweight_migration() {
      return Err(Error::IncompatibleModel {
        model:  model.name.clone(),
        reason: format!("{} is missing columns {names}", entity.name),
      });
    }

    statements.extend(missing.into_iter().map(|spec| entity.add_column(spec)));
  }

  Ok(statements)
}
