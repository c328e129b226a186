//! [`SqliteStore`] — the physical store a context chain saves into.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use gazette_core::{KeyedFields, Predicate};
use rusqlite::types::Value;
use tracing::{debug, info};

use crate::{
  ChangeSet, Result,
  encode::{Clause, encode_value, quote, read_row, where_clause},
  schema::{EntityDescription, ExistingTables, ManagedModel, PRAGMAS, StoreOptions, plan_migration},
};

/// One SQLite file bound to a [`ManagedModel`].
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:  tokio_rusqlite::Connection,
  model: Arc<ManagedModel>,
  path:  Option<PathBuf>,
}

impl SqliteStore {
  /// Open (or create) the store at `path` and migrate it to `model`.
  pub async fn open(
    path: impl AsRef<Path>,
    model: ManagedModel,
    options: StoreOptions,
  ) -> Result<Self> {
    let path = path.as_ref().to_path_buf();
    let conn = tokio_rusqlite::Connection::open(&path).await?;
    let store = Self { conn, model: Arc::new(model), path: Some(path) };
    store.init_schema(options).await?;
    Ok(store)
  }

  /// Open `<dir>/<ModelName>.sqlite`.
  pub async fn open_in(
    dir: impl AsRef<Path>,
    model: ManagedModel,
    options: StoreOptions,
  ) -> Result<Self> {
    let path = model.store_location(dir.as_ref());
    Self::open(path, model, options).await
  }

  /// Open an in-memory store.
  pub async fn open_in_memory(model: ManagedModel, options: StoreOptions) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, model: Arc::new(model), path: None };
    store.init_schema(options).await?;
    Ok(store)
  }

  pub fn model(&self) -> &ManagedModel { &self.model }

  pub fn path(&self) -> Option<&Path> { self.path.as_deref() }

  async fn init_schema(&self, options: StoreOptions) -> Result<()> {
    let tables: Vec<String> =
      self.model.entities.iter().map(|e| e.name.to_owned()).collect();

    let existing: ExistingTables = self
      .conn
      .call(move |conn| {
        conn.execute_batch(PRAGMAS)?;
        let mut existing = ExistingTables::new();
        for table in tables {
          let mut stmt =
            conn.prepare(&format!("PRAGMA table_info({})", quote(&table)))?;
          let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          if !columns.is_empty() {
            existing.insert(table, columns);
          }
        }
        Ok(existing)
      })
      .await?;

    let plan = plan_migration(&self.model, &existing, options)?;
    if plan.is_empty() {
      return Ok(());
    }

    let steps = plan.len();
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for statement in &plan {
          tx.execute(statement, [])?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    info!(model = %self.model.name, steps, "relational store schema migrated");
    Ok(())
  }

  pub(crate) fn entity(&self, name: &str) -> Result<EntityDescription> {
    self
      .model
      .entity(name)
      .copied()
      .ok_or_else(|| gazette_core::Error::WrongModel(name.to_owned()).into())
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  /// Committed rows of `entity` matching `predicate`, ordered by primary key.
  pub async fn fetch(
    &self,
    entity: EntityDescription,
    predicate: Option<&Predicate>,
  ) -> Result<Vec<KeyedFields>> {
    let Clause { sql: condition, params } = match predicate {
      Some(p) => where_clause(&entity, p)?,
      None => Clause { sql: "1".to_owned(), params: Vec::new() },
    };
    let sql = format!(
      "SELECT {} FROM {} WHERE {condition} ORDER BY {}",
      entity.columns(),
      entity.table(),
      quote(entity.primary_key),
    );

    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), |row| {
            read_row(&entity, row)
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    debug!(entity = entity.name, count = rows.len(), "fetched rows");
    Ok(rows)
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  /// Write `changes` in a single transaction.
  pub async fn commit(&self, changes: &ChangeSet) -> Result<()> {
    let mut statements: Vec<(String, Vec<Value>)> = Vec::new();

    for (key, fields) in changes.upserts() {
      statements.push(upsert_statement(&self.entity(key.entity)?, fields));
    }
    for key in changes.deletes() {
      let entity = self.entity(key.entity)?;
      statements.push((
        format!("DELETE FROM {} WHERE {} = ?1", entity.table(), quote(entity.primary_key)),
        vec![Value::Text(key.key.clone())],
      ));
    }

    let count = statements.len();
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for (sql, params) in &statements {
          tx.execute(sql, rusqlite::params_from_iter(params.iter()))?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    debug!(model = %self.model.name, statements = count, "committed changes");
    Ok(())
  }
}

/// `INSERT ... ON CONFLICT DO UPDATE` over the columns present in `fields`.
fn upsert_statement(entity: &EntityDescription, fields: &KeyedFields) -> (String, Vec<Value>) {
  let known: Vec<(&str, &gazette_core::FieldValue)> = fields
    .iter()
    .filter(|(name, _)| entity.attribute(name).is_some())
    .collect();

  let columns = known.iter().map(|(n, _)| quote(n)).collect::<Vec<_>>();
  let placeholders = (1..=known.len()).map(|i| format!("?{i}")).collect::<Vec<_>>();
  let updates = known
    .iter()
    .filter(|(n, _)| *n != entity.primary_key)
    .map(|(n, _)| format!("{0} = excluded.{0}", quote(n)))
    .collect::<Vec<_>>();

  let conflict = if updates.is_empty() {
    "DO NOTHING".to_owned()
  } else {
    format!("DO UPDATE SET {}", updates.join(", "))
  };

  let sql = format!(
    "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) {conflict}",
    entity.table(),
    columns.join(", "),
    placeholders.join(", "),
    quote(entity.primary_key),
  );
  let params = known.into_iter().map(|(_, v)| encode_value(v)).collect();
  (sql, params)
}

impl std::fmt::Debug for SqliteStore {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SqliteStore")
      .field("model", &self.model.name)
      .field("path", &self.path)
      .finish()
  }
}
