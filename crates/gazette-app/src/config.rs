//! Runtime configuration, deserialised by the binary from `gazette.toml`
//! and `GAZETTE_*` environment variables. Every field has a default.

use std::path::{Path, PathBuf};

use gazette_objectstore::ObjectStoreConfig;
use gazette_store_sqlite::{CoordinatorOptions, StoreOptions, Topology};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
  /// Durable per-user directory holding both store files.
  pub data_dir:      PathBuf,
  /// Flag store file name inside `data_dir`.
  pub defaults_file: String,
  pub object_store:  ObjectStoreSettings,
  pub relational:    RelationalSettings,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      data_dir:      PathBuf::from("~/.local/share/gazette"),
      defaults_file: "defaults.json".into(),
      object_store:  ObjectStoreSettings::default(),
      relational:    RelationalSettings::default(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObjectStoreSettings {
  pub name:           String,
  pub schema_version: u64,
}

impl Default for ObjectStoreSettings {
  fn default() -> Self { Self { name: "default".into(), schema_version: 2 } }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelationalSettings {
  pub model_name:            String,
  pub topology:              Topology,
  pub save_after_write:      bool,
  pub migrate_automatically: bool,
  pub infer_mapping_model:   bool,
}

impl Default for RelationalSettings {
  fn default() -> Self {
    Self {
      model_name:            "DatabaseDemo".into(),
      topology:              Topology::Single,
      save_after_write:      false,
      migrate_automatically: true,
      infer_mapping_model:   true,
    }
  }
}

impl AppConfig {
  /// `data_dir` with a leading `~` expanded.
  pub fn data_dir(&self) -> PathBuf { expand_tilde(&self.data_dir) }

  pub fn defaults_path(&self) -> PathBuf { self.data_dir().join(&self.defaults_file) }

  pub fn object_store_path(&self) -> PathBuf {
    ObjectStoreConfig::location(&self.data_dir(), &self.object_store.name)
  }

  pub fn coordinator_options(&self) -> CoordinatorOptions {
    let r = &self.relational;
    CoordinatorOptions {
      topology:         r.topology,
      save_after_write: r.save_after_write,
      store:            StoreOptions {
        migrate_automatically: r.migrate_automatically,
        infer_mapping_model:   r.infer_mapping_model,
      },
    }
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
