//! The engines and services, built once at startup and passed around
//! explicitly.

use std::{fs, sync::Arc};

use gazette_core::{
  events::EventHub,
  models::{ArticleEntity, ArticleObject},
};
use gazette_objectstore::{ObjectStoreConfig, ObjectStoreCoordinator};
use gazette_store_sqlite::{CoordinatorOptions, ManagedCoordinator, ManagedModel};
use tracing::info;

use crate::{
  AppConfig, Defaults, FavoritesService, MigrationService, Result, StartupMigration,
};

pub type Migration = MigrationService<ObjectStoreCoordinator, ManagedCoordinator>;

pub struct Persistence {
  pub defaults:   Arc<Defaults>,
  pub events:     Arc<EventHub>,
  pub objects:    Arc<ObjectStoreCoordinator>,
  pub relational: Arc<ManagedCoordinator>,
  pub migration:  Arc<Migration>,
}

impl Persistence {
  /// Open both stores and the flag file under `config.data_dir`.
  pub async fn open(config: &AppConfig) -> Result<Self> {
    let data_dir = config.data_dir();
    fs::create_dir_all(&data_dir)?;

    let objects = ObjectStoreCoordinator::open(
      ObjectStoreConfig::new(config.object_store_path())
        .register::<ArticleObject>()
        .schema_version(config.object_store.schema_version),
    )?;
    let relational = ManagedCoordinator::open(
      &data_dir,
      article_model(&config.relational.model_name),
      config.coordinator_options(),
    )
    .await?;
    let defaults = Defaults::open(config.defaults_path())?;

    info!(data_dir = %data_dir.display(), "persistence opened");
    Ok(Self::assemble(defaults, objects, relational))
  }

  /// Temporary stores and an in-memory flag store.
  pub async fn open_in_memory(options: CoordinatorOptions) -> Result<Self> {
    let objects = ObjectStoreCoordinator::open(
      ObjectStoreConfig::temporary().register::<ArticleObject>(),
    )?;
    let relational =
      ManagedCoordinator::open_in_memory(article_model("DatabaseDemo"), options).await?;
    Ok(Self::assemble(Defaults::in_memory(), objects, relational))
  }

  fn assemble(
    defaults: Defaults,
    objects: ObjectStoreCoordinator,
    relational: ManagedCoordinator,
  ) -> Self {
    let objects = Arc::new(objects);
    let relational = Arc::new(relational);
    Self {
      defaults: Arc::new(defaults),
      events: Arc::new(EventHub::new()),
      migration: Arc::new(MigrationService::new(objects.clone(), relational.clone())),
      objects,
      relational,
    }
  }

  pub fn startup(&self) -> StartupMigration<ObjectStoreCoordinator, ManagedCoordinator> {
    StartupMigration::new(self.migration.clone(), self.defaults.clone(), self.events.clone())
  }

  pub fn object_favorites(&self) -> FavoritesService<ObjectStoreCoordinator, ArticleObject> {
    FavoritesService::new(self.objects.clone(), self.events.clone())
  }

  pub fn relational_favorites(&self) -> FavoritesService<ManagedCoordinator, ArticleEntity> {
    FavoritesService::new(self.relational.clone(), self.events.clone())
  }
}

fn article_model(name: &str) -> ManagedModel {
  ManagedModel::new(name).with_entity::<ArticleEntity>()
}
