//! Copies articles from the object store into the relational store.
//!
//! The pipeline itself never touches the launch flag; it only reports
//! success or failure. See [`crate::StartupMigration`] for the run-once
//! sequencing around it.

use std::sync::Arc;

use gazette_core::{
  Article, ArticleModel, DatabaseCoordinator, KeyedFields, MigrationError,
  models::{ArticleEntity, ArticleObject},
};
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
  /// Articles written to the destination.
  pub migrated: usize,
}

pub struct MigrationService<A, B> {
  source:      Arc<A>,
  destination: Arc<B>,
}

impl<A, B> MigrationService<A, B>
where
  A: DatabaseCoordinator + 'static,
  B: DatabaseCoordinator + 'static,
{
  pub fn new(source: Arc<A>, destination: Arc<B>) -> Self { Self { source, destination } }

  /// Fetch every [`ArticleObject`], create the equivalent [`ArticleEntity`]
  /// rows in one batch and save. An empty source succeeds without writing.
  pub async fn migrate_storage_models(&self) -> Result<MigrationReport, MigrationError> {
    let result = self.run().await;
    match &result {
      Ok(report) => info!(migrated = report.migrated, "storage migration finished"),
      Err(error) => warn!(%error, "storage migration failed"),
    }
    result
  }

  async fn run(&self) -> Result<MigrationReport, MigrationError> {
    let objects: Vec<ArticleObject> = self.source.fetch_all().await?;
    if objects.is_empty() {
      info!("no articles to migrate");
      return Ok(MigrationReport::default());
    }

    let records: Vec<KeyedFields> = objects
      .iter()
      .map(ArticleObject::to_article)
      .map(|article: Article| ArticleEntity::keyed_fields(&article))
      .collect();

    let created: Vec<ArticleEntity> = self.destination.create(records).await?;
    self.destination.save_context().await?;
    Ok(MigrationReport { migrated: created.len() })
  }

  /// Run the pipeline on the runtime and hand the result to `completion`.
  pub fn migrate_in_background<F>(self: &Arc<Self>, completion: F) -> JoinHandle<()>
  where
    F: FnOnce(Result<MigrationReport, MigrationError>) + Send + 'static,
  {
    let service = Arc::clone(self);
    tokio::spawn(async move {
      completion(service.migrate_storage_models().await);
    })
  }
}
