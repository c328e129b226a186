//! Service-level tests over real engines, with a coordinator wrapper that
//! counts calls and can fail saves.

use std::sync::{
  Arc, Mutex,
  atomic::{AtomicBool, AtomicUsize, Ordering},
};

use gazette_core::{
  Article, ArticleModel, DatabaseCoordinator, Entity, Error, KeyedFields, MigrationError,
  Predicate, Result as CoreResult,
  events::{EventHub, FavoriteEvent, MigrationState},
  models::{ArticleEntity, ArticleObject},
};
use gazette_objectstore::{ObjectStoreConfig, ObjectStoreCoordinator};
use gazette_store_sqlite::{CoordinatorOptions, ManagedCoordinator, ManagedModel, Topology};
use tokio::sync::oneshot;

use crate::{
  AppConfig, Defaults, FavoritesService, MIGRATED_FLAG, MigrationReport, MigrationService,
  Persistence, StartupMigration, StartupOutcome,
};

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn article(url: &str) -> Article {
  Article {
    url:          url.into(),
    title:        format!("Title of {url}"),
    author:       Some("Ada".into()),
    image_url:    None,
    content:      None,
    summary:      Some(format!("About {url}")),
    published_at: "2022-06-04T10:15:00Z".into(),
    is_favorite:  false,
  }
}

fn objects() -> Arc<ObjectStoreCoordinator> {
  Arc::new(
    ObjectStoreCoordinator::open(ObjectStoreConfig::temporary().register::<ArticleObject>())
      .unwrap(),
  )
}

async fn relational(topology: Topology) -> Arc<ManagedCoordinator> {
  let model = ManagedModel::new("DatabaseDemo").with_entity::<ArticleEntity>();
  let options = CoordinatorOptions { topology, ..Default::default() };
  Arc::new(ManagedCoordinator::open_in_memory(model, options).await.unwrap())
}

async fn seed(objects: &ObjectStoreCoordinator, articles: &[Article]) {
  let records = articles.iter().map(ArticleObject::keyed_fields).collect();
  objects.create::<ArticleObject>(records).await.unwrap();
}

async fn urls<C: DatabaseCoordinator>(coordinator: &C) -> Vec<String> {
  let rows: Vec<ArticleEntity> = coordinator.fetch_all().await.unwrap();
  rows.into_iter().map(|row| row.url).collect()
}

/// Records every state the migration channel announces.
fn record_states(events: &EventHub) -> Arc<Mutex<Vec<MigrationState>>> {
  let seen = Arc::new(Mutex::new(Vec::new()));
  let sink = seen.clone();
  events.migration.subscribe(&seen, move |state| sink.lock().unwrap().push(*state));
  seen
}

/// Delegates to `inner`, counting calls and optionally failing saves.
struct Counted<C> {
  inner:     Arc<C>,
  creates:   AtomicUsize,
  saves:     AtomicUsize,
  fail_save: AtomicBool,
}

impl<C> Counted<C> {
  fn new(inner: Arc<C>) -> Self {
    Self {
      inner,
      creates: AtomicUsize::new(0),
      saves: AtomicUsize::new(0),
      fail_save: AtomicBool::new(false),
    }
  }

  fn creates(&self) -> usize { self.creates.load(Ordering::SeqCst) }

  fn saves(&self) -> usize { self.saves.load(Ordering::SeqCst) }
}

impl<C: DatabaseCoordinator> DatabaseCoordinator for Counted<C> {
  async fn create<E: Entity>(&self, records: Vec<KeyedFields>) -> CoreResult<Vec<E>> {
    self.creates.fetch_add(1, Ordering::SeqCst);
    self.inner.create(records).await
  }

  async fn update<E: Entity>(
    &self,
    predicate: Predicate,
    fields: KeyedFields,
  ) -> CoreResult<Vec<E>> {
    self.inner.update(predicate, fields).await
  }

  async fn delete<E: Entity>(&self, predicate: Option<Predicate>) -> CoreResult<Vec<E>> {
    self.inner.delete(predicate).await
  }

  async fn fetch<E: Entity>(&self, predicate: Option<Predicate>) -> CoreResult<Vec<E>> {
    self.inner.fetch(predicate).await
  }

  async fn save_context(&self) -> CoreResult<()> {
    self.saves.fetch_add(1, Ordering::SeqCst);
    if self.fail_save.load(Ordering::SeqCst) {
      return Err(Error::store("counted", "save rejected"));
    }
    self.inner.save_context().await
  }
}

// ─── Startup migration ───────────────────────────────────────────────────────

#[tokio::test]
async fn migrates_three_articles_once() {
  let source = objects();
  seed(&source, &[article("a"), article("b"), article("c")]).await;
  let destination = Arc::new(Counted::new(relational(Topology::Single).await));
  let service = Arc::new(MigrationService::new(source, destination.clone()));
  let defaults = Arc::new(Defaults::in_memory());

  let events = Arc::new(EventHub::new());
  let states = record_states(&events);
  assert_eq!(events.migration.get(), MigrationState::NotBegun);

  let startup = StartupMigration::new(service.clone(), defaults.clone(), events.clone());
  assert_eq!(
    startup.run().await,
    StartupOutcome::Migrated(MigrationReport { migrated: 3 })
  );
  assert_eq!(*states.lock().unwrap(), [MigrationState::Begun, MigrationState::Ended]);
  assert_eq!(urls(destination.as_ref()).await, ["a", "b", "c"]);
  assert!(defaults.bool(MIGRATED_FLAG));

  // Same process: never runs twice.
  assert_eq!(startup.run().await, StartupOutcome::Skipped);

  // Next launch: the flag short-circuits before any state change or write.
  let events = Arc::new(EventHub::new());
  let states = record_states(&events);
  let relaunch = StartupMigration::new(service, defaults, events.clone());
  assert_eq!(relaunch.run().await, StartupOutcome::AlreadyMigrated);
  assert!(states.lock().unwrap().is_empty());
  assert_eq!(events.migration.get(), MigrationState::NotBegun);
  assert_eq!(destination.creates(), 1);
  assert_eq!(destination.saves(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sequencers_sharing_events_migrate_once() {
  let source = objects();
  seed(&source, &[article("a"), article("b")]).await;
  let destination = Arc::new(Counted::new(relational(Topology::Single).await));
  let service = Arc::new(MigrationService::new(source, destination.clone()));
  let defaults = Arc::new(Defaults::in_memory());
  let events = Arc::new(EventHub::new());

  let runs: Vec<_> = (0..4)
    .map(|_| {
      let startup = StartupMigration::new(service.clone(), defaults.clone(), events.clone());
      tokio::spawn(async move { startup.run().await })
    })
    .collect();

  let mut migrated = 0;
  for run in runs {
    match run.await.unwrap() {
      StartupOutcome::Migrated(report) => {
        assert_eq!(report.migrated, 2);
        migrated += 1;
      }
      other => assert!(matches!(
        other,
        StartupOutcome::Skipped | StartupOutcome::AlreadyMigrated
      )),
    }
  }
  assert_eq!(migrated, 1);
  assert_eq!(destination.creates(), 1);
  assert_eq!(events.migration.get(), MigrationState::Ended);
}

#[tokio::test]
async fn rerunning_the_pipeline_creates_no_duplicates() {
  let source = objects();
  seed(&source, &[article("a"), article("b")]).await;
  let destination = relational(Topology::Cascading).await;
  let service = MigrationService::new(source, destination.clone());

  service.migrate_storage_models().await.unwrap();
  service.migrate_storage_models().await.unwrap();
  assert_eq!(urls(destination.as_ref()).await, ["a", "b"]);
}

#[tokio::test]
async fn failed_save_leaves_flag_unset() {
  let source = objects();
  seed(&source, &[article("a"), article("b"), article("c")]).await;
  let destination = Arc::new(Counted::new(relational(Topology::Single).await));
  destination.fail_save.store(true, Ordering::SeqCst);
  let service = Arc::new(MigrationService::new(source, destination.clone()));
  let defaults = Arc::new(Defaults::in_memory());

  let events = Arc::new(EventHub::new());
  let states = record_states(&events);
  let startup = StartupMigration::new(service.clone(), defaults.clone(), events.clone());

  let outcome = startup.run().await;
  assert!(matches!(outcome, StartupOutcome::Failed(MigrationError::Failed(_))));
  assert_eq!(destination.creates(), 1);
  assert!(!defaults.bool(MIGRATED_FLAG));
  assert_eq!(*states.lock().unwrap(), [MigrationState::Begun, MigrationState::Ended]);
  assert_eq!(events.migration.get(), MigrationState::Ended);

  // The next launch retries the whole batch.
  destination.fail_save.store(false, Ordering::SeqCst);
  let relaunch = StartupMigration::new(service, defaults.clone(), Arc::new(EventHub::new()));
  assert_eq!(
    relaunch.run().await,
    StartupOutcome::Migrated(MigrationReport { migrated: 3 })
  );
  assert!(defaults.bool(MIGRATED_FLAG));
  assert_eq!(urls(destination.as_ref()).await, ["a", "b", "c"]);
}

#[tokio::test]
async fn empty_source_succeeds_without_writing() {
  let destination = Arc::new(Counted::new(relational(Topology::Single).await));
  let service = Arc::new(MigrationService::new(objects(), destination.clone()));
  let defaults = Arc::new(Defaults::in_memory());
  let startup = StartupMigration::new(service, defaults.clone(), Arc::new(EventHub::new()));

  assert_eq!(
    startup.run().await,
    StartupOutcome::Migrated(MigrationReport { migrated: 0 })
  );
  assert_eq!(destination.creates(), 0);
  assert_eq!(destination.saves(), 0);
  assert!(defaults.bool(MIGRATED_FLAG));
}

#[tokio::test]
async fn migration_preserves_every_field() {
  let mut favorite = article("a");
  favorite.is_favorite = true;
  favorite.image_url = Some("https://img.example/a.png".into());
  favorite.content = Some("Body".into());

  let source = objects();
  seed(&source, &[favorite.clone(), article("b")]).await;
  let destination = relational(Topology::Single).await;
  MigrationService::new(source, destination.clone())
    .migrate_storage_models()
    .await
    .unwrap();

  let rows: Vec<ArticleEntity> = destination
    .fetch(Some(Predicate::key::<ArticleEntity>("a")))
    .await
    .unwrap();
  assert_eq!(rows[0].to_article(), favorite);
}

#[tokio::test]
async fn background_migration_reports_through_completion() {
  let source = objects();
  seed(&source, &[article("a")]).await;
  let service = Arc::new(MigrationService::new(source, relational(Topology::Single).await));

  let (sender, receiver) = oneshot::channel();
  let task = service.migrate_in_background(move |result| {
    let _ = sender.send(result);
  });

  assert_eq!(receiver.await.unwrap(), Ok(MigrationReport { migrated: 1 }));
  task.await.unwrap();
}

// ─── Favorites ───────────────────────────────────────────────────────────────

async fn favorite_toggle_round_trip<C, M>(service: FavoritesService<C, M>, coordinator: &C)
where
  C: DatabaseCoordinator,
  M: ArticleModel,
{
  let mut current = article("a");
  for expected in [true, false, true] {
    current = service.toggle_favorite(&current).await.unwrap();
    assert_eq!(current.is_favorite, expected);

    let stored: Vec<M> = coordinator
      .fetch(Some(Predicate::key::<M>("a")))
      .await
      .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].to_article().is_favorite, expected);
  }
}

#[tokio::test]
async fn toggle_favorite_persists_last_write_on_both_engines() {
  let events = Arc::new(EventHub::new());

  let objects = objects();
  let service = FavoritesService::<_, ArticleObject>::new(objects.clone(), events.clone());
  favorite_toggle_round_trip(service, objects.as_ref()).await;

  let relational = relational(Topology::Cascading).await;
  let service = FavoritesService::<_, ArticleEntity>::new(relational.clone(), events);
  favorite_toggle_round_trip(service, relational.as_ref()).await;
}

#[tokio::test]
async fn favorite_changes_are_announced() {
  let events = Arc::new(EventHub::new());
  let seen = Arc::new(Mutex::new(Vec::new()));
  let sink = seen.clone();
  events
    .favorites
    .subscribe(&seen, move |event| sink.lock().unwrap().push(event.clone()));

  let relational = relational(Topology::Single).await;
  let service = FavoritesService::<_, ArticleEntity>::new(relational, events);

  let liked = service.toggle_favorite(&article("a")).await.unwrap();
  assert_eq!(service.favorites().await.unwrap(), [liked.clone()]);

  let removed = service.remove_from_favorites(&liked).await.unwrap().unwrap();
  assert!(!removed.is_favorite);
  assert!(service.favorites().await.unwrap().is_empty());

  assert!(service.remove_from_favorites(&article("missing")).await.unwrap().is_none());

  assert_eq!(*seen.lock().unwrap(), [
    FavoriteEvent::Toggled(liked),
    FavoriteEvent::RemovedFromFavorites(removed),
  ]);
}

#[tokio::test]
async fn reconcile_marks_stored_favorites() {
  let objects = objects();
  let service = FavoritesService::<_, ArticleObject>::new(objects, Arc::new(EventHub::new()));
  service.toggle_favorite(&article("b")).await.unwrap();

  let feed = service
    .reconcile(vec![article("a"), article("b"), article("c")])
    .await
    .unwrap();
  let flags: Vec<_> = feed.iter().map(|a| (a.url.as_str(), a.is_favorite)).collect();
  assert_eq!(flags, [("a", false), ("b", true), ("c", false)]);
}

// ─── Persistence ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn persistence_lays_out_files_in_data_dir() {
  let dir = tempfile::tempdir().unwrap();
  let config = AppConfig { data_dir: dir.path().to_path_buf(), ..Default::default() };

  {
    let persistence = Persistence::open(&config).await.unwrap();
    seed(&persistence.objects, &[article("a"), article("b")]).await;
    assert_eq!(
      persistence.startup().run().await,
      StartupOutcome::Migrated(MigrationReport { migrated: 2 })
    );
    assert_eq!(persistence.events.migration.get(), MigrationState::Ended);
  }

  assert!(dir.path().join("default.store").exists());
  assert!(dir.path().join("DatabaseDemo.sqlite").exists());
  assert!(dir.path().join("defaults.json").exists());
}

#[tokio::test]
async fn in_memory_persistence_wires_services_together() {
  let persistence = Persistence::open_in_memory(CoordinatorOptions::default())
    .await
    .unwrap();
  seed(&persistence.objects, &[article("a")]).await;

  assert!(matches!(
    persistence.startup().run().await,
    StartupOutcome::Migrated(_)
  ));
  let liked = persistence
    .relational_favorites()
    .toggle_favorite(&article("a"))
    .await
    .unwrap();
  assert!(liked.is_favorite);
  assert_eq!(urls(persistence.relational.as_ref()).await, ["a"]);
  assert!(persistence.object_favorites().favorites().await.unwrap().is_empty());
}
