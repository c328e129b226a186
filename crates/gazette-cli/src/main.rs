//! `gazette` — command-line front end for the Gazette persistence layer.
//!
//! Reads `gazette.toml` (or the path given with `--config`) layered under
//! `GAZETTE_*` environment variables, opens both stores in the data
//! directory and runs one command against them.
//!
//! ```
//! gazette seed feed.json
//! gazette migrate
//! gazette list --engine relational --favorites
//! gazette favorite https://example.com/story
//! ```

use std::{
  fs,
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::{Context as _, bail};
use clap::{Parser, Subcommand, ValueEnum};
use gazette_app::{AppConfig, FavoritesService, MIGRATED_FLAG, Persistence, StartupOutcome};
use gazette_core::{
  Article, ArticleModel, DatabaseCoordinator, Feed, Predicate,
  models::{ArticleEntity, ArticleObject},
};
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Gazette persistence tool")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "gazette.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Load articles from a feed JSON file into the object store.
  Seed { file: PathBuf },
  /// Run the startup migration from the object store to the relational store.
  Migrate,
  /// List stored articles.
  List {
    #[arg(long, value_enum, default_value_t = Engine::Relational)]
    engine:    Engine,
    /// Only favorites.
    #[arg(long)]
    favorites: bool,
  },
  /// Toggle the favorite flag of a stored article.
  Favorite {
    url:    String,
    #[arg(long, value_enum, default_value_t = Engine::Relational)]
    engine: Engine,
  },
  /// Remove a stored article from the favorites.
  Unfavorite {
    url:    String,
    #[arg(long, value_enum, default_value_t = Engine::Relational)]
    engine: Engine,
  },
  /// Show the migration flag and article counts.
  Status,
}

#[derive(Clone, Copy, ValueEnum)]
enum Engine {
  Objects,
  Relational,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("GAZETTE").separator("__"))
    .build()
    .context("failed to read config file")?;
  let app_config: AppConfig = settings
    .try_deserialize()
    .context("failed to deserialise AppConfig")?;

  let persistence = Persistence::open(&app_config)
    .await
    .with_context(|| format!("failed to open stores in {:?}", app_config.data_dir()))?;

  let owner = Arc::new(());
  persistence.events.migration.subscribe(&owner, |state| {
    info!(?state, "migration state changed");
  });

  match cli.command {
    Command::Seed { file } => seed(&persistence, &file).await,
    Command::Migrate => migrate(&persistence).await,
    Command::List { engine, favorites } => match engine {
      Engine::Objects => list(&persistence.object_favorites(), favorites).await,
      Engine::Relational => list(&persistence.relational_favorites(), favorites).await,
    },
    Command::Favorite { url, engine } => match engine {
      Engine::Objects => {
        toggle(&persistence.object_favorites(), persistence.objects.as_ref(), &url).await
      }
      Engine::Relational => {
        toggle(&persistence.relational_favorites(), persistence.relational.as_ref(), &url)
          .await
      }
    },
    Command::Unfavorite { url, engine } => match engine {
      Engine::Objects => {
        unfavorite(&persistence.object_favorites(), persistence.objects.as_ref(), &url).await
      }
      Engine::Relational => {
        unfavorite(&persistence.relational_favorites(), persistence.relational.as_ref(), &url)
          .await
      }
    },
    Command::Status => status(&persistence).await,
  }
}

async fn seed(persistence: &Persistence, file: &Path) -> anyhow::Result<()> {
  let raw = fs::read(file).with_context(|| format!("reading feed {}", file.display()))?;
  let feed: Feed = serde_json::from_slice(&raw).context("parsing feed")?;

  let records = feed.articles.iter().map(ArticleObject::keyed_fields).collect();
  let stored: Vec<ArticleObject> = persistence
    .objects
    .create(records)
    .await
    .context("storing feed articles")?;
  persistence.objects.save_context().await?;

  println!("seeded {} articles", stored.len());
  Ok(())
}

async fn migrate(persistence: &Persistence) -> anyhow::Result<()> {
  match persistence.startup().run().await {
    StartupOutcome::Migrated(report) => println!("migrated {} articles", report.migrated),
    StartupOutcome::AlreadyMigrated => println!("already migrated"),
    StartupOutcome::Skipped => println!("migration already ran"),
    StartupOutcome::Failed(error) => bail!(error),
  }
  Ok(())
}

async fn list<C, M>(service: &FavoritesService<C, M>, favorites_only: bool) -> anyhow::Result<()>
where
  C: DatabaseCoordinator,
  M: ArticleModel,
{
  let articles = if favorites_only {
    service.favorites().await?
  } else {
    service.all().await?
  };
  for article in &articles {
    print_article(article);
  }
  Ok(())
}

async fn stored<C, M>(coordinator: &C, url: &str) -> anyhow::Result<Article>
where
  C: DatabaseCoordinator,
  M: ArticleModel,
{
  let found: Vec<M> = coordinator.fetch(Some(Predicate::key::<M>(url))).await?;
  match found.first() {
    Some(model) => Ok(model.to_article()),
    None => bail!("no stored article with url {url}"),
  }
}

async fn toggle<C, M>(
  service: &FavoritesService<C, M>,
  coordinator: &C,
  url: &str,
) -> anyhow::Result<()>
where
  C: DatabaseCoordinator,
  M: ArticleModel,
{
  let article = stored::<C, M>(coordinator, url).await?;
  let toggled = service.toggle_favorite(&article).await?;
  print_article(&toggled);
  Ok(())
}

async fn unfavorite<C, M>(
  service: &FavoritesService<C, M>,
  coordinator: &C,
  url: &str,
) -> anyhow::Result<()>
where
  C: DatabaseCoordinator,
  M: ArticleModel,
{
  let article = stored::<C, M>(coordinator, url).await?;
  if let Some(removed) = service.remove_from_favorites(&article).await? {
    print_article(&removed);
  }
  Ok(())
}

async fn status(persistence: &Persistence) -> anyhow::Result<()> {
  let objects: Vec<ArticleObject> = persistence.objects.fetch_all().await?;
  let rows: Vec<ArticleEntity> = persistence.relational.fetch_all().await?;
  println!("migrated:         {}", persistence.defaults.bool(MIGRATED_FLAG));
  println!("object store:     {} articles", objects.len());
  println!("relational store: {} articles", rows.len());
  Ok(())
}

fn print_article(article: &Article) {
  let date = article
    .published_at_display()
    .unwrap_or_else(|| article.published_at.clone());
  let heart = if article.is_favorite { "♥" } else { " " };
  println!("{heart} {date:<20} {}  <{}>", article.title, article.url);
}
