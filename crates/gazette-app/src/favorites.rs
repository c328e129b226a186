//! Favorite toggling over any coordinator.
//!
//! Favoriting writes the article with `is_favorite` flipped; un-favoriting
//! updates the stored row in place. Every persisted change is announced on
//! [`EventHub::favorites`] so independent lists can follow along.

use std::{collections::HashSet, marker::PhantomData, sync::Arc};

use gazette_core::{
  Article, ArticleModel, DatabaseCoordinator, KeyedFields, Predicate, Result,
  events::{EventHub, FavoriteEvent},
};
use tracing::debug;

pub struct FavoritesService<C, M> {
  coordinator: Arc<C>,
  events:      Arc<EventHub>,
  _model:      PhantomData<fn() -> M>,
}

impl<C, M> FavoritesService<C, M>
where
  C: DatabaseCoordinator,
  M: ArticleModel,
{
  pub fn new(coordinator: Arc<C>, events: Arc<EventHub>) -> Self {
    Self { coordinator, events, _model: PhantomData }
  }

  /// Flip `article`'s favorite flag, persist it and announce the new state.
  pub async fn toggle_favorite(&self, article: &Article) -> Result<Article> {
    let toggled = Article { is_favorite: !article.is_favorite, ..article.clone() };

    let stored: Vec<M> = self.coordinator.create(vec![M::keyed_fields(&toggled)]).await?;
    self.coordinator.save_context().await?;

    let toggled = stored.first().map(M::to_article).unwrap_or(toggled);
    debug!(url = %toggled.url, favorite = toggled.is_favorite, "favorite toggled");
    self.events.favorites.notify(&FavoriteEvent::Toggled(toggled.clone()));
    Ok(toggled)
  }

  /// Clear the favorite flag of the stored article with `article`'s url.
  /// `None` if no such article is stored.
  pub async fn remove_from_favorites(&self, article: &Article) -> Result<Option<Article>> {
    let updated: Vec<M> = self
      .coordinator
      .update(
        Predicate::key::<M>(article.url.clone()),
        KeyedFields::new().with(M::FAVORITE_FIELD, false),
      )
      .await?;
    self.coordinator.save_context().await?;

    let Some(removed) = updated.first().map(M::to_article) else {
      return Ok(None);
    };
    debug!(url = %removed.url, "removed from favorites");
    self
      .events
      .favorites
      .notify(&FavoriteEvent::RemovedFromFavorites(removed.clone()));
    Ok(Some(removed))
  }

  /// Every stored article, ordered by url.
  pub async fn all(&self) -> Result<Vec<Article>> {
    let stored: Vec<M> = self.coordinator.fetch_all().await?;
    Ok(stored.iter().map(M::to_article).collect())
  }

  /// Every stored favorite, ordered by url.
  pub async fn favorites(&self) -> Result<Vec<Article>> {
    let favorites: Vec<M> = self
      .coordinator
      .fetch(Some(Predicate::eq(M::FAVORITE_FIELD, true)))
      .await?;
    Ok(favorites.iter().map(M::to_article).collect())
  }

  /// Mark the articles of a freshly decoded feed with their stored favorite
  /// state.
  pub async fn reconcile(&self, feed: Vec<Article>) -> Result<Vec<Article>> {
    let favorites: HashSet<String> =
      self.favorites().await?.into_iter().map(|a| a.url).collect();
    Ok(
      feed
        .into_iter()
        .map(|article| Article { is_favorite: favorites.contains(&article.url), ..article })
        .collect(),
    )
  }
}
