//! Engine-native article models.
//!
//! [`ArticleObject`] is the object-store document (camelCase fields, the
//! summary stored as `specification`). [`ArticleEntity`] is the relational
//! row (snake_case columns). Both are keyed by `url`.

use crate::{
  Article, ArticleModel, Entity, FieldSpec, FieldValue, Result,
  entity::unknown_field,
};

// ─── Object-store model ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleObject {
  pub url:           String,
  pub title:         String,
  pub author:        Option<String>,
  pub image_url:     Option<String>,
  pub content:       Option<String>,
  pub specification: Option<String>,
  pub published_at:  String,
  pub is_favorite:   bool,
}

impl Entity for ArticleObject {
  const NAME: &'static str = "ArticleObject";
  const PRIMARY_KEY: &'static str = "url";
  const FIELDS: &'static [FieldSpec] = &[
    FieldSpec::text("url"),
    FieldSpec::text("title"),
    FieldSpec::optional_text("author"),
    FieldSpec::optional_text("imageURL"),
    FieldSpec::optional_text("content"),
    FieldSpec::optional_text("specification"),
    FieldSpec::text("publishedAt"),
    FieldSpec::boolean("isFavorite"),
  ];

  fn empty() -> Self { Self::default() }

  fn primary_key(&self) -> &str { &self.url }

  fn get(&self, field: &str) -> Option<FieldValue> {
    Some(match field {
      "url" => self.url.as_str().into(),
      "title" => self.title.as_str().into(),
      "author" => self.author.clone().into(),
      "imageURL" => self.image_url.clone().into(),
      "content" => self.content.clone().into(),
      "specification" => self.specification.clone().into(),
      "publishedAt" => self.published_at.as_str().into(),
      "isFavorite" => self.is_favorite.into(),
      _ => return None,
    })
  }

  fn set(&mut self, field: &str, value: FieldValue) -> Result<()> {
    let name = Self::NAME;
    match field {
      "url" => self.url = value.into_text(name, field)?,
      "title" => self.title = value.into_text(name, field)?,
      "author" => self.author = value.into_optional_text(name, field)?,
      "imageURL" => self.image_url = value.into_optional_text(name, field)?,
      "content" => self.content = value.into_optional_text(name, field)?,
      "specification" => {
        self.specification = value.into_optional_text(name, field)?
      }
      "publishedAt" => self.published_at = value.into_text(name, field)?,
      "isFavorite" => self.is_favorite = value.into_bool(name, field)?,
      other => return Err(unknown_field::<Self>(other)),
    }
    Ok(())
  }
}

impl ArticleModel for ArticleObject {
  const FAVORITE_FIELD: &'static str = "isFavorite";

  fn from_article(article: &Article) -> Self {
    Self {
      url:           article.url.clone(),
      title:         article.title.clone(),
      author:        article.author.clone(),
      image_url:     article.image_url.clone(),
      content:       article.content.clone(),
      specification: article.summary.clone(),
      published_at:  article.published_at.clone(),
      is_favorite:   article.is_favorite,
    }
  }

  fn to_article(&self) -> Article {
    Article {
      url:          self.url.clone(),
      title:        self.title.clone(),
      author:       self.author.clone(),
      image_url:    self.image_url.clone(),
      content:      self.content.clone(),
      summary:      self.specification.clone(),
      published_at: self.published_at.clone(),
      is_favorite:  self.is_favorite,
    }
  }
}

// ─── Relational model ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleEntity {
  pub url:          String,
  pub title:        String,
  pub author:       Option<String>,
  pub image_url:    Option<String>,
  pub content:      Option<String>,
  pub summary:      Option<String>,
  pub published_at: String,
  pub is_favorite:  bool,
}

impl Entity for ArticleEntity {
  const NAME: &'static str = "ArticleEntity";
  const PRIMARY_KEY: &'static str = "url";
  const FIELDS: &'static [FieldSpec] = &[
    FieldSpec::text("url"),
    FieldSpec::text("title"),
    FieldSpec::optional_text("author"),
    FieldSpec::optional_text("image_url"),
    FieldSpec::optional_text("content"),
    FieldSpec::optional_text("summary"),
    FieldSpec::text("published_at"),
    FieldSpec::boolean("is_favorite"),
  ];

  fn empty() -> Self { Self::default() }

  fn primary_key(&self) -> &str { &self.url }

  fn get(&self, field: &str) -> Option<FieldValue> {
    Some(match field {
      "url" => self.url.as_str().into(),
      "title" => self.title.as_str().into(),
      "author" => self.author.clone().into(),
      "image_url" => self.image_url.clone().into(),
      "content" => self.content.clone().into(),
      "summary" => self.summary.clone().into(),
      "published_at" => self.published_at.as_str().into(),
      "is_favorite" => self.is_favorite.into(),
      _ => return None,
    })
  }

  fn set(&mut self, field: &str, value: FieldValue) -> Result<()> {
    let name = Self::NAME;
    match field {
      "url" => self.url = value.into_text(name, field)?,
      "title" => self.title = value.into_text(name, field)?,
      "author" => self.author = value.into_optional_text(name, field)?,
      "image_url" => self.image_url = value.into_optional_text(name, field)?,
      "content" => self.content = value.into_optional_text(name, field)?,
      "summary" => self.summary = value.into_optional_text(name, field)?,
      "published_at" => self.published_at = value.into_text(name, field)?,
      "is_favorite" => self.is_favorite = value.into_bool(name, field)?,
      other => return Err(unknown_field::<Self>(other)),
    }
    Ok(())
  }
}

impl ArticleModel for ArticleEntity {
  const FAVORITE_FIELD: &'static str = "is_favorite";

  fn from_article(article: &Article) -> Self {
    Self {
      url:          article.url.clone(),
      title:        article.title.clone(),
      author:       article.author.clone(),
      image_url:    article.image_url.clone(),
      content:      article.content.clone(),
      summary:      article.summary.clone(),
      published_at: article.published_at.clone(),
      is_favorite:  article.is_favorite,
    }
  }

  fn to_article(&self) -> Article {
    Article {
      url:          self.url.clone(),
      title:        self.title.clone(),
      author:       self.author.clone(),
      image_url:    self.image_url.clone(),
      content:      self.content.clone(),
      summary:      self.summary.clone(),
      published_at: self.published_at.clone(),
      is_favorite:  self.is_favorite,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{Error, KeyedFields};

  fn article() -> Article {
    Article {
      url:          "https://news.example/a".into(),
      title:        "Title".into(),
      author:       Some("Ada".into()),
      image_url:    None,
      content:      Some("Body".into()),
      summary:      Some("Summary".into()),
      published_at: "2022-06-04T10:15:00Z".into(),
      is_favorite:  true,
    }
  }

  #[test]
  fn object_keyed_fields_reconstruct_the_article() {
    let original = article();
    let fields = ArticleObject::keyed_fields(&original);
    assert_eq!(fields.text("specification"), Some("Summary"));

    let object = ArticleObject::from_fields(&fields).unwrap();
    assert_eq!(object.to_article(), original);
  }

  #[test]
  fn entity_keyed_fields_reconstruct_the_article() {
    let original = article();
    let fields = ArticleEntity::keyed_fields(&original);
    let entity = ArticleEntity::from_fields(&fields).unwrap();
    assert_eq!(entity.to_article(), original);
  }

  #[test]
  fn unknown_key_is_rejected() {
    let fields = ArticleEntity::keyed_fields(&article()).with("specification", "x");
    let err = ArticleEntity::from_fields(&fields).unwrap_err();
    assert_eq!(
      err,
      Error::invalid_field("ArticleEntity", "specification", "no such field")
    );
  }

  #[test]
  fn empty_primary_key_is_rejected() {
    let fields = KeyedFields::new().with("title", "t");
    assert!(ArticleObject::from_fields(&fields).is_err());
  }

  #[test]
  fn partial_apply_only_touches_named_fields() {
    let mut entity = ArticleEntity::from_article(&article());
    entity
      .apply(&KeyedFields::new().with("is_favorite", false))
      .unwrap();
    assert!(!entity.is_favorite);
    assert_eq!(entity.title, "Title");
  }

  #[test]
  fn update_may_restate_but_not_change_the_key() {
    let mut entity = ArticleEntity::from_article(&article());
    entity
      .apply_update(
        &KeyedFields::new()
          .with("url", "https://news.example/a")
          .with("title", "Retitled"),
      )
      .unwrap();
    assert_eq!(entity.title, "Retitled");

    let err = entity
      .apply_update(&KeyedFields::new().with("url", "https://news.example/b"))
      .unwrap_err();
    assert!(matches!(err, Error::InvalidField { ref field, .. } if field == "url"));
    assert_eq!(entity.url, "https://news.example/a");
  }
}
