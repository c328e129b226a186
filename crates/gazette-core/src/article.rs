//! The engine-neutral article record.
//!
//! An article is keyed by its URL in both engines. The only field mutated
//! after creation is `is_favorite`. Each engine has its own native model (see
//! [`crate::models`]); [`ArticleModel`] converts between them and this type.

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::{Entity, KeyedFields};

/// A news article as decoded from the feed or reconstructed from storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
  pub url:          String,
  pub title:        String,
  #[serde(default)]
  pub author:       Option<String>,
  #[serde(default, rename = "urlToImage")]
  pub image_url:    Option<String>,
  #[serde(default)]
  pub content:      Option<String>,
  #[serde(default, rename = "description")]
  pub summary:      Option<String>,
  /// ISO 8601 timestamp as delivered by the feed.
  pub published_at: String,
  /// Not part of the feed; always `false` on first decode.
  #[serde(default)]
  pub is_favorite:  bool,
}

impl Article {
  /// `published_at` rendered as e.g. `June 4, 2022`, or `None` if it does not
  /// parse as an RFC 3339 timestamp.
  pub fn published_at_display(&self) -> Option<String> {
    DateTime::parse_from_rfc3339(&self.published_at)
      .ok()
      .map(|dt| dt.format("%B %-d, %Y").to_string())
  }

  /// Identity comparison used when reconciling lists from different sources.
  pub fn same_url(&self, other: &Article) -> bool { self.url == other.url }
}

/// Shape of the external feed payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
  pub status:   String,
  pub articles: Vec<Article>,
}

/// An engine-native article model.
pub trait ArticleModel: Entity {
  /// Name of the boolean favorite field in this model.
  const FAVORITE_FIELD: &'static str;

  fn from_article(article: &Article) -> Self;

  fn to_article(&self) -> Article;

  /// The keyed-field form used to create this model from an article.
  fn keyed_fields(article: &Article) -> KeyedFields {
    Self::from_article(article).to_fields()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn decodes_feed_with_renamed_fields() {
    let json = r#"{
      "status": "ok",
      "articles": [{
        "source": { "id": null, "name": "Example" },
        "author": "Ada",
        "title": "Hello",
        "description": "Short",
        "url": "https://news.example/a",
        "urlToImage": "https://img.example/a.png",
        "publishedAt": "2022-06-04T10:15:00Z",
        "content": null
      }]
    }"#;

    let feed: Feed = serde_json::from_str(json).unwrap();
    let article = &feed.articles[0];
    assert_eq!(article.summary.as_deref(), Some("Short"));
    assert_eq!(article.image_url.as_deref(), Some("https://img.example/a.png"));
    assert_eq!(article.content, None);
    assert!(!article.is_favorite);
  }

  #[test]
  fn display_date() {
    let mut article = Article {
      url:          "u".into(),
      title:        "t".into(),
      author:       None,
      image_url:    None,
      content:      None,
      summary:      None,
      published_at: "2022-06-04T10:15:00Z".into(),
      is_favorite:  false,
    };
    assert_eq!(article.published_at_display().as_deref(), Some("June 4, 2022"));

    article.published_at = "yesterday".into();
    assert_eq!(article.published_at_display(), None);
  }
}
