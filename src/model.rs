//! Domain records shared by the adapters, the matcher and the store.
//!
//! - [`Source`]: externally administered source configuration (read-only here).
//! - [`RawArticle`]: normalized candidate produced by an adapter, never persisted as-is.
//! - [`Event`]: canonical occurrence; only `last_updated_at` changes after creation.
//! - [`Article`]: persisted article, owned by exactly one event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::peril::Peril;

/// How a source is fetched and parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    #[serde(alias = "rss")]
    Feed,
    #[serde(alias = "json_api", alias = "structured_api")]
    StructuredApi,
    #[serde(alias = "html", alias = "html_scrape")]
    HtmlScrape,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceKind::Feed => "feed",
            SourceKind::StructuredApi => "structured-api",
            SourceKind::HtmlScrape => "html-scrape",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub kind: SourceKind,
    #[serde(alias = "baseUrl")]
    pub base_url: String,
    /// Sources are opt-in: a record without the flag is not processed.
    #[serde(default)]
    pub enabled: bool,
}

/// Candidate article as produced by a source adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawArticle {
    pub source_id: String,
    pub title: String,
    pub url: String,
    pub summary: String,
    pub published_at: DateTime<Utc>,
    pub peril: Peril,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub location_text: Option<String>,
}

impl RawArticle {
    /// `title` and `url` must both carry something other than whitespace.
    pub fn is_well_formed(&self) -> bool {
        !self.title.trim().is_empty() && !self.url.trim().is_empty()
    }
}

/// Fields fixed at event creation, taken from the first article.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub canonical_title: String,
    pub peril: Peril,
    pub location_text: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub first_published_at: DateTime<Utc>,
}

impl NewEvent {
    pub fn from_article(a: &RawArticle) -> Self {
        Self {
            canonical_title: a.title.clone(),
            peril: a.peril,
            location_text: a.location_text.clone(),
            lat: a.lat,
            lng: a.lng,
            first_published_at: a.published_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub canonical_title: String,
    pub peril: Peril,
    pub location_text: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub event_key: String,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: Uuid,
    pub event_id: Uuid,
    pub external_url: String,
    pub source_id: String,
    pub title: String,
    pub summary: String,
    pub published_at: DateTime<Utc>,
    pub peril: Peril,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub location_text: Option<String>,
    pub ingested_at: DateTime<Utc>,
}

impl Article {
    pub fn from_raw(raw: &RawArticle, event_id: Uuid, ingested_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id,
            external_url: raw.url.clone(),
            source_id: raw.source_id.clone(),
            title: raw.title.clone(),
            summary: raw.summary.clone(),
            published_at: raw.published_at,
            peril: raw.peril,
            lat: raw.lat,
            lng: raw.lng,
            location_text: raw.location_text.clone(),
            ingested_at,
        }
    }
}

/// Shape served to the downstream query layer: an event with its articles embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventWithArticles {
    #[serde(flatten)]
    pub event: Event,
    pub articles: Vec<Article>,
}

pub const DEFAULT_QUERY_LIMIT: usize = 100;

/// Downstream read filter: substring on the canonical title, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    pub search: Option<String>,
    pub limit: usize,
}

impl Default for EventQuery {
    fn default() -> Self {
        Self {
            search: None,
            limit: DEFAULT_QUERY_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_kind_accepts_legacy_names() {
        let s: Source = serde_json::from_str(
            r#"{"id":"usgs","kind":"json_api","baseUrl":"https://x.test","enabled":true}"#,
        )
        .unwrap();
        assert_eq!(s.kind, SourceKind::StructuredApi);
        assert_eq!(s.base_url, "https://x.test");

        let s: Source =
            serde_json::from_str(r#"{"id":"h","kind":"html","base_url":"https://y.test"}"#)
                .unwrap();
        assert_eq!(s.kind, SourceKind::HtmlScrape);
        assert!(!s.enabled);
    }

    #[test]
    fn well_formed_requires_title_and_url() {
        let mut a = RawArticle {
            source_id: "s".into(),
            title: "Flood in Lyon".into(),
            url: "https://x.test/a".into(),
            summary: String::new(),
            published_at: Utc::now(),
            peril: Peril::Flood,
            lat: None,
            lng: None,
            location_text: None,
        };
        assert!(a.is_well_formed());
        a.url = "   ".into();
        assert!(!a.is_well_formed());
    }
}
