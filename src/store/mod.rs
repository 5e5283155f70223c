// src/store/mod.rs
//! Event Store Gateway: the narrow interface the orchestrator persists through.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::model::{Article, Event, EventQuery, EventWithArticles, NewEvent, RawArticle};

pub use memory::MemoryStore;

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Events whose `last_updated_at >= since`, in store (creation) order.
    async fn find_recent_events(&self, since: DateTime<Utc>) -> Result<Vec<Event>>;

    async fn article_exists(&self, external_url: &str) -> Result<bool>;

    /// Create an event with a fresh, never reused `event_key`.
    async fn create_event(&self, new: NewEvent) -> Result<Event>;

    /// `last_updated_at = max(last_updated_at, published_at)`.
    async fn touch_event(&self, event_id: Uuid, published_at: DateTime<Utc>) -> Result<()>;

    /// Fails when `external_url` is already stored or the event is unknown.
    async fn insert_article(&self, article: &RawArticle, event_id: Uuid) -> Result<Article>;

    /// Create an event together with its first article. Stores that can do
    /// this atomically should override it so no event is ever left empty.
    async fn create_event_with_article(
        &self,
        new: NewEvent,
        article: &RawArticle,
    ) -> Result<(Event, Article)> {
        let event = self.create_event(new).await?;
        let article = self.insert_article(article, event.id).await?;
        Ok((event, article))
    }

    /// Downstream read: title substring (case-insensitive), newest first, limited.
    async fn search_events(&self, query: &EventQuery) -> Result<Vec<EventWithArticles>>;
}

/// `<peril>-<unix millis>-<8 hex>`, e.g. `earthquake-1760608800000-9f2c01ab`.
pub fn generate_event_key(peril: crate::peril::Peril, at: DateTime<Utc>) -> String {
    let rand = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}",
        peril.as_str().to_ascii_lowercase(),
        at.timestamp_millis(),
        &rand[..8]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peril::Peril;

    #[test]
    fn event_keys_are_prefixed_and_distinct() {
        let at = Utc::now();
        let a = generate_event_key(Peril::Flood, at);
        let b = generate_event_key(Peril::Flood, at);
        assert!(a.starts_with(&format!("flood-{}-", at.timestamp_millis())));
        assert_ne!(a, b);
    }
}
