// src/store/memory.rs
//! In-process [`EventStore`] with an optional JSON snapshot on disk.
//!
//! The snapshot is loaded once on [`MemoryStore::open`] and rewritten (temp file +
//! rename) after every mutation. A failed snapshot write is logged and does not
//! undo the in-memory change.
//!
//! Each mutation and its snapshot write run together in a detached task: a caller
//! that gives up (timeout, cancelled run) cannot leave one without the other.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{generate_event_key, EventStore};
use crate::clock::{Clock, SystemClock};
use crate::model::{Article, Event, EventQuery, EventWithArticles, NewEvent, RawArticle};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    events: Vec<Event>,
    articles: Vec<Article>,
}

#[derive(Debug, Default)]
struct Inner {
    data: Snapshot,
    event_idx: HashMap<Uuid, usize>,
    event_keys: HashSet<String>,
    urls: HashSet<String>,
}

impl Inner {
    fn from_snapshot(data: Snapshot) -> Result<Self> {
        let mut inner = Inner {
            data,
            ..Default::default()
        };
        for (i, ev) in inner.data.events.iter().enumerate() {
            if inner.event_idx.insert(ev.id, i).is_some() {
                bail!("snapshot has duplicate event id {}", ev.id);
            }
            if !inner.event_keys.insert(ev.event_key.clone()) {
                bail!("snapshot has duplicate event key {}", ev.event_key);
            }
        }
        for a in &inner.data.articles {
            if !inner.urls.insert(a.external_url.clone()) {
                bail!("snapshot has duplicate article url {}", a.external_url);
            }
        }
        Ok(inner)
    }

    fn create_event(&mut self, new: NewEvent, now: DateTime<Utc>) -> Event {
        let mut key = generate_event_key(new.peril, now);
        while self.event_keys.contains(&key) {
            key = generate_event_key(new.peril, now);
        }
        let ev = Event {
            id: Uuid::new_v4(),
            canonical_title: new.canonical_title,
            peril: new.peril,
            location_text: new.location_text,
            lat: new.lat,
            lng: new.lng,
            event_key: key.clone(),
            created_at: now,
            last_updated_at: new.first_published_at,
        };
        self.event_keys.insert(key);
        self.event_idx.insert(ev.id, self.data.events.len());
        self.data.events.push(ev.clone());
        ev
    }

    fn check_insertable(&self, raw: &RawArticle, event_id: Uuid) -> Result<()> {
        if self.urls.contains(&raw.url) {
            bail!("article already stored: {}", raw.url);
        }
        if !self.event_idx.contains_key(&event_id) {
            bail!("unknown event {event_id}");
        }
        Ok(())
    }

    fn insert_article(&mut self, raw: &RawArticle, event_id: Uuid, now: DateTime<Utc>) -> Article {
        let article = Article::from_raw(raw, event_id, now);
        self.urls.insert(article.external_url.clone());
        self.data.articles.push(article.clone());
        article
    }
}

pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
    snapshot_path: Option<PathBuf>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Volatile store, nothing written to disk.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            snapshot_path: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Store backed by a JSON snapshot at `path`; a missing file starts empty.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let inner = match tokio::fs::read_to_string(&path).await {
            Ok(s) => {
                let snap: Snapshot = serde_json::from_str(&s)
                    .with_context(|| format!("parsing snapshot {}", path.display()))?;
                Inner::from_snapshot(snap)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Inner::default(),
            Err(e) => {
                return Err(e).with_context(|| format!("reading snapshot {}", path.display()))
            }
        };
        tracing::info!(
            path = %path.display(),
            events = inner.data.events.len(),
            articles = inner.data.articles.len(),
            "event store opened"
        );
        Ok(Self {
            inner: Arc::new(RwLock::new(inner)),
            snapshot_path: Some(path),
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn event_count(&self) -> usize {
        self.inner.read().await.data.events.len()
    }

    pub async fn article_count(&self) -> usize {
        self.inner.read().await.data.articles.len()
    }

    /// Articles attached to `event_id`, oldest first.
    pub async fn articles_for(&self, event_id: Uuid) -> Vec<Article> {
        let g = self.inner.read().await;
        articles_of(&g.data.articles, event_id)
    }

    pub async fn event(&self, event_id: Uuid) -> Option<Event> {
        let g = self.inner.read().await;
        g.event_idx.get(&event_id).map(|&i| g.data.events[i].clone())
    }

    /// Apply `f` under the write lock and persist when it reports a change.
    async fn mutate<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Inner, DateTime<Utc>) -> Result<(T, bool)> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let path = self.snapshot_path.clone();
        let now = self.clock.now();
        tokio::spawn(async move {
            let mut g = inner.write().await;
            let (out, dirty) = f(&mut g, now)?;
            if dirty {
                persist(path.as_deref(), &g.data).await;
            }
            Ok::<T, anyhow::Error>(out)
        })
        .await
        .context("store write task")?
    }
}

async fn persist(path: Option<&Path>, data: &Snapshot) {
    let Some(path) = path else {
        return;
    };
    if let Err(e) = write_snapshot(path, data).await {
        tracing::warn!(path = %path.display(), error = ?e, "snapshot write failed");
    }
}

fn articles_of(articles: &[Article], event_id: Uuid) -> Vec<Article> {
    let mut out: Vec<Article> = articles
        .iter()
        .filter(|a| a.event_id == event_id)
        .cloned()
        .collect();
    out.sort_by_key(|a| a.published_at);
    out
}

async fn write_snapshot(path: &Path, data: &Snapshot) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await?;
    }
    let bytes = serde_json::to_vec_pretty(data)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn find_recent_events(&self, since: DateTime<Utc>) -> Result<Vec<Event>> {
        let g = self.inner.read().await;
        Ok(g.data
            .events
            .iter()
            .filter(|e| e.last_updated_at >= since)
            .cloned()
            .collect())
    }

    async fn article_exists(&self, external_url: &str) -> Result<bool> {
        Ok(self.inner.read().await.urls.contains(external_url))
    }

    async fn create_event(&self, new: NewEvent) -> Result<Event> {
        self.mutate(move |g, now| Ok((g.create_event(new, now), true)))
            .await
    }

    async fn touch_event(&self, event_id: Uuid, published_at: DateTime<Utc>) -> Result<()> {
        self.mutate(move |g, _| {
            let idx = *g
                .event_idx
                .get(&event_id)
                .ok_or_else(|| anyhow!("unknown event {event_id}"))?;
            let ev = &mut g.data.events[idx];
            if published_at > ev.last_updated_at {
                ev.last_updated_at = published_at;
                return Ok(((), true));
            }
            Ok(((), false))
        })
        .await
    }

    async fn insert_article(&self, article: &RawArticle, event_id: Uuid) -> Result<Article> {
        let article = article.clone();
        self.mutate(move |g, now| {
            g.check_insertable(&article, event_id)?;
            Ok((g.insert_article(&article, event_id, now), true))
        })
        .await
    }

    async fn create_event_with_article(
        &self,
        new: NewEvent,
        article: &RawArticle,
    ) -> Result<(Event, Article)> {
        let article = article.clone();
        self.mutate(move |g, now| {
            if g.urls.contains(&article.url) {
                bail!("article already stored: {}", article.url);
            }
            let ev = g.create_event(new, now);
            let stored = g.insert_article(&article, ev.id, now);
            Ok(((ev, stored), true))
        })
        .await
    }

    async fn search_events(&self, query: &EventQuery) -> Result<Vec<EventWithArticles>> {
        let g = self.inner.read().await;
        let needle = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut hits: Vec<&Event> = g
            .data
            .events
            .iter()
            .filter(|e| match &needle {
                Some(n) => e.canonical_title.to_lowercase().contains(n.as_str()),
                None => true,
            })
            .collect();
        hits.sort_by(|a, b| b.last_updated_at.cmp(&a.last_updated_at));

        Ok(hits
            .into_iter()
            .take(query.limit)
            .map(|e| EventWithArticles {
                event: e.clone(),
                articles: articles_of(&g.data.articles, e.id),
            })
            .collect())
    }
}
