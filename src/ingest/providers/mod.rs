// src/ingest/providers/mod.rs
//! Source adapters and the per-kind dispatcher.
//!
//! | Kind | Module | Payload |
//! |------|--------|---------|
//! | `feed` | [`feed`] | RSS 2.0 / Atom |
//! | `structured-api` | [`quake_api`] | GeoJSON feature list |
//! | `html-scrape` | [`html`] | arbitrary HTML, heuristic extraction |
//!
//! [`Adapters::fetch`] is the only entry the orchestrator uses: it never fails.
//! Network, status, parse and timeout errors become an empty list plus a log line.

pub mod feed;
pub mod html;
pub mod quake_api;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::ingest::types::SourceAdapter;
use crate::model::{RawArticle, Source};

pub use feed::FeedAdapter;
pub use html::HtmlScrapeAdapter;
pub use quake_api::QuakeApiAdapter;

/// Shared outbound client. The User-Agent is sent to every source.
pub fn http_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
        .context("building http client")
}

pub(crate) async fn fetch_text(client: &reqwest::Client, url: &str) -> Result<String> {
    let resp = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("GET {url}"))?
        .error_for_status()
        .with_context(|| format!("GET {url}"))?;
    resp.text().await.with_context(|| format!("reading body of {url}"))
}

pub struct Adapters {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    fetch_timeout: Duration,
}

impl Adapters {
    pub fn empty(fetch_timeout: Duration) -> Self {
        Self {
            adapters: Vec::new(),
            fetch_timeout,
        }
    }

    /// The three built-in adapters sharing one client.
    pub fn http(client: reqwest::Client, fetch_timeout: Duration) -> Self {
        Self::empty(fetch_timeout)
            .with(FeedAdapter::new(client.clone()))
            .with(QuakeApiAdapter::new(client.clone()))
            .with(HtmlScrapeAdapter::new(client))
    }

    /// Register an adapter; a later registration for the same kind wins.
    pub fn with<A: SourceAdapter + 'static>(mut self, adapter: A) -> Self {
        self.adapters.retain(|a| a.kind() != adapter.kind());
        self.adapters.push(Arc::new(adapter));
        self
    }

    /// Fetch one source. Failures are logged and yield an empty list.
    pub async fn fetch(&self, source: &Source, now: DateTime<Utc>) -> Vec<RawArticle> {
        let Some(adapter) = self.adapters.iter().find(|a| a.kind() == source.kind) else {
            tracing::warn!(source_id = %source.id, kind = %source.kind, "no adapter for source kind");
            counter!("ingest_source_errors_total").increment(1);
            return Vec::new();
        };

        let t0 = Instant::now();
        let res = tokio::time::timeout(self.fetch_timeout, adapter.fetch(source, now)).await;
        histogram!("ingest_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        let articles = match res {
            Ok(Ok(v)) => v,
            Ok(Err(e)) => {
                tracing::warn!(source_id = %source.id, kind = %source.kind, error = ?e, "source fetch failed");
                counter!("ingest_source_errors_total").increment(1);
                return Vec::new();
            }
            Err(_) => {
                tracing::warn!(
                    source_id = %source.id,
                    timeout_ms = self.fetch_timeout.as_millis() as u64,
                    "source fetch timed out"
                );
                counter!("ingest_source_errors_total").increment(1);
                return Vec::new();
            }
        };

        let total = articles.len();
        let kept: Vec<RawArticle> = articles.into_iter().filter(RawArticle::is_well_formed).collect();
        tracing::info!(
            source_id = %source.id,
            kind = %source.kind,
            fetched = total,
            kept = kept.len(),
            "source fetched"
        );
        kept
    }
}
