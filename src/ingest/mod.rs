// src/ingest/mod.rs
//! Ingest orchestrator: one pipeline run over every enabled source.
//!
//! 1. read enabled sources (fatal on failure)
//! 2. fetch all sources concurrently, each fetch bounded by its own deadline
//! 3. commit serially: dedupe by url, match against the recent-events window,
//!    create or touch the event, insert the article
//!
//! The commit stage is a single writer and [`Ingestor::run`] refuses to overlap
//! with itself, so two candidates can never race into creating two events.

pub mod config;
pub mod providers;
pub mod scheduler;
pub mod types;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::app::MAX_WINDOW_DAYS;
use crate::config::AppConfig;
use crate::error::IngestError;
use crate::ingest::config::SourceRegistry;
use crate::ingest::providers::Adapters;
use crate::matcher::EventMatcher;
use crate::model::{Event, NewEvent, RawArticle, Source};
use crate::store::EventStore;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_runs_total", "Ingest runs started.");
        describe_counter!(
            "ingest_articles_inserted_total",
            "Articles persisted by ingest runs."
        );
        describe_counter!(
            "ingest_candidates_total",
            "Candidate articles routed to the commit stage."
        );
        describe_counter!(
            "ingest_duplicates_total",
            "Candidates skipped because their url is already stored."
        );
        describe_counter!("ingest_events_created_total", "New events created.");
        describe_counter!(
            "ingest_events_merged_total",
            "Articles attached to an existing event."
        );
        describe_counter!(
            "ingest_source_errors_total",
            "Source fetch/parse errors and timeouts."
        );
        describe_counter!(
            "ingest_store_errors_total",
            "Storage calls that failed or timed out."
        );
        describe_counter!(
            "ingest_run_deadline_exceeded_total",
            "Runs stopped early by the run deadline."
        );
        describe_histogram!("ingest_fetch_ms", "Per-source fetch time in milliseconds.");
        describe_gauge!("ingest_last_run_ts", "Unix ts when the last ingest run finished.");
    });
}

/// Decode entities, strip tags, straighten quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    collapse_whitespace(&out)
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First `max` characters (not bytes) of `s`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Stand-in deadline when a configured run timeout does not fit an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Timing knobs for a run.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub window: chrono::Duration,
    pub fetch_concurrency: usize,
    pub store_timeout: Duration,
    pub run_timeout: Duration,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl IngestSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            window: chrono::Duration::days(cfg.window_days.clamp(1, MAX_WINDOW_DAYS)),
            fetch_concurrency: cfg.fetch_concurrency.max(1),
            store_timeout: cfg.store_timeout(),
            run_timeout: cfg.run_timeout(),
        }
    }
}

/// What a run did. Callers only need `inserted`; the rest is for logs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub inserted: usize,
    pub sources: usize,
    pub candidates: usize,
    pub duplicates: usize,
    pub events_created: usize,
    pub events_merged: usize,
    pub failures: usize,
    pub deadline_hit: bool,
    pub elapsed: Duration,
}

enum Outcome {
    Duplicate,
    Created,
    Merged(Uuid),
}

/// Clears the in-flight flag when the run ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Ingestor {
    registry: Arc<dyn SourceRegistry>,
    adapters: Adapters,
    store: Arc<dyn EventStore>,
    matcher: EventMatcher,
    clock: Arc<dyn Clock>,
    settings: IngestSettings,
    running: AtomicBool,
}

impl Ingestor {
    pub fn new(
        registry: Arc<dyn SourceRegistry>,
        adapters: Adapters,
        store: Arc<dyn EventStore>,
    ) -> Self {
        Self {
            registry,
            adapters,
            store,
            matcher: EventMatcher::default(),
            clock: Arc::new(SystemClock),
            settings: IngestSettings::default(),
            running: AtomicBool::new(false),
        }
    }

    pub fn with_matcher(mut self, matcher: EventMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_settings(mut self, settings: IngestSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run the pipeline once. `Ok` carries the count of newly persisted
    /// articles; `Err` is reserved for run-level failures.
    pub async fn run(&self) -> Result<RunReport, IngestError> {
        let _guard = RunGuard::acquire(&self.running).ok_or(IngestError::AlreadyRunning)?;
        ensure_metrics_described();
        counter!("ingest_runs_total").increment(1);

        let started = Instant::now();
        let deadline = started
            .checked_add(self.settings.run_timeout)
            .unwrap_or_else(|| started + FAR_FUTURE);

        let sources = self
            .store_call("enabled_sources", self.registry.enabled_sources())
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, "source registry read failed; aborting run");
                IngestError::SourceRegistry(e)
            })?;

        let mut report = RunReport {
            sources: sources.len(),
            ..Default::default()
        };

        let fetched = self.fetch_all(sources, deadline).await;

        for (source, articles) in fetched {
            if Instant::now() >= deadline {
                report.deadline_hit = true;
                break;
            }
            self.commit_source(&source, articles, deadline, &mut report)
                .await;
        }

        if report.deadline_hit {
            counter!("ingest_run_deadline_exceeded_total").increment(1);
            tracing::warn!(
                inserted = report.inserted,
                run_timeout_secs = self.settings.run_timeout.as_secs(),
                "run deadline reached; remaining candidates left for the next run"
            );
        }

        report.elapsed = started.elapsed();
        gauge!("ingest_last_run_ts").set(self.clock.now().timestamp() as f64);
        tracing::info!(
            target: "ingest",
            inserted = report.inserted,
            sources = report.sources,
            candidates = report.candidates,
            duplicates = report.duplicates,
            events_created = report.events_created,
            events_merged = report.events_merged,
            failures = report.failures,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "ingest run finished"
        );
        Ok(report)
    }

    /// Fetch every source concurrently; results come back in registry order.
    async fn fetch_all(
        &self,
        sources: Vec<Source>,
        deadline: Instant,
    ) -> Vec<(Source, Vec<RawArticle>)> {
        let now = self.clock.now();
        let adapters = &self.adapters;
        stream::iter(sources)
            .map(|source| async move {
                let articles =
                    match tokio::time::timeout_at(deadline, adapters.fetch(&source, now)).await {
                        Ok(v) => v,
                        Err(_) => {
                            tracing::warn!(source_id = %source.id, "fetch cut by run deadline");
                            counter!("ingest_source_errors_total").increment(1);
                            Vec::new()
                        }
                    };
                (source, articles)
            })
            .buffered(self.settings.fetch_concurrency)
            .collect()
            .await
    }

    async fn commit_source(
        &self,
        source: &Source,
        articles: Vec<RawArticle>,
        deadline: Instant,
        report: &mut RunReport,
    ) {
        if articles.is_empty() {
            return;
        }
        let since = self
            .clock
            .now()
            .checked_sub_signed(self.settings.window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let mut window = match self
            .store_call("find_recent_events", self.store.find_recent_events(since))
            .await
        {
            Ok(w) => w,
            Err(e) => {
                tracing::warn!(source_id = %source.id, error = ?e, "recent events read failed; source skipped");
                counter!("ingest_store_errors_total").increment(1);
                report.failures += articles.len();
                return;
            }
        };

        for article in articles {
            if Instant::now() >= deadline {
                report.deadline_hit = true;
                return;
            }
            report.candidates += 1;
            counter!("ingest_candidates_total").increment(1);

            match self.commit_article(&article, since, &mut window).await {
                Ok(Outcome::Duplicate) => {
                    report.duplicates += 1;
                    counter!("ingest_duplicates_total").increment(1);
                }
                Ok(Outcome::Created) => {
                    report.inserted += 1;
                    report.events_created += 1;
                    counter!("ingest_articles_inserted_total").increment(1);
                    counter!("ingest_events_created_total").increment(1);
                }
                Ok(Outcome::Merged(event_id)) => {
                    report.inserted += 1;
                    report.events_merged += 1;
                    counter!("ingest_articles_inserted_total").increment(1);
                    counter!("ingest_events_merged_total").increment(1);
                    tracing::debug!(%event_id, url = %article.url, "article merged into event");
                }
                Err(e) => {
                    report.failures += 1;
                    counter!("ingest_store_errors_total").increment(1);
                    tracing::warn!(
                        source_id = %source.id,
                        url = %article.url,
                        error = ?e,
                        "article skipped after storage error"
                    );
                }
            }
        }
    }

    async fn commit_article(
        &self,
        article: &RawArticle,
        since: DateTime<Utc>,
        window: &mut Vec<Event>,
    ) -> Result<Outcome> {
        if self
            .store_call("article_exists", self.store.article_exists(&article.url))
            .await?
        {
            return Ok(Outcome::Duplicate);
        }

        match self.matcher.find_match(article, window) {
            Some(event_id) => {
                self.store_call(
                    "touch_event",
                    self.store.touch_event(event_id, article.published_at),
                )
                .await?;
                if let Err(e) = self
                    .store_call("insert_article", self.store.insert_article(article, event_id))
                    .await
                {
                    if !self.write_landed(&article.url).await {
                        return Err(e);
                    }
                    tracing::warn!(
                        url = %article.url,
                        error = ?e,
                        "insert acknowledged late; article is stored"
                    );
                }
                if let Some(ev) = window.iter_mut().find(|e| e.id == event_id) {
                    if article.published_at > ev.last_updated_at {
                        ev.last_updated_at = article.published_at;
                    }
                }
                Ok(Outcome::Merged(event_id))
            }
            None => {
                let created = self
                    .store_call(
                        "create_event_with_article",
                        self.store
                            .create_event_with_article(NewEvent::from_article(article), article),
                    )
                    .await;
                let event = match created {
                    Ok((event, _)) => event,
                    Err(e) => {
                        if !self.write_landed(&article.url).await {
                            return Err(e);
                        }
                        // the new event is stored but unknown here; pick it up
                        tracing::warn!(
                            url = %article.url,
                            error = ?e,
                            "create acknowledged late; reloading window"
                        );
                        match self
                            .store_call("find_recent_events", self.store.find_recent_events(since))
                            .await
                        {
                            Ok(fresh) => *window = fresh,
                            Err(e) => {
                                counter!("ingest_store_errors_total").increment(1);
                                tracing::warn!(error = ?e, "window reload failed; window may miss one event");
                            }
                        }
                        return Ok(Outcome::Created);
                    }
                };
                tracing::debug!(
                    event_id = %event.id,
                    event_key = %event.event_key,
                    peril = %event.peril,
                    "event created"
                );
                if event.last_updated_at >= since {
                    window.push(event);
                }
                Ok(Outcome::Created)
            }
        }
    }

    /// After a failed or timed-out write: did the article make it into the store anyway?
    async fn write_landed(&self, url: &str) -> bool {
        matches!(
            self.store_call("article_exists", self.store.article_exists(url)).await,
            Ok(true)
        )
    }

    /// Bound a storage/registry call by the per-call deadline.
    async fn store_call<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.settings.store_timeout, fut).await {
            Ok(res) => res,
            Err(_) => Err(anyhow!(
                "{op} timed out after {}ms",
                self.settings.store_timeout.as_millis()
            )),
        }
    }
}
