// src/ingest/providers/html.rs
//! Best-effort HTML scrape adapter.
//!
//! Structural heuristic over pages that promise no structure:
//! - containers: `article, .post`
//! - title: text of the first `h2, .title` inside the container
//! - link: `href` of the first anchor, resolved against the page URL
//! - summary: first 200 characters of the container's visible text
//!
//! Containers missing a title or a link are dropped. Peril comes from the title only.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::fetch_text;
use crate::ingest::types::SourceAdapter;
use crate::ingest::{collapse_whitespace, truncate_chars};
use crate::model::{RawArticle, Source, SourceKind};
use crate::peril::classify;

pub const HTML_SUMMARY_MAX_CHARS: usize = 200;

const CONTAINER_SELECTOR: &str = "article, .post";
const TITLE_SELECTOR: &str = "h2, .title";
const LINK_SELECTOR: &str = "a";

pub struct HtmlScrapeAdapter {
    client: reqwest::Client,
}

impl HtmlScrapeAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SourceAdapter for HtmlScrapeAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::HtmlScrape
    }

    async fn fetch(&self, source: &Source, now: DateTime<Utc>) -> Result<Vec<RawArticle>> {
        let body = fetch_text(&self.client, &source.base_url).await?;
        parse_page(&body, &source.base_url, &source.id, now)
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector {css:?}: {e}"))
}

fn element_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

/// Extract candidate articles from an HTML page fetched from `page_url`.
pub fn parse_page(
    html: &str,
    page_url: &str,
    source_id: &str,
    now: DateTime<Utc>,
) -> Result<Vec<RawArticle>> {
    let base = Url::parse(page_url).with_context(|| format!("invalid page url {page_url}"))?;
    let containers = selector(CONTAINER_SELECTOR)?;
    let titles = selector(TITLE_SELECTOR)?;
    let links = selector(LINK_SELECTOR)?;

    let document = Html::parse_document(html);
    let mut out = Vec::new();

    for el in document.select(&containers) {
        let title = el.select(&titles).next().map(element_text).unwrap_or_default();
        let href = el
            .select(&links)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(str::trim)
            .unwrap_or_default();
        if title.is_empty() || href.is_empty() {
            continue;
        }
        let Ok(url) = base.join(href) else {
            tracing::debug!(source_id, href, "unresolvable link dropped");
            continue;
        };

        let summary = truncate_chars(&element_text(el), HTML_SUMMARY_MAX_CHARS)
            .trim()
            .to_string();
        out.push(RawArticle {
            source_id: source_id.to_string(),
            peril: classify(&title),
            title,
            url: url.to_string(),
            summary,
            published_at: now,
            lat: None,
            lng: None,
            location_text: None,
        });
    }

    tracing::debug!(source_id, count = out.len(), "html containers extracted");
    Ok(out)
}
