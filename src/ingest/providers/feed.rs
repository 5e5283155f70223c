// src/ingest/providers/feed.rs
//! Syndication feed adapter: RSS 2.0 first, Atom as a fallback.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

use super::fetch_text;
use crate::ingest::types::SourceAdapter;
use crate::ingest::{normalize_text, truncate_chars};
use crate::model::{RawArticle, Source, SourceKind};
use crate::peril::classify;

pub const FEED_SUMMARY_MAX_CHARS: usize = 300;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    title: Option<TextNode>,
    #[serde(default)]
    link: Vec<AtomLink>,
    summary: Option<TextNode>,
    content: Option<TextNode>,
    updated: Option<String>,
    published: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TextNode {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

impl Entry {
    fn alternate_href(&self) -> Option<String> {
        self.link
            .iter()
            .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
            .or_else(|| self.link.first())
            .and_then(|l| l.href.clone())
    }
}

/// Feed item reduced to the fields we keep, before classification.
struct FeedItem {
    title: String,
    link: String,
    text: String,
    published: Option<String>,
}

pub struct FeedAdapter {
    client: reqwest::Client,
}

impl FeedAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SourceAdapter for FeedAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Feed
    }

    async fn fetch(&self, source: &Source, now: DateTime<Utc>) -> Result<Vec<RawArticle>> {
        let body = fetch_text(&self.client, &source.base_url).await?;
        parse_feed(&body, &source.id, now)
    }
}

/// Parse an RSS or Atom document into candidate articles.
pub fn parse_feed(xml: &str, source_id: &str, now: DateTime<Utc>) -> Result<Vec<RawArticle>> {
    let xml_clean = scrub_html_entities_for_xml(xml);
    let items = match from_str::<Rss>(&xml_clean) {
        Ok(rss) => rss
            .channel
            .item
            .into_iter()
            .map(|it| FeedItem {
                title: it.title.unwrap_or_default(),
                link: it.link.unwrap_or_default(),
                text: it.description.unwrap_or_default(),
                published: it.pub_date,
            })
            .collect::<Vec<_>>(),
        Err(rss_err) => {
            let atom: AtomFeed = from_str(&xml_clean)
                .map_err(|atom_err| anyhow!("rss: {rss_err}; atom: {atom_err}"))
                .context("parsing feed xml")?;
            atom.entry
                .into_iter()
                .map(|e| FeedItem {
                    link: e.alternate_href().unwrap_or_default(),
                    title: e.title.map(|t| t.value).unwrap_or_default(),
                    text: e
                        .summary
                        .or(e.content)
                        .map(|t| t.value)
                        .unwrap_or_default(),
                    published: e.published.or(e.updated),
                })
                .collect()
        }
    };

    let mut out = Vec::with_capacity(items.len());
    for it in items {
        let title = normalize_text(&it.title);
        let link = it.link.trim().to_string();
        if title.is_empty() || link.is_empty() {
            tracing::debug!(source_id, "feed item without title or link dropped");
            continue;
        }
        let text = normalize_text(&it.text);
        let peril = classify(&format!("{title} {text}"));
        out.push(RawArticle {
            source_id: source_id.to_string(),
            summary: truncate_chars(&text, FEED_SUMMARY_MAX_CHARS),
            published_at: it
                .published
                .as_deref()
                .and_then(parse_feed_date)
                .unwrap_or(now),
            title,
            url: link,
            peril,
            lat: None,
            lng: None,
            location_text: None,
        });
    }
    Ok(out)
}

/// RFC 2822 (RSS `pubDate`) or RFC 3339 (Atom).
pub fn parse_feed_date(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    let odt = OffsetDateTime::parse(ts, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(ts, &Rfc3339))
        .ok()?;
    DateTime::from_timestamp(odt.unix_timestamp(), odt.nanosecond())
}

// quick-xml only knows the five XML entities.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peril::Peril;
    use chrono::TimeZone;

    #[test]
    fn rfc2822_and_rfc3339_dates_parse() {
        let want = Utc.with_ymd_and_hms(2026, 10, 14, 8, 30, 0).unwrap();
        assert_eq!(parse_feed_date("Wed, 14 Oct 2026 08:30:00 +0000"), Some(want));
        assert_eq!(parse_feed_date("2026-10-14T10:30:00+02:00"), Some(want));
        assert_eq!(parse_feed_date("yesterday"), None);
    }

    #[test]
    fn atom_entries_are_read() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Hazard wire</title>
  <entry>
    <title type="html">Cyclone Alfred nears Brisbane</title>
    <link rel="self" href="https://wire.test/self/1"/>
    <link rel="alternate" href="https://wire.test/alfred"/>
    <summary>Residents told to prepare &amp; evacuate.</summary>
    <updated>2026-10-14T08:30:00Z</updated>
  </entry>
</feed>"#;
        let now = Utc::now();
        let out = parse_feed(xml, "wire", now).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].url, "https://wire.test/alfred");
        assert_eq!(out[0].peril, Peril::Storm);
        assert_eq!(out[0].summary, "Residents told to prepare & evacuate.");
        assert_ne!(out[0].published_at, now);
    }

    #[test]
    fn html_page_yields_nothing() {
        let out = parse_feed("<html><body><p>nope</p></body></html>", "x", Utc::now());
        assert!(out.map(|v| v.is_empty()).unwrap_or(true));
    }
}
