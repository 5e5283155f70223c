// src/ingest/config.rs
//! Source registry: the externally administered list of sources.
//!
//! Read fresh on every run. TOML (`[[sources]]`) and JSON (bare array or
//! `{"sources": [...]}`) are both accepted.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::Source;

pub const ENV_SOURCES_PATH: &str = "INGEST_SOURCES_PATH";

#[async_trait]
pub trait SourceRegistry: Send + Sync {
    /// Sources with `enabled = true`, in registry order. An error here is fatal
    /// for the run.
    async fn enabled_sources(&self) -> Result<Vec<Source>>;
}

/// File-backed registry. Without an explicit path it resolves
/// `$INGEST_SOURCES_PATH`, then `config/sources.toml`, then `config/sources.json`.
#[derive(Debug, Clone, Default)]
pub struct FileSourceRegistry {
    path: Option<PathBuf>,
}

impl FileSourceRegistry {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

#[async_trait]
impl SourceRegistry for FileSourceRegistry {
    async fn enabled_sources(&self) -> Result<Vec<Source>> {
        let path = self.path.clone();
        let all = tokio::task::spawn_blocking(move || match path {
            Some(p) => load_sources_from(&p),
            None => load_sources_default(),
        })
        .await
        .context("source registry task")??;
        Ok(all.into_iter().filter(|s| s.enabled).collect())
    }
}

/// Fixed in-memory registry.
#[derive(Debug, Clone, Default)]
pub struct StaticSourceRegistry {
    sources: Vec<Source>,
}

impl StaticSourceRegistry {
    pub fn new(sources: Vec<Source>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl SourceRegistry for StaticSourceRegistry {
    async fn enabled_sources(&self) -> Result<Vec<Source>> {
        Ok(self.sources.iter().filter(|s| s.enabled).cloned().collect())
    }
}

/// Load every source record (enabled or not) from an explicit path.
pub fn load_sources_from(path: &Path) -> Result<Vec<Source>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sources from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_sources(&content, ext.as_str())
        .with_context(|| format!("parsing sources from {}", path.display()))
}

pub fn load_sources_default() -> Result<Vec<Source>> {
    if let Ok(p) = std::env::var(ENV_SOURCES_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_sources_from(&pb);
        }
        bail!("{ENV_SOURCES_PATH} points to non-existent path {}", pb.display());
    }
    for candidate in ["config/sources.toml", "config/sources.json"] {
        let p = PathBuf::from(candidate);
        if p.exists() {
            return load_sources_from(&p);
        }
    }
    Err(anyhow!("no source registry found (set {ENV_SOURCES_PATH} or add config/sources.toml)"))
}

fn parse_sources(s: &str, hint_ext: &str) -> Result<Vec<Source>> {
    let parsed = match hint_ext {
        "toml" => parse_toml(s),
        "json" => parse_json(s),
        _ => parse_json(s).or_else(|_| parse_toml(s)),
    }?;
    clean_list(parsed)
}

#[derive(serde::Deserialize)]
struct Wrapped {
    sources: Vec<Source>,
}

fn parse_toml(s: &str) -> Result<Vec<Source>> {
    let v: Wrapped = toml::from_str(s)?;
    Ok(v.sources)
}

fn parse_json(s: &str) -> Result<Vec<Source>> {
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum JsonSources {
        List(Vec<Source>),
        Wrapped(Wrapped),
    }
    Ok(match serde_json::from_str::<JsonSources>(s)? {
        JsonSources::List(v) => v,
        JsonSources::Wrapped(w) => w.sources,
    })
}

/// Trim fields, reject blank ids/urls, keep the first record per id.
fn clean_list(items: Vec<Source>) -> Result<Vec<Source>> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for mut it in items {
        it.id = it.id.trim().to_string();
        it.base_url = it.base_url.trim().to_string();
        if it.id.is_empty() || it.base_url.is_empty() {
            bail!("source record with empty id or base_url");
        }
        if !seen.insert(it.id.clone()) {
            tracing::warn!(source_id = %it.id, "duplicate source id ignored");
            continue;
        }
        out.push(it);
    }
    Ok(out)
}
