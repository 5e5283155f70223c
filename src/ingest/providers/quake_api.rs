// src/ingest/providers/quake_api.rs
//! Structured seismic API adapter (GeoJSON `FeatureCollection`, USGS-style).
//!
//! Every feature becomes an `Earthquake` article titled `M<mag> Earthquake - <place>`
//! with coordinates copied from the geometry (`[lng, lat, depth]`).

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::fetch_text;
use crate::ingest::types::SourceAdapter;
use crate::model::{RawArticle, Source, SourceKind};
use crate::peril::Peril;

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    properties: Properties,
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
struct Properties {
    mag: Option<f64>,
    place: Option<String>,
    /// Epoch milliseconds.
    time: Option<i64>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(default)]
    coordinates: Vec<f64>,
}

pub struct QuakeApiAdapter {
    client: reqwest::Client,
}

impl QuakeApiAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SourceAdapter for QuakeApiAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::StructuredApi
    }

    async fn fetch(&self, source: &Source, now: DateTime<Utc>) -> Result<Vec<RawArticle>> {
        let body = fetch_text(&self.client, &source.base_url).await?;
        parse_features(&body, &source.id, now)
    }
}

pub fn parse_features(json: &str, source_id: &str, now: DateTime<Utc>) -> Result<Vec<RawArticle>> {
    let fc: FeatureCollection = serde_json::from_str(json).context("parsing feature collection")?;

    let mut out = Vec::with_capacity(fc.features.len());
    for f in fc.features {
        let p = f.properties;
        let (Some(mag), Some(url)) = (p.mag, p.url.filter(|u| !u.trim().is_empty())) else {
            tracing::debug!(source_id, "feature without magnitude or url dropped");
            continue;
        };
        let place = p
            .place
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let place_label = place.as_deref().unwrap_or("unknown location");

        let (lng, lat) = match f.geometry.as_ref().map(|g| g.coordinates.as_slice()) {
            Some([lng, lat, ..]) => (Some(*lng), Some(*lat)),
            _ => (None, None),
        };

        out.push(RawArticle {
            source_id: source_id.to_string(),
            title: format!("M{mag} Earthquake - {place_label}"),
            url: url.trim().to_string(),
            summary: format!("Magnitude {mag} near {place_label}."),
            published_at: p
                .time
                .and_then(DateTime::<Utc>::from_timestamp_millis)
                .unwrap_or(now),
            peril: Peril::Earthquake,
            lat,
            lng,
            location_text: place,
        });
    }
    Ok(out)
}
