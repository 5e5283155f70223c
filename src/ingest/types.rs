// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::model::{RawArticle, Source, SourceKind};

/// One adapter per source kind. Payload shapes stay private to the adapter;
/// only normalized [`RawArticle`]s cross this boundary.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Fetch and normalize `source`. `now` is used where the source gives no
    /// publish date. Errors are handled by the dispatcher, not the caller.
    async fn fetch(&self, source: &Source, now: DateTime<Utc>) -> Result<Vec<RawArticle>>;
}
