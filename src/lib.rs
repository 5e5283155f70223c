// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod clock;
pub mod config;
pub mod error;
pub mod ingest;
pub mod matcher;
pub mod metrics;
pub mod model;
pub mod peril;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::error::IngestError;
pub use crate::ingest::{Ingestor, RunReport};
pub use crate::matcher::{EventMatcher, MatchStrategy};
pub use crate::model::{Article, Event, RawArticle, Source, SourceKind};
pub use crate::peril::{classify, Peril};
pub use crate::store::{EventStore, MemoryStore};
