// src/error.rs
//! Run-level failures. Everything below the run (a source, an article) is
//! handled in place and only shows up in logs and metrics.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    /// The source registry could not be read; nothing was fetched or counted.
    #[error("cannot enumerate sources: {0:#}")]
    SourceRegistry(#[source] anyhow::Error),

    /// A previous run is still in flight.
    #[error("an ingest run is already in progress")]
    AlreadyRunning,
}
