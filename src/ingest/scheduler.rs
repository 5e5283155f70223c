// src/ingest/scheduler.rs
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::IngestError;
use crate::ingest::Ingestor;

/// Something that decides when the next run starts. `false` stops the driver.
#[async_trait]
pub trait Trigger: Send {
    async fn tick(&mut self) -> bool;
}

/// Fixed-interval trigger. The first tick fires immediately; ticks missed
/// while a run is still going are skipped, not queued.
pub struct IntervalTrigger {
    ticker: tokio::time::Interval,
}

impl IntervalTrigger {
    pub fn new(period: Duration) -> Self {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { ticker }
    }
}

#[async_trait]
impl Trigger for IntervalTrigger {
    async fn tick(&mut self) -> bool {
        self.ticker.tick().await;
        true
    }
}

/// Fires `n` times back to back, then stops.
pub struct CountedTrigger {
    remaining: usize,
}

impl CountedTrigger {
    pub fn new(n: usize) -> Self {
        Self { remaining: n }
    }
}

#[async_trait]
impl Trigger for CountedTrigger {
    async fn tick(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriveStats {
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub inserted: usize,
}

/// Run the ingestor on every trigger tick until the trigger stops.
pub async fn drive<T: Trigger>(ingestor: Arc<Ingestor>, mut trigger: T) -> DriveStats {
    let mut stats = DriveStats::default();
    while trigger.tick().await {
        match ingestor.run().await {
            Ok(report) => {
                stats.completed += 1;
                stats.inserted += report.inserted;
            }
            Err(IngestError::AlreadyRunning) => {
                stats.skipped += 1;
                tracing::info!(target: "ingest", "tick skipped; previous run still in flight");
            }
            Err(e) => {
                stats.failed += 1;
                tracing::error!(target: "ingest", error = %e, "ingest run failed");
            }
        }
    }
    stats
}

/// Spawn the periodic driver; `period` is one hour with the default config.
pub fn spawn_hourly(ingestor: Arc<Ingestor>, period: Duration) -> JoinHandle<DriveStats> {
    tracing::info!(target: "ingest", period_secs = period.as_secs(), "ingest scheduler started");
    tokio::spawn(drive(ingestor, IntervalTrigger::new(period)))
}
