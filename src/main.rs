//! Hazard ingest service: binary entrypoint.
//! Wires config, store, adapters and the scheduler, then serves `/health` and
//! `/metrics`. With `INGEST_ONCE=1` it runs the pipeline once and prints
//! `{"count":N}` instead.

use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hazard_ingest::config::AppConfig;
use hazard_ingest::ingest::config::FileSourceRegistry;
use hazard_ingest::ingest::providers::{http_client, Adapters};
use hazard_ingest::ingest::{scheduler, IngestSettings, Ingestor};
use hazard_ingest::metrics::Metrics;
use hazard_ingest::store::{EventStore, MemoryStore};
use hazard_ingest::EventMatcher;

/// `LOG_FORMAT=json` switches to JSON lines; otherwise compact text.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("hazard_ingest=info,ingest=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

fn run_once_requested() -> bool {
    std::env::var("INGEST_ONCE").ok().is_some_and(|v| v == "1")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // No-op when .env is absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load_default().context("loading ingest config")?;
    tracing::info!(?cfg, "config loaded");

    let metrics = Metrics::init()?;

    let store: Arc<dyn EventStore> = match &cfg.snapshot_path {
        Some(p) => Arc::new(MemoryStore::open(p).await?),
        None => Arc::new(MemoryStore::new()),
    };

    let client = http_client(&cfg.user_agent, cfg.fetch_timeout())?;
    let ingestor = Arc::new(
        Ingestor::new(
            Arc::new(FileSourceRegistry::new(cfg.sources_path.clone())),
            Adapters::http(client, cfg.fetch_timeout()),
            store,
        )
        .with_matcher(EventMatcher::new(cfg.similarity_threshold, cfg.match_strategy))
        .with_settings(IngestSettings::from_config(&cfg)),
    );

    if run_once_requested() {
        let report = ingestor.run().await?;
        println!("{}", serde_json::json!({ "count": report.inserted }));
        return Ok(());
    }

    let _scheduler = scheduler::spawn_hourly(ingestor, cfg.interval());

    let listener = tokio::net::TcpListener::bind(&cfg.metrics_addr)
        .await
        .with_context(|| format!("binding {}", cfg.metrics_addr))?;
    tracing::info!(addr = %cfg.metrics_addr, "serving /health and /metrics");
    axum::serve(listener, metrics.router())
        .await
        .context("http server")?;
    Ok(())
}
