// src/config/app.rs
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use crate::matcher::{MatchStrategy, DEFAULT_SIMILARITY_THRESHOLD};

pub const ENV_CONFIG_PATH: &str = "INGEST_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/ingest.toml";

/// Upper bound for the lookback window.
pub const MAX_WINDOW_DAYS: i64 = 365;

fn default_interval_secs() -> u64 {
    3600
}
fn default_window_days() -> i64 {
    7
}
fn default_threshold() -> f64 {
    DEFAULT_SIMILARITY_THRESHOLD
}
fn default_fetch_concurrency() -> usize {
    4
}
fn default_fetch_timeout_secs() -> u64 {
    30
}
fn default_store_timeout_secs() -> u64 {
    10
}
fn default_run_timeout_secs() -> u64 {
    3000
}
fn default_user_agent() -> String {
    "Bot/1.0".to_string()
}
fn default_metrics_addr() -> String {
    "127.0.0.1:9000".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Source registry file; `None` uses the registry's own lookup order.
    #[serde(default)]
    pub sources_path: Option<PathBuf>,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Trailing lookback for candidate events.
    #[serde(default = "default_window_days")]
    pub window_days: i64,
    /// Titles must score strictly above this to merge. Must lie in (0, 1].
    #[serde(default = "default_threshold")]
    pub similarity_threshold: f64,
    #[serde(default)]
    pub match_strategy: MatchStrategy,
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_store_timeout_secs")]
    pub store_timeout_secs: u64,
    /// Whole-run budget; keep it below `interval_secs`.
    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// JSON snapshot for the bundled store; `None` keeps everything in memory.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
    #[serde(default = "default_metrics_addr")]
    pub metrics_addr: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sources_path: None,
            interval_secs: default_interval_secs(),
            window_days: default_window_days(),
            similarity_threshold: default_threshold(),
            match_strategy: MatchStrategy::default(),
            fetch_concurrency: default_fetch_concurrency(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            store_timeout_secs: default_store_timeout_secs(),
            run_timeout_secs: default_run_timeout_secs(),
            user_agent: default_user_agent(),
            snapshot_path: None,
            metrics_addr: default_metrics_addr(),
        }
    }
}

impl AppConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        let cfg: AppConfig = toml::from_str(&data)?;
        Ok(cfg.sanitized())
    }

    /// `$INGEST_CONFIG_PATH`, then `config/ingest.toml`, then defaults.
    /// Env overrides are applied last.
    pub fn load_default() -> anyhow::Result<Self> {
        let cfg = match env::var(ENV_CONFIG_PATH) {
            Ok(p) => Self::load_from_file(&p)
                .map_err(|e| anyhow::anyhow!("loading {ENV_CONFIG_PATH}={p}: {e:#}"))?,
            Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::load_from_file(DEFAULT_CONFIG_PATH)?
            }
            Err(_) => Self::default(),
        };
        Ok(cfg.with_env_overrides())
    }

    fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env::var("INGEST_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            self.interval_secs = v;
        }
        if let Ok(addr) = env::var("INGEST_METRICS_ADDR") {
            self.metrics_addr = addr;
        }
        self.sanitized()
    }

    fn sanitized(mut self) -> Self {
        if !(self.similarity_threshold > 0.0 && self.similarity_threshold <= 1.0) {
            self.similarity_threshold = default_threshold();
        }
        if self.window_days <= 0 {
            self.window_days = default_window_days();
        }
        self.window_days = self.window_days.min(MAX_WINDOW_DAYS);
        if self.interval_secs == 0 {
            self.interval_secs = default_interval_secs();
        }
        if self.fetch_concurrency == 0 {
            self.fetch_concurrency = default_fetch_concurrency();
        }
        if self.fetch_timeout_secs == 0 {
            self.fetch_timeout_secs = default_fetch_timeout_secs();
        }
        if self.store_timeout_secs == 0 {
            self.store_timeout_secs = default_store_timeout_secs();
        }
        if self.run_timeout_secs == 0 {
            self.run_timeout_secs = default_run_timeout_secs();
        }
        // a run must end before the next tick; calls must fit inside a run
        self.run_timeout_secs = self.run_timeout_secs.min(self.interval_secs);
        self.fetch_timeout_secs = self.fetch_timeout_secs.min(self.run_timeout_secs);
        self.store_timeout_secs = self.store_timeout_secs.min(self.run_timeout_secs);
        if self.user_agent.trim().is_empty() {
            self.user_agent = default_user_agent();
        }
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
