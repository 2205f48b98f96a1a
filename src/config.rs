//! Pipeline configuration.
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML file, then
//! `DEXSNAP__*` environment variables (`DEXSNAP__HTTP__RETRIES=4`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_CONFIG_FILE: &str = "dex-snap.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root under which `data/latest`, `data/daily_snapshots` and `data/history` live.
    pub repo_root: PathBuf,
    /// Per-run staging directories are created as `<staging_root>/<YYYYMMDD>`.
    pub staging_root: PathBuf,
    pub registry_dir: PathBuf,
    pub endpoints: Endpoints,
    pub http: HttpSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            repo_root: PathBuf::from("."),
            staging_root: PathBuf::from("tmp"),
            registry_dir: PathBuf::from("symbol_registry"),
            endpoints: Endpoints::default(),
            http: HttpSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Endpoints {
    pub drift_markets_url: String,
    pub hyperliquid_info_url: String,
    pub dydx_indexer_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            drift_markets_url: "https://api.cosmic.markets/api/drift/markets".into(),
            hyperliquid_info_url: "https://api.hyperliquid.xyz/info".into(),
            dydx_indexer_url: "https://indexer.dydx.trade".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpSettings {
    pub user_agent: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Retries after the first attempt.
    pub retries: u32,
    pub backoff_min_secs: f64,
    pub backoff_max_secs: f64,
    pub drift_page_size: u32,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: "dex-snap/1.0 (+snapshots)".into(),
            connect_timeout_secs: 10,
            request_timeout_secs: 20,
            retries: 2,
            backoff_min_secs: 0.4,
            backoff_max_secs: 1.6,
            drift_page_size: 200,
        }
    }
}

impl HttpSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl PipelineConfig {
    /// Load defaults, then `path` (or `dex-snap.toml` if present), then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        builder = match path {
            Some(p) => builder.add_source(File::from(p).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };
        builder = builder.add_source(
            Environment::with_prefix("DEXSNAP")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let cfg: PipelineConfig = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        debug!(?cfg, "loaded pipeline config");
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let h = &self.http;
        if !(h.backoff_min_secs >= 0.0 && h.backoff_min_secs <= h.backoff_max_secs) {
            return Err(ConfigError::Invalid(format!(
                "backoff range [{}, {}] is not ordered",
                h.backoff_min_secs, h.backoff_max_secs
            )));
        }
        if h.drift_page_size == 0 {
            return Err(ConfigError::Invalid("drift_page_size must be positive".into()));
        }
        Ok(())
    }

    pub fn latest_dir(&self) -> PathBuf {
        self.repo_root.join("data").join("latest")
    }

    pub fn registry_path(&self) -> PathBuf {
        self.repo_root.join(&self.registry_dir)
    }
}
