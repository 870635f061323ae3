use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,
    pub cache_ttl_sec: Option<u64>,
    pub admin_key: Option<String>,
    pub markets: Option<Vec<String>>,
    pub cors_origins: Option<Vec<String>>,

    // Feature configs
    pub catalog: Option<CatalogConfig>,
    pub scheduler: Option<SchedulerConfig>,
    /// `[[market]]` tables overriding or adding per-market settings.
    pub market: Option<Vec<MarketConfig>>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct CatalogConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub token_url: Option<String>,
    pub api_base_url: Option<String>,
    pub request_timeout_sec: Option<u64>,
    pub max_retries: Option<u32>,
    pub max_backoff_sec: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: Option<bool>,
    pub snapshot_hour: Option<u32>,
    pub snapshot_minute: Option<u32>,
    pub timezone: Option<String>,
    pub cache_cleanup_interval_sec: Option<u64>,
    pub refresh_aggregates: Option<bool>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct MarketConfig {
    pub code: String,
    pub name: Option<String>,
    pub playlist_id: Option<String>,
    pub timezone: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
