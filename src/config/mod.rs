mod file_config;

pub use file_config::{CatalogConfig, FileConfig, MarketConfig, SchedulerConfig};

use crate::catalog_client::{CatalogClientConfig, CatalogCredentials};
use crate::server::RequestsLoggingLevel;
use anyhow::{anyhow, bail, Context, Result};
use chrono_tz::Tz;
use clap::ValueEnum;
use std::path::PathBuf;

pub const DEFAULT_MARKETS: &[&str] = &["IN", "US", "GB"];
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const DEFAULT_API_BASE_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

const INDIA_TOP_50_PLAYLIST_ID: &str = "37i9dQZEVXbLZ52XmnySJg";
const USA_TOP_50_PLAYLIST_ID: &str = "37i9dQZEVXbLRQDuF5jeBp";
const UK_TOP_50_PLAYLIST_ID: &str = "37i9dQZEVXbLnolsZ8PSNw";

/// (code, name, playlist id, timezone) for the markets known out of the box.
const BUILTIN_MARKETS: &[(&str, &str, &str, &str)] = &[
    ("IN", "India", INDIA_TOP_50_PLAYLIST_ID, "Asia/Kolkata"),
    ("US", "United States", USA_TOP_50_PLAYLIST_ID, "America/New_York"),
    ("GB", "United Kingdom", UK_TOP_50_PLAYLIST_ID, "Europe/London"),
];

/// Resolves a CLI path argument to an absolute path. Paths that do not exist
/// yet are kept as given, joined to the working directory.
pub fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub cache_ttl_sec: u64,
    pub catalog_client_id: Option<String>,
    pub catalog_client_secret: Option<String>,
    pub admin_key: Option<String>,
    pub markets: Option<String>,
    pub no_scheduler: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_dir: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub cache_ttl_sec: u64,
    pub admin_key: String,
    pub cors_origins: Vec<String>,

    pub markets: Vec<MarketSettings>,
    pub catalog: CatalogSettings,
    pub scheduler: SchedulerSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketSettings {
    pub code: String,
    pub name: String,
    pub playlist_id: String,
    pub timezone: Tz,
}

#[derive(Debug, Clone)]
pub struct CatalogSettings {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
    pub api_base_url: String,
    pub request_timeout_sec: u64,
    pub max_retries: u32,
    pub max_backoff_sec: u64,
}

impl CatalogSettings {
    pub fn client_config(&self) -> CatalogClientConfig {
        CatalogClientConfig {
            token_url: self.token_url.clone(),
            api_base_url: self.api_base_url.clone(),
            credentials: CatalogCredentials {
                client_id: self.client_id.clone(),
                client_secret: self.client_secret.clone(),
            },
            request_timeout_sec: self.request_timeout_sec,
            max_retries: self.max_retries,
            max_backoff_sec: self.max_backoff_sec,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub enabled: bool,
    pub snapshot_hour: u32,
    pub snapshot_minute: u32,
    pub timezone: Tz,
    pub cache_cleanup_interval_sec: u64,
    pub refresh_aggregates: bool,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            snapshot_hour: 0,
            snapshot_minute: 30,
            timezone: chrono_tz::Asia::Kolkata,
            cache_cleanup_interval_sec: 60,
            refresh_aggregates: true,
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| anyhow!("db_dir must be specified via --db-dir or in config file"))?;

        // Validate db_dir exists
        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let cache_ttl_sec = file.cache_ttl_sec.unwrap_or(cli.cache_ttl_sec);

        // Empty means admin routes reject every request
        let admin_key = file
            .admin_key
            .or_else(|| cli.admin_key.clone())
            .map(|k| k.trim().to_string())
            .unwrap_or_default();

        let cors_origins = file
            .cors_origins
            .unwrap_or_else(|| vec![DEFAULT_CORS_ORIGIN.to_string()]);

        let market_codes: Vec<String> = match (file.markets, &cli.markets) {
            (Some(list), _) => list,
            (None, Some(csv)) => csv.split(',').map(str::to_string).collect(),
            (None, None) => DEFAULT_MARKETS.iter().map(|m| m.to_string()).collect(),
        };
        let markets = resolve_markets(&market_codes, &file.market.unwrap_or_default())?;

        let catalog_file = file.catalog.unwrap_or_default();
        let catalog = CatalogSettings {
            client_id: catalog_file
                .client_id
                .or_else(|| cli.catalog_client_id.clone())
                .ok_or_else(|| anyhow!("Catalog client id is missing"))?,
            client_secret: catalog_file
                .client_secret
                .or_else(|| cli.catalog_client_secret.clone())
                .ok_or_else(|| anyhow!("Catalog client secret is missing"))?,
            token_url: catalog_file
                .token_url
                .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
            api_base_url: catalog_file
                .api_base_url
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            request_timeout_sec: catalog_file.request_timeout_sec.unwrap_or(30),
            max_retries: catalog_file.max_retries.unwrap_or(3),
            max_backoff_sec: catalog_file.max_backoff_sec.unwrap_or(60),
        };

        let scheduler_file = file.scheduler.unwrap_or_default();
        let defaults = SchedulerSettings::default();
        let scheduler = SchedulerSettings {
            enabled: !cli.no_scheduler && scheduler_file.enabled.unwrap_or(defaults.enabled),
            snapshot_hour: scheduler_file.snapshot_hour.unwrap_or(defaults.snapshot_hour),
            snapshot_minute: scheduler_file
                .snapshot_minute
                .unwrap_or(defaults.snapshot_minute),
            timezone: match scheduler_file.timezone {
                Some(tz) => parse_timezone(&tz)?,
                None => defaults.timezone,
            },
            cache_cleanup_interval_sec: scheduler_file
                .cache_cleanup_interval_sec
                .unwrap_or(defaults.cache_cleanup_interval_sec),
            refresh_aggregates: scheduler_file
                .refresh_aggregates
                .unwrap_or(defaults.refresh_aggregates),
        };
        if scheduler.snapshot_hour > 23 || scheduler.snapshot_minute > 59 {
            bail!(
                "Invalid snapshot time {:02}:{:02}",
                scheduler.snapshot_hour,
                scheduler.snapshot_minute
            );
        }
        if scheduler.cache_cleanup_interval_sec == 0 {
            bail!("cache_cleanup_interval_sec must be positive");
        }

        Ok(Self {
            db_dir,
            port,
            metrics_port,
            logging_level,
            cache_ttl_sec,
            admin_key,
            cors_origins,
            markets,
            catalog,
            scheduler,
        })
    }

    pub fn chart_db_path(&self) -> PathBuf {
        self.db_dir.join("charts.db")
    }

    /// Case-insensitive lookup of a configured market.
    pub fn market(&self, code: &str) -> Option<&MarketSettings> {
        self.markets
            .iter()
            .find(|m| m.code.eq_ignore_ascii_case(code.trim()))
    }
}

fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|e| anyhow!("Invalid timezone {:?}: {}", name, e))
}

fn builtin_market(code: &str) -> Option<(&'static str, &'static str, &'static str)> {
    BUILTIN_MARKETS
        .iter()
        .find(|(c, ..)| *c == code)
        .map(|(_, name, playlist, tz)| (*name, *playlist, *tz))
}

/// Builds market settings from the configured codes.
///
/// Overrides win over built-ins. Codes known to neither borrow the India
/// playlist and timezone.
fn resolve_markets(codes: &[String], overrides: &[MarketConfig]) -> Result<Vec<MarketSettings>> {
    let mut markets: Vec<MarketSettings> = Vec::new();
    for raw in codes {
        let code = raw.trim().to_uppercase();
        if code.is_empty() {
            continue;
        }
        if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            bail!("Invalid market code {:?}", raw);
        }
        if markets.iter().any(|m| m.code == code) {
            continue;
        }

        let (builtin_name, builtin_playlist, builtin_tz) = builtin_market(&code)
            .or_else(|| builtin_market("IN"))
            .ok_or_else(|| anyhow!("No built-in settings for {}", code))?;
        let known = builtin_market(&code).is_some();
        let over = overrides
            .iter()
            .find(|o| o.code.trim().eq_ignore_ascii_case(&code));

        let name = over
            .and_then(|o| o.name.clone())
            .unwrap_or_else(|| if known { builtin_name.to_string() } else { code.clone() });
        let playlist_id = over
            .and_then(|o| o.playlist_id.clone())
            .unwrap_or_else(|| builtin_playlist.to_string());
        let timezone = match over.and_then(|o| o.timezone.as_deref()) {
            Some(tz) => parse_timezone(tz)?,
            None => parse_timezone(builtin_tz)?,
        };

        markets.push(MarketSettings {
            code,
            name,
            playlist_id,
            timezone,
        });
    }

    if markets.is_empty() {
        bail!("At least one market must be configured");
    }
    Ok(markets)
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
