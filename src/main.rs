use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chart_insights_server::aggregation::YearlyAggregator;
use chart_insights_server::background_jobs::jobs::{CacheCleanupJob, DailySnapshotJob};
use chart_insights_server::background_jobs::{JobContext, JobScheduler};
use chart_insights_server::cache::ResponseCache;
use chart_insights_server::catalog_client::CatalogClient;
use chart_insights_server::chart_store::SqliteChartStore;
use chart_insights_server::config::{parse_path, AppConfig, CliConfig, FileConfig};
use chart_insights_server::ingestion::IngestionService;
use chart_insights_server::server::{self, run_server, RequestsLoggingLevel, ServerConfig};
use chart_insights_server::ServerState;

/// Read-only connections kept open for request handlers.
const READ_POOL_SIZE: usize = 4;

#[derive(Parser, Debug)]
#[command(version, about = "Music chart snapshot and analytics server")]
struct CliArgs {
    /// Directory holding the SQLite chart database.
    #[clap(long, value_parser = parse_path, env = "DB_DIR")]
    pub db_dir: Option<PathBuf>,

    /// Path to a TOML config file. Its values override command line arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 8000)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// How long chart responses stay cached, in seconds.
    #[clap(long, default_value_t = 300)]
    pub cache_ttl_sec: u64,

    #[clap(long, env = "CATALOG_CLIENT_ID")]
    pub catalog_client_id: Option<String>,

    #[clap(long, env = "CATALOG_CLIENT_SECRET", hide_env_values = true)]
    pub catalog_client_secret: Option<String>,

    /// Secret expected in the X-Admin-Key header of admin routes.
    #[clap(long, env = "ADMIN_KEY", hide_env_values = true)]
    pub admin_key: Option<String>,

    /// Comma separated market codes, e.g. "IN,US,GB".
    #[clap(long, env = "MARKETS")]
    pub markets: Option<String>,

    /// Disable the daily snapshot and cache cleanup jobs.
    #[clap(long)]
    pub no_scheduler: bool,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            db_dir: self.db_dir.clone(),
            port: self.port,
            metrics_port: self.metrics_port,
            logging_level: self.logging_level.clone(),
            cache_ttl_sec: self.cache_ttl_sec,
            catalog_client_id: self.catalog_client_id.clone(),
            catalog_client_secret: self.catalog_client_secret.clone(),
            admin_key: self.admin_key.clone(),
            markets: self.markets.clone(),
            no_scheduler: self.no_scheduler,
        }
    }
}

async fn wait_for_ctrl_c(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl-C, shutting down..."),
        Err(err) => error!("Failed to listen for Ctrl-C: {}", err),
    }
    shutdown.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = cli_args
        .config
        .as_deref()
        .map(FileConfig::load)
        .transpose()?;
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;
    let markets: Vec<&str> = config.markets.iter().map(|m| m.code.as_str()).collect();
    info!("Configured markets: {}", markets.join(", "));
    if config.admin_key.is_empty() {
        warn!("No admin key configured, admin routes are disabled");
    }

    info!(
        "Opening SQLite chart database at {:?}...",
        config.chart_db_path()
    );
    let store = SqliteChartStore::new(config.chart_db_path(), READ_POOL_SIZE)?;

    info!("Initializing metrics...");
    server::metrics::init_metrics();

    let cache = Arc::new(ResponseCache::new(Duration::from_secs(config.cache_ttl_sec)));
    let catalog = Arc::new(CatalogClient::new(config.catalog.client_config()));
    let ingestion = Arc::new(IngestionService::new(
        store.clone(),
        catalog.clone(),
        cache.clone(),
        config.markets.clone(),
    ));
    let aggregator = YearlyAggregator::new(Arc::new(store.clone()));

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_ctrl_c(shutdown.clone()));

    let scheduler_task = if config.scheduler.enabled {
        let scheduler_settings = &config.scheduler;
        let job_context = JobContext::new(
            shutdown.child_token(),
            tokio::runtime::Handle::current(),
            ingestion.clone(),
            aggregator.clone(),
            cache.clone(),
        );
        let mut scheduler = JobScheduler::new(shutdown.clone(), job_context);
        scheduler.register_job(Arc::new(DailySnapshotJob::new(
            scheduler_settings.snapshot_hour,
            scheduler_settings.snapshot_minute,
            scheduler_settings.timezone,
            scheduler_settings.refresh_aggregates,
        )));
        scheduler.register_job(Arc::new(CacheCleanupJob::new(Duration::from_secs(
            scheduler_settings.cache_cleanup_interval_sec,
        ))));
        Some(tokio::spawn(async move { scheduler.run().await }))
    } else {
        info!("Background scheduler disabled");
        None
    };

    let state = ServerState {
        config: ServerConfig {
            requests_logging_level: config.logging_level.clone(),
            port: config.port,
            cache_ttl_sec: config.cache_ttl_sec,
            admin_key: config.admin_key.clone(),
            cors_origins: config.cors_origins.clone(),
        },
        start_time: Instant::now(),
        store: Arc::new(store),
        cache,
        catalog,
        ingestion,
        aggregator,
        hash: env!("GIT_HASH").to_string(),
    };

    let result = run_server(state, config.metrics_port, shutdown.clone()).await;
    // A failed server must still stop the scheduler
    shutdown.cancel();

    if let Some(task) = scheduler_task {
        if let Err(err) = task.await {
            error!("Scheduler task failed: {}", err);
        }
    }
    result
}
