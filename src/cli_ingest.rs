use anyhow::{anyhow, bail, Context, Result};
use chrono::{Datelike, NaiveDate};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chart_insights_server::aggregation::YearlyAggregator;
use chart_insights_server::background_jobs::jobs::DailySnapshotJob;
use chart_insights_server::background_jobs::{BackgroundJob, JobContext};
use chart_insights_server::cache::ResponseCache;
use chart_insights_server::catalog_client::CatalogClient;
use chart_insights_server::chart_store::SqliteChartStore;
use chart_insights_server::config::{parse_path, AppConfig, CliConfig, FileConfig};
use chart_insights_server::ingestion::{IngestionRequest, IngestionService};
use chart_insights_server::utils::today_in_timezone;

#[derive(Parser, Debug)]
#[command(version, about = "One-shot chart ingestion and yearly rollup refresh")]
struct CliArgs {
    /// Directory holding the SQLite chart database.
    #[clap(long, value_parser = parse_path, env = "DB_DIR")]
    pub db_dir: Option<PathBuf>,

    /// Path to a TOML config file. Its values override command line arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    #[clap(long, env = "CATALOG_CLIENT_ID")]
    pub catalog_client_id: Option<String>,

    #[clap(long, env = "CATALOG_CLIENT_SECRET", hide_env_values = true)]
    pub catalog_client_secret: Option<String>,

    /// Comma separated market codes, e.g. "IN,US,GB".
    #[clap(long, env = "MARKETS")]
    pub markets: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest the current chart of one market, or of every configured market.
    Ingest {
        #[clap(long)]
        market: Option<String>,

        /// Snapshot date (YYYY-MM-DD), defaults to today in the market's timezone.
        #[clap(long)]
        date: Option<NaiveDate>,

        /// Ingest this playlist instead of the market's configured one.
        #[clap(long, requires = "market")]
        playlist_id: Option<String>,
    },

    /// Recompute yearly rollups for one market, or every configured market.
    Aggregate {
        /// Defaults to the current year.
        #[clap(long)]
        year: Option<i32>,

        #[clap(long)]
        market: Option<String>,
    },

    /// Ingest every market and refresh the current year, like the daily job.
    Snapshot,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

struct Services {
    config: AppConfig,
    cache: Arc<ResponseCache>,
    ingestion: Arc<IngestionService>,
    aggregator: YearlyAggregator,
}

fn build_services(cli_args: &CliArgs) -> Result<Services> {
    let file_config = cli_args
        .config
        .as_deref()
        .map(FileConfig::load)
        .transpose()?;
    let cli_config = CliConfig {
        db_dir: cli_args.db_dir.clone(),
        catalog_client_id: cli_args.catalog_client_id.clone(),
        catalog_client_secret: cli_args.catalog_client_secret.clone(),
        markets: cli_args.markets.clone(),
        cache_ttl_sec: 300,
        ..Default::default()
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    info!(
        "Opening SQLite chart database at {:?}...",
        config.chart_db_path()
    );
    let store = SqliteChartStore::new(config.chart_db_path(), 1)?;
    let cache = Arc::new(ResponseCache::new(Duration::from_secs(config.cache_ttl_sec)));
    let catalog = Arc::new(CatalogClient::new(config.catalog.client_config()));
    let ingestion = Arc::new(IngestionService::new(
        store.clone(),
        catalog,
        cache.clone(),
        config.markets.clone(),
    ));
    let aggregator = YearlyAggregator::new(Arc::new(store));
    Ok(Services {
        config,
        cache,
        ingestion,
        aggregator,
    })
}

async fn ingest(
    services: &Services,
    market: Option<String>,
    date: Option<NaiveDate>,
    playlist_id: Option<String>,
) -> Result<()> {
    let markets: Vec<String> = match market {
        Some(code) => vec![code.trim().to_uppercase()],
        None => services.config.markets.iter().map(|m| m.code.clone()).collect(),
    };

    let mut failed = Vec::new();
    for market in markets {
        let request = IngestionRequest {
            market: market.clone(),
            playlist_id: playlist_id.clone(),
            snapshot_date: date,
        };
        match services.ingestion.run(request).await {
            Ok(report) => print_json(&report)?,
            Err(err) => {
                error!("Ingestion failed for market {}: {}", market, err);
                failed.push(market);
            }
        }
    }
    if !failed.is_empty() {
        bail!("Ingestion failed for: {}", failed.join(", "));
    }
    Ok(())
}

async fn aggregate(services: &Services, year: Option<i32>, market: Option<String>) -> Result<()> {
    let targets: Vec<(String, i32)> = match market {
        Some(code) => {
            let settings = services
                .config
                .market(&code)
                .ok_or_else(|| anyhow!("Unknown market: {}", code))?;
            let year = year.unwrap_or_else(|| today_in_timezone(settings.timezone).year());
            vec![(settings.code.clone(), year)]
        }
        None => services
            .config
            .markets
            .iter()
            .map(|m| {
                let year = year.unwrap_or_else(|| today_in_timezone(m.timezone).year());
                (m.code.clone(), year)
            })
            .collect(),
    };

    for (market, year) in targets {
        let aggregator = services.aggregator.clone();
        let report = tokio::task::spawn_blocking(move || aggregator.refresh(year, &market))
            .await
            .context("Aggregate refresh task panicked")??;
        print_json(&report)?;
    }
    Ok(())
}

async fn snapshot(services: &Services) -> Result<()> {
    let scheduler = &services.config.scheduler;
    let job = DailySnapshotJob::new(
        scheduler.snapshot_hour,
        scheduler.snapshot_minute,
        scheduler.timezone,
        scheduler.refresh_aggregates,
    );
    let ctx = JobContext::new(
        CancellationToken::new(),
        tokio::runtime::Handle::current(),
        services.ingestion.clone(),
        services.aggregator.clone(),
        services.cache.clone(),
    );

    info!("Running {} once", job.name());
    tokio::task::spawn_blocking(move || job.execute(&ctx))
        .await
        .context("Snapshot task panicked")?
        .map_err(|e| anyhow!("{}", e))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let services = build_services(&cli_args)?;

    match cli_args.command {
        Command::Ingest {
            market,
            date,
            playlist_id,
        } => ingest(&services, market, date, playlist_id).await,
        Command::Aggregate { year, market } => aggregate(&services, year, market).await,
        Command::Snapshot => snapshot(&services).await,
    }
}
