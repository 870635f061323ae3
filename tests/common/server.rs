//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own database and fake catalog.

use super::constants::*;
use super::fake_catalog::FakeCatalog;
use chart_insights_server::aggregation::YearlyAggregator;
use chart_insights_server::cache::ResponseCache;
use chart_insights_server::catalog_client::{
    CatalogClient, CatalogClientConfig, CatalogCredentials,
};
use chart_insights_server::chart_store::SqliteChartStore;
use chart_insights_server::config::MarketSettings;
use chart_insights_server::ingestion::IngestionService;
use chart_insights_server::server::{make_app, RequestsLoggingLevel, ServerConfig, ServerState};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::net::TcpListener;

fn test_markets() -> Vec<MarketSettings> {
    vec![
        MarketSettings {
            code: MARKET_IN.to_string(),
            name: "India".to_string(),
            playlist_id: PLAYLIST_IN.to_string(),
            timezone: chrono_tz::Asia::Kolkata,
        },
        MarketSettings {
            code: MARKET_US.to_string(),
            name: "United States".to_string(),
            playlist_id: PLAYLIST_US.to_string(),
            timezone: chrono_tz::America::New_York,
        },
    ]
}

/// Test server instance with an isolated database and catalog
///
/// When dropped, the server gracefully shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Fake upstream catalog, configurable per test
    pub catalog: FakeCatalog,

    /// Chart store for direct database access in tests
    pub store: SqliteChartStore,

    /// Response cache shared with the server
    pub cache: Arc<ResponseCache>,

    // Private fields - keep resources alive until drop
    _temp_db_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server on a random port
    ///
    /// # Panics
    ///
    /// Panics if the database cannot be created, the port cannot be bound or
    /// the server doesn't become ready within the timeout.
    pub async fn spawn() -> Self {
        let temp_db_dir = TempDir::new().expect("Failed to create temp dir");
        let store = SqliteChartStore::new(temp_db_dir.path().join("charts.db"), 2)
            .expect("Failed to open chart store");

        let catalog = FakeCatalog::spawn().await;
        let catalog_client = Arc::new(CatalogClient::new(CatalogClientConfig {
            token_url: catalog.token_url(),
            api_base_url: catalog.api_base_url(),
            credentials: CatalogCredentials {
                client_id: CATALOG_CLIENT_ID.to_string(),
                client_secret: CATALOG_CLIENT_SECRET.to_string(),
            },
            request_timeout_sec: REQUEST_TIMEOUT_SECS,
            // Failures surface immediately instead of backing off
            max_retries: 0,
            max_backoff_sec: 0,
        }));

        let cache = Arc::new(ResponseCache::new(Duration::from_secs(CACHE_TTL_SEC)));
        let ingestion = Arc::new(IngestionService::new(
            store.clone(),
            catalog_client.clone(),
            cache.clone(),
            test_markets(),
        ));
        let aggregator = YearlyAggregator::new(Arc::new(store.clone()));

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let state = ServerState {
            config: ServerConfig {
                requests_logging_level: RequestsLoggingLevel::None,
                port,
                cache_ttl_sec: CACHE_TTL_SEC,
                admin_key: ADMIN_KEY.to_string(),
                ..Default::default()
            },
            start_time: Instant::now(),
            store: Arc::new(store.clone()),
            cache: cache.clone(),
            catalog: catalog_client,
            ingestion,
            aggregator,
            hash: "e2e".to_string(),
        };
        let app = make_app(state);

        // Spawn server in background task with graceful shutdown
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            catalog,
            store,
            cache,
            _temp_db_dir: temp_db_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling the /v1/health endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(500))
            .build()
            .expect("Failed to build reqwest client");

        let start = Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client
                .get(format!("{}/v1/health", self.base_url))
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Send shutdown signal
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
