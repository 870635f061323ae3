//! Background job scheduling and execution.
//!
//! Runs the daily chart snapshot and the periodic response cache cleanup
//! until the shared shutdown token is cancelled.

mod context;
mod job;
pub mod jobs;
mod scheduler;

pub use context::JobContext;
pub use job::{BackgroundJob, JobError, JobSchedule, ShutdownBehavior};
pub use scheduler::JobScheduler;

#[cfg(test)]
pub(crate) struct TestEnv {
    pub _dir: tempfile::TempDir,
    pub mock: crate::catalog_client::test_support::MockCatalog,
    pub store: crate::chart_store::SqliteChartStore,
}

/// Job context over a temp store and a mock catalog serving one market, `IN`.
#[cfg(test)]
pub(crate) async fn test_context() -> (TestEnv, JobContext) {
    use crate::aggregation::YearlyAggregator;
    use crate::cache::ResponseCache;
    use crate::catalog_client::{
        test_support::MockCatalog, CatalogClient, CatalogClientConfig, CatalogCredentials,
    };
    use crate::chart_store::SqliteChartStore;
    use crate::config::MarketSettings;
    use crate::ingestion::IngestionService;
    use std::sync::Arc;
    use std::time::Duration;

    let dir = tempfile::TempDir::new().unwrap();
    let store = SqliteChartStore::new(dir.path().join("charts.db"), 2).unwrap();
    let mock = MockCatalog::spawn(3600).await;
    let client = CatalogClient::new(CatalogClientConfig {
        token_url: mock.token_url(),
        api_base_url: mock.api_base_url(),
        credentials: CatalogCredentials {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
        },
        request_timeout_sec: 5,
        max_retries: 0,
        max_backoff_sec: 0,
    });
    let cache = Arc::new(ResponseCache::new(Duration::from_secs(300)));
    let markets = vec![MarketSettings {
        code: "IN".to_string(),
        name: "India".to_string(),
        playlist_id: "pl-in".to_string(),
        timezone: chrono_tz::Asia::Kolkata,
    }];
    let ingestion = Arc::new(IngestionService::new(
        store.clone(),
        Arc::new(client),
        cache.clone(),
        markets,
    ));
    let aggregator = YearlyAggregator::new(Arc::new(store.clone()));
    let ctx = JobContext::new(
        tokio_util::sync::CancellationToken::new(),
        tokio::runtime::Handle::current(),
        ingestion,
        aggregator,
        cache,
    );
    (
        TestEnv {
            _dir: dir,
            mock,
            store,
        },
        ctx,
    )
}
