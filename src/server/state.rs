use axum::extract::FromRef;

use crate::aggregation::YearlyAggregator;
use crate::cache::ResponseCache;
use crate::catalog_client::CatalogClient;
use crate::chart_store::ChartStore;
use crate::config::MarketSettings;
use crate::ingestion::IngestionService;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedChartStore = Arc<dyn ChartStore>;
pub type GuardedResponseCache = Arc<ResponseCache>;
pub type GuardedCatalogClient = Arc<CatalogClient>;
pub type GuardedIngestionService = Arc<IngestionService>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub store: GuardedChartStore,
    pub cache: GuardedResponseCache,
    pub catalog: GuardedCatalogClient,
    pub ingestion: GuardedIngestionService,
    pub aggregator: YearlyAggregator,
    pub hash: String,
}

impl ServerState {
    /// Markets the server accepts, in configuration order.
    pub fn markets(&self) -> &[MarketSettings] {
        self.ingestion.markets()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for GuardedChartStore {
    fn from_ref(input: &ServerState) -> Self {
        input.store.clone()
    }
}

impl FromRef<ServerState> for GuardedResponseCache {
    fn from_ref(input: &ServerState) -> Self {
        input.cache.clone()
    }
}

impl FromRef<ServerState> for GuardedCatalogClient {
    fn from_ref(input: &ServerState) -> Self {
        input.catalog.clone()
    }
}

impl FromRef<ServerState> for GuardedIngestionService {
    fn from_ref(input: &ServerState) -> Self {
        input.ingestion.clone()
    }
}

impl FromRef<ServerState> for YearlyAggregator {
    fn from_ref(input: &ServerState) -> Self {
        input.aggregator.clone()
    }
}
