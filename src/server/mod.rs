mod admin;
mod admin_key;
mod artists;
mod charts;
pub mod config;
pub mod error;
mod health;
mod http_layers;
pub mod metrics;
mod search;
pub mod server;
pub mod state;
pub mod validation;

pub use admin_key::HEADER_ADMIN_KEY;
pub use artists::TopSearchedArtists;
pub use charts::{ChartTrack, TodayChart};
pub use config::ServerConfig;
pub use error::ApiError;
pub use health::{AnalyticsOverview, HealthResponse};
pub use http_layers::*;
pub use search::{SearchTracksPage, TopOfYear};
pub use server::{make_app, make_metrics_app, run_server};
pub use state::ServerState;

/// Server state over a temp store and a mock catalog serving one market, `IN`.
#[cfg(test)]
pub(crate) async fn test_state(
    admin_key: &str,
) -> (crate::background_jobs::TestEnv, ServerState) {
    use crate::catalog_client::{CatalogClient, CatalogClientConfig, CatalogCredentials};
    use std::sync::Arc;
    use std::time::Instant;

    let (env, ctx) = crate::background_jobs::test_context().await;
    let catalog = CatalogClient::new(CatalogClientConfig {
        token_url: env.mock.token_url(),
        api_base_url: env.mock.api_base_url(),
        credentials: CatalogCredentials {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
        },
        request_timeout_sec: 5,
        max_retries: 0,
        max_backoff_sec: 0,
    });
    let state = ServerState {
        config: ServerConfig {
            admin_key: admin_key.to_string(),
            ..Default::default()
        },
        start_time: Instant::now(),
        store: Arc::new(env.store.clone()),
        cache: ctx.cache.clone(),
        catalog: Arc::new(catalog),
        ingestion: ctx.ingestion.clone(),
        aggregator: ctx.aggregator.clone(),
        hash: "test".to_string(),
    };
    (env, state)
}
