use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

use super::admin::make_admin_routes;
use super::artists::make_artist_routes;
use super::charts::make_chart_routes;
use super::health::{analytics_overview, health};
use super::metrics::metrics_handler;
use super::search::make_search_routes;
use super::{http_cache, log_requests, state::*};

const ADMIN_KEY_HEADER_LOWERCASE: &str = "x-admin-key";

fn make_cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(ADMIN_KEY_HEADER_LOWERCASE),
        ]);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

pub fn make_app(state: ServerState) -> Router {
    let chart_routes = make_chart_routes(state.clone()).layer(middleware::from_fn_with_state(
        state.config.cache_ttl_sec,
        http_cache,
    ));

    let root_routes: Router = Router::new()
        .route("/v1/health", get(health))
        .route("/v1/analytics/overview", get(analytics_overview))
        .with_state(state.clone());

    root_routes
        .nest("/v1/charts", chart_routes)
        .nest("/v1/search", make_search_routes(state.clone()))
        .nest("/v1/artists", make_artist_routes(state.clone()))
        .nest("/v1/admin", make_admin_routes(state.clone()))
        .layer(make_cors_layer(&state.config.cors_origins))
        .layer(middleware::from_fn_with_state(state, log_requests))
}

pub fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

/// Serves the API on `state.config.port` and Prometheus metrics on
/// `metrics_port` until `shutdown` is cancelled.
pub async fn run_server(
    state: ServerState,
    metrics_port: u16,
    shutdown: CancellationToken,
) -> Result<()> {
    let port = state.config.port;
    let app = make_app(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind API port {}", port))?;
    let metrics_listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", metrics_port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", metrics_port))?;

    let metrics_shutdown = shutdown.clone();
    let metrics_task = tokio::spawn(async move {
        axum::serve(metrics_listener, make_metrics_app())
            .with_graceful_shutdown(async move { metrics_shutdown.cancelled().await })
            .await
    });

    info!("Serving API on port {} and metrics on port {}", port, metrics_port);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("API server failed")?;

    metrics_task
        .await
        .context("Metrics server task panicked")?
        .context("Metrics server failed")?;
    info!("Servers stopped");
    Ok(())
}
