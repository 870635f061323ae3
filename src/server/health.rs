use super::error::ApiError;
use super::state::ServerState;

use axum::{extract::State, Json};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::warn;

pub const STATUS_HEALTHY: &str = "healthy";
pub const STATUS_DEGRADED: &str = "degraded";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub version: &'static str,
    pub git_hash: String,
    pub uptime: String,
    pub database: &'static str,
    pub catalog_api: &'static str,
    pub cache_status: String,
    pub last_snapshot_date: Option<NaiveDate>,
    pub last_aggregate_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct MarketOverview {
    pub code: String,
    pub name: String,
    pub latest_snapshot_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsOverview {
    pub total_tracks: usize,
    pub total_artists: usize,
    pub total_playlists: usize,
    pub total_snapshots: usize,
    pub last_snapshot_date: Option<NaiveDate>,
    pub markets: Vec<MarketOverview>,
}

pub(super) fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

/// Always answers 200; a failing dependency only degrades `status`.
pub(super) async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    let database = match state.store.ping() {
        Ok(()) => "connected",
        Err(err) => {
            warn!("Health check: database unreachable: {:#}", err);
            "disconnected"
        }
    };
    let catalog_api = match state.catalog.health_check().await {
        Ok(()) => "connected",
        Err(err) => {
            warn!("Health check: catalog API unreachable: {}", err);
            "disconnected"
        }
    };

    let last_snapshot_date = state.store.last_snapshot_date().unwrap_or_else(|err| {
        warn!("Health check: failed to read last snapshot date: {:#}", err);
        None
    });
    let last_aggregate_date = state
        .store
        .last_aggregate_computed_at()
        .unwrap_or_else(|err| {
            warn!("Health check: failed to read last aggregate time: {:#}", err);
            None
        })
        .map(|at| at.date_naive());

    let status = if database == "connected" && catalog_api == "connected" {
        STATUS_HEALTHY
    } else {
        STATUS_DEGRADED
    };

    Json(HealthResponse {
        status,
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION"),
        git_hash: state.hash.clone(),
        uptime: format_uptime(state.start_time.elapsed()),
        database,
        catalog_api,
        cache_status: format!("active ({} items)", state.cache.len()),
        last_snapshot_date,
        last_aggregate_date,
    })
}

pub(super) async fn analytics_overview(
    State(state): State<ServerState>,
) -> Result<Json<AnalyticsOverview>, ApiError> {
    let counts = state.store.counts()?;
    let markets = state
        .markets()
        .iter()
        .map(|market| {
            Ok(MarketOverview {
                code: market.code.clone(),
                name: market.name.clone(),
                latest_snapshot_date: state.store.latest_snapshot_date(&market.code)?,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(Json(AnalyticsOverview {
        total_tracks: counts.tracks,
        total_artists: counts.artists,
        total_playlists: counts.playlists,
        total_snapshots: counts.snapshots,
        last_snapshot_date: state.store.last_snapshot_date()?,
        markets,
    }))
}
