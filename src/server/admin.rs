//! Operator routes, all guarded by the admin key.

use super::admin_key::AdminKey;
use super::error::ApiError;
use super::metrics::set_cache_entries;
use super::state::ServerState;
use super::validation::{parse_year, validate_market};
use crate::aggregation::AggregateReport;
use crate::cache::{YEARLY_ARTISTS_PREFIX, YEARLY_CHART_PREFIX, YEARLY_GENRES_PREFIX};
use crate::ingestion::{IngestionReport, IngestionRequest};

use anyhow::anyhow;
use axum::{
    extract::{Query, State},
    routing::post,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

#[derive(Debug, Default, Deserialize)]
pub struct IngestQuery {
    pub market: Option<String>,
    pub date: Option<String>,
    pub playlist_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AggregateQuery {
    pub market: Option<String>,
    pub year: Option<String>,
}

fn parse_snapshot_date(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::validation(format!("Invalid date '{}', expected YYYY-MM-DD", raw)))
}

async fn run_ingest(
    _admin: AdminKey,
    State(state): State<ServerState>,
    Query(query): Query<IngestQuery>,
) -> Result<Json<IngestionReport>, ApiError> {
    let market = validate_market(query.market.as_deref(), state.markets())?
        .code
        .clone();
    let snapshot_date = query.date.as_deref().map(parse_snapshot_date).transpose()?;
    let playlist_id = query.playlist_id.filter(|id| !id.trim().is_empty());

    info!("Manual ingestion requested for market {}", market);
    let report = state
        .ingestion
        .run(IngestionRequest {
            market,
            playlist_id,
            snapshot_date,
        })
        .await?;
    Ok(Json(report))
}

async fn run_aggregate(
    _admin: AdminKey,
    State(state): State<ServerState>,
    Query(query): Query<AggregateQuery>,
) -> Result<Json<AggregateReport>, ApiError> {
    let market = validate_market(query.market.as_deref(), state.markets())?
        .code
        .clone();
    let year = parse_year(query.year.as_deref())?;

    info!("Manual aggregate refresh requested for {} {}", year, market);
    let aggregator = state.aggregator.clone();
    let report = tokio::task::spawn_blocking(move || aggregator.refresh(year, &market))
        .await
        .map_err(|e| anyhow!("Aggregate refresh task failed: {}", e))??;

    for prefix in [YEARLY_CHART_PREFIX, YEARLY_ARTISTS_PREFIX, YEARLY_GENRES_PREFIX] {
        state.cache.invalidate_prefix(&format!("{}:", prefix));
    }
    set_cache_entries(state.cache.len());
    Ok(Json(report))
}

async fn clear_cache(_admin: AdminKey, State(state): State<ServerState>) -> Json<Value> {
    let cleared = state.cache.clear();
    set_cache_entries(0);
    info!("Cleared {} cached responses", cleared);
    Json(json!({"success": true, "entries_cleared": cleared}))
}

pub fn make_admin_routes(state: ServerState) -> Router {
    Router::new()
        .route("/ingest/run", post(run_ingest))
        .route("/aggregate/run", post(run_aggregate))
        .route("/cache/clear", post(clear_cache))
        .with_state(state)
}
