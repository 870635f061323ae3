//! Daily and yearly chart routes.

use super::error::ApiError;
use super::state::ServerState;
use super::validation::{parse_limit, parse_year, validate_market};
use crate::cache::{
    cache_key, ResponseCache, TODAY_CHART_PREFIX, YEARLY_ARTISTS_PREFIX, YEARLY_CHART_PREFIX,
    YEARLY_GENRES_PREFIX,
};
use crate::chart_store::ChartEntry;
use crate::utils::{format_duration, parse_release_date};

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

pub const TODAY_DEFAULT_LIMIT: usize = 50;
pub const TODAY_MAX_LIMIT: usize = 50;
pub const YEARLY_DEFAULT_LIMIT: usize = 50;
pub const YEARLY_MAX_LIMIT: usize = 100;

#[derive(Debug, Default, Deserialize)]
pub struct ChartQuery {
    pub market: Option<String>,
    pub limit: Option<String>,
    pub year: Option<String>,
}

/// One ranked row of the daily chart as exposed over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartTrack {
    pub rank: u32,
    pub track_id: String,
    pub track_name: String,
    pub artists: Vec<String>,
    pub album: Option<String>,
    pub release_date: Option<String>,
    pub release_year: Option<i32>,
    pub popularity: i64,
    pub spotify_url: Option<String>,
    pub preview_url: Option<String>,
    pub duration_formatted: Option<String>,
    pub explicit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodayChart {
    pub market: String,
    pub snapshot_date: NaiveDate,
    pub total_tracks: usize,
    pub tracks: Vec<ChartTrack>,
    pub last_updated: DateTime<Utc>,
}

impl From<ChartEntry> for ChartTrack {
    fn from(entry: ChartEntry) -> Self {
        let track = entry.track;
        let release_year = track
            .album_release_date
            .as_deref()
            .and_then(parse_release_date)
            .map(|d| d.year());
        ChartTrack {
            rank: entry.rank,
            track_id: track.id,
            track_name: track.name,
            artists: entry.artists,
            album: track.album_name,
            release_date: track.album_release_date,
            release_year,
            popularity: track.popularity,
            spotify_url: track.external_url,
            preview_url: track.preview_url,
            duration_formatted: track.duration_ms.map(format_duration),
            explicit: track.explicit,
        }
    }
}

/// Returns the cached JSON under `key`, or builds, caches and returns it.
fn serve_cached<T, F>(cache: &ResponseCache, key: String, build: F) -> Result<Json<Value>, ApiError>
where
    T: Serialize,
    F: FnOnce() -> Result<T, ApiError>,
{
    if let Some(cached) = cache.get(&key) {
        debug!("Cache hit for {}", key);
        return Ok(Json(cached));
    }
    let value = serde_json::to_value(build()?).map_err(anyhow::Error::from)?;
    cache.set(key, value.clone(), None);
    Ok(Json(value))
}

async fn top_today(
    State(state): State<ServerState>,
    Query(query): Query<ChartQuery>,
) -> Result<Json<Value>, ApiError> {
    let market = validate_market(query.market.as_deref(), state.markets())?
        .code
        .clone();
    let limit = parse_limit(query.limit.as_deref(), TODAY_DEFAULT_LIMIT, TODAY_MAX_LIMIT)?;

    let key = cache_key(
        TODAY_CHART_PREFIX,
        &[("market", market.clone()), ("limit", limit.to_string())],
    );
    serve_cached(&state.cache, key, || {
        let no_data =
            || ApiError::not_found("today_chart", format!("No chart data found for market {}", market));
        let snapshot_date = state.store.latest_snapshot_date(&market)?.ok_or_else(no_data)?;
        let entries = state.store.get_chart(&market, snapshot_date, limit)?;
        if entries.is_empty() {
            return Err(no_data());
        }
        let last_updated = entries
            .iter()
            .map(|e| e.fetched_at)
            .max()
            .unwrap_or_else(Utc::now);
        let tracks: Vec<ChartTrack> = entries.into_iter().map(ChartTrack::from).collect();
        Ok(TodayChart {
            market: market.clone(),
            snapshot_date,
            total_tracks: tracks.len(),
            tracks,
            last_updated,
        })
    })
}

/// Market, year and limit shared by the yearly routes.
fn yearly_params(state: &ServerState, query: &ChartQuery) -> Result<(String, i32, usize), ApiError> {
    let market = validate_market(query.market.as_deref(), state.markets())?
        .code
        .clone();
    let year = parse_year(query.year.as_deref())?;
    let limit = parse_limit(query.limit.as_deref(), YEARLY_DEFAULT_LIMIT, YEARLY_MAX_LIMIT)?;
    Ok((market, year, limit))
}

fn yearly_key(prefix: &str, market: &str, year: i32, limit: usize) -> String {
    cache_key(
        prefix,
        &[
            ("market", market.to_string()),
            ("year", year.to_string()),
            ("limit", limit.to_string()),
        ],
    )
}

fn no_yearly_data(resource: &str, year: i32, market: &str) -> ApiError {
    ApiError::not_found(
        resource,
        format!("No yearly data found for {} in market {}", year, market),
    )
}

async fn top_year(
    State(state): State<ServerState>,
    Query(query): Query<ChartQuery>,
) -> Result<Json<Value>, ApiError> {
    let (market, year, limit) = yearly_params(&state, &query)?;
    let key = yearly_key(YEARLY_CHART_PREFIX, &market, year, limit);
    serve_cached(&state.cache, key, || {
        let chart = state.aggregator.top_tracks(year, &market, limit)?;
        if chart.tracks.is_empty() {
            return Err(no_yearly_data("yearly_chart", year, &market));
        }
        Ok(chart)
    })
}

async fn top_artists(
    State(state): State<ServerState>,
    Query(query): Query<ChartQuery>,
) -> Result<Json<Value>, ApiError> {
    let (market, year, limit) = yearly_params(&state, &query)?;
    let key = yearly_key(YEARLY_ARTISTS_PREFIX, &market, year, limit);
    serve_cached(&state.cache, key, || {
        let chart = state.aggregator.top_artists(year, &market, limit)?;
        if chart.artists.is_empty() {
            return Err(no_yearly_data("yearly_artists", year, &market));
        }
        Ok(chart)
    })
}

async fn top_genres(
    State(state): State<ServerState>,
    Query(query): Query<ChartQuery>,
) -> Result<Json<Value>, ApiError> {
    let (market, year, limit) = yearly_params(&state, &query)?;
    let key = yearly_key(YEARLY_GENRES_PREFIX, &market, year, limit);
    serve_cached(&state.cache, key, || {
        let chart = state.aggregator.top_genres(year, &market, limit)?;
        if chart.genres.is_empty() {
            return Err(no_yearly_data("yearly_genres", year, &market));
        }
        Ok(chart)
    })
}

pub fn make_chart_routes(state: ServerState) -> Router {
    Router::new()
        .route("/top-today", get(top_today))
        .route("/top-year", get(top_year))
        .route("/top-artists", get(top_artists))
        .route("/top-genres", get(top_genres))
        .with_state(state)
}
