//! Catalog search passthrough routes.

use super::error::ApiError;
use super::state::ServerState;
use super::validation::{
    parse_limit, parse_offset, parse_year, parse_year_range, validate_market,
    validate_search_type,
};
use crate::catalog_client::{CatalogApiError, CatalogTrack, MAX_PAGE_SIZE};

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::{debug, info, warn};

pub const SEARCH_DEFAULT_LIMIT: usize = 20;
/// Used by the year searches when no query text is given.
pub const DEFAULT_YEAR_SEARCH_QUERY: &str = "india bollywood hindi";
/// Searches combined into the top tracks of a year, each prefixed with the
/// genre when one is given.
pub const TOP_OF_YEAR_QUERIES: &[&str] = &[
    "top hits",
    "best songs",
    "popular music",
    "chart toppers",
    "greatest hits",
];

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    #[serde(rename = "type")]
    pub search_type: Option<String>,
    pub market: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct YearSearchQuery {
    pub query: Option<String>,
    pub market: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TopOfYearQuery {
    pub genre: Option<String>,
    pub market: Option<String>,
    pub limit: Option<String>,
}

/// Most popular tracks released in a year, merged from several searches.
#[derive(Debug, Clone, Serialize)]
pub struct TopOfYear {
    pub year: i32,
    /// "all" when no genre filter was given.
    pub genre: String,
    pub market: String,
    /// Distinct tracks seen across all searches, before truncation.
    pub total_found: usize,
    pub limit: usize,
    pub tracks: Vec<CatalogTrack>,
    pub fetched_at: DateTime<Utc>,
}

/// Tracks of a search response, skipping null and undecodable items.
pub(crate) fn decode_search_tracks(value: &Value) -> Vec<CatalogTrack> {
    value["tracks"]["items"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter(|item| !item.is_null())
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Merges search responses by track id, first occurrence wins, then orders
/// by popularity, most popular first.
fn merge_by_popularity(responses: &[Value]) -> Vec<CatalogTrack> {
    let mut seen = HashSet::new();
    let mut tracks: Vec<CatalogTrack> = responses
        .iter()
        .flat_map(decode_search_tracks)
        .filter(|track| {
            track
                .id
                .as_deref()
                .is_some_and(|id| !id.is_empty() && seen.insert(id.to_string()))
        })
        .collect();
    tracks.sort_by_key(|track| std::cmp::Reverse(track.popularity.unwrap_or(0)));
    tracks
}

/// One page of year-filtered track search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchTracksPage {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_range: Option<String>,
    pub market: String,
    pub total: u64,
    pub limit: usize,
    pub offset: usize,
    /// Offset of the following page, absent once a short page is returned.
    pub next_offset: Option<usize>,
    pub tracks: Vec<CatalogTrack>,
    pub fetched_at: DateTime<Utc>,
}

impl SearchTracksPage {
    fn from_upstream(
        value: &Value,
        query: String,
        market: String,
        limit: usize,
        offset: usize,
    ) -> Self {
        let tracks = decode_search_tracks(value);
        // Paging follows the upstream page size, dropped items included
        let upstream_len = value["tracks"]["items"].as_array().map(Vec::len).unwrap_or(0);
        let next_offset = (upstream_len == limit).then_some(offset + limit);
        SearchTracksPage {
            query,
            year: None,
            year_range: None,
            market,
            total: value["tracks"]["total"].as_u64().unwrap_or(0),
            limit,
            offset,
            next_offset,
            tracks,
            fetched_at: Utc::now(),
        }
    }
}

/// Validated paging and market shared by the year searches.
struct YearSearchParams {
    query: String,
    market: String,
    limit: usize,
    offset: usize,
}

fn year_search_params(
    state: &ServerState,
    params: YearSearchQuery,
) -> Result<YearSearchParams, ApiError> {
    let market = validate_market(params.market.as_deref(), state.markets())?
        .code
        .clone();
    let limit = parse_limit(params.limit.as_deref(), SEARCH_DEFAULT_LIMIT, MAX_PAGE_SIZE)?;
    let offset = parse_offset(params.offset.as_deref())?;
    let query = params
        .query
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .unwrap_or_else(|| DEFAULT_YEAR_SEARCH_QUERY.to_string());
    Ok(YearSearchParams {
        query,
        market,
        limit,
        offset,
    })
}

async fn search(
    State(state): State<ServerState>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<Value>, ApiError> {
    let query = params
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::validation("Query parameter 'q' must not be empty"))?
        .to_string();
    let search_type = validate_search_type(params.search_type.as_deref())?;
    let market = validate_market(params.market.as_deref(), state.markets())?
        .code
        .clone();
    let limit = parse_limit(params.limit.as_deref(), SEARCH_DEFAULT_LIMIT, MAX_PAGE_SIZE)?;
    let offset = parse_offset(params.offset.as_deref())?;

    debug!("Searching {} for '{}' in {}", search_type, query, market);
    let results = state
        .catalog
        .search(&query, &search_type, &market, limit, offset)
        .await?;
    Ok(Json(json!({
        "query": query,
        "type": search_type,
        "market": market,
        "limit": limit,
        "offset": offset,
        "results": results,
    })))
}

async fn search_by_year(
    State(state): State<ServerState>,
    Path(year): Path<String>,
    Query(params): Query<YearSearchQuery>,
) -> Result<Json<SearchTracksPage>, ApiError> {
    let year = parse_year(Some(&year))?;
    let params = year_search_params(&state, params)?;

    let value = state
        .catalog
        .search_tracks_by_year(&params.query, year, &params.market, params.limit, params.offset)
        .await?;
    let mut page = SearchTracksPage::from_upstream(
        &value,
        params.query,
        params.market,
        params.limit,
        params.offset,
    );
    page.year = Some(year);
    Ok(Json(page))
}

async fn search_by_year_range(
    State(state): State<ServerState>,
    Path(range): Path<String>,
    Query(params): Query<YearSearchQuery>,
) -> Result<Json<SearchTracksPage>, ApiError> {
    let (start, end) = parse_year_range(&range)?;
    let params = year_search_params(&state, params)?;

    let value = state
        .catalog
        .search_tracks_by_year_range(
            &params.query,
            start,
            end,
            &params.market,
            params.limit,
            params.offset,
        )
        .await?;
    let mut page = SearchTracksPage::from_upstream(
        &value,
        params.query,
        params.market,
        params.limit,
        params.offset,
    );
    page.year_range = Some(format!("{}-{}", start, end));
    Ok(Json(page))
}

async fn top_of_year(
    State(state): State<ServerState>,
    Path(year): Path<String>,
    Query(params): Query<TopOfYearQuery>,
) -> Result<Json<TopOfYear>, ApiError> {
    let year = parse_year(Some(&year))?;
    let market = validate_market(params.market.as_deref(), state.markets())?
        .code
        .clone();
    let limit = parse_limit(params.limit.as_deref(), MAX_PAGE_SIZE, MAX_PAGE_SIZE)?;
    let genre = params
        .genre
        .map(|g| g.trim().to_string())
        .filter(|g| !g.is_empty());

    let mut responses = Vec::with_capacity(TOP_OF_YEAR_QUERIES.len());
    let mut last_error: Option<CatalogApiError> = None;
    for base in TOP_OF_YEAR_QUERIES {
        let query = match &genre {
            Some(genre) => format!("{} {}", genre, base),
            None => base.to_string(),
        };
        match state
            .catalog
            .search_tracks_by_year(&query, year, &market, MAX_PAGE_SIZE, 0)
            .await
        {
            Ok(value) => responses.push(value),
            Err(e) => {
                warn!("Top of year search '{}' for {} failed: {}", query, year, e);
                last_error = Some(e);
            }
        }
    }
    // Partial results are served, a complete outage is not.
    if responses.is_empty() {
        if let Some(e) = last_error {
            return Err(e.into());
        }
    }

    let mut tracks = merge_by_popularity(&responses);
    let total_found = tracks.len();
    tracks.truncate(limit);
    info!(
        "Top of year {} ({}): {} distinct tracks, returning {}",
        year,
        genre.as_deref().unwrap_or("all"),
        total_found,
        tracks.len()
    );

    Ok(Json(TopOfYear {
        year,
        genre: genre.unwrap_or_else(|| "all".to_string()),
        market,
        total_found,
        limit,
        tracks,
        fetched_at: Utc::now(),
    }))
}

pub fn make_search_routes(state: ServerState) -> Router {
    Router::new()
        .route("/", get(search))
        .route("/top-of-year/{year}", get(top_of_year))
        .route("/tracks/year/{year}", get(search_by_year))
        // Single segment: "{start}-{end}" is not a valid route pattern
        .route("/tracks/year-range/{range}", get(search_by_year_range))
        .with_state(state)
}
