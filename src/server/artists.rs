//! Top artists of a year, derived live from a catalog track search.

use super::error::ApiError;
use super::search::decode_search_tracks;
use super::state::ServerState;
use super::validation::{parse_flag, parse_limit, parse_year, validate_market};
use crate::catalog_client::{CatalogArtist, CatalogTrack, MAX_PAGE_SIZE};

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub const TOP_ARTISTS_DEFAULT_LIMIT: usize = 20;

/// Weights of the ranking score: track count against average popularity.
const TRACK_COUNT_WEIGHT: f64 = 0.4;
const POPULARITY_WEIGHT: f64 = 0.6;

#[derive(Debug, Default, Deserialize)]
pub struct TopArtistsQuery {
    pub year: Option<String>,
    pub market: Option<String>,
    pub genre: Option<String>,
    pub limit: Option<String>,
    pub include_details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtistTrackRef {
    pub id: String,
    pub name: Option<String>,
    pub popularity: i64,
}

/// Catalog profile of an artist, present when details were requested and
/// the lookup succeeded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtistProfile {
    pub genres: Vec<String>,
    pub followers_total: Option<i64>,
    pub popularity_score: Option<i64>,
    pub image_urls: Vec<String>,
}

impl From<CatalogArtist> for ArtistProfile {
    fn from(artist: CatalogArtist) -> Self {
        Self {
            genres: artist.genres.unwrap_or_default(),
            followers_total: artist.followers.and_then(|f| f.total),
            popularity_score: artist.popularity,
            image_urls: artist.images.into_iter().map(|i| i.url).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchedArtist {
    pub id: String,
    pub name: Option<String>,
    pub external_url: Option<String>,
    pub track_count: usize,
    pub total_popularity: i64,
    /// Rounded to one decimal.
    pub avg_popularity: f64,
    pub tracks: Vec<ArtistTrackRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ArtistProfile>,
}

impl SearchedArtist {
    fn score(&self) -> f64 {
        self.track_count as f64 * TRACK_COUNT_WEIGHT + self.avg_popularity * POPULARITY_WEIGHT
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TopSearchedArtists {
    pub year: i32,
    pub market: String,
    pub genre: Option<String>,
    pub total: usize,
    pub artists: Vec<SearchedArtist>,
    pub fetched_at: DateTime<Utc>,
}

/// Groups the artists credited on `tracks` and ranks them by a blend of how
/// many tracks they appear on and how popular those tracks are.
fn rank_artists(tracks: &[CatalogTrack]) -> Vec<SearchedArtist> {
    let mut order: Vec<String> = Vec::new();
    let mut by_id: HashMap<String, SearchedArtist> = HashMap::new();

    for track in tracks {
        let Some(track_id) = track.id.as_deref() else {
            continue;
        };
        let popularity = track.popularity.unwrap_or(0);
        for artist in &track.artists {
            let Some(artist_id) = artist.id.as_deref().filter(|id| !id.is_empty()) else {
                continue;
            };
            let entry = by_id.entry(artist_id.to_string()).or_insert_with(|| {
                order.push(artist_id.to_string());
                SearchedArtist {
                    id: artist_id.to_string(),
                    name: artist.name.clone(),
                    external_url: artist.external_urls.as_ref().and_then(|u| u.spotify.clone()),
                    track_count: 0,
                    total_popularity: 0,
                    avg_popularity: 0.0,
                    tracks: Vec::new(),
                    details: None,
                }
            });
            entry.track_count += 1;
            entry.total_popularity += popularity;
            entry.tracks.push(ArtistTrackRef {
                id: track_id.to_string(),
                name: track.name.clone(),
                popularity,
            });
        }
    }

    let mut artists: Vec<SearchedArtist> = order
        .into_iter()
        .filter_map(|id| by_id.remove(&id))
        .map(|mut artist| {
            let avg = artist.total_popularity as f64 / artist.track_count as f64;
            artist.avg_popularity = (avg * 10.0).round() / 10.0;
            artist
        })
        .collect();
    // Stable sort keeps first-seen order between equal scores.
    artists.sort_by(|a, b| b.score().total_cmp(&a.score()));
    artists
}

/// Looks up every artist concurrently. A failed lookup leaves that artist
/// without details.
async fn attach_details(state: &ServerState, artists: &mut [SearchedArtist]) {
    let mut lookups = JoinSet::new();
    for (index, artist) in artists.iter().enumerate() {
        let catalog = state.catalog.clone();
        let id = artist.id.clone();
        lookups.spawn(async move { (index, catalog.get_artist(&id).await) });
    }

    while let Some(joined) = lookups.join_next().await {
        match joined {
            Ok((index, Ok(details))) => artists[index].details = Some(details.into()),
            Ok((index, Err(e))) => {
                warn!("Artist lookup for {} failed: {}", artists[index].id, e)
            }
            Err(e) => warn!("Artist lookup task failed: {}", e),
        }
    }
}

async fn top_artists(
    State(state): State<ServerState>,
    Query(params): Query<TopArtistsQuery>,
) -> Result<Json<TopSearchedArtists>, ApiError> {
    let year = match params.year.as_deref() {
        Some(raw) => parse_year(Some(raw))?,
        None => Utc::now().year(),
    };
    let market = validate_market(params.market.as_deref(), state.markets())?
        .code
        .clone();
    let limit = parse_limit(params.limit.as_deref(), TOP_ARTISTS_DEFAULT_LIMIT, MAX_PAGE_SIZE)?;
    let include_details =
        parse_flag("include_details", params.include_details.as_deref(), true)?;
    let genre = params
        .genre
        .map(|g| g.trim().to_string())
        .filter(|g| !g.is_empty());

    let value = state
        .catalog
        .search_tracks_by_year(genre.as_deref().unwrap_or(""), year, &market, MAX_PAGE_SIZE, 0)
        .await?;
    let tracks = decode_search_tracks(&value);
    debug!("Ranking artists of {} over {} tracks", year, tracks.len());

    let mut artists = rank_artists(&tracks);
    artists.truncate(limit);
    if include_details && !artists.is_empty() {
        attach_details(&state, &mut artists).await;
    }
    info!("Found {} top artists for {} in {}", artists.len(), year, market);

    Ok(Json(TopSearchedArtists {
        year,
        market,
        genre,
        total: artists.len(),
        artists,
        fetched_at: Utc::now(),
    }))
}

pub fn make_artist_routes(state: ServerState) -> Router {
    Router::new()
        .route("/top", get(top_artists))
        .with_state(state)
}
