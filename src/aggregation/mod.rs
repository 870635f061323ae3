//! Yearly leaderboards, served from precomputed rollups when present and
//! computed from snapshots otherwise.

use crate::chart_store::{
    ChartStore, YearlyArtistStats, YearlyGenreStats, YearlyRollup, YearlyTrackStats,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearlyChart {
    pub year: i32,
    pub market: String,
    pub total_tracks: usize,
    pub tracks: Vec<YearlyTrackStats>,
    /// `None` when the rows were computed on the fly.
    pub last_computed: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopArtists {
    pub year: i32,
    pub market: String,
    pub total_artists: usize,
    pub artists: Vec<YearlyArtistStats>,
    pub last_computed: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopGenres {
    pub year: i32,
    pub market: String,
    pub total_genres: usize,
    pub genres: Vec<YearlyGenreStats>,
    pub last_computed: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateReport {
    pub success: bool,
    pub year: i32,
    pub market: String,
    pub tracks_computed: usize,
    pub artists_computed: usize,
    pub genres_computed: usize,
    pub duration_seconds: f64,
    pub message: String,
}

#[derive(Clone)]
pub struct YearlyAggregator {
    store: Arc<dyn ChartStore>,
}

impl YearlyAggregator {
    pub fn new(store: Arc<dyn ChartStore>) -> Self {
        Self { store }
    }

    pub fn top_tracks(&self, year: i32, market: &str, limit: usize) -> Result<YearlyChart> {
        let mut tracks = self.store.get_yearly_track_stats(year, market, limit)?;
        if tracks.is_empty() {
            debug!("No precomputed track stats for {} {}, computing", year, market);
            tracks = self
                .store
                .compute_yearly_track_stats(year, market, Some(limit))?;
        }
        Ok(YearlyChart {
            year,
            market: market.to_string(),
            total_tracks: tracks.len(),
            last_computed: tracks.first().and_then(|t| t.last_computed_at),
            tracks,
        })
    }

    pub fn top_artists(&self, year: i32, market: &str, limit: usize) -> Result<TopArtists> {
        let mut artists = self.store.get_yearly_artist_stats(year, market, limit)?;
        if artists.is_empty() {
            debug!("No precomputed artist stats for {} {}, computing", year, market);
            artists = self
                .store
                .compute_yearly_artist_stats(year, market, Some(limit))?;
        }
        Ok(TopArtists {
            year,
            market: market.to_string(),
            total_artists: artists.len(),
            last_computed: artists.first().and_then(|a| a.last_computed_at),
            artists,
        })
    }

    pub fn top_genres(&self, year: i32, market: &str, limit: usize) -> Result<TopGenres> {
        let mut genres = self.store.get_yearly_genre_stats(year, market, limit)?;
        if genres.is_empty() {
            debug!("No precomputed genre stats for {} {}, computing", year, market);
            genres = self
                .store
                .compute_yearly_genre_stats(year, market, Some(limit))?;
        }
        Ok(TopGenres {
            year,
            market: market.to_string(),
            total_genres: genres.len(),
            last_computed: genres.first().and_then(|g| g.last_computed_at),
            genres,
        })
    }

    /// Recomputes all rollups of (year, market) and replaces the stored rows.
    pub fn refresh(&self, year: i32, market: &str) -> Result<AggregateReport> {
        let start = Instant::now();
        let rollup = YearlyRollup {
            tracks: self.store.compute_yearly_track_stats(year, market, None)?,
            artists: self.store.compute_yearly_artist_stats(year, market, None)?,
            genres: self.store.compute_yearly_genre_stats(year, market, None)?,
        };
        self.store
            .replace_yearly_stats(year, market, &rollup, Utc::now())?;

        let duration_seconds = start.elapsed().as_secs_f64();
        info!(
            "Refreshed {} {} aggregates in {:.2}s: {} tracks, {} artists, {} genres",
            year,
            market,
            duration_seconds,
            rollup.tracks.len(),
            rollup.artists.len(),
            rollup.genres.len()
        );

        Ok(AggregateReport {
            success: true,
            year,
            market: market.to_string(),
            tracks_computed: rollup.tracks.len(),
            artists_computed: rollup.artists.len(),
            genres_computed: rollup.genres.len(),
            duration_seconds,
            message: format!("Aggregates for {} {} refreshed", year, market),
        })
    }
}
