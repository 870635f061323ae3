//! Read-side interface of the chart store.

use super::models::*;
use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};

/// Read and rollup operations used by the HTTP layer and the aggregation job.
///
/// Ingestion writes go through [`super::SqliteChartStore::ingest_in_transaction`]
/// instead, since they need a transaction spanning many calls.
pub trait ChartStore: Send + Sync {
    /// Most recent snapshot date recorded for any playlist of `market`.
    fn latest_snapshot_date(&self, market: &str) -> Result<Option<NaiveDate>>;

    /// Ranked chart of `market` on `date`, best rank first.
    fn get_chart(&self, market: &str, date: NaiveDate, limit: usize) -> Result<Vec<ChartEntry>>;

    fn get_track(&self, id: &str) -> Result<Option<Track>>;
    fn get_artist(&self, id: &str) -> Result<Option<Artist>>;
    fn get_track_artist_ids(&self, track_id: &str) -> Result<Vec<String>>;

    /// Precomputed yearly track rows, empty if the rollup was never computed.
    fn get_yearly_track_stats(
        &self,
        year: i32,
        market: &str,
        limit: usize,
    ) -> Result<Vec<YearlyTrackStats>>;

    /// Yearly track rows computed directly from snapshots.
    fn compute_yearly_track_stats(
        &self,
        year: i32,
        market: &str,
        limit: Option<usize>,
    ) -> Result<Vec<YearlyTrackStats>>;

    fn get_yearly_artist_stats(
        &self,
        year: i32,
        market: &str,
        limit: usize,
    ) -> Result<Vec<YearlyArtistStats>>;

    fn compute_yearly_artist_stats(
        &self,
        year: i32,
        market: &str,
        limit: Option<usize>,
    ) -> Result<Vec<YearlyArtistStats>>;

    fn get_yearly_genre_stats(
        &self,
        year: i32,
        market: &str,
        limit: usize,
    ) -> Result<Vec<YearlyGenreStats>>;

    fn compute_yearly_genre_stats(
        &self,
        year: i32,
        market: &str,
        limit: Option<usize>,
    ) -> Result<Vec<YearlyGenreStats>>;

    /// Atomically replaces every rollup row of (year, market).
    fn replace_yearly_stats(
        &self,
        year: i32,
        market: &str,
        rollup: &YearlyRollup,
        computed_at: DateTime<Utc>,
    ) -> Result<()>;

    fn last_snapshot_date(&self) -> Result<Option<NaiveDate>>;
    fn last_aggregate_computed_at(&self) -> Result<Option<DateTime<Utc>>>;
    fn counts(&self) -> Result<StoreCounts>;
    fn ping(&self) -> Result<()>;
}
