use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// Field values observed for a track in one catalog sighting.
///
/// `None` means "not present in this sighting": it never erases stored data.
#[derive(Debug, Clone, Default)]
pub struct TrackUpsert {
    pub id: String,
    pub name: Option<String>,
    pub album_id: Option<String>,
    pub album_name: Option<String>,
    pub album_release_date: Option<String>,
    pub duration_ms: Option<i64>,
    pub explicit: Option<bool>,
    pub popularity: Option<i64>,
    pub preview_url: Option<String>,
    pub external_url: Option<String>,
}

/// Field values observed for an artist in one catalog sighting.
///
/// `genres` replaces the stored tag set only when present.
#[derive(Debug, Clone, Default)]
pub struct ArtistUpsert {
    pub id: String,
    pub name: Option<String>,
    pub popularity: Option<i64>,
    pub followers: Option<i64>,
    pub genres: Option<Vec<String>>,
    pub external_url: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub rowid: i64,
    pub created: bool,
}

impl UpsertOutcome {
    pub fn created(rowid: i64) -> Self {
        Self {
            rowid,
            created: true,
        }
    }

    pub fn updated(rowid: i64) -> Self {
        Self {
            rowid,
            created: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub album_id: Option<String>,
    pub album_name: Option<String>,
    pub album_release_date: Option<String>,
    pub duration_ms: Option<i64>,
    pub explicit: bool,
    pub popularity: i64,
    pub preview_url: Option<String>,
    pub external_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
    pub popularity: Option<i64>,
    pub followers: Option<i64>,
    pub genres: Vec<String>,
    pub external_url: Option<String>,
}

/// A ranked row of a daily chart, with its track and artist names resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartEntry {
    pub rank: u32,
    pub track: Track,
    pub artists: Vec<String>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearlyTrackStats {
    #[serde(skip)]
    pub track_rowid: i64,
    pub track_id: String,
    pub track_name: String,
    pub appearances: i64,
    pub avg_rank: f64,
    pub best_rank: i64,
    pub worst_rank: i64,
    pub popularity: i64,
    pub first_appearance: NaiveDate,
    pub last_appearance: NaiveDate,
    pub days_on_chart: i64,
    pub last_computed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearlyArtistStats {
    #[serde(skip)]
    pub artist_rowid: i64,
    pub artist_id: String,
    pub artist_name: String,
    pub track_count: i64,
    pub total_appearances: i64,
    pub avg_popularity: f64,
    #[serde(skip)]
    pub top_track_rowid: Option<i64>,
    pub top_track_id: Option<String>,
    pub top_track_name: Option<String>,
    pub last_computed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearlyGenreStats {
    pub genre: String,
    pub track_count: i64,
    pub total_appearances: i64,
    pub avg_popularity: f64,
    #[serde(skip)]
    pub top_track_rowid: Option<i64>,
    pub top_track_id: Option<String>,
    pub top_track_name: Option<String>,
    pub last_computed_at: Option<DateTime<Utc>>,
}

/// All three rollups for one (year, market), written together.
#[derive(Debug, Clone, Default)]
pub struct YearlyRollup {
    pub tracks: Vec<YearlyTrackStats>,
    pub artists: Vec<YearlyArtistStats>,
    pub genres: Vec<YearlyGenreStats>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub artists: usize,
    pub tracks: usize,
    pub playlists: usize,
    pub snapshots: usize,
    pub track_artist_links: usize,
}
