//! SQLite schema for the chart database.
//!
//! Primary keys are integer rowids; catalog identifiers are unique text columns
//! used for lookups. Snapshots are the append-only fact table, the yearly tables
//! are derived rollups that can be rebuilt at any time.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};

const ARTIST_FK: ForeignKey = ForeignKey {
    foreign_table: "artists",
    foreign_column: "rowid",
    on_delete: ForeignKeyOnChange::Cascade,
};

const TRACK_FK: ForeignKey = ForeignKey {
    foreign_table: "tracks",
    foreign_column: "rowid",
    on_delete: ForeignKeyOnChange::Cascade,
};

const PLAYLIST_FK: ForeignKey = ForeignKey {
    foreign_table: "playlists",
    foreign_column: "rowid",
    on_delete: ForeignKeyOnChange::Cascade,
};

// =============================================================================
// Entities
// =============================================================================

const ARTISTS_TABLE: Table = Table {
    name: "artists",
    columns: &[
        sqlite_column!("rowid", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("id", &SqlType::Text, non_null = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("popularity", &SqlType::Integer),
        sqlite_column!("followers", &SqlType::Integer),
        sqlite_column!("external_url", &SqlType::Text),
        sqlite_column!("image_url", &SqlType::Text),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "updated_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_artists_name", "name")],
    unique_constraints: &[&["id"]],
};

/// Genre tags of an artist, replaced as a whole set.
const ARTIST_GENRES_TABLE: Table = Table {
    name: "artist_genres",
    columns: &[
        sqlite_column!(
            "artist_rowid",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ARTIST_FK)
        ),
        sqlite_column!("genre", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_artist_genres_genre", "genre")],
    unique_constraints: &[&["artist_rowid", "genre"]],
};

const TRACKS_TABLE: Table = Table {
    name: "tracks",
    columns: &[
        sqlite_column!("rowid", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("id", &SqlType::Text, non_null = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("album_id", &SqlType::Text),
        sqlite_column!("album_name", &SqlType::Text),
        sqlite_column!("album_release_date", &SqlType::Text), // '2023-05-15', '2023-05', '2023'
        sqlite_column!("duration_ms", &SqlType::Integer),
        sqlite_column!(
            "explicit",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "popularity",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!("preview_url", &SqlType::Text),
        sqlite_column!("external_url", &SqlType::Text),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "updated_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_tracks_name", "name")],
    unique_constraints: &[&["id"]],
};

const TRACK_ARTISTS_TABLE: Table = Table {
    name: "track_artists",
    columns: &[
        sqlite_column!(
            "track_rowid",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&TRACK_FK)
        ),
        sqlite_column!(
            "artist_rowid",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ARTIST_FK)
        ),
    ],
    indices: &[("idx_track_artists_artist", "artist_rowid")],
    unique_constraints: &[&["track_rowid", "artist_rowid"]],
};

const PLAYLISTS_TABLE: Table = Table {
    name: "playlists",
    columns: &[
        sqlite_column!("rowid", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("id", &SqlType::Text, non_null = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("market", &SqlType::Text, non_null = true),
        sqlite_column!("description", &SqlType::Text),
        sqlite_column!("external_url", &SqlType::Text),
        sqlite_column!("image_url", &SqlType::Text),
        sqlite_column!(
            "created_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_playlists_market", "market")],
    unique_constraints: &[&["id"]],
};

// =============================================================================
// Snapshots
// =============================================================================

const PLAYLIST_TRACK_SNAPSHOTS_TABLE: Table = Table {
    name: "playlist_track_snapshots",
    columns: &[
        sqlite_column!("rowid", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "playlist_rowid",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&PLAYLIST_FK)
        ),
        sqlite_column!(
            "track_rowid",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&TRACK_FK)
        ),
        sqlite_column!("snapshot_date", &SqlType::Text, non_null = true), // 'YYYY-MM-DD'
        sqlite_column!("rank", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "fetched_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("added_at", &SqlType::Integer),
    ],
    indices: &[
        ("idx_snapshots_date", "snapshot_date"),
        ("idx_snapshots_track", "track_rowid"),
        ("idx_snapshots_playlist_date", "playlist_rowid, snapshot_date"),
    ],
    unique_constraints: &[&["playlist_rowid", "track_rowid", "snapshot_date"]],
};

// =============================================================================
// Yearly rollups
// =============================================================================

const YEARLY_TRACK_STATS_TABLE: Table = Table {
    name: "yearly_track_stats",
    columns: &[
        sqlite_column!("year", &SqlType::Integer, non_null = true),
        sqlite_column!("market", &SqlType::Text, non_null = true),
        sqlite_column!(
            "track_rowid",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&TRACK_FK)
        ),
        sqlite_column!("track_name", &SqlType::Text, non_null = true),
        sqlite_column!("appearances", &SqlType::Integer, non_null = true),
        sqlite_column!("avg_rank", &SqlType::Real, non_null = true),
        sqlite_column!("best_rank", &SqlType::Integer, non_null = true),
        sqlite_column!("worst_rank", &SqlType::Integer, non_null = true),
        sqlite_column!("popularity", &SqlType::Integer, non_null = true),
        sqlite_column!("first_appearance", &SqlType::Text, non_null = true),
        sqlite_column!("last_appearance", &SqlType::Text, non_null = true),
        sqlite_column!("days_on_chart", &SqlType::Integer, non_null = true),
        sqlite_column!("last_computed_at", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_yearly_track_stats_year_market", "year, market")],
    unique_constraints: &[&["year", "market", "track_rowid"]],
};

const YEARLY_ARTIST_STATS_TABLE: Table = Table {
    name: "yearly_artist_stats",
    columns: &[
        sqlite_column!("year", &SqlType::Integer, non_null = true),
        sqlite_column!("market", &SqlType::Text, non_null = true),
        sqlite_column!(
            "artist_rowid",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ARTIST_FK)
        ),
        sqlite_column!("artist_name", &SqlType::Text, non_null = true),
        sqlite_column!("track_count", &SqlType::Integer, non_null = true),
        sqlite_column!("total_appearances", &SqlType::Integer, non_null = true),
        sqlite_column!("avg_popularity", &SqlType::Real, non_null = true),
        sqlite_column!(
            "top_track_rowid",
            &SqlType::Integer,
            foreign_key = Some(&TRACK_FK)
        ),
        sqlite_column!("top_track_name", &SqlType::Text),
        sqlite_column!("last_computed_at", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_yearly_artist_stats_year_market", "year, market")],
    unique_constraints: &[&["year", "market", "artist_rowid"]],
};

const YEARLY_GENRE_STATS_TABLE: Table = Table {
    name: "yearly_genre_stats",
    columns: &[
        sqlite_column!("year", &SqlType::Integer, non_null = true),
        sqlite_column!("market", &SqlType::Text, non_null = true),
        sqlite_column!("genre", &SqlType::Text, non_null = true),
        sqlite_column!("track_count", &SqlType::Integer, non_null = true),
        sqlite_column!("total_appearances", &SqlType::Integer, non_null = true),
        sqlite_column!("avg_popularity", &SqlType::Real, non_null = true),
        sqlite_column!(
            "top_track_rowid",
            &SqlType::Integer,
            foreign_key = Some(&TRACK_FK)
        ),
        sqlite_column!("top_track_name", &SqlType::Text),
        sqlite_column!("last_computed_at", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_yearly_genre_stats_year_market", "year, market")],
    unique_constraints: &[&["year", "market", "genre"]],
};

pub const CHART_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[
        ARTISTS_TABLE,
        ARTIST_GENRES_TABLE,
        TRACKS_TABLE,
        TRACK_ARTISTS_TABLE,
        PLAYLISTS_TABLE,
        PLAYLIST_TRACK_SNAPSHOTS_TABLE,
        YEARLY_TRACK_STATS_TABLE,
        YEARLY_ARTIST_STATS_TABLE,
        YEARLY_GENRE_STATS_TABLE,
    ],
    migration: None,
}];
