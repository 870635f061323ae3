//! Upsert primitives used by ingestion.
//!
//! Every operation is read-then-insert-or-update against the connection it was
//! given (normally a transaction or savepoint). When an insert loses a race on a
//! UNIQUE constraint the row is re-read and updated instead.

use super::models::{ArtistUpsert, TrackUpsert, UpsertOutcome};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;

pub const PLACEHOLDER_PLAYLIST_DESCRIPTION: &str = "Top 50 tracks playlist";

pub fn placeholder_playlist_name(market: &str) -> String {
    format!("Top 50 - {}", market)
}

pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

pub struct ChartWriter<'a> {
    conn: &'a Connection,
}

impl<'a> ChartWriter<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn rowid_by_id(&self, table: &str, id: &str) -> Result<Option<i64>> {
        let rowid = self
            .conn
            .prepare_cached(&format!("SELECT rowid FROM {} WHERE id = ?1", table))?
            .query_row(params![id], |r| r.get(0))
            .optional()?;
        Ok(rowid)
    }

    /// Runs `insert`; if it trips a UNIQUE constraint, falls back to looking the
    /// row up again and running `update` on it.
    fn insert_or_update(
        &self,
        table: &str,
        id: &str,
        insert: impl FnOnce() -> rusqlite::Result<usize>,
        update: impl FnOnce(i64) -> Result<()>,
    ) -> Result<UpsertOutcome> {
        match insert() {
            Ok(_) => Ok(UpsertOutcome::created(self.conn.last_insert_rowid())),
            Err(e) if is_unique_violation(&e) => {
                let rowid = self
                    .rowid_by_id(table, id)?
                    .with_context(|| format!("{} row {} vanished after conflict", table, id))?;
                update(rowid)?;
                Ok(UpsertOutcome::updated(rowid))
            }
            Err(e) => Err(e.into()),
        }
    }

    // =========================================================================
    // Playlists
    // =========================================================================

    /// Returns the playlist row for `id`, creating a placeholder if absent.
    /// The market of an existing playlist is never changed.
    pub fn ensure_playlist(&self, id: &str, market: &str) -> Result<UpsertOutcome> {
        if let Some(rowid) = self.rowid_by_id("playlists", id)? {
            return Ok(UpsertOutcome::updated(rowid));
        }
        self.insert_or_update(
            "playlists",
            id,
            || {
                self.conn.execute(
                    "INSERT INTO playlists (id, name, market, description) VALUES (?1, ?2, ?3, ?4)",
                    params![
                        id,
                        placeholder_playlist_name(market),
                        market,
                        PLACEHOLDER_PLAYLIST_DESCRIPTION
                    ],
                )
            },
            |_| Ok(()),
        )
    }

    // =========================================================================
    // Tracks
    // =========================================================================

    fn update_track(&self, rowid: i64, track: &TrackUpsert) -> Result<()> {
        self.conn.execute(
            "UPDATE tracks SET
                name = COALESCE(?2, name),
                album_id = COALESCE(?3, album_id),
                album_name = COALESCE(?4, album_name),
                album_release_date = COALESCE(?5, album_release_date),
                duration_ms = COALESCE(?6, duration_ms),
                explicit = COALESCE(?7, explicit),
                popularity = COALESCE(?8, popularity),
                preview_url = COALESCE(?9, preview_url),
                external_url = COALESCE(?10, external_url),
                updated_at = cast(strftime('%s','now') as int)
             WHERE rowid = ?1",
            params![
                rowid,
                track.name,
                track.album_id,
                track.album_name,
                track.album_release_date,
                track.duration_ms,
                track.explicit,
                track.popularity,
                track.preview_url,
                track.external_url,
            ],
        )?;
        Ok(())
    }

    /// Creates the track or applies a null-coalescing update to it.
    pub fn upsert_track(&self, track: &TrackUpsert) -> Result<UpsertOutcome> {
        if let Some(rowid) = self.rowid_by_id("tracks", &track.id)? {
            self.update_track(rowid, track)?;
            return Ok(UpsertOutcome::updated(rowid));
        }

        let name = track
            .name
            .as_deref()
            .with_context(|| format!("Track {} has no name", track.id))?;

        self.insert_or_update(
            "tracks",
            &track.id,
            || {
                self.conn.execute(
                    "INSERT INTO tracks (id, name, album_id, album_name, album_release_date,
                        duration_ms, explicit, popularity, preview_url, external_url)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    params![
                        track.id,
                        name,
                        track.album_id,
                        track.album_name,
                        track.album_release_date,
                        track.duration_ms,
                        track.explicit.unwrap_or(false),
                        track.popularity.unwrap_or(0),
                        track.preview_url,
                        track.external_url,
                    ],
                )
            },
            |rowid| self.update_track(rowid, track),
        )
    }

    // =========================================================================
    // Artists
    // =========================================================================

    fn replace_artist_genres(&self, artist_rowid: i64, genres: &[String]) -> Result<()> {
        self.conn.execute(
            "DELETE FROM artist_genres WHERE artist_rowid = ?1",
            params![artist_rowid],
        )?;
        let unique: BTreeSet<&str> = genres
            .iter()
            .map(|g| g.trim())
            .filter(|g| !g.is_empty())
            .collect();
        let mut stmt = self
            .conn
            .prepare_cached("INSERT INTO artist_genres (artist_rowid, genre) VALUES (?1, ?2)")?;
        for genre in unique {
            stmt.execute(params![artist_rowid, genre])?;
        }
        Ok(())
    }

    fn update_artist(&self, rowid: i64, artist: &ArtistUpsert) -> Result<()> {
        self.conn.execute(
            "UPDATE artists SET
                name = COALESCE(?2, name),
                popularity = COALESCE(?3, popularity),
                followers = COALESCE(?4, followers),
                external_url = COALESCE(?5, external_url),
                image_url = COALESCE(?6, image_url),
                updated_at = cast(strftime('%s','now') as int)
             WHERE rowid = ?1",
            params![
                rowid,
                artist.name,
                artist.popularity,
                artist.followers,
                artist.external_url,
                artist.image_url,
            ],
        )?;
        if let Some(genres) = &artist.genres {
            self.replace_artist_genres(rowid, genres)?;
        }
        Ok(())
    }

    /// Creates the artist or applies a null-coalescing update to it.
    pub fn upsert_artist(&self, artist: &ArtistUpsert) -> Result<UpsertOutcome> {
        if let Some(rowid) = self.rowid_by_id("artists", &artist.id)? {
            self.update_artist(rowid, artist)?;
            return Ok(UpsertOutcome::updated(rowid));
        }

        let name = artist
            .name
            .as_deref()
            .with_context(|| format!("Artist {} has no name", artist.id))?;

        let outcome = self.insert_or_update(
            "artists",
            &artist.id,
            || {
                self.conn.execute(
                    "INSERT INTO artists (id, name, popularity, followers, external_url, image_url)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        artist.id,
                        name,
                        artist.popularity,
                        artist.followers,
                        artist.external_url,
                        artist.image_url,
                    ],
                )
            },
            |rowid| self.update_artist(rowid, artist),
        )?;
        if outcome.created {
            if let Some(genres) = &artist.genres {
                self.replace_artist_genres(outcome.rowid, genres)?;
            }
        }
        Ok(outcome)
    }

    /// Replaces the full artist set of a track. Duplicate artists collapse.
    pub fn replace_track_artists(&self, track_rowid: i64, artist_rowids: &[i64]) -> Result<()> {
        self.conn.execute(
            "DELETE FROM track_artists WHERE track_rowid = ?1",
            params![track_rowid],
        )?;
        let unique: BTreeSet<i64> = artist_rowids.iter().copied().collect();
        let mut stmt = self
            .conn
            .prepare_cached("INSERT INTO track_artists (track_rowid, artist_rowid) VALUES (?1, ?2)")?;
        for artist_rowid in unique {
            stmt.execute(params![track_rowid, artist_rowid])?;
        }
        Ok(())
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    fn snapshot_rowid(
        &self,
        playlist_rowid: i64,
        track_rowid: i64,
        date: NaiveDate,
    ) -> Result<Option<i64>> {
        let rowid = self
            .conn
            .prepare_cached(
                "SELECT rowid FROM playlist_track_snapshots
                 WHERE playlist_rowid = ?1 AND track_rowid = ?2 AND snapshot_date = ?3",
            )?
            .query_row(params![playlist_rowid, track_rowid, date], |r| r.get(0))
            .optional()?;
        Ok(rowid)
    }

    fn update_snapshot(&self, rowid: i64, rank: u32, added_at: Option<i64>) -> Result<()> {
        self.conn.execute(
            "UPDATE playlist_track_snapshots SET
                rank = ?2,
                added_at = COALESCE(?3, added_at),
                fetched_at = cast(strftime('%s','now') as int)
             WHERE rowid = ?1",
            params![rowid, rank, added_at],
        )?;
        Ok(())
    }

    /// Records `rank` for (playlist, track, date), updating the existing row for
    /// that triple in place if there is one.
    pub fn upsert_snapshot(
        &self,
        playlist_rowid: i64,
        track_rowid: i64,
        date: NaiveDate,
        rank: u32,
        added_at: Option<i64>,
    ) -> Result<UpsertOutcome> {
        if let Some(rowid) = self.snapshot_rowid(playlist_rowid, track_rowid, date)? {
            self.update_snapshot(rowid, rank, added_at)?;
            return Ok(UpsertOutcome::updated(rowid));
        }

        let inserted = self.conn.execute(
            "INSERT INTO playlist_track_snapshots (playlist_rowid, track_rowid, snapshot_date, rank, added_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![playlist_rowid, track_rowid, date, rank, added_at],
        );
        match inserted {
            Ok(_) => Ok(UpsertOutcome::created(self.conn.last_insert_rowid())),
            Err(e) if is_unique_violation(&e) => {
                let rowid = self
                    .snapshot_rowid(playlist_rowid, track_rowid, date)?
                    .context("Snapshot row vanished after conflict")?;
                self.update_snapshot(rowid, rank, added_at)?;
                Ok(UpsertOutcome::updated(rowid))
            }
            Err(e) => Err(e.into()),
        }
    }
}
