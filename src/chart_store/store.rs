//! SQLite-backed chart store.
//!
//! One write connection guarded by a mutex plus a small pool of read-only
//! connections, all in WAL mode so readers never wait on the ingestion writer.

use super::models::*;
use super::schema::CHART_VERSIONED_SCHEMAS;
use super::trait_def::ChartStore;
use crate::sqlite_persistence::migrate_if_needed;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Transaction, TransactionBehavior};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub struct SqliteChartStore {
    read_pool: Vec<Arc<Mutex<Connection>>>,
    write_conn: Arc<Mutex<Connection>>,
    read_index: Arc<AtomicUsize>,
}

fn year_bounds(year: i32) -> Result<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1)
        .with_context(|| format!("Invalid year {}", year))?;
    let end = NaiveDate::from_ymd_opt(year, 12, 31)
        .with_context(|| format!("Invalid year {}", year))?;
    Ok((start, end))
}

fn sql_limit(limit: Option<usize>) -> i64 {
    limit.map(|l| l as i64).unwrap_or(-1)
}

fn timestamp_to_datetime(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

/// Per (entity, track) appearance numbers, folded into artist/genre rollups.
struct TrackContribution {
    track_rowid: i64,
    track_id: String,
    track_name: String,
    popularity: i64,
    appearances: i64,
    avg_rank: f64,
}

impl TrackContribution {
    /// True if `self` should be preferred over `other` as an entity's top track.
    fn beats(&self, other: &TrackContribution) -> bool {
        (other.appearances, self.avg_rank, &self.track_id)
            .partial_cmp(&(self.appearances, other.avg_rank, &other.track_id))
            .map(|o| o == std::cmp::Ordering::Less)
            .unwrap_or(false)
    }
}

struct Accumulator {
    rowid: i64,
    id: String,
    name: String,
    track_count: i64,
    total_appearances: i64,
    popularity_sum: i64,
    top: Option<TrackContribution>,
}

impl Accumulator {
    fn new(rowid: i64, id: String, name: String) -> Self {
        Self {
            rowid,
            id,
            name,
            track_count: 0,
            total_appearances: 0,
            popularity_sum: 0,
            top: None,
        }
    }

    fn add(&mut self, contribution: TrackContribution) {
        self.track_count += 1;
        self.total_appearances += contribution.appearances;
        self.popularity_sum += contribution.popularity;
        let replace = match &self.top {
            None => true,
            Some(current) => contribution.beats(current),
        };
        if replace {
            self.top = Some(contribution);
        }
    }

    fn avg_popularity(&self) -> f64 {
        if self.track_count == 0 {
            0.0
        } else {
            self.popularity_sum as f64 / self.track_count as f64
        }
    }
}

/// Orders by total appearances desc, track count desc, then name asc.
fn sort_accumulators(accumulators: &mut [Accumulator]) {
    accumulators.sort_by(|a, b| {
        b.total_appearances
            .cmp(&a.total_appearances)
            .then(b.track_count.cmp(&a.track_count))
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    });
}

impl SqliteChartStore {
    /// Opens (creating if needed) the chart database at `db_path`.
    ///
    /// `read_pool_size` read-only connections are kept for concurrent readers.
    pub fn new<P: AsRef<Path>>(db_path: P, read_pool_size: usize) -> Result<Self> {
        let db_path_ref = db_path.as_ref();

        let mut write_conn = Connection::open_with_flags(
            db_path_ref,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open chart database {:?}", db_path_ref))?;

        write_conn.pragma_update(None, "journal_mode", "WAL")?;
        write_conn.pragma_update(None, "foreign_keys", "ON")?;
        write_conn.busy_timeout(std::time::Duration::from_secs(5))?;
        migrate_if_needed(&mut write_conn, CHART_VERSIONED_SCHEMAS)?;

        let mut read_pool = Vec::with_capacity(read_pool_size.max(1));
        for _ in 0..read_pool_size.max(1) {
            let read_conn = Connection::open_with_flags(
                db_path_ref,
                OpenFlags::SQLITE_OPEN_READ_ONLY
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            read_conn.busy_timeout(std::time::Duration::from_secs(5))?;
            read_pool.push(Arc::new(Mutex::new(read_conn)));
        }

        let store = SqliteChartStore {
            write_conn: Arc::new(Mutex::new(write_conn)),
            read_pool,
            read_index: Arc::new(AtomicUsize::new(0)),
        };

        let counts = store.counts()?;
        info!(
            "Opened chart database: {} artists, {} tracks, {} playlists, {} snapshots",
            counts.artists, counts.tracks, counts.playlists, counts.snapshots
        );

        Ok(store)
    }

    fn get_read_conn(&self) -> Arc<Mutex<Connection>> {
        let index = self.read_index.fetch_add(1, Ordering::SeqCst) % self.read_pool.len();
        self.read_pool[index].clone()
    }

    /// Runs `f` inside a single `BEGIN IMMEDIATE` transaction on the write
    /// connection, committing if it returns `Ok` and rolling back otherwise.
    pub fn ingest_in_transaction<T>(
        &self,
        f: impl FnOnce(&mut Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut conn = self.write_conn.lock().unwrap();
        let mut tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&mut tx)?;
        tx.commit()?;
        Ok(value)
    }

    // =========================================================================
    // Internal Helper Methods
    // =========================================================================

    fn get_track_artist_names(conn: &Connection, track_rowid: i64) -> Result<Vec<String>> {
        let mut stmt = conn.prepare_cached(
            "SELECT a.name FROM track_artists ta
             JOIN artists a ON a.rowid = ta.artist_rowid
             WHERE ta.track_rowid = ?1
             ORDER BY a.name, a.id",
        )?;
        let names = stmt
            .query_map(params![track_rowid], |r| r.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    fn parse_track_row(row: &rusqlite::Row, offset: usize) -> rusqlite::Result<Track> {
        Ok(Track {
            id: row.get(offset)?,
            name: row.get(offset + 1)?,
            album_id: row.get(offset + 2)?,
            album_name: row.get(offset + 3)?,
            album_release_date: row.get(offset + 4)?,
            duration_ms: row.get(offset + 5)?,
            explicit: row.get(offset + 6)?,
            popularity: row.get(offset + 7)?,
            preview_url: row.get(offset + 8)?,
            external_url: row.get(offset + 9)?,
        })
    }

    const TRACK_COLUMNS: &'static str = "t.id, t.name, t.album_id, t.album_name, t.album_release_date, \
         t.duration_ms, t.explicit, t.popularity, t.preview_url, t.external_url";

    fn track_contributions(
        conn: &Connection,
        sql: &str,
        year: i32,
        market: &str,
    ) -> Result<Vec<(i64, String, String, TrackContribution)>> {
        let (start, end) = year_bounds(year)?;
        let mut stmt = conn.prepare_cached(sql)?;
        let rows = stmt
            .query_map(params![market, start, end], |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    TrackContribution {
                        track_rowid: r.get(3)?,
                        track_id: r.get(4)?,
                        track_name: r.get(5)?,
                        popularity: r.get(6)?,
                        appearances: r.get(7)?,
                        avg_rank: r.get(8)?,
                    },
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn fold_contributions(
        rows: Vec<(i64, String, String, TrackContribution)>,
    ) -> Vec<Accumulator> {
        let mut by_key: HashMap<(i64, String), Accumulator> = HashMap::new();
        for (rowid, id, name, contribution) in rows {
            by_key
                .entry((rowid, id.clone()))
                .or_insert_with(|| Accumulator::new(rowid, id, name))
                .add(contribution);
        }
        let mut accumulators: Vec<Accumulator> = by_key.into_values().collect();
        sort_accumulators(&mut accumulators);
        accumulators
    }

    fn count(conn: &Connection, table: &str) -> Result<usize> {
        let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| {
            r.get(0)
        })?;
        Ok(n as usize)
    }
}

impl ChartStore for SqliteChartStore {
    fn latest_snapshot_date(&self, market: &str) -> Result<Option<NaiveDate>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let date = conn.query_row(
            "SELECT MAX(s.snapshot_date) FROM playlist_track_snapshots s
             JOIN playlists p ON p.rowid = s.playlist_rowid
             WHERE p.market = ?1",
            params![market],
            |r| r.get::<_, Option<NaiveDate>>(0),
        )?;
        Ok(date)
    }

    fn get_chart(&self, market: &str, date: NaiveDate, limit: usize) -> Result<Vec<ChartEntry>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let sql = format!(
            "SELECT s.rank, s.fetched_at, t.rowid, {}
             FROM playlist_track_snapshots s
             JOIN playlists p ON p.rowid = s.playlist_rowid
             JOIN tracks t ON t.rowid = s.track_rowid
             WHERE p.market = ?1 AND s.snapshot_date = ?2
             ORDER BY s.rank ASC, t.id ASC
             LIMIT ?3",
            Self::TRACK_COLUMNS
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt
            .query_map(params![market, date, limit as i64], |r| {
                Ok((
                    r.get::<_, u32>(0)?,
                    r.get::<_, i64>(1)?,
                    r.get::<_, i64>(2)?,
                    Self::parse_track_row(r, 3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut entries = Vec::with_capacity(rows.len());
        for (rank, fetched_at, track_rowid, track) in rows {
            entries.push(ChartEntry {
                rank,
                artists: Self::get_track_artist_names(&conn, track_rowid)?,
                track,
                fetched_at: timestamp_to_datetime(fetched_at).unwrap_or_default(),
            });
        }
        Ok(entries)
    }

    fn get_track(&self, id: &str) -> Result<Option<Track>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let sql = format!("SELECT {} FROM tracks t WHERE t.id = ?1", Self::TRACK_COLUMNS);
        let track = conn
            .query_row(&sql, params![id], |r| Self::parse_track_row(r, 0))
            .optional()?;
        Ok(track)
    }

    fn get_artist(&self, id: &str) -> Result<Option<Artist>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT rowid, id, name, popularity, followers, external_url FROM artists WHERE id = ?1",
                params![id],
                |r| {
                    Ok((
                        r.get::<_, i64>(0)?,
                        Artist {
                            id: r.get(1)?,
                            name: r.get(2)?,
                            popularity: r.get(3)?,
                            followers: r.get(4)?,
                            genres: Vec::new(),
                            external_url: r.get(5)?,
                        },
                    ))
                },
            )
            .optional()?;
        let Some((rowid, mut artist)) = row else {
            return Ok(None);
        };
        let mut stmt = conn
            .prepare_cached("SELECT genre FROM artist_genres WHERE artist_rowid = ?1 ORDER BY genre")?;
        artist.genres = stmt
            .query_map(params![rowid], |r| r.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(Some(artist))
    }

    fn get_track_artist_ids(&self, track_id: &str) -> Result<Vec<String>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT a.id FROM track_artists ta
             JOIN tracks t ON t.rowid = ta.track_rowid
             JOIN artists a ON a.rowid = ta.artist_rowid
             WHERE t.id = ?1
             ORDER BY a.id",
        )?;
        let ids = stmt
            .query_map(params![track_id], |r| r.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    // =========================================================================
    // Yearly tracks
    // =========================================================================

    fn get_yearly_track_stats(
        &self,
        year: i32,
        market: &str,
        limit: usize,
    ) -> Result<Vec<YearlyTrackStats>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT y.track_rowid, t.id, y.track_name, y.appearances, y.avg_rank, y.best_rank,
                    y.worst_rank, y.popularity, y.first_appearance, y.last_appearance,
                    y.days_on_chart, y.last_computed_at
             FROM yearly_track_stats y
             JOIN tracks t ON t.rowid = y.track_rowid
             WHERE y.year = ?1 AND y.market = ?2
             ORDER BY y.appearances DESC, y.avg_rank ASC, t.id ASC
             LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(params![year, market, limit as i64], |r| {
                Ok(YearlyTrackStats {
                    track_rowid: r.get(0)?,
                    track_id: r.get(1)?,
                    track_name: r.get(2)?,
                    appearances: r.get(3)?,
                    avg_rank: r.get(4)?,
                    best_rank: r.get(5)?,
                    worst_rank: r.get(6)?,
                    popularity: r.get(7)?,
                    first_appearance: r.get(8)?,
                    last_appearance: r.get(9)?,
                    days_on_chart: r.get(10)?,
                    last_computed_at: timestamp_to_datetime(r.get(11)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn compute_yearly_track_stats(
        &self,
        year: i32,
        market: &str,
        limit: Option<usize>,
    ) -> Result<Vec<YearlyTrackStats>> {
        let (start, end) = year_bounds(year)?;
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT t.rowid, t.id, t.name,
                    COUNT(*) AS appearances,
                    AVG(s.rank) AS avg_rank,
                    MIN(s.rank), MAX(s.rank), MAX(t.popularity),
                    MIN(s.snapshot_date), MAX(s.snapshot_date),
                    COUNT(DISTINCT s.snapshot_date)
             FROM playlist_track_snapshots s
             JOIN playlists p ON p.rowid = s.playlist_rowid
             JOIN tracks t ON t.rowid = s.track_rowid
             WHERE p.market = ?1 AND s.snapshot_date BETWEEN ?2 AND ?3
             GROUP BY t.rowid
             ORDER BY appearances DESC, avg_rank ASC, t.id ASC
             LIMIT ?4",
        )?;
        let rows = stmt
            .query_map(params![market, start, end, sql_limit(limit)], |r| {
                Ok(YearlyTrackStats {
                    track_rowid: r.get(0)?,
                    track_id: r.get(1)?,
                    track_name: r.get(2)?,
                    appearances: r.get(3)?,
                    avg_rank: r.get(4)?,
                    best_rank: r.get(5)?,
                    worst_rank: r.get(6)?,
                    popularity: r.get(7)?,
                    first_appearance: r.get(8)?,
                    last_appearance: r.get(9)?,
                    days_on_chart: r.get(10)?,
                    last_computed_at: None,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // =========================================================================
    // Yearly artists
    // =========================================================================

    fn get_yearly_artist_stats(
        &self,
        year: i32,
        market: &str,
        limit: usize,
    ) -> Result<Vec<YearlyArtistStats>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT y.artist_rowid, a.id, y.artist_name, y.track_count, y.total_appearances,
                    y.avg_popularity, y.top_track_rowid, t.id, y.top_track_name, y.last_computed_at
             FROM yearly_artist_stats y
             JOIN artists a ON a.rowid = y.artist_rowid
             LEFT JOIN tracks t ON t.rowid = y.top_track_rowid
             WHERE y.year = ?1 AND y.market = ?2
             ORDER BY y.total_appearances DESC, y.track_count DESC, y.artist_name ASC, a.id ASC
             LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(params![year, market, limit as i64], |r| {
                Ok(YearlyArtistStats {
                    artist_rowid: r.get(0)?,
                    artist_id: r.get(1)?,
                    artist_name: r.get(2)?,
                    track_count: r.get(3)?,
                    total_appearances: r.get(4)?,
                    avg_popularity: r.get(5)?,
                    top_track_rowid: r.get(6)?,
                    top_track_id: r.get(7)?,
                    top_track_name: r.get(8)?,
                    last_computed_at: timestamp_to_datetime(r.get(9)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn compute_yearly_artist_stats(
        &self,
        year: i32,
        market: &str,
        limit: Option<usize>,
    ) -> Result<Vec<YearlyArtistStats>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let rows = Self::track_contributions(
            &conn,
            "SELECT a.rowid, a.id, a.name, t.rowid, t.id, t.name, t.popularity,
                    COUNT(DISTINCT s.rowid), AVG(s.rank)
             FROM playlist_track_snapshots s
             JOIN playlists p ON p.rowid = s.playlist_rowid
             JOIN tracks t ON t.rowid = s.track_rowid
             JOIN track_artists ta ON ta.track_rowid = t.rowid
             JOIN artists a ON a.rowid = ta.artist_rowid
             WHERE p.market = ?1 AND s.snapshot_date BETWEEN ?2 AND ?3
             GROUP BY a.rowid, t.rowid",
            year,
            market,
        )?;

        let stats = Self::fold_contributions(rows)
            .into_iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|acc| {
                let avg_popularity = acc.avg_popularity();
                YearlyArtistStats {
                    artist_rowid: acc.rowid,
                    artist_id: acc.id,
                    artist_name: acc.name,
                    track_count: acc.track_count,
                    total_appearances: acc.total_appearances,
                    avg_popularity,
                    top_track_rowid: acc.top.as_ref().map(|t| t.track_rowid),
                    top_track_id: acc.top.as_ref().map(|t| t.track_id.clone()),
                    top_track_name: acc.top.map(|t| t.track_name),
                    last_computed_at: None,
                }
            })
            .collect();
        Ok(stats)
    }

    // =========================================================================
    // Yearly genres
    // =========================================================================

    fn get_yearly_genre_stats(
        &self,
        year: i32,
        market: &str,
        limit: usize,
    ) -> Result<Vec<YearlyGenreStats>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT y.genre, y.track_count, y.total_appearances, y.avg_popularity,
                    y.top_track_rowid, t.id, y.top_track_name, y.last_computed_at
             FROM yearly_genre_stats y
             LEFT JOIN tracks t ON t.rowid = y.top_track_rowid
             WHERE y.year = ?1 AND y.market = ?2
             ORDER BY y.total_appearances DESC, y.track_count DESC, y.genre ASC
             LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(params![year, market, limit as i64], |r| {
                Ok(YearlyGenreStats {
                    genre: r.get(0)?,
                    track_count: r.get(1)?,
                    total_appearances: r.get(2)?,
                    avg_popularity: r.get(3)?,
                    top_track_rowid: r.get(4)?,
                    top_track_id: r.get(5)?,
                    top_track_name: r.get(6)?,
                    last_computed_at: timestamp_to_datetime(r.get(7)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn compute_yearly_genre_stats(
        &self,
        year: i32,
        market: &str,
        limit: Option<usize>,
    ) -> Result<Vec<YearlyGenreStats>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        // A track with several artists sharing a genre joins once per artist,
        // hence the DISTINCT count. The average is unaffected by the duplication.
        let rows = Self::track_contributions(
            &conn,
            "SELECT 0, g.genre, g.genre, t.rowid, t.id, t.name, t.popularity,
                    COUNT(DISTINCT s.rowid), AVG(s.rank)
             FROM playlist_track_snapshots s
             JOIN playlists p ON p.rowid = s.playlist_rowid
             JOIN tracks t ON t.rowid = s.track_rowid
             JOIN track_artists ta ON ta.track_rowid = t.rowid
             JOIN artist_genres g ON g.artist_rowid = ta.artist_rowid
             WHERE p.market = ?1 AND s.snapshot_date BETWEEN ?2 AND ?3
             GROUP BY g.genre, t.rowid",
            year,
            market,
        )?;

        let stats = Self::fold_contributions(rows)
            .into_iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|acc| {
                let avg_popularity = acc.avg_popularity();
                YearlyGenreStats {
                    genre: acc.name,
                    track_count: acc.track_count,
                    total_appearances: acc.total_appearances,
                    avg_popularity,
                    top_track_rowid: acc.top.as_ref().map(|t| t.track_rowid),
                    top_track_id: acc.top.as_ref().map(|t| t.track_id.clone()),
                    top_track_name: acc.top.map(|t| t.track_name),
                    last_computed_at: None,
                }
            })
            .collect();
        Ok(stats)
    }

    // =========================================================================
    // Rollup persistence
    // =========================================================================

    fn replace_yearly_stats(
        &self,
        year: i32,
        market: &str,
        rollup: &YearlyRollup,
        computed_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.write_conn.lock().unwrap();
        let computed_at = computed_at.timestamp();
        conn.execute("BEGIN IMMEDIATE", [])?;

        let result = (|| -> Result<()> {
            for table in ["yearly_track_stats", "yearly_artist_stats", "yearly_genre_stats"] {
                conn.execute(
                    &format!("DELETE FROM {} WHERE year = ?1 AND market = ?2", table),
                    params![year, market],
                )?;
            }

            let mut stmt = conn.prepare_cached(
                "INSERT INTO yearly_track_stats (year, market, track_rowid, track_name, appearances,
                    avg_rank, best_rank, worst_rank, popularity, first_appearance, last_appearance,
                    days_on_chart, last_computed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )?;
            for t in &rollup.tracks {
                stmt.execute(params![
                    year,
                    market,
                    t.track_rowid,
                    t.track_name,
                    t.appearances,
                    t.avg_rank,
                    t.best_rank,
                    t.worst_rank,
                    t.popularity,
                    t.first_appearance,
                    t.last_appearance,
                    t.days_on_chart,
                    computed_at,
                ])?;
            }

            let mut stmt = conn.prepare_cached(
                "INSERT INTO yearly_artist_stats (year, market, artist_rowid, artist_name, track_count,
                    total_appearances, avg_popularity, top_track_rowid, top_track_name, last_computed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for a in &rollup.artists {
                stmt.execute(params![
                    year,
                    market,
                    a.artist_rowid,
                    a.artist_name,
                    a.track_count,
                    a.total_appearances,
                    a.avg_popularity,
                    a.top_track_rowid,
                    a.top_track_name,
                    computed_at,
                ])?;
            }

            let mut stmt = conn.prepare_cached(
                "INSERT INTO yearly_genre_stats (year, market, genre, track_count, total_appearances,
                    avg_popularity, top_track_rowid, top_track_name, last_computed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for g in &rollup.genres {
                stmt.execute(params![
                    year,
                    market,
                    g.genre,
                    g.track_count,
                    g.total_appearances,
                    g.avg_popularity,
                    g.top_track_rowid,
                    g.top_track_name,
                    computed_at,
                ])?;
            }
            Ok(())
        })();

        match result {
            Ok(()) => {
                conn.execute("COMMIT", [])?;
                Ok(())
            }
            Err(e) => {
                let _ = conn.execute("ROLLBACK", []);
                Err(e)
            }
        }
    }

    // =========================================================================
    // Status
    // =========================================================================

    fn last_snapshot_date(&self) -> Result<Option<NaiveDate>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let date = conn.query_row(
            "SELECT MAX(snapshot_date) FROM playlist_track_snapshots",
            [],
            |r| r.get::<_, Option<NaiveDate>>(0),
        )?;
        Ok(date)
    }

    fn last_aggregate_computed_at(&self) -> Result<Option<DateTime<Utc>>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let ts = conn.query_row(
            "SELECT MAX(last_computed_at) FROM yearly_track_stats",
            [],
            |r| r.get::<_, Option<i64>>(0),
        )?;
        Ok(ts.and_then(timestamp_to_datetime))
    }

    fn counts(&self) -> Result<StoreCounts> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        Ok(StoreCounts {
            artists: Self::count(&conn, "artists")?,
            tracks: Self::count(&conn, "tracks")?,
            playlists: Self::count(&conn, "playlists")?,
            snapshots: Self::count(&conn, "playlist_track_snapshots")?,
            track_artist_links: Self::count(&conn, "track_artists")?,
        })
    }

    fn ping(&self) -> Result<()> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        conn.query_row("SELECT 1", [], |r| r.get::<_, i64>(0))?;
        Ok(())
    }
}
