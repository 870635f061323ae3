//! Merges a fetched playlist into the chart store.
//!
//! A run fetches the ranked list and the full details of its artists first,
//! then applies every slot inside one write transaction. Each slot runs in its own savepoint: a bad slot is rolled
//! back and counted while the rest of the run commits.

use super::models::{IngestionReport, IngestionRequest, MergeCounts};
use super::IngestionError;
use crate::cache::{ResponseCache, TODAY_CHART_PREFIX};
use crate::catalog_client::{CatalogArtist, CatalogTrack, PlaylistItem, PlaylistSource, MAX_ARTIST_BATCH};
use crate::chart_store::{ChartWriter, SqliteChartStore};
use crate::config::MarketSettings;
use crate::server::metrics::{record_ingestion_items_failed, record_ingestion_run, record_ingestion_tracks};
use crate::utils::{parse_timestamp, today_in_timezone};
use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{Connection, Transaction};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Number of ranked slots requested per run.
pub const FETCH_LIMIT: usize = 50;

pub struct IngestionService {
    store: SqliteChartStore,
    source: Arc<dyn PlaylistSource>,
    cache: Arc<ResponseCache>,
    markets: Vec<MarketSettings>,
}

/// Full artist objects keyed by artist id, fetched ahead of the merge.
pub(crate) type ArtistDetails = HashMap<String, CatalogArtist>;

/// Artists linked by one merged slot, with whether each row was created.
struct SlotOutcome {
    artists: Vec<(String, bool)>,
}

fn merge_slot(
    conn: &Connection,
    playlist_rowid: i64,
    snapshot_date: NaiveDate,
    rank: u32,
    track: &CatalogTrack,
    added_at: Option<i64>,
    details: &ArtistDetails,
) -> Result<SlotOutcome> {
    let writer = ChartWriter::new(conn);

    let track_outcome = writer.upsert_track(&track.to_upsert()?)?;

    let mut artist_rowids = Vec::with_capacity(track.artists.len());
    let mut artists = Vec::with_capacity(track.artists.len());
    for artist in &track.artists {
        let upsert = match artist.id.as_deref().and_then(|id| details.get(id)) {
            Some(full) => artist.enriched_with(full).to_upsert()?,
            None => artist.to_upsert()?,
        };
        let outcome = writer.upsert_artist(&upsert)?;
        artist_rowids.push(outcome.rowid);
        artists.push((upsert.id, outcome.created));
    }

    writer.replace_track_artists(track_outcome.rowid, &artist_rowids)?;
    writer.upsert_snapshot(
        playlist_rowid,
        track_outcome.rowid,
        snapshot_date,
        rank,
        added_at,
    )?;

    Ok(SlotOutcome { artists })
}

/// Applies every slot of `items` to the store. Rank is the 1-based slot
/// position, so empty slots still consume their rank.
pub(crate) fn merge_playlist(
    tx: &mut Transaction<'_>,
    playlist_id: &str,
    market: &str,
    snapshot_date: NaiveDate,
    items: &[PlaylistItem],
    details: &ArtistDetails,
) -> Result<MergeCounts> {
    let playlist_rowid = ChartWriter::new(tx).ensure_playlist(playlist_id, market)?.rowid;

    let mut counts = MergeCounts::default();
    let mut touched_artists: HashSet<String> = HashSet::new();
    let mut created_artists: HashSet<String> = HashSet::new();

    for (index, item) in items.iter().enumerate() {
        let rank = index as u32 + 1;
        let Some(decoded) = item.decode_track() else {
            debug!("Rank {} of {} has no track, skipping", rank, playlist_id);
            counts.items_skipped += 1;
            continue;
        };

        let savepoint = tx.savepoint()?;
        let added_at = parse_timestamp(item.added_at.as_deref());
        let result = decoded
            .and_then(|track| {
            merge_slot(&savepoint, playlist_rowid, snapshot_date, rank, &track, added_at, details)
        });

        match result {
            Ok(outcome) => {
                savepoint.commit()?;
                counts.tracks_processed += 1;
                for (artist_id, created) in outcome.artists {
                    if created {
                        created_artists.insert(artist_id.clone());
                    }
                    touched_artists.insert(artist_id);
                }
            }
            Err(e) => {
                // Dropping the savepoint rolls back whatever the slot wrote.
                drop(savepoint);
                warn!(
                    "Failed to merge rank {} of playlist {}: {:#}",
                    rank, playlist_id, e
                );
                counts.items_failed += 1;
            }
        }
    }

    counts.artists_processed = touched_artists.len();
    counts.artists_created = created_artists.len();
    Ok(counts)
}

impl IngestionService {
    pub fn new(
        store: SqliteChartStore,
        source: Arc<dyn PlaylistSource>,
        cache: Arc<ResponseCache>,
        markets: Vec<MarketSettings>,
    ) -> Self {
        Self {
            store,
            source,
            cache,
            markets,
        }
    }

    pub fn markets(&self) -> &[MarketSettings] {
        &self.markets
    }

    fn market(&self, code: &str) -> Option<&MarketSettings> {
        self.markets.iter().find(|m| m.code == code)
    }

    /// Fetches the market's playlist and merges it as one unit of work.
    pub async fn run(&self, request: IngestionRequest) -> Result<IngestionReport, IngestionError> {
        let start = Instant::now();
        let market_code = request.market.trim().to_uppercase();
        let market = self
            .market(&market_code)
            .ok_or_else(|| IngestionError::UnknownMarket(market_code.clone()))?
            .clone();

        let playlist_id = request
            .playlist_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| market.playlist_id.clone());
        let snapshot_date = request
            .snapshot_date
            .unwrap_or_else(|| today_in_timezone(market.timezone));

        info!(
            "Starting ingestion for {} (playlist {}, snapshot {})",
            market.code, playlist_id, snapshot_date
        );

        let result = self
            .fetch_and_merge(&market.code, &playlist_id, snapshot_date)
            .await;
        let counts = match result {
            Ok(counts) => counts,
            Err(e) => {
                record_ingestion_run(&market.code, "failed");
                error!(
                    "Ingestion for {} failed after {:.2}s: {}",
                    market.code,
                    start.elapsed().as_secs_f64(),
                    e
                );
                return Err(e);
            }
        };

        let invalidated = self.cache.invalidate_prefix(&format!("{}:", TODAY_CHART_PREFIX));
        debug!("Invalidated {} cached daily charts", invalidated);

        record_ingestion_run(&market.code, "success");
        record_ingestion_tracks(&market.code, counts.tracks_processed);
        record_ingestion_items_failed(&market.code, counts.items_failed);

        let duration_seconds = start.elapsed().as_secs_f64();
        info!(
            "Ingestion for {} completed in {:.2}s: {} tracks, {} artists ({} new, {} enriched), {} skipped, {} failed",
            market.code,
            duration_seconds,
            counts.tracks_processed,
            counts.artists_processed,
            counts.artists_created,
            counts.artists_enriched,
            counts.items_skipped,
            counts.items_failed
        );

        Ok(IngestionReport {
            success: true,
            market: market.code,
            playlist_id,
            snapshot_date,
            tracks_processed: counts.tracks_processed,
            artists_processed: counts.artists_processed,
            artists_created: counts.artists_created,
            artists_enriched: counts.artists_enriched,
            items_skipped: counts.items_skipped,
            items_failed: counts.items_failed,
            duration_seconds,
            message: format!("Successfully processed {} tracks", counts.tracks_processed),
        })
    }

    async fn fetch_and_merge(
        &self,
        market: &str,
        playlist_id: &str,
        snapshot_date: NaiveDate,
    ) -> Result<MergeCounts, IngestionError> {
        let page = self
            .source
            .fetch_playlist_tracks(playlist_id, market, FETCH_LIMIT)
            .await?;
        debug!("Fetched {} ranked slots for {}", page.items.len(), market);

        let details = self.fetch_artist_details(&page.items).await;
        let enriched = details.len();

        let store = self.store.clone();
        let market = market.to_string();
        let playlist_id = playlist_id.to_string();
        let mut counts = tokio::task::spawn_blocking(move || {
            store.ingest_in_transaction(|tx| {
                merge_playlist(tx, &playlist_id, &market, snapshot_date, &page.items, &details)
            })
        })
        .await
        .map_err(|e| IngestionError::Task(e.to_string()))??;
        counts.artists_enriched = enriched;

        Ok(counts)
    }

    /// Looks up full details for every artist the page mentions. Playlist
    /// payloads only embed id and name, so genres, followers and popularity
    /// come from here. A failed batch is logged and its artists are merged
    /// with whatever the playlist carried.
    async fn fetch_artist_details(&self, items: &[PlaylistItem]) -> ArtistDetails {
        let mut seen = HashSet::new();
        let ids: Vec<String> = items
            .iter()
            .filter_map(|item| item.decode_track()?.ok())
            .flat_map(|track| track.artists)
            .filter_map(|artist| artist.id)
            .filter(|id| !id.is_empty() && seen.insert(id.clone()))
            .collect();

        let mut details = ArtistDetails::with_capacity(ids.len());
        for batch in ids.chunks(MAX_ARTIST_BATCH) {
            match self.source.fetch_artists(batch).await {
                Ok(artists) => {
                    for artist in artists {
                        if let Some(id) = artist.id.clone() {
                            details.insert(id, artist);
                        }
                    }
                }
                Err(e) => warn!(
                    "Artist details lookup failed for {} artists, keeping playlist data: {}",
                    batch.len(),
                    e
                ),
            }
        }
        debug!("Enriched {} of {} artists", details.len(), ids.len());
        details
    }

    /// Ingests every configured market in order. A failing market is logged
    /// and does not stop the others.
    pub async fn run_all_markets(&self) -> Vec<(String, Result<IngestionReport, IngestionError>)> {
        let mut results = Vec::with_capacity(self.markets.len());
        for market in &self.markets {
            let result = self
                .run(IngestionRequest::for_market(market.code.clone()))
                .await;
            if let Err(e) = &result {
                warn!("Scheduled ingestion for {} failed: {}", market.code, e);
            }
            results.push((market.code.clone(), result));
        }
        results
    }
}
