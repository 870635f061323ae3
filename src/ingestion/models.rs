use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Parameters of one ingestion run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestionRequest {
    pub market: String,
    /// Defaults to the market's configured playlist.
    pub playlist_id: Option<String>,
    /// Defaults to today in the market's timezone.
    pub snapshot_date: Option<NaiveDate>,
}

impl IngestionRequest {
    pub fn for_market(market: impl Into<String>) -> Self {
        Self {
            market: market.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionReport {
    pub success: bool,
    pub market: String,
    pub playlist_id: String,
    pub snapshot_date: NaiveDate,
    pub tracks_processed: usize,
    /// Distinct artists linked by the processed tracks.
    pub artists_processed: usize,
    pub artists_created: usize,
    /// Artists whose full details were fetched from the catalog.
    pub artists_enriched: usize,
    /// Empty slots in the feed.
    pub items_skipped: usize,
    /// Slots whose payload could not be merged.
    pub items_failed: usize,
    pub duration_seconds: f64,
    pub message: String,
}

/// Counters accumulated inside the ingestion transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct MergeCounts {
    pub tracks_processed: usize,
    pub artists_processed: usize,
    pub artists_created: usize,
    pub artists_enriched: usize,
    pub items_skipped: usize,
    pub items_failed: usize,
}
