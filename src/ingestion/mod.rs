//! Playlist ingestion: fetch a ranked list and merge it into the chart store.

mod models;
mod pipeline;

pub use models::{IngestionReport, IngestionRequest};
pub use pipeline::{IngestionService, FETCH_LIMIT};

use crate::catalog_client::CatalogApiError;
use thiserror::Error;

/// Run-level ingestion failures. Per-item failures never surface here.
#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("Unknown market: {0}")]
    UnknownMarket(String),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogApiError),

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),

    #[error("Ingestion task failed: {0}")]
    Task(String),
}
