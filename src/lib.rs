//! Chart Insights Server Library
//!
//! Music chart aggregation: daily playlist snapshots ingested from a catalog
//! API, yearly rollups, and a JSON read API over both.

pub mod aggregation;
pub mod background_jobs;
pub mod cache;
pub mod catalog_client;
pub mod chart_store;
pub mod config;
pub mod ingestion;
pub mod server;
pub mod sqlite_persistence;
pub mod utils;

// Re-export commonly used types for convenience
pub use aggregation::YearlyAggregator;
pub use cache::ResponseCache;
pub use catalog_client::CatalogClient;
pub use chart_store::{ChartStore, SqliteChartStore};
pub use ingestion::{IngestionService, IngestionRequest};
pub use server::{run_server, RequestsLoggingLevel, ServerState};
