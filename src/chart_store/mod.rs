mod models;
mod schema;
mod store;
mod trait_def;
mod writer;

pub use models::*;
pub use schema::CHART_VERSIONED_SCHEMAS;
pub use store::SqliteChartStore;
pub use trait_def::ChartStore;
pub use writer::{placeholder_playlist_name, ChartWriter, PLACEHOLDER_PLAYLIST_DESCRIPTION};
