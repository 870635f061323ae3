//! Client for the third-party music catalog API.

mod client;
mod error;
mod models;
mod token;

#[cfg(test)]
pub(crate) mod test_support;

pub use client::{CatalogClient, CatalogClientConfig, MAX_ARTIST_BATCH, MAX_PAGE_SIZE};
pub use error::CatalogApiError;
pub use models::*;
pub use token::{CatalogCredentials, TokenManager, TOKEN_EXPIRY_BUFFER_SECS};

use async_trait::async_trait;

/// Anything able to produce the current ranked track list of a playlist,
/// along with full details for the artists it mentions.
#[async_trait]
pub trait PlaylistSource: Send + Sync {
    async fn fetch_playlist_tracks(
        &self,
        playlist_id: &str,
        market: &str,
        limit: usize,
    ) -> Result<PlaylistTracksPage, CatalogApiError>;

    /// Looks up at most [`MAX_ARTIST_BATCH`] artists at once.
    async fn fetch_artists(
        &self,
        artist_ids: &[String],
    ) -> Result<Vec<CatalogArtist>, CatalogApiError>;
}
