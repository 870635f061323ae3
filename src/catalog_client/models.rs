//! Catalog API payloads and their conversion into store upserts.
//!
//! Every field is optional: playlist feeds are known to contain partial or
//! malformed entries and the ingestion loop decides what is fatal per item.

use crate::chart_store::{ArtistUpsert, TrackUpsert};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PlaylistTracksPage {
    #[serde(default)]
    pub items: Vec<PlaylistItem>,
}

/// One ranked slot of a playlist.
///
/// The track payload is kept as raw JSON and decoded per item, so a single
/// malformed track cannot fail the whole page.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PlaylistItem {
    #[serde(default)]
    pub added_at: Option<String>,
    #[serde(default)]
    pub track: Option<serde_json::Value>,
}

impl PlaylistItem {
    /// `None` for an empty slot.
    pub fn decode_track(&self) -> Option<Result<CatalogTrack>> {
        let raw = self.track.as_ref()?;
        if raw.is_null() {
            return None;
        }
        Some(serde_json::from_value(raw.clone()).map_err(anyhow::Error::from))
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ExternalUrls {
    #[serde(default)]
    pub spotify: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CatalogAlbum {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CatalogFollowers {
    #[serde(default)]
    pub total: Option<i64>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CatalogImage {
    pub url: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CatalogArtist {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub popularity: Option<i64>,
    #[serde(default)]
    pub followers: Option<CatalogFollowers>,
    /// Absent on the simplified artist objects embedded in tracks.
    #[serde(default)]
    pub genres: Option<Vec<String>>,
    #[serde(default)]
    pub external_urls: Option<ExternalUrls>,
    #[serde(default)]
    pub images: Vec<CatalogImage>,
}

impl CatalogArtist {
    pub fn to_upsert(&self) -> Result<ArtistUpsert> {
        let Some(id) = self.id.as_deref().filter(|id| !id.is_empty()) else {
            bail!("Artist payload has no id");
        };
        Ok(ArtistUpsert {
            id: id.to_string(),
            name: self.name.clone(),
            popularity: self.popularity,
            followers: self.followers.as_ref().and_then(|f| f.total),
            genres: self.genres.clone(),
            external_url: self.external_urls.as_ref().and_then(|u| u.spotify.clone()),
            image_url: self.images.first().map(|i| i.url.clone()),
        })
    }

    /// Overlays a full artist object on the simplified one embedded in a
    /// track. Fields the details lack keep their embedded value.
    pub fn enriched_with(&self, details: &CatalogArtist) -> CatalogArtist {
        CatalogArtist {
            id: self.id.clone(),
            name: details.name.clone().or_else(|| self.name.clone()),
            popularity: details.popularity.or(self.popularity),
            followers: details.followers.clone().or_else(|| self.followers.clone()),
            genres: details.genres.clone().or_else(|| self.genres.clone()),
            external_urls: details
                .external_urls
                .clone()
                .or_else(|| self.external_urls.clone()),
            images: if details.images.is_empty() {
                self.images.clone()
            } else {
                details.images.clone()
            },
        }
    }
}

/// Body of the batched artists lookup. Unknown ids come back as null.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ArtistsPage {
    #[serde(default)]
    pub artists: Vec<Option<CatalogArtist>>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CatalogTrack {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub album: Option<CatalogAlbum>,
    #[serde(default)]
    pub artists: Vec<CatalogArtist>,
    #[serde(default)]
    pub popularity: Option<i64>,
    #[serde(default)]
    pub external_urls: Option<ExternalUrls>,
    #[serde(default)]
    pub duration_ms: Option<i64>,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub explicit: Option<bool>,
}

impl CatalogTrack {
    pub fn to_upsert(&self) -> Result<TrackUpsert> {
        let Some(id) = self.id.as_deref().filter(|id| !id.is_empty()) else {
            bail!("Track payload has no id");
        };
        let album = self.album.as_ref();
        Ok(TrackUpsert {
            id: id.to_string(),
            name: self.name.clone(),
            album_id: album.and_then(|a| a.id.clone()),
            album_name: album.and_then(|a| a.name.clone()),
            album_release_date: album.and_then(|a| a.release_date.clone()),
            duration_ms: self.duration_ms,
            explicit: self.explicit,
            popularity: self.popularity,
            preview_url: self.preview_url.clone(),
            external_url: self.external_urls.as_ref().and_then(|u| u.spotify.clone()),
        })
    }
}
