//! Authenticated, retrying HTTP client for the music catalog API.

use super::error::{parse_error_body, CatalogApiError};
use super::models::{ArtistsPage, CatalogArtist, PlaylistTracksPage};
use super::token::{CatalogCredentials, TokenManager};
use super::PlaylistSource;
use crate::server::metrics::record_catalog_request;
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Method, StatusCode};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Largest page the catalog serves for playlists and searches.
pub const MAX_PAGE_SIZE: usize = 50;

/// Most ids one batched artists lookup accepts.
pub const MAX_ARTIST_BATCH: usize = 50;

const PLAYLIST_TRACK_FIELDS: &str = "items(added_at,track(id,name,artists(id,name,external_urls),\
album(id,name,release_date),popularity,external_urls,duration_ms,preview_url,explicit))";

#[derive(Debug, Clone)]
pub struct CatalogClientConfig {
    pub token_url: String,
    pub api_base_url: String,
    pub credentials: CatalogCredentials,
    pub request_timeout_sec: u64,
    pub max_retries: u32,
    pub max_backoff_sec: u64,
}

pub struct CatalogClient {
    http: reqwest::Client,
    api_base_url: String,
    tokens: TokenManager,
    max_retries: u32,
    max_backoff_sec: u64,
}

struct RawResponse {
    status: StatusCode,
    retry_after: Duration,
    text: String,
}

impl CatalogClient {
    pub fn new(config: CatalogClientConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_sec))
            .build()
            .expect("Failed to create HTTP client");

        let tokens = TokenManager::new(http.clone(), config.token_url, config.credentials);

        Self {
            http,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            tokens,
            max_retries: config.max_retries,
            max_backoff_sec: config.max_backoff_sec,
        }
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let secs = 2u64.saturating_pow(attempt).min(self.max_backoff_sec);
        Duration::from_secs(secs)
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<RawResponse, CatalogApiError> {
        let token = self.tokens.get_access_token().await?;
        debug!("Catalog request {} {} {:?}", method, url, params);

        let response = match self
            .http
            .request(method.clone(), url)
            .bearer_auth(token)
            .query(params)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                record_catalog_request("network_error");
                return Err(e.into());
            }
        };

        let status = response.status();
        record_catalog_request(status.as_str());
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(1);
        let text = response.text().await?;

        Ok(RawResponse {
            status,
            retry_after: Duration::from_secs(retry_after),
            text,
        })
    }

    /// Issues an authenticated request against the API base URL.
    ///
    /// Transient failures are retried up to `retries` times with exponential
    /// backoff. Rate limiting honors `Retry-After` under its own budget of
    /// `retries` waits, and a 401 refreshes the token once.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        retries: u32,
    ) -> Result<serde_json::Value, CatalogApiError> {
        let url = format!("{}/{}", self.api_base_url, path.trim_start_matches('/'));
        let mut attempt = 0u32;
        let mut rate_limit_waits = 0u32;
        let mut token_refreshed = false;

        loop {
            let response = match self.send_once(&method, &url, params).await {
                Ok(response) => response,
                Err(CatalogApiError::Network(e)) => {
                    if attempt >= retries {
                        error!("Network error calling {}: {}", path, e);
                        return Err(CatalogApiError::Network(e));
                    }
                    let backoff = self.backoff(attempt);
                    warn!(
                        "Network error calling {} (attempt {}/{}): {}, retrying in {}s",
                        path,
                        attempt + 1,
                        retries + 1,
                        e,
                        backoff.as_secs()
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            if response.status == StatusCode::TOO_MANY_REQUESTS {
                if rate_limit_waits >= retries {
                    error!("Catalog still rate limiting {} after {} waits", path, retries);
                    return Err(CatalogApiError::RetriesExhausted);
                }
                rate_limit_waits += 1;
                warn!(
                    "Rate limited on {}, retrying after {}s",
                    path,
                    response.retry_after.as_secs()
                );
                tokio::time::sleep(response.retry_after).await;
                continue;
            }

            if response.status == StatusCode::UNAUTHORIZED && !token_refreshed {
                warn!("Catalog rejected access token on {}, refreshing", path);
                token_refreshed = true;
                self.tokens.invalidate().await;
                continue;
            }

            if response.status.is_success() {
                return serde_json::from_str(&response.text)
                    .map_err(|e| CatalogApiError::Decode(e.to_string()));
            }

            if attempt >= retries {
                error!(
                    "Catalog request {} failed with status {} after {} attempts",
                    path,
                    response.status,
                    attempt + 1
                );
                return Err(CatalogApiError::Http {
                    status: response.status.as_u16(),
                    body: parse_error_body(&response.text),
                });
            }

            let backoff = self.backoff(attempt);
            warn!(
                "Catalog request {} failed with status {} (attempt {}/{}), retrying in {}s",
                path,
                response.status,
                attempt + 1,
                retries + 1,
                backoff.as_secs()
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }

    async fn get(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<serde_json::Value, CatalogApiError> {
        self.request(Method::GET, path, params, self.max_retries)
            .await
    }

    pub async fn get_playlist_tracks(
        &self,
        playlist_id: &str,
        market: &str,
        limit: usize,
    ) -> Result<PlaylistTracksPage, CatalogApiError> {
        let value = self
            .get(
                &format!("playlists/{}/tracks", playlist_id),
                &[
                    ("market", market.to_string()),
                    ("limit", limit.min(MAX_PAGE_SIZE).to_string()),
                    ("fields", PLAYLIST_TRACK_FIELDS.to_string()),
                ],
            )
            .await?;
        serde_json::from_value(value).map_err(|e| CatalogApiError::Decode(e.to_string()))
    }

    /// Plain catalog search, returned as the upstream JSON.
    pub async fn search(
        &self,
        query: &str,
        search_type: &str,
        market: &str,
        limit: usize,
        offset: usize,
    ) -> Result<serde_json::Value, CatalogApiError> {
        self.get(
            "search",
            &[
                ("q", query.to_string()),
                ("type", search_type.to_string()),
                ("market", market.to_string()),
                ("limit", limit.min(MAX_PAGE_SIZE).to_string()),
                ("offset", offset.to_string()),
            ],
        )
        .await
    }

    pub async fn search_tracks_by_year(
        &self,
        query: &str,
        year: i32,
        market: &str,
        limit: usize,
        offset: usize,
    ) -> Result<serde_json::Value, CatalogApiError> {
        let query = format!("{} year:{}", query.trim(), year);
        self.search(query.trim(), "track", market, limit, offset)
            .await
    }

    pub async fn search_tracks_by_year_range(
        &self,
        query: &str,
        start_year: i32,
        end_year: i32,
        market: &str,
        limit: usize,
        offset: usize,
    ) -> Result<serde_json::Value, CatalogApiError> {
        let query = format!("{} year:{}-{}", query.trim(), start_year, end_year);
        self.search(query.trim(), "track", market, limit, offset)
            .await
    }

    pub async fn get_artist(&self, artist_id: &str) -> Result<CatalogArtist, CatalogApiError> {
        let value = self.get(&format!("artists/{}", artist_id), &[]).await?;
        serde_json::from_value(value).map_err(|e| CatalogApiError::Decode(e.to_string()))
    }

    /// Full artist objects for up to [`MAX_ARTIST_BATCH`] ids. Ids the
    /// catalog does not know are left out.
    pub async fn get_artists(
        &self,
        artist_ids: &[String],
    ) -> Result<Vec<CatalogArtist>, CatalogApiError> {
        if artist_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = artist_ids
            .iter()
            .take(MAX_ARTIST_BATCH)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let value = self.get("artists", &[("ids", ids)]).await?;
        let page: ArtistsPage =
            serde_json::from_value(value).map_err(|e| CatalogApiError::Decode(e.to_string()))?;
        Ok(page.artists.into_iter().flatten().collect())
    }

    /// Succeeds when the credentials can be exchanged for a token.
    pub async fn health_check(&self) -> Result<(), CatalogApiError> {
        self.tokens.get_access_token().await.map(|_| ())
    }
}

#[async_trait]
impl PlaylistSource for CatalogClient {
    async fn fetch_playlist_tracks(
        &self,
        playlist_id: &str,
        market: &str,
        limit: usize,
    ) -> Result<PlaylistTracksPage, CatalogApiError> {
        self.get_playlist_tracks(playlist_id, market, limit).await
    }

    async fn fetch_artists(
        &self,
        artist_ids: &[String],
    ) -> Result<Vec<CatalogArtist>, CatalogApiError> {
        self.get_artists(artist_ids).await
    }
}
