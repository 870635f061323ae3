//! Client-credentials access token cache.

use super::error::CatalogApiError;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Seconds shaved off the advertised token lifetime.
pub const TOKEN_EXPIRY_BUFFER_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct CatalogCredentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

pub struct TokenManager {
    http: reqwest::Client,
    token_url: String,
    credentials: CatalogCredentials,
    slot: Mutex<Option<CachedToken>>,
}

impl TokenManager {
    pub fn new(http: reqwest::Client, token_url: String, credentials: CatalogCredentials) -> Self {
        Self {
            http,
            token_url,
            credentials,
            slot: Mutex::new(None),
        }
    }

    /// Returns the cached token, exchanging credentials for a new one when
    /// there is none or it is within the expiry buffer.
    pub async fn get_access_token(&self) -> Result<String, CatalogApiError> {
        let mut slot = self.slot.lock().await;
        if let Some(token) = slot.as_ref().filter(|t| t.is_valid()) {
            return Ok(token.access_token.clone());
        }

        let fresh = self.request_token().await?;
        let access_token = fresh.access_token.clone();
        *slot = Some(fresh);
        Ok(access_token)
    }

    /// Drops the cached token so the next call performs a fresh exchange.
    pub async fn invalidate(&self) {
        debug!("Invalidating cached catalog token");
        *self.slot.lock().await = None;
    }

    async fn request_token(&self) -> Result<CachedToken, CatalogApiError> {
        info!("Requesting new catalog access token");
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Token exchange failed with status {}: {}", status, body);
            return Err(CatalogApiError::Auth(format!("status {}", status.as_u16())));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| CatalogApiError::Auth(format!("invalid token response: {}", e)))?;

        let lifetime = token.expires_in.saturating_sub(TOKEN_EXPIRY_BUFFER_SECS);
        info!("Catalog access token obtained, valid for {}s", lifetime);
        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(lifetime),
        })
    }
}
