use super::error::ApiError;
use super::state::ServerState;

use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::debug;

pub const HEADER_ADMIN_KEY: &str = "X-Admin-Key";

/// Proof that the request carried the configured admin key.
#[derive(Debug)]
pub struct AdminKey;

/// Compares without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

impl FromRequestParts<ServerState> for AdminKey {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        let expected = ctx.config.admin_key.as_bytes();
        let provided = parts
            .headers
            .get(HEADER_ADMIN_KEY)
            .map(|v| v.as_bytes())
            .unwrap_or_default();

        if expected.is_empty() || !constant_time_eq(provided, expected) {
            debug!("Rejected admin request to {}", parts.uri.path());
            return Err(ApiError::Unauthorized);
        }
        Ok(AdminKey)
    }
}
