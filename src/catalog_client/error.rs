use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogApiError {
    #[error("Catalog API error: status {status}")]
    Http {
        status: u16,
        body: serde_json::Value,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Token exchange failed: {0}")]
    Auth(String),

    #[error("Invalid catalog response: {0}")]
    Decode(String),

    #[error("Max retries exceeded")]
    RetriesExhausted,
}

impl CatalogApiError {
    /// Upstream HTTP status, if the failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            CatalogApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for CatalogApiError {
    fn from(err: reqwest::Error) -> Self {
        CatalogApiError::Network(err.to_string())
    }
}

/// Parses an error body as JSON, keeping non-JSON bodies as `{"raw": text}`.
pub(crate) fn parse_error_body(text: &str) -> serde_json::Value {
    serde_json::from_str(text).unwrap_or_else(|_| serde_json::json!({ "raw": text }))
}
