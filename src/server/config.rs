use super::RequestsLoggingLevel;
use crate::config::DEFAULT_CORS_ORIGIN;

#[derive(Clone)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub port: u16,
    /// TTL of cached chart responses, also sent as `Cache-Control: max-age`.
    pub cache_ttl_sec: u64,
    /// Value the `X-Admin-Key` header must match on admin routes.
    pub admin_key: String,
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            port: 8000,
            cache_ttl_sec: 300,
            admin_key: String::new(),
            cors_origins: vec![DEFAULT_CORS_ORIGIN.to_string()],
        }
    }
}
