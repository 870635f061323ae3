//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per API route.
//! When API routes or parameters change, update only this file.

use super::constants::*;
use reqwest::Response;
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
    admin_key: Option<String>,
}

/// Builds a query list, leaving out parameters that are `None`.
fn query<'a>(params: &[(&'a str, Option<String>)]) -> Vec<(&'a str, String)> {
    params
        .iter()
        .filter_map(|(k, v)| v.clone().map(|v| (*k, v)))
        .collect()
}

impl TestClient {
    /// Creates a client that sends no admin key
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self {
            client,
            base_url,
            admin_key: None,
        }
    }

    /// Creates a client sending the test server's admin key
    pub fn admin(base_url: String) -> Self {
        Self::with_admin_key(base_url, ADMIN_KEY)
    }

    pub fn with_admin_key(base_url: String, key: &str) -> Self {
        Self {
            admin_key: Some(key.to_string()),
            ..Self::new(base_url)
        }
    }

    async fn get(&self, path: &str, params: &[(&str, Option<String>)]) -> Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .query(&query(params))
            .send()
            .await
            .expect("GET request failed")
    }

    async fn post(&self, path: &str, params: &[(&str, Option<String>)]) -> Response {
        let mut request = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .query(&query(params));
        if let Some(key) = &self.admin_key {
            request = request.header("X-Admin-Key", key);
        }
        request.send().await.expect("POST request failed")
    }

    // ========================================================================
    // Status Endpoints
    // ========================================================================

    /// GET /v1/health
    pub async fn health(&self) -> Response {
        self.get("/v1/health", &[]).await
    }

    /// GET /v1/analytics/overview
    pub async fn analytics_overview(&self) -> Response {
        self.get("/v1/analytics/overview", &[]).await
    }

    // ========================================================================
    // Chart Endpoints
    // ========================================================================

    /// GET /v1/charts/top-today
    pub async fn top_today(&self, market: Option<&str>, limit: Option<usize>) -> Response {
        self.get(
            "/v1/charts/top-today",
            &[
                ("market", market.map(str::to_string)),
                ("limit", limit.map(|l| l.to_string())),
            ],
        )
        .await
    }

    async fn yearly(&self, route: &str, year: i32, market: &str, limit: Option<usize>) -> Response {
        self.get(
            &format!("/v1/charts/{}", route),
            &[
                ("year", Some(year.to_string())),
                ("market", Some(market.to_string())),
                ("limit", limit.map(|l| l.to_string())),
            ],
        )
        .await
    }

    /// GET /v1/charts/top-year
    pub async fn top_year(&self, year: i32, market: &str, limit: Option<usize>) -> Response {
        self.yearly("top-year", year, market, limit).await
    }

    /// GET /v1/charts/top-artists
    pub async fn top_artists(&self, year: i32, market: &str, limit: Option<usize>) -> Response {
        self.yearly("top-artists", year, market, limit).await
    }

    /// GET /v1/charts/top-genres
    pub async fn top_genres(&self, year: i32, market: &str, limit: Option<usize>) -> Response {
        self.yearly("top-genres", year, market, limit).await
    }

    // ========================================================================
    // Admin Endpoints
    // ========================================================================

    /// POST /v1/admin/ingest/run
    pub async fn run_ingest(&self, market: &str, date: Option<&str>) -> Response {
        self.post(
            "/v1/admin/ingest/run",
            &[
                ("market", Some(market.to_string())),
                ("date", date.map(str::to_string)),
            ],
        )
        .await
    }

    /// POST /v1/admin/aggregate/run
    pub async fn run_aggregate(&self, year: i32, market: &str) -> Response {
        self.post(
            "/v1/admin/aggregate/run",
            &[
                ("year", Some(year.to_string())),
                ("market", Some(market.to_string())),
            ],
        )
        .await
    }

    /// POST /v1/admin/cache/clear
    pub async fn clear_cache(&self) -> Response {
        self.post("/v1/admin/cache/clear", &[]).await
    }

    // ========================================================================
    // Search Endpoints
    // ========================================================================

    /// GET /v1/search
    pub async fn search(&self, q: &str, search_type: Option<&str>) -> Response {
        self.get(
            "/v1/search",
            &[
                ("q", Some(q.to_string())),
                ("type", search_type.map(str::to_string)),
            ],
        )
        .await
    }

    /// GET /v1/search/tracks/year/{year}
    pub async fn search_by_year(
        &self,
        year: &str,
        query: Option<&str>,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Response {
        self.get(
            &format!("/v1/search/tracks/year/{}", year),
            &[
                ("query", query.map(str::to_string)),
                ("limit", limit.map(|l| l.to_string())),
                ("offset", offset.map(|o| o.to_string())),
            ],
        )
        .await
    }

    /// GET /v1/search/top-of-year/{year}
    pub async fn top_of_year(
        &self,
        year: &str,
        genre: Option<&str>,
        limit: Option<usize>,
    ) -> Response {
        self.get(
            &format!("/v1/search/top-of-year/{}", year),
            &[
                ("genre", genre.map(str::to_string)),
                ("limit", limit.map(|l| l.to_string())),
            ],
        )
        .await
    }

    /// GET /v1/artists/top
    pub async fn searched_top_artists(
        &self,
        year: Option<&str>,
        genre: Option<&str>,
        limit: Option<usize>,
        include_details: Option<bool>,
    ) -> Response {
        self.get(
            "/v1/artists/top",
            &[
                ("year", year.map(str::to_string)),
                ("genre", genre.map(str::to_string)),
                ("limit", limit.map(|l| l.to_string())),
                ("include_details", include_details.map(|d| d.to_string())),
            ],
        )
        .await
    }

    /// GET /v1/search/tracks/year-range/{start}-{end}
    pub async fn search_by_year_range(&self, range: &str, query: Option<&str>) -> Response {
        self.get(
            &format!("/v1/search/tracks/year-range/{}", range),
            &[("query", query.map(str::to_string))],
        )
        .await
    }
}
