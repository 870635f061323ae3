//! HTTP caching middleware

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::IntoResponse,
};

/// Marks successful responses cacheable by clients for `max_age_sec`.
/// Error responses are left uncached.
pub async fn http_cache(
    State(max_age_sec): State<u64>,
    request: Request<Body>,
    next: Next,
) -> impl IntoResponse {
    let response = next.run(request).await.into_response();
    if !response.status().is_success() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    if let Ok(value) = HeaderValue::from_str(&format!("max-age={}", max_age_sec)) {
        parts.headers.insert(header::CACHE_CONTROL, value);
    }

    axum::http::Response::from_parts(parts, body)
}
