//! Fake catalog API served over HTTP
//!
//! Answers the client-credentials token exchange, playlist track pages,
//! artist lookups and searches. Playlists are configured per test; searches
//! are recorded.

use super::fixtures::{artist_payload, playlist_page, search_page};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct FakeState {
    token_requests: Arc<AtomicUsize>,
    playlists: Arc<Mutex<HashMap<String, Value>>>,
    searches: Arc<Mutex<Vec<HashMap<String, String>>>>,
    search_response: Arc<Mutex<Option<Value>>>,
    /// Bodies for searches whose query contains the paired needle.
    query_responses: Arc<Mutex<Vec<(String, Value)>>>,
    /// Searches whose query contains this needle answer 500.
    failing_query: Arc<Mutex<Option<String>>>,
    artist_lookups: Arc<AtomicUsize>,
    /// Status returned by artist lookups while set.
    artist_failure: Arc<Mutex<Option<u16>>>,
    /// Status returned by every API call while set.
    failure: Arc<Mutex<Option<u16>>>,
}

pub struct FakeCatalog {
    pub addr: SocketAddr,
    state: FakeState,
    handle: tokio::task::JoinHandle<()>,
}

async fn token(State(state): State<FakeState>, headers: HeaderMap) -> Response {
    let n = state.token_requests.fetch_add(1, Ordering::SeqCst) + 1;
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("Basic "))
        .unwrap_or(false);
    if !authorized {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid_client"})))
            .into_response();
    }
    Json(json!({
        "access_token": format!("fake-token-{}", n),
        "token_type": "Bearer",
        "expires_in": 3600,
    }))
    .into_response()
}

fn failure_response(state: &FakeState) -> Option<Response> {
    let status = (*state.failure.lock().unwrap())?;
    let status = StatusCode::from_u16(status).unwrap();
    Some((status, Json(json!({"error": {"status": status.as_u16()}}))).into_response())
}

async fn playlist_tracks(
    State(state): State<FakeState>,
    Path(playlist_id): Path<String>,
) -> Response {
    if let Some(response) = failure_response(&state) {
        return response;
    }
    match state.playlists.lock().unwrap().get(&playlist_id) {
        Some(page) => Json(page.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": {"status": 404, "message": "Resource not found"}})),
        )
            .into_response(),
    }
}

async fn search(
    State(state): State<FakeState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Some(response) = failure_response(&state) {
        return response;
    }
    let query = params.get("q").cloned().unwrap_or_default();
    state.searches.lock().unwrap().push(params);

    let failing = state.failing_query.lock().unwrap().clone();
    if failing.is_some_and(|needle| query.contains(&needle)) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": {"status": 500}})),
        )
            .into_response();
    }

    let matched = state
        .query_responses
        .lock()
        .unwrap()
        .iter()
        .find(|(needle, _)| query.contains(needle.as_str()))
        .map(|(_, body)| body.clone());
    let body = matched
        .or_else(|| state.search_response.lock().unwrap().clone())
        .unwrap_or_else(|| search_page(&[], 0));
    Json(body).into_response()
}

fn artist_failure_response(state: &FakeState) -> Option<Response> {
    state.artist_lookups.fetch_add(1, Ordering::SeqCst);
    if let Some(response) = failure_response(state) {
        return Some(response);
    }
    let status = (*state.artist_failure.lock().unwrap())?;
    let status = StatusCode::from_u16(status).unwrap();
    Some((status, Json(json!({"error": {"status": status.as_u16()}}))).into_response())
}

async fn artists(
    State(state): State<FakeState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Some(response) = artist_failure_response(&state) {
        return response;
    }
    let ids = params.get("ids").cloned().unwrap_or_default();
    let artists: Vec<Value> = ids
        .split(',')
        .filter(|id| !id.is_empty())
        .map(|id| artist_payload(id).unwrap_or(Value::Null))
        .collect();
    Json(json!({ "artists": artists })).into_response()
}

async fn artist(State(state): State<FakeState>, Path(artist_id): Path<String>) -> Response {
    if let Some(response) = artist_failure_response(&state) {
        return response;
    }
    match artist_payload(&artist_id) {
        Some(body) => Json(body).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": {"status": 404, "message": "Resource not found"}})),
        )
            .into_response(),
    }
}

impl FakeCatalog {
    pub async fn spawn() -> Self {
        let state = FakeState::default();
        let app = Router::new()
            .route("/token", post(token))
            .route("/v1/playlists/{id}/tracks", get(playlist_tracks))
            .route("/v1/search", get(search))
            .route("/v1/artists", get(artists))
            .route("/v1/artists/{id}", get(artist))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake catalog");
        let addr = listener.local_addr().expect("Failed to get local address");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Fake catalog failed");
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn token_url(&self) -> String {
        format!("http://{}/token", self.addr)
    }

    pub fn api_base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Sets the ranked tracks the playlist serves from now on.
    pub fn set_playlist(&self, playlist_id: &str, ranking: &[Option<&str>]) {
        self.state
            .playlists
            .lock()
            .unwrap()
            .insert(playlist_id.to_string(), playlist_page(ranking));
    }

    pub fn set_search_response(&self, body: Value) {
        *self.state.search_response.lock().unwrap() = Some(body);
    }

    /// Serves `body` to searches whose query contains `needle`.
    pub fn set_search_response_for(&self, needle: &str, body: Value) {
        self.state
            .query_responses
            .lock()
            .unwrap()
            .push((needle.to_string(), body));
    }

    /// Fails searches whose query contains `needle`.
    pub fn fail_searches_containing(&self, needle: &str) {
        *self.state.failing_query.lock().unwrap() = Some(needle.to_string());
    }

    /// Makes artist lookups answer `status` until cleared with `None`.
    pub fn set_artist_failure(&self, status: Option<u16>) {
        *self.state.artist_failure.lock().unwrap() = status;
    }

    /// Number of artist lookups received, batched or single.
    pub fn artist_lookups(&self) -> usize {
        self.state.artist_lookups.load(Ordering::SeqCst)
    }

    /// Makes every API call answer `status` until cleared with `None`.
    pub fn set_failure(&self, status: Option<u16>) {
        *self.state.failure.lock().unwrap() = status;
    }

    pub fn token_requests(&self) -> usize {
        self.state.token_requests.load(Ordering::SeqCst)
    }

    /// Query parameters of every search received so far.
    pub fn searches(&self) -> Vec<HashMap<String, String>> {
        self.state.searches.lock().unwrap().clone()
    }
}

impl Drop for FakeCatalog {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
