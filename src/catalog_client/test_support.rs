//! In-process stand-in for the catalog API used by unit tests.

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Basic auth for client id "id" and secret "secret".
const EXPECTED_BASIC_AUTH: &str = "Basic aWQ6c2VjcmV0";

struct Scripted {
    status: u16,
    retry_after: Option<&'static str>,
    body: String,
}

#[derive(Clone)]
struct MockState {
    expires_in: u64,
    token_requests: Arc<AtomicUsize>,
    api_requests: Arc<AtomicUsize>,
    script: Arc<Mutex<VecDeque<Scripted>>>,
    last_params: Arc<Mutex<HashMap<String, String>>>,
}

pub struct MockCatalog {
    addr: SocketAddr,
    state: MockState,
    handle: tokio::task::JoinHandle<()>,
}

async fn token(State(state): State<MockState>, headers: HeaderMap) -> Response {
    let n = state.token_requests.fetch_add(1, Ordering::SeqCst) + 1;
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(EXPECTED_BASIC_AUTH);
    if !authorized {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid_client"})))
            .into_response();
    }
    Json(json!({
        "access_token": format!("token-{}", n),
        "token_type": "Bearer",
        "expires_in": state.expires_in,
    }))
    .into_response()
}

fn artist_details(id: &str) -> serde_json::Value {
    let name = match id {
        "a1" => "Artist One".to_string(),
        "a2" => "Artist Two".to_string(),
        other => format!("Artist {}", other),
    };
    json!({"id": id, "name": name, "genres": ["filmi"], "followers": {"total": 10}, "popularity": 55})
}

fn default_body(path: &str, params: &HashMap<String, String>) -> serde_json::Value {
    if path.ends_with("/artists") {
        let ids = params.get("ids").map(String::as_str).unwrap_or_default();
        let artists: Vec<serde_json::Value> = ids
            .split(',')
            .filter(|id| !id.is_empty())
            .map(|id| {
                if id.starts_with("missing") {
                    serde_json::Value::Null
                } else {
                    artist_details(id)
                }
            })
            .collect();
        json!({ "artists": artists })
    } else if path.ends_with("/tracks") {
        json!({
            "items": [
                {
                    "added_at": "2024-03-01T08:00:00Z",
                    "track": {
                        "id": "t1",
                        "name": "First",
                        "artists": [{"id": "a1", "name": "Artist One"}],
                        "album": {"id": "al1", "name": "Album", "release_date": "2024-01-05"},
                        "popularity": 90,
                        "duration_ms": 180000
                    }
                },
                {
                    "track": {
                        "id": "t2",
                        "name": "Second",
                        "artists": [{"id": "a2", "name": "Artist Two"}],
                        "popularity": 80
                    }
                }
            ]
        })
    } else if let Some((_, id)) = path.rsplit_once("/artists/") {
        artist_details(id)
    } else {
        json!({"tracks": {"items": [], "total": 0, "limit": 20, "offset": 0}})
    }
}

async fn api(
    State(state): State<MockState>,
    headers: HeaderMap,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.api_requests.fetch_add(1, Ordering::SeqCst);
    *state.last_params.lock().unwrap() = params.clone();

    let has_bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("Bearer token-"))
        .unwrap_or(false);
    if !has_bearer {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let scripted = state.script.lock().unwrap().pop_front();
    match scripted {
        Some(scripted) => {
            let status = StatusCode::from_u16(scripted.status).unwrap();
            let mut response = (status, scripted.body).into_response();
            if let Some(retry_after) = scripted.retry_after {
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, retry_after.parse().unwrap());
            }
            response
        }
        None => Json(default_body(uri.path(), &params)).into_response(),
    }
}

impl MockCatalog {
    pub async fn spawn(expires_in: u64) -> Self {
        let state = MockState {
            expires_in,
            token_requests: Arc::new(AtomicUsize::new(0)),
            api_requests: Arc::new(AtomicUsize::new(0)),
            script: Arc::new(Mutex::new(VecDeque::new())),
            last_params: Arc::new(Mutex::new(HashMap::new())),
        };
        let app = Router::new()
            .route("/token", post(token))
            .fallback(api)
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
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

    /// Queues a response served by the next API request.
    pub fn script(&self, status: u16, retry_after: Option<&'static str>, body: &str) {
        self.state.script.lock().unwrap().push_back(Scripted {
            status,
            retry_after,
            body: body.to_string(),
        });
    }

    pub fn token_requests(&self) -> usize {
        self.state.token_requests.load(Ordering::SeqCst)
    }

    pub fn api_requests(&self) -> usize {
        self.state.api_requests.load(Ordering::SeqCst)
    }

    pub fn last_params(&self) -> HashMap<String, String> {
        self.state.last_params.lock().unwrap().clone()
    }
}

impl Drop for MockCatalog {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
