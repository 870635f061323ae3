//! End-to-end tests for ingestion and the chart read routes
//!
//! Charts are seeded through the admin ingestion route against the fake
//! catalog, then read back over HTTP.

mod common;

use chart_insights_server::chart_store::ChartStore;
use common::*;
use reqwest::StatusCode;
use serde_json::Value;

async fn ingest(server: &TestServer, market: &str, date: &str) -> Value {
    let client = TestClient::admin(server.base_url.clone());
    let response = client.run_ingest(market, Some(date)).await;
    assert_eq!(response.status(), StatusCode::OK);
    response.json().await.unwrap()
}

fn track_ids(chart: &Value) -> Vec<String> {
    chart["tracks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["track_id"].as_str().unwrap().to_string())
        .collect()
}

/// Three January days of the IN chart:
/// track-1 charts 3 times, track-2 and track-3 twice, track-4 once.
async fn seed_january(server: &TestServer) {
    let days: [(&str, &[Option<&str>]); 3] = [
        ("2024-01-10", &[Some(TRACK_1_ID), Some(TRACK_2_ID), Some(TRACK_3_ID)]),
        ("2024-01-11", &[Some(TRACK_2_ID), Some(TRACK_1_ID), Some(TRACK_4_ID)]),
        ("2024-01-12", &[Some(TRACK_1_ID), Some(TRACK_3_ID)]),
    ];
    for (date, ranking) in days {
        server.catalog.set_playlist(PLAYLIST_IN, ranking);
        ingest(server, MARKET_IN, date).await;
    }
}

// =============================================================================
// Daily Chart
// =============================================================================

#[tokio::test]
async fn test_top_today_serves_latest_snapshot() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    server
        .catalog
        .set_playlist(PLAYLIST_IN, &[Some(TRACK_1_ID), Some(TRACK_2_ID), Some(TRACK_3_ID)]);
    ingest(&server, MARKET_IN, "2024-03-01").await;
    server
        .catalog
        .set_playlist(PLAYLIST_IN, &[Some(TRACK_3_ID), Some(TRACK_1_ID)]);
    ingest(&server, MARKET_IN, "2024-03-02").await;

    let response = client.top_today(Some("in"), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let chart: Value = response.json().await.unwrap();

    assert_eq!(chart["market"], MARKET_IN);
    assert_eq!(chart["snapshot_date"], "2024-03-02");
    assert_eq!(chart["total_tracks"], 2);
    assert_eq!(track_ids(&chart), vec![TRACK_3_ID, TRACK_1_ID]);

    let first = &chart["tracks"][0];
    assert_eq!(first["rank"], 1);
    assert_eq!(first["track_name"], TRACK_3_NAME);
    assert_eq!(first["artists"][0], ARTIST_3_NAME);
    assert_eq!(first["album"], "Dunes");
    assert_eq!(first["release_year"], 2022);
    assert_eq!(first["duration_formatted"], "4:00");
    assert_eq!(
        first["spotify_url"],
        format!("https://open.spotify.com/track/{}", TRACK_3_ID)
    );
}

#[tokio::test]
async fn test_top_today_lists_artists_in_name_order() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    server.catalog.set_playlist(PLAYLIST_IN, &[Some(TRACK_2_ID)]);
    ingest(&server, MARKET_IN, "2024-03-01").await;

    let chart: Value = client.top_today(None, None).await.json().await.unwrap();
    assert_eq!(chart["tracks"][0]["artists"][0], ARTIST_1_NAME);
    assert_eq!(chart["tracks"][0]["artists"][1], ARTIST_2_NAME);
}

#[tokio::test]
async fn test_top_today_limit() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    server
        .catalog
        .set_playlist(PLAYLIST_IN, &[Some(TRACK_1_ID), Some(TRACK_2_ID), Some(TRACK_3_ID)]);
    ingest(&server, MARKET_IN, "2024-03-01").await;

    let chart: Value = client.top_today(Some(MARKET_IN), Some(2)).await.json().await.unwrap();
    assert_eq!(track_ids(&chart), vec![TRACK_1_ID, TRACK_2_ID]);

    let response = client.top_today(Some(MARKET_IN), Some(51)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_top_today_is_not_found_without_snapshot() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    server.catalog.set_playlist(PLAYLIST_IN, &[Some(TRACK_1_ID)]);
    ingest(&server, MARKET_IN, "2024-03-01").await;

    // US was never ingested
    let response = client.top_today(Some(MARKET_US), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_unknown_market_is_rejected() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    let response = client.top_today(Some("GB"), None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
    assert!(body["message"].as_str().unwrap().contains("IN, US"));
}

// =============================================================================
// Ingestion Semantics
// =============================================================================

#[tokio::test]
async fn test_reingesting_same_day_is_idempotent() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    let ranking = [Some(TRACK_1_ID), Some(TRACK_2_ID), Some(TRACK_3_ID)];
    server.catalog.set_playlist(PLAYLIST_IN, &ranking);

    let first = ingest(&server, MARKET_IN, "2024-03-01").await;
    let counts_after_first: Value = client.analytics_overview().await.json().await.unwrap();
    let second = ingest(&server, MARKET_IN, "2024-03-01").await;
    let counts_after_second: Value = client.analytics_overview().await.json().await.unwrap();

    assert_eq!(first["artists_created"], 3);
    assert_eq!(second["artists_created"], 0);
    assert_eq!(second["tracks_processed"], 3);
    assert_eq!(counts_after_first, counts_after_second);
    assert_eq!(counts_after_second["total_tracks"], 3);
    assert_eq!(counts_after_second["total_artists"], 3);
    assert_eq!(counts_after_second["total_snapshots"], 3);
}

#[tokio::test]
async fn test_reordered_feed_updates_ranks_in_place() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    server
        .catalog
        .set_playlist(PLAYLIST_IN, &[Some(TRACK_1_ID), Some(TRACK_2_ID), Some(TRACK_3_ID)]);
    ingest(&server, MARKET_IN, "2024-03-01").await;
    server
        .catalog
        .set_playlist(PLAYLIST_IN, &[Some(TRACK_3_ID), Some(TRACK_1_ID), Some(TRACK_2_ID)]);
    ingest(&server, MARKET_IN, "2024-03-01").await;

    let overview: Value = client.analytics_overview().await.json().await.unwrap();
    assert_eq!(overview["total_snapshots"], 3);

    let chart: Value = client.top_today(Some(MARKET_IN), None).await.json().await.unwrap();
    assert_eq!(track_ids(&chart), vec![TRACK_3_ID, TRACK_1_ID, TRACK_2_ID]);
    let ranks: Vec<i64> = chart["tracks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["rank"].as_i64().unwrap())
        .collect();
    assert_eq!(ranks, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_empty_slots_consume_their_rank() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    server
        .catalog
        .set_playlist(PLAYLIST_IN, &[Some(TRACK_1_ID), None, Some(TRACK_2_ID)]);
    let report = ingest(&server, MARKET_IN, "2024-03-01").await;
    assert_eq!(report["tracks_processed"], 2);
    assert_eq!(report["items_skipped"], 1);
    assert_eq!(report["items_failed"], 0);

    let chart: Value = client.top_today(Some(MARKET_IN), None).await.json().await.unwrap();
    assert_eq!(chart["tracks"][0]["rank"], 1);
    assert_eq!(chart["tracks"][1]["rank"], 3);
    assert_eq!(chart["tracks"][1]["track_id"], TRACK_2_ID);
}

// =============================================================================
// Caching
// =============================================================================

#[tokio::test]
async fn test_chart_responses_are_cached_until_next_ingestion() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());

    server.catalog.set_playlist(PLAYLIST_IN, &[Some(TRACK_1_ID)]);
    ingest(&server, MARKET_IN, "2024-03-01").await;

    let response = client.top_today(Some(MARKET_IN), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["cache-control"],
        format!("max-age={}", CACHE_TTL_SEC)
    );
    assert_eq!(server.cache.len(), 1);

    server.catalog.set_playlist(PLAYLIST_IN, &[Some(TRACK_2_ID)]);
    ingest(&server, MARKET_IN, "2024-03-02").await;
    assert_eq!(server.cache.len(), 0);

    let chart: Value = client.top_today(Some(MARKET_IN), None).await.json().await.unwrap();
    assert_eq!(chart["snapshot_date"], "2024-03-02");
    assert_eq!(track_ids(&chart), vec![TRACK_2_ID]);
}

// =============================================================================
// Yearly Charts
// =============================================================================

#[tokio::test]
async fn test_top_year_fallback_matches_precomputed() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    let admin = TestClient::admin(server.base_url.clone());
    seed_january(&server).await;

    let response = client.top_year(2024, MARKET_IN, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let fallback: Value = response.json().await.unwrap();
    assert!(fallback["last_computed"].is_null());
    assert_eq!(fallback["total_tracks"], 4);

    let response = admin.run_aggregate(2024, MARKET_IN).await;
    assert_eq!(response.status(), StatusCode::OK);
    let report: Value = response.json().await.unwrap();
    assert_eq!(report["tracks_computed"], 4);
    assert_eq!(report["artists_computed"], 3);
    assert_eq!(report["genres_computed"], 2);

    let precomputed: Value = client
        .top_year(2024, MARKET_IN, None)
        .await
        .json()
        .await
        .unwrap();
    assert!(!precomputed["last_computed"].is_null());

    assert_eq!(
        track_ids(&fallback),
        vec![TRACK_1_ID, TRACK_2_ID, TRACK_3_ID, TRACK_4_ID]
    );
    assert_eq!(track_ids(&fallback), track_ids(&precomputed));

    for (a, b) in fallback["tracks"]
        .as_array()
        .unwrap()
        .iter()
        .zip(precomputed["tracks"].as_array().unwrap())
    {
        assert_eq!(a["appearances"], b["appearances"]);
        assert_eq!(a["best_rank"], b["best_rank"]);
        assert_eq!(a["first_appearance"], b["first_appearance"]);
    }

    let top = &precomputed["tracks"][0];
    assert_eq!(top["appearances"], 3);
    assert_eq!(top["best_rank"], 1);
    assert_eq!(top["worst_rank"], 2);
    assert_eq!(top["first_appearance"], "2024-01-10");
    assert_eq!(top["last_appearance"], "2024-01-12");
}

#[tokio::test]
async fn test_top_year_limit_and_empty_year() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    seed_january(&server).await;

    let chart: Value = client
        .top_year(2024, MARKET_IN, Some(2))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(chart["total_tracks"], 2);

    let response = client.top_year(2023, MARKET_IN, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client.top_year(2024, MARKET_US, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client.top_year(2024, MARKET_IN, Some(101)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_top_artists_and_genres() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    seed_january(&server).await;

    let response = client.top_artists(2024, MARKET_IN, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let artists: Value = response.json().await.unwrap();
    let names: Vec<&str> = artists["artists"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["artist_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec![ARTIST_1_NAME, ARTIST_2_NAME, ARTIST_3_NAME]);
    assert_eq!(artists["artists"][0]["total_appearances"], 5);
    assert_eq!(artists["artists"][0]["track_count"], 2);
    assert_eq!(artists["artists"][0]["top_track_id"], TRACK_1_ID);

    let response = client.top_genres(2024, MARKET_IN, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let genres: Value = response.json().await.unwrap();
    assert_eq!(genres["genres"][0]["genre"], GENRE_INDIE);
    assert_eq!(genres["genres"][0]["total_appearances"], 5);
    assert_eq!(genres["genres"][0]["track_count"], 3);
    assert_eq!(genres["genres"][0]["top_track_id"], TRACK_2_ID);
    assert_eq!(genres["genres"][1]["genre"], GENRE_FILMI);
    assert_eq!(genres["genres"][1]["top_track_id"], TRACK_1_ID);
}

#[tokio::test]
async fn test_artist_details_are_looked_up_during_ingestion() {
    let server = TestServer::spawn().await;
    server
        .catalog
        .set_playlist(PLAYLIST_IN, &[Some(TRACK_1_ID), Some(TRACK_2_ID)]);

    let report = ingest(&server, MARKET_IN, "2024-01-10").await;
    assert_eq!(report["artists_processed"], 2);
    assert_eq!(report["artists_enriched"], 2);
    // Both artists fit in one batched lookup
    assert_eq!(server.catalog.artist_lookups(), 1);

    let artist = server.store.get_artist(ARTIST_1_ID).unwrap().unwrap();
    assert_eq!(artist.genres, vec![GENRE_FILMI]);
    assert_eq!(artist.followers, Some(ARTIST_1_FOLLOWERS));
    assert!(artist.popularity.is_some());
}

#[tokio::test]
async fn test_failed_artist_lookup_still_ingests_without_genres() {
    let server = TestServer::spawn().await;
    let client = TestClient::new(server.base_url.clone());
    server.catalog.set_artist_failure(Some(503));
    server
        .catalog
        .set_playlist(PLAYLIST_IN, &[Some(TRACK_1_ID), Some(TRACK_3_ID)]);

    let report = ingest(&server, MARKET_IN, "2024-01-10").await;
    assert_eq!(report["success"], true);
    assert_eq!(report["tracks_processed"], 2);
    assert_eq!(report["artists_enriched"], 0);

    let response = client.top_year(2024, MARKET_IN, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    // Playlist payloads carry no genres, so nothing can be grouped
    let response = client.top_genres(2024, MARKET_IN, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
