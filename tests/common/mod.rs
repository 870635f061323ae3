//! Common test infrastructure
//!
//! This module provides all the infrastructure needed for end-to-end tests.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestServer, TestClient, MARKET_IN, PLAYLIST_IN, TRACK_1_ID};
//! use reqwest::StatusCode;
//!
//! #[tokio::test]
//! async fn test_ingest() {
//!     let server = TestServer::spawn().await;
//!     server.catalog.set_playlist(PLAYLIST_IN, &[Some(TRACK_1_ID)]);
//!     let client = TestClient::admin(server.base_url.clone());
//!
//!     let response = client.run_ingest(MARKET_IN, None).await;
//!     assert_eq!(response.status(), StatusCode::OK);
//! }
//! ```

mod client;
mod constants;
mod fake_catalog;
mod fixtures;
mod server;

// Public API - this is what tests import
pub use client::TestClient;
pub use constants::*;
#[allow(unused_imports)]
pub use fixtures::search_page;
pub use server::TestServer;
