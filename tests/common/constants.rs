//! Shared constants for end-to-end tests
//!
//! When fixture data or server settings change, update only this file.

// ============================================================================
// Server Settings
// ============================================================================

/// Value of the X-Admin-Key header accepted by the test server
pub const ADMIN_KEY: &str = "e2e-admin-key";

/// Credentials the test server exchanges for catalog tokens
pub const CATALOG_CLIENT_ID: &str = "e2e-client";
pub const CATALOG_CLIENT_SECRET: &str = "e2e-secret";

/// TTL of cached chart responses, also the expected Cache-Control max-age
pub const CACHE_TTL_SEC: u64 = 300;

// ============================================================================
// Markets
// ============================================================================

pub const MARKET_IN: &str = "IN";
pub const MARKET_US: &str = "US";

pub const PLAYLIST_IN: &str = "top-50-in";
pub const PLAYLIST_US: &str = "top-50-us";

// ============================================================================
// Catalog Fixture IDs
// ============================================================================

pub const TRACK_1_ID: &str = "track-1";
pub const TRACK_2_ID: &str = "track-2";
pub const TRACK_3_ID: &str = "track-3";
pub const TRACK_4_ID: &str = "track-4";

pub const TRACK_1_NAME: &str = "Monsoon Song";
pub const TRACK_2_NAME: &str = "City Lights";
pub const TRACK_3_NAME: &str = "Desert Wind";
pub const TRACK_4_NAME: &str = "Harbour Blues";

pub const ARTIST_1_ID: &str = "artist-1";
pub const ARTIST_2_ID: &str = "artist-2";
pub const ARTIST_3_ID: &str = "artist-3";

pub const ARTIST_1_NAME: &str = "Asha Rao";
pub const ARTIST_2_NAME: &str = "Dev Malik";
pub const ARTIST_3_NAME: &str = "Nila Band";

/// Only present on full artist objects, never on the ones embedded in tracks
pub const ARTIST_1_FOLLOWERS: i64 = 2_400_000;

pub const GENRE_FILMI: &str = "filmi";
pub const GENRE_INDIE: &str = "indie";

// ============================================================================
// Test Timeouts and Configuration
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Timeout for individual HTTP requests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Polling interval when waiting for server ready (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;
