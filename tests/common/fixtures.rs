//! Catalog payload fixtures
//!
//! Tracks and artists are described once here and rendered into the JSON
//! shapes the catalog API returns, so tests only pick which tracks appear and
//! in what order. Tracks embed simplified artists (id, name, link) the way
//! playlist and search payloads do; genres, followers and popularity only
//! come with the full artist object.

use super::constants::*;
use serde_json::{json, Value};

struct FixtureArtist {
    id: &'static str,
    name: &'static str,
    genres: &'static [&'static str],
    followers: i64,
    popularity: i64,
}

const ARTISTS: &[FixtureArtist] = &[
    FixtureArtist {
        id: ARTIST_1_ID,
        name: ARTIST_1_NAME,
        genres: &[GENRE_FILMI],
        followers: ARTIST_1_FOLLOWERS,
        popularity: 88,
    },
    FixtureArtist {
        id: ARTIST_2_ID,
        name: ARTIST_2_NAME,
        genres: &[GENRE_INDIE],
        followers: 310_000,
        popularity: 72,
    },
    FixtureArtist {
        id: ARTIST_3_ID,
        name: ARTIST_3_NAME,
        genres: &[GENRE_INDIE],
        followers: 54_000,
        popularity: 61,
    },
];

struct FixtureTrack {
    id: &'static str,
    name: &'static str,
    artists: &'static [(&'static str, &'static str)],
    album: &'static str,
    release_date: &'static str,
    popularity: i64,
    duration_ms: i64,
}

const TRACKS: &[FixtureTrack] = &[
    FixtureTrack {
        id: TRACK_1_ID,
        name: TRACK_1_NAME,
        artists: &[(ARTIST_1_ID, ARTIST_1_NAME)],
        album: "Rain Album",
        release_date: "2024-01-12",
        popularity: 91,
        duration_ms: 201_000,
    },
    FixtureTrack {
        id: TRACK_2_ID,
        name: TRACK_2_NAME,
        artists: &[
            (ARTIST_1_ID, ARTIST_1_NAME),
            (ARTIST_2_ID, ARTIST_2_NAME),
        ],
        album: "Night Drive",
        release_date: "2023-11",
        popularity: 84,
        duration_ms: 185_500,
    },
    FixtureTrack {
        id: TRACK_3_ID,
        name: TRACK_3_NAME,
        artists: &[(ARTIST_3_ID, ARTIST_3_NAME)],
        album: "Dunes",
        release_date: "2022",
        popularity: 70,
        duration_ms: 240_000,
    },
    FixtureTrack {
        id: TRACK_4_ID,
        name: TRACK_4_NAME,
        artists: &[(ARTIST_2_ID, ARTIST_2_NAME)],
        album: "Docks",
        release_date: "2024-02-02",
        popularity: 65,
        duration_ms: 199_000,
    },
];

/// Catalog track payload for a fixture track id.
///
/// # Panics
///
/// Panics on an unknown id (indicates a broken test).
pub fn track_payload(track_id: &str) -> Value {
    let track = TRACKS
        .iter()
        .find(|t| t.id == track_id)
        .unwrap_or_else(|| panic!("Unknown fixture track {}", track_id));
    let artists: Vec<Value> = track
        .artists
        .iter()
        .map(|(id, name)| {
            json!({
                "id": id,
                "name": name,
                "external_urls": {"spotify": format!("https://open.spotify.com/artist/{}", id)},
            })
        })
        .collect();
    json!({
        "id": track.id,
        "name": track.name,
        "artists": artists,
        "album": {
            "id": format!("album-{}", track.id),
            "name": track.album,
            "release_date": track.release_date,
        },
        "popularity": track.popularity,
        "duration_ms": track.duration_ms,
        "explicit": false,
        "preview_url": null,
        "external_urls": {"spotify": format!("https://open.spotify.com/track/{}", track.id)},
    })
}

/// Playlist tracks page ranking the given tracks in order. `None` renders an
/// empty slot, the way removed tracks appear upstream.
pub fn playlist_page(ranking: &[Option<&str>]) -> Value {
    let items: Vec<Value> = ranking
        .iter()
        .map(|slot| match slot {
            Some(track_id) => json!({
                "added_at": "2024-01-15T06:30:00Z",
                "track": track_payload(track_id),
            }),
            None => json!({"added_at": null, "track": null}),
        })
        .collect();
    json!({"items": items, "total": ranking.len()})
}

/// Search response with the given tracks and total.
pub fn search_page(track_ids: &[&str], total: u64) -> Value {
    let items: Vec<Value> = track_ids.iter().map(|id| track_payload(id)).collect();
    json!({"tracks": {"items": items, "total": total}})
}

/// Full artist object, or `None` for an id the catalog does not know.
pub fn artist_payload(artist_id: &str) -> Option<Value> {
    let artist = ARTISTS.iter().find(|a| a.id == artist_id)?;
    Some(json!({
        "id": artist.id,
        "name": artist.name,
        "genres": artist.genres,
        "followers": {"total": artist.followers},
        "popularity": artist.popularity,
        "images": [{"url": format!("https://img.example/{}.jpg", artist.id)}],
        "external_urls": {"spotify": format!("https://open.spotify.com/artist/{}", artist.id)},
    }))
}
