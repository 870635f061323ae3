//! In-memory TTL cache for read responses.

use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const TODAY_CHART_PREFIX: &str = "today_chart";
pub const YEARLY_CHART_PREFIX: &str = "yearly_chart";
pub const YEARLY_ARTISTS_PREFIX: &str = "yearly_artists";
pub const YEARLY_GENRES_PREFIX: &str = "yearly_genres";

/// Cache of serialized JSON read responses.
pub type ResponseCache = TtlCache<serde_json::Value>;

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Key/value map whose entries expire after a per-entry TTL.
///
/// Expired entries are dropped lazily by `get`, or in bulk by
/// `cleanup_expired`.
pub struct TtlCache<V: Clone> {
    default_ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().unwrap();
        let now = Instant::now();
        let expired = entries.get(key)?.is_expired(now);
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|entry| entry.value.clone())
    }

    /// Stores `value` under `key`, expiring after `ttl` or the default TTL.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let expires_at = Instant::now() + ttl.unwrap_or(self.default_ttl);
        self.entries
            .lock()
            .unwrap()
            .insert(key.into(), CacheEntry { value, expires_at });
    }

    /// Returns true if an entry was removed.
    pub fn delete(&self, key: &str) -> bool {
        self.entries.lock().unwrap().remove(key).is_some()
    }

    /// Drops everything, returning how many entries were held.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let count = entries.len();
        entries.clear();
        count
    }

    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        before - entries.len()
    }

    pub fn cleanup_expired(&self) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builds `"{prefix}:{hash}"` from named parameters.
///
/// Parameters are sorted by name before hashing so their order never changes
/// the key.
pub fn cache_key(prefix: &str, params: &[(&str, String)]) -> String {
    let sorted: BTreeMap<&str, &str> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();
    let serialized = serde_json::to_string(&sorted).unwrap_or_default();
    let digest = format!("{:x}", Sha256::digest(serialized.as_bytes()));
    format!("{}:{}", prefix, &digest[..8])
}
