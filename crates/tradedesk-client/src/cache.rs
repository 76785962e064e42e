//! In-memory response cache and in-flight lock set
//!
//! [`ResponseCache`] holds unwrapped GET payloads keyed by rendered URL.
//! Entries are never updated in place: a store replaces the whole entry and
//! an expired entry is removed the first time a lookup notices it.
//!
//! [`InFlight`] tracks keys whose GET is currently on the wire. Membership is
//! tied to an [`InFlightGuard`], so the key is released when the owning call
//! finishes, fails, or its future is dropped.

use dashmap::{DashMap, DashSet};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::InvalidationMode;

/// Current time in milliseconds since the Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// One cached GET response
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Unwrapped response payload
    pub data: Value,
    /// Creation time in epoch milliseconds
    pub timestamp: u64,
    pub ttl: Duration,
    /// Normalized endpoint path the entry was fetched from
    pub path: String,
}

impl CacheEntry {
    pub fn new(data: Value, ttl: Duration, path: impl Into<String>) -> Self {
        Self {
            data,
            timestamp: now_ms(),
            ttl,
            path: path.into(),
        }
    }

    fn age_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.timestamp)
    }

    pub fn is_expired_at(&self, now: u64) -> bool {
        u128::from(self.age_ms(now)) >= self.ttl.as_millis()
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_ms())
    }

    /// Time left before the entry expires
    pub fn remaining_at(&self, now: u64) -> Option<Duration> {
        self.ttl
            .checked_sub(Duration::from_millis(self.age_ms(now)))
            .filter(|d| !d.is_zero())
    }
}

/// Per-instance TTL cache for GET responses
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the payload for `key` if a fresh entry exists
    ///
    /// An expired entry is removed and counted as a miss.
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = now_ms();
        let fresh = self.entries.get(key).and_then(|entry| {
            if entry.is_expired_at(now) {
                None
            } else {
                Some(entry.data.clone())
            }
        });

        if fresh.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.entries
                .remove_if(key, |_, entry| entry.is_expired_at(now));
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        fresh
    }

    /// Like [`get`](Self::get) but leaves the counters and expired entries alone
    pub fn peek(&self, key: &str) -> Option<Value> {
        let now = now_ms();
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.data.clone())
    }

    /// Store `entry` under `key`, replacing any previous entry
    pub fn insert(&self, key: impl Into<String>, entry: CacheEntry) {
        self.entries.insert(key.into(), entry);
    }

    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Whether a fresh entry exists, without touching hit/miss counters
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired())
    }

    /// Remaining lifetime of the entry under `key`
    pub fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        let now = now_ms();
        self.entries
            .get(key)
            .and_then(|entry| entry.remaining_at(now))
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Remove every expired entry, returning how many were dropped
    pub fn clear_expired(&self) -> usize {
        let now = now_ms();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        before.saturating_sub(self.entries.len())
    }

    /// Drop cached reads related to `resource`, returning how many were dropped
    pub fn invalidate(&self, resource: &str, mode: InvalidationMode) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, entry| match mode {
            InvalidationMode::Substring => !key.contains(resource),
            InvalidationMode::SegmentPrefix => {
                let beneath = entry
                    .path
                    .strip_prefix(resource)
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'));
                !beneath
            }
        });
        let removed = before.saturating_sub(self.entries.len());
        self.invalidations
            .fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            entries: self.entries.len() as u64,
        }
    }
}

/// Cache statistics for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
    pub entries: u64,
}

impl CacheStats {
    /// Calculate cache hit rate as percentage
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            (self.hits as f64) / ((self.hits + self.misses) as f64) * 100.0
        }
    }
}

/// Set of cache keys with a GET currently on the wire
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    keys: Arc<DashSet<String>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `key` as in flight, or return `None` if another call already holds it
    pub fn try_acquire(&self, key: &str) -> Option<InFlightGuard> {
        self.keys.insert(key.to_string()).then(|| InFlightGuard {
            keys: Arc::clone(&self.keys),
            key: key.to_string(),
        })
    }

    pub fn is_locked(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Releases its key from the [`InFlight`] set on drop
#[derive(Debug)]
pub struct InFlightGuard {
    keys: Arc<DashSet<String>>,
    key: String,
}

impl InFlightGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.keys.remove(&self.key);
    }
}
