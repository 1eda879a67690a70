//! Snapshot cache
//!
//! Holds the most recent price snapshot behind a freshness gate: a stored
//! snapshot older than the caller's max age is a miss, never an error.
//! An optional blob backend sits underneath; when it is absent or failing
//! the cache degrades to its in-process store with identical semantics.

pub mod backend;

use crate::core::{PricePoint, PriceSnapshot};
use backend::CacheBackend;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use time::OffsetDateTime;

/// Key the serialized snapshot is stored under in the backend
pub const CACHE_KEY: &str = "prices:snapshot";

/// Backend entry TTL; after this the entry is treated as a miss anyway
pub const BACKEND_TTL: Duration = Duration::from_secs(60);

/// Blob layout shared with any external backend: capture time as unix
/// seconds plus the raw points.
#[derive(Debug, Serialize, Deserialize)]
struct CachedBlob {
    ts: f64,
    data: Vec<PricePoint>,
}

struct LocalEntry {
    captured_at: OffsetDateTime,
    snapshot: PriceSnapshot,
}

/// Freshness-gated holder of the latest snapshot
///
/// Single writer per tick, many concurrent readers. The cache knows
/// nothing about how snapshots are produced.
pub struct SnapshotCache {
    backend: Option<Box<dyn CacheBackend>>,
    local: RwLock<Option<LocalEntry>>,
}

impl SnapshotCache {
    /// Cache with the in-process store only
    pub fn new() -> Self {
        Self {
            backend: None,
            local: RwLock::new(None),
        }
    }

    /// Cache layered over a blob backend
    pub fn with_backend(backend: Box<dyn CacheBackend>) -> Self {
        Self {
            backend: Some(backend),
            local: RwLock::new(None),
        }
    }

    /// Store a snapshot captured now, replacing any prior value
    pub fn set(&self, snapshot: &PriceSnapshot) {
        self.set_at(snapshot, OffsetDateTime::now_utc());
    }

    /// Store a snapshot with an explicit capture instant
    pub fn set_at(&self, snapshot: &PriceSnapshot, now: OffsetDateTime) {
        if let Some(backend) = &self.backend {
            let blob = CachedBlob {
                ts: unix_seconds(now),
                data: snapshot.points().to_vec(),
            };
            match serde_json::to_vec(&blob) {
                Ok(bytes) => match backend.put(CACHE_KEY, &bytes, BACKEND_TTL) {
                    Ok(()) => return,
                    Err(e) => {
                        tracing::warn!("Cache backend put failed, using local store: {}", e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to serialize snapshot for cache backend: {}", e);
                }
            }
        }

        *self.local.write() = Some(LocalEntry {
            captured_at: now,
            snapshot: snapshot.clone(),
        });
    }

    /// Return the stored snapshot if it is no older than `max_age`
    pub fn get(&self, max_age: Duration) -> Option<PriceSnapshot> {
        self.get_at(max_age, OffsetDateTime::now_utc())
    }

    /// Freshness check against an explicit instant
    pub fn get_at(&self, max_age: Duration, now: OffsetDateTime) -> Option<PriceSnapshot> {
        if let Some(backend) = &self.backend {
            match backend.get(CACHE_KEY) {
                Ok(Some(bytes)) => {
                    // The backend answered, so it is authoritative: a stale
                    // or unreadable blob is a miss, not a fallback.
                    let blob: CachedBlob = serde_json::from_slice(&bytes).ok()?;
                    let age = unix_seconds(now) - blob.ts;
                    if age <= max_age.as_secs_f64() {
                        return Some(PriceSnapshot::new(blob.data));
                    }
                    return None;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("Cache backend get failed, using local store: {}", e);
                }
            }
        }

        let guard = self.local.read();
        let entry = guard.as_ref()?;
        let age = now - entry.captured_at;
        let max = time::Duration::try_from(max_age).unwrap_or(time::Duration::MAX);
        if age <= max {
            Some(entry.snapshot.clone())
        } else {
            None
        }
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}

fn unix_seconds(ts: OffsetDateTime) -> f64 {
    ts.unix_timestamp_nanos() as f64 / 1e9
}

#[cfg(test)]
mod tests {
    use super::*;
    use backend::{BackendError, MemoryBackend};
    use time::macros::datetime;

    fn make_snapshot(ts: OffsetDateTime) -> PriceSnapshot {
        PriceSnapshot::new(vec![PricePoint {
            symbol: "AAPL".to_string(),
            price: 190.0,
            change: 1.0,
            percent_change: 0.5,
            ts,
        }])
    }

    /// Backend that always errors, for the degrade path
    struct BrokenBackend;

    impl CacheBackend for BrokenBackend {
        fn put(&self, _key: &str, _blob: &[u8], _ttl: Duration) -> Result<(), BackendError> {
            Err(BackendError::Unavailable("connection refused".to_string()))
        }

        fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, BackendError> {
            Err(BackendError::Unavailable("connection refused".to_string()))
        }
    }

    #[test]
    fn test_fresh_snapshot_is_returned() {
        let cache = SnapshotCache::new();
        let t0 = datetime!(2024-06-01 12:00:00 UTC);
        cache.set_at(&make_snapshot(t0), t0);

        let got = cache.get_at(Duration::from_secs(15), t0 + time::Duration::seconds(5));
        assert!(got.is_some());
    }

    #[test]
    fn test_stale_snapshot_is_a_miss() {
        let cache = SnapshotCache::new();
        let t0 = datetime!(2024-06-01 12:00:00 UTC);
        cache.set_at(&make_snapshot(t0), t0);

        let got = cache.get_at(Duration::from_secs(15), t0 + time::Duration::seconds(16));
        assert!(got.is_none());
    }

    #[test]
    fn test_empty_cache_is_a_miss() {
        let cache = SnapshotCache::new();
        assert!(cache.get(Duration::from_secs(15)).is_none());
    }

    #[test]
    fn test_set_replaces_prior_value() {
        let cache = SnapshotCache::new();
        let t0 = datetime!(2024-06-01 12:00:00 UTC);
        cache.set_at(&make_snapshot(t0), t0);

        let t1 = t0 + time::Duration::seconds(30);
        let newer = PriceSnapshot::new(
            make_snapshot(t1)
                .points()
                .iter()
                .cloned()
                .map(|mut p| {
                    p.price = 195.0;
                    p
                })
                .collect(),
        );
        cache.set_at(&newer, t1);

        let got = cache
            .get_at(Duration::from_secs(15), t1 + time::Duration::seconds(1))
            .unwrap();
        assert_eq!(got.points()[0].price, 195.0);
    }

    #[test]
    fn test_backend_roundtrip_preserves_freshness_gate() {
        let cache = SnapshotCache::with_backend(Box::new(MemoryBackend::new()));
        let t0 = datetime!(2024-06-01 12:00:00 UTC);
        cache.set_at(&make_snapshot(t0), t0);

        let got = cache.get_at(Duration::from_secs(15), t0 + time::Duration::seconds(5));
        assert!(got.is_some());
        assert_eq!(got.unwrap().points()[0].symbol, "AAPL");

        let got = cache.get_at(Duration::from_secs(15), t0 + time::Duration::seconds(16));
        assert!(got.is_none());
    }

    #[test]
    fn test_broken_backend_degrades_to_local_store() {
        let cache = SnapshotCache::with_backend(Box::new(BrokenBackend));
        let t0 = datetime!(2024-06-01 12:00:00 UTC);
        cache.set_at(&make_snapshot(t0), t0);

        // put failed, so the value must have landed in the local store
        let got = cache.get_at(Duration::from_secs(15), t0 + time::Duration::seconds(5));
        assert!(got.is_some());
    }
}
