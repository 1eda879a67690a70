//! Pluggable blob backend beneath the snapshot cache
//!
//! A backend stores an opaque serialized snapshot under a key with a TTL.
//! The cache treats backend failure as a miss and falls back to its
//! in-process store, so a shared store (Redis or similar) can be swapped
//! in behind this trait without touching freshness semantics.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Backend failures. Callers recover by using the in-process fallback.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
}

/// Key/blob store with per-entry TTL
pub trait CacheBackend: Send + Sync {
    /// Store a blob under `key`, replacing any prior value
    fn put(&self, key: &str, blob: &[u8], ttl: Duration) -> Result<(), BackendError>;

    /// Fetch the blob at `key`; expired or absent entries return `None`
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError>;
}

/// In-process backend used when no shared store is configured
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, StoredBlob>>,
}

struct StoredBlob {
    expires_at: Instant,
    bytes: Vec<u8>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheBackend for MemoryBackend {
    fn put(&self, key: &str, blob: &[u8], ttl: Duration) -> Result<(), BackendError> {
        let mut entries = self.entries.lock();
        entries.insert(
            key.to_string(),
            StoredBlob {
                expires_at: Instant::now() + ttl,
                bytes: blob.to_vec(),
            },
        );
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(stored) if stored.expires_at > Instant::now() => Ok(Some(stored.bytes.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }
}
