//! File-backed cache store.
//!
//! One JSON [`CacheRecord`] per key, written atomically via a temp file and
//! rename. The store never propagates I/O failures: a failed read is a miss,
//! a failed write is a no-op, both logged at `warn`. Corrupt or expired
//! records are removed opportunistically when encountered.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use tokio::fs;
use tracing::{debug, warn};

use crate::cache::evictor::EvictionRegistry;
use crate::cache::types::{CacheRecord, now_ms};

#[derive(Clone)]
pub struct CacheStore {
    dir: PathBuf,
    enabled: bool,
    evictor: Arc<EvictionRegistry>,
}

impl CacheStore {
    pub fn new(dir: PathBuf, enabled: bool, evictor: Arc<EvictionRegistry>) -> Self {
        Self {
            dir,
            enabled,
            evictor,
        }
    }

    /// Store directory used when the caller does not configure one.
    pub fn default_dir() -> PathBuf {
        std::env::temp_dir().join("cachet-store")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn evictor(&self) -> &Arc<EvictionRegistry> {
        &self.evictor
    }

    fn record_path(&self, key: &str) -> PathBuf {
        // Keys are storage-safe by construction (derive_cache_key)
        self.dir.join(key)
    }

    /// Read a persisted entry. Absent, corrupt, unreadable, or older than
    /// `ttl` all report `None`; the latter two also remove the record.
    pub async fn load(&self, key: &str, ttl: Option<Duration>) -> Option<(Bytes, Option<String>)> {
        if !self.enabled {
            return None;
        }

        let path = self.record_path(key);
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(key = %key, error = %e, "failed to read cache record");
                }
                return None;
            }
        };

        let record: CacheRecord = match serde_json::from_slice(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!(key = %key, error = %e, "discarding corrupt cache record");
                let _ = fs::remove_file(&path).await;
                return None;
            }
        };

        if let Some(ttl) = ttl {
            if record.is_expired(ttl, now_ms()) {
                debug!(key = %key, "cache record expired, removing");
                self.evictor.cancel(key);
                let _ = fs::remove_file(&path).await;
                return None;
            }
        }

        match BASE64.decode(record.payload.as_bytes()) {
            Ok(bytes) => Some((Bytes::from(bytes), record.mime_type)),
            Err(e) => {
                warn!(key = %key, error = %e, "discarding undecodable cache record");
                let _ = fs::remove_file(&path).await;
                None
            }
        }
    }

    /// Persist the full record for `key`, replacing any prior entry, and
    /// reset its eviction timer: rescheduled when `ttl` is finite, cancelled
    /// otherwise. Failures are absorbed.
    pub async fn save(&self, key: &str, payload: &Bytes, mime_type: Option<String>, ttl: Option<Duration>) {
        if !self.enabled {
            return;
        }

        if let Err(e) = fs::create_dir_all(&self.dir).await {
            warn!(dir = ?self.dir, error = %e, "failed to create cache directory");
            return;
        }

        let record = CacheRecord::new(BASE64.encode(payload), mime_type);
        let json = match serde_json::to_vec(&record) {
            Ok(json) => json,
            Err(e) => {
                warn!(key = %key, error = %e, "failed to serialize cache record");
                return;
            }
        };

        let path = self.record_path(key);
        let tmp = self.dir.join(format!("{key}.tmp"));

        if let Err(e) = fs::write(&tmp, &json).await {
            warn!(key = %key, error = %e, "failed to write cache record");
            let _ = fs::remove_file(&tmp).await;
            return;
        }

        if let Err(e) = fs::rename(&tmp, &path).await {
            warn!(key = %key, error = %e, "failed to finalize cache record");
            let _ = fs::remove_file(&tmp).await;
            return;
        }

        match ttl {
            Some(ttl) => self.evictor.schedule(key, path, ttl),
            None => self.evictor.cancel(key),
        }

        debug!(key = %key, size = payload.len(), "cached payload");
    }

    /// Remove the persisted entry and cancel its eviction timer. Idempotent.
    pub async fn clear(&self, key: &str) {
        if !self.enabled {
            return;
        }

        self.evictor.cancel(key);

        let path = self.record_path(key);
        match fs::remove_file(&path).await {
            Ok(()) => debug!(key = %key, "cleared cache entry"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(key = %key, error = %e, "failed to clear cache entry"),
        }
    }
}
