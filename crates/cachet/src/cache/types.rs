//! Cache key derivation and the persisted record shape.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Namespace prefix shared by every persisted cache key.
pub const CACHE_KEY_PREFIX: &str = "cachet-v1-";

/// Derive the storage key for a resolved URL and optional caller-supplied
/// logical key.
///
/// A custom key wins when supplied (the caller controls its collision domain);
/// otherwise the resolved URL is percent-encoded into the key. Both variants
/// are deterministic across processes and double as storage-safe file names.
pub fn derive_cache_key(resolved_url: &str, custom_key: Option<&str>) -> String {
    match custom_key {
        Some(key) => format!("{CACHE_KEY_PREFIX}{}", percent_encode(key)),
        None => format!("{CACHE_KEY_PREFIX}{}", percent_encode(resolved_url)),
    }
}

/// Percent-encode everything outside the unreserved set, so the result is
/// safe as a file name on any platform.
pub(crate) fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for b in input.as_bytes() {
        match *b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(*b as char);
            }
            b => write!(&mut out, "%{b:02X}").unwrap(),
        }
    }
    out
}

/// Current time as epoch milliseconds.
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Persisted cache entry. The payload travels as base64 text so the record is
/// a single text-safe JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    pub payload: String,
    pub mime_type: Option<String>,
    /// Epoch milliseconds of the write
    pub stored_at: u64,
}

impl CacheRecord {
    pub fn new(payload: String, mime_type: Option<String>) -> Self {
        Self {
            payload,
            mime_type,
            stored_at: now_ms(),
        }
    }

    /// An entry is expired once its age exceeds the TTL. Exactly at the TTL
    /// boundary it is still valid.
    pub fn is_expired(&self, ttl: Duration, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.stored_at) > ttl.as_millis() as u64
    }
}

/// Caching options for a download manager.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Whether the persisted cache is read and written at all
    pub enabled: bool,
    /// Overrides the URL-derived cache key
    pub key: Option<String>,
    /// Maximum entry age; `None` means entries never expire automatically
    pub ttl: Option<Duration>,
    /// Store directory; defaults under the system temp dir
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            key: None,
            ttl: None,
            dir: None,
        }
    }
}
