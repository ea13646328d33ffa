//! Keyed eviction timers.
//!
//! Each cache entry with a finite TTL gets a pending one-shot removal task
//! scheduled for its expiry deadline. The registry is an injectable object
//! owned by the store rather than process-global state, so independent stores
//! can be tested (and run) in isolation.
//!
//! Invariant: at most one live timer per key. Scheduling for a key that
//! already has a timer cancels the old one first; clearing an entry cancels
//! its timer.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Default)]
pub struct EvictionRegistry {
    timers: Arc<Mutex<HashMap<String, (u64, JoinHandle<()>)>>>,
    next_id: AtomicU64,
}

impl EvictionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Cancel any existing timer for `key` and schedule removal of `path`
    /// after `delay`. Cancel-then-schedule happens under the registry lock so
    /// the one-timer-per-key invariant holds on a multi-threaded runtime.
    pub fn schedule(&self, key: &str, path: PathBuf, delay: Duration) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let slot = Arc::downgrade(&self.timers);
        let task_key = key.to_string();

        let mut timers = self.timers.lock();
        if let Some((_, old)) = timers.remove(key) {
            old.abort();
        }

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!(key = %task_key, "evicted expired cache entry"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(key = %task_key, error = %e, "failed to evict cache entry"),
            }

            // Deregister this timer, unless a newer one has already replaced
            // the slot.
            if let Some(timers) = slot.upgrade() {
                let mut timers = timers.lock();
                if timers.get(&task_key).is_some_and(|(slot_id, _)| *slot_id == id) {
                    timers.remove(&task_key);
                }
            }
        });

        timers.insert(key.to_string(), (id, handle));
    }

    /// Cancel the pending timer for `key`, if any.
    pub fn cancel(&self, key: &str) {
        if let Some((_, handle)) = self.timers.lock().remove(key) {
            handle.abort();
            debug!(key = %key, "cancelled eviction timer");
        }
    }

    /// Number of timers currently pending.
    pub fn pending(&self) -> usize {
        self.timers.lock().len()
    }
}

impl Drop for EvictionRegistry {
    fn drop(&mut self) {
        for (_, (_, handle)) in self.timers.lock().drain() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::time::sleep;

    async fn entry(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        tokio::fs::write(&path, b"payload").await.unwrap();
        path
    }

    #[tokio::test]
    async fn test_timer_removes_entry_at_deadline() {
        let dir = TempDir::new().unwrap();
        let path = entry(&dir, "k1").await;
        let registry = EvictionRegistry::new();

        registry.schedule("k1", path.clone(), Duration::from_millis(50));
        assert_eq!(registry.pending(), 1);

        sleep(Duration::from_millis(200)).await;
        assert!(!path.exists());
        assert_eq!(registry.pending(), 0);
    }

    #[tokio::test]
    async fn test_cancel_keeps_entry() {
        let dir = TempDir::new().unwrap();
        let path = entry(&dir, "k1").await;
        let registry = EvictionRegistry::new();

        registry.schedule("k1", path.clone(), Duration::from_millis(50));
        registry.cancel("k1");

        sleep(Duration::from_millis(200)).await;
        assert!(path.exists());
        assert_eq!(registry.pending(), 0);
    }

    #[tokio::test]
    async fn test_reschedule_replaces_timer() {
        let dir = TempDir::new().unwrap();
        let path = entry(&dir, "k1").await;
        let registry = EvictionRegistry::new();

        // The first, short timer must never fire once replaced by a longer one
        registry.schedule("k1", path.clone(), Duration::from_millis(50));
        registry.schedule("k1", path.clone(), Duration::from_millis(400));
        assert_eq!(registry.pending(), 1);

        sleep(Duration::from_millis(200)).await;
        assert!(path.exists(), "entry removed by a superseded timer");

        sleep(Duration::from_millis(400)).await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_registries_are_isolated() {
        let dir = TempDir::new().unwrap();
        let path_a = entry(&dir, "a").await;
        let path_b = entry(&dir, "b").await;

        let first = EvictionRegistry::new();
        let second = EvictionRegistry::new();

        first.schedule("k", path_a.clone(), Duration::from_millis(50));
        second.schedule("k", path_b.clone(), Duration::from_millis(50));

        // Cancelling the key in one registry leaves the other's timer alone
        first.cancel("k");

        sleep(Duration::from_millis(200)).await;
        assert!(path_a.exists());
        assert!(!path_b.exists());
    }

    #[tokio::test]
    async fn test_cancel_unknown_key_is_noop() {
        let registry = EvictionRegistry::new();
        registry.cancel("ghost");
        assert_eq!(registry.pending(), 0);
    }
}
