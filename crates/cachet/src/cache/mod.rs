//! Durable payload cache.
//!
//! Completed downloads are persisted as one JSON record per key and replayed
//! on construction of a new manager. Entries with a finite TTL are guarded by
//! keyed eviction timers. The cache is a pure optimization layer: every
//! storage failure is absorbed and behaves as a miss.

pub mod evictor;
pub mod store;
pub mod types;

pub use evictor::EvictionRegistry;
pub use store::CacheStore;
pub use types::{CACHE_KEY_PREFIX, CacheConfig, CacheRecord, derive_cache_key};
