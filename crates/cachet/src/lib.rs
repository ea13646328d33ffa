//! # Cachet
//!
//! A background download engine with a durable, TTL-bounded payload cache.
//!
//! A [`DownloadManager`] drives one resource: the URL is resolved once from a
//! per-platform pair or a caller-supplied resolver, the payload is streamed
//! with incremental progress reporting, and the completed result is persisted
//! under a stable cache key so a later manager can replay it without touching
//! the network.
//!
//! ## Features
//!
//! - Streamed fetch with per-chunk progress callbacks
//! - Cooperative cancellation; a superseding start cleanly replaces the
//!   in-flight transfer
//! - File-backed payload cache with TTL expiry and keyed eviction timers
//! - One-shot save of the finished payload to disk
//! - Injectable platform detection and eviction registry for tests

pub mod builder;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod manager;
pub mod platform;
pub mod proxy;
pub mod session;
pub mod source;

pub use builder::DownloadConfigBuilder;
pub use cache::{
    CACHE_KEY_PREFIX, CacheConfig, CacheRecord, CacheStore, EvictionRegistry, derive_cache_key,
};
pub use config::{CompleteFn, DownloadConfig, ErrorFn, ProgressFn};
pub use error::DownloadError;
pub use manager::DownloadManager;
pub use platform::{FixedPlatform, Platform, PlatformDetector, SystemPlatform};
pub use proxy::{ProxyAuth, ProxyConfig, ProxyKind};
pub use session::{DownloadSnapshot, DownloadState, Payload};
pub use source::{PlatformUrls, UrlResolver};

// Re-export client construction for callers that want a matching client
pub use client::create_client;
