//! # Builder for DownloadConfig
//!
//! Fluent API for assembling a [`DownloadConfig`].
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use cachet_engine::{DownloadConfig, PlatformUrls};
//!
//! let config = DownloadConfig::builder()
//!     .with_platform_urls(PlatformUrls::new("https://x/a.dmg", "https://x/a.exe"))
//!     .with_cache_key("release-artifact")
//!     .with_cache_ttl(Duration::from_secs(24 * 3600))
//!     .with_timeout(Duration::from_secs(60))
//!     .build();
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::config::{CompleteFn, DownloadConfig, ErrorFn, ProgressFn};
use crate::error::DownloadError;
use crate::proxy::ProxyConfig;
use crate::session::Payload;
use crate::source::PlatformUrls;

/// Builder for creating [`DownloadConfig`] instances with a fluent API.
#[derive(Clone, Default)]
pub struct DownloadConfigBuilder {
    config: DownloadConfig,
}

impl DownloadConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: DownloadConfig::default(),
        }
    }

    /// Set the static per-platform URL pair.
    pub fn with_platform_urls(mut self, urls: PlatformUrls) -> Self {
        self.config.urls = Some(urls);
        self
    }

    /// Set a URL resolver function. Takes precedence over the platform pair.
    pub fn with_url_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.config.resolver = Some(Arc::new(resolver));
        self
    }

    /// Enable or disable the persisted cache (enabled by default).
    pub fn with_caching_enabled(mut self, enabled: bool) -> Self {
        self.config.cache.enabled = enabled;
        self
    }

    /// Override the URL-derived cache key.
    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.config.cache.key = Some(key.into());
        self
    }

    /// Set the cache TTL. Without one, entries never expire automatically.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache.ttl = Some(ttl);
        self
    }

    /// Set the cache store directory.
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.cache.dir = Some(dir.into());
        self
    }

    /// Set the progress callback, invoked per chunk with
    /// `(progress, bytes_received, total_bytes)` when the total is known.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(f64, u64, u64) + Send + Sync + 'static,
    {
        self.config.on_progress = Some(Arc::new(callback) as ProgressFn);
        self
    }

    /// Set the completion callback, invoked with the finished payload.
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Payload) + Send + Sync + 'static,
    {
        self.config.on_complete = Some(Arc::new(callback) as CompleteFn);
        self
    }

    /// Set the error callback, invoked with the transfer failure detail.
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&DownloadError) + Send + Sync + 'static,
    {
        self.config.on_error = Some(Arc::new(callback) as ErrorFn);
        self
    }

    /// Set the overall timeout for the entire HTTP request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set whether to follow redirects.
    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.config.follow_redirects = follow;
        self
    }

    /// Set the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Add a custom HTTP header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.as_ref().parse::<reqwest::header::HeaderName>(),
            HeaderValue::from_str(value.as_ref()),
        ) {
            self.config.headers.insert(name, value);
        }
        self
    }

    /// Set all HTTP headers, replacing any existing headers.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.config.headers = headers;
        self
    }

    /// Set the proxy configuration. Overrides system proxy settings.
    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.config.proxy = Some(proxy);
        self.config.use_system_proxy = false;
        self
    }

    /// Set whether to use system proxy settings if available.
    pub fn with_system_proxy(mut self, use_system_proxy: bool) -> Self {
        if self.config.proxy.is_none() {
            self.config.use_system_proxy = use_system_proxy;
        }
        self
    }

    pub fn build(self) -> DownloadConfig {
        self.config
    }
}
