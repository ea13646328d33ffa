use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::cache::CacheConfig;
use crate::error::DownloadError;
use crate::proxy::ProxyConfig;
use crate::session::Payload;
use crate::source::{PlatformUrls, UrlResolver};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Invoked per received chunk with `(progress, bytes_received, total_bytes)`
/// while the server advertises a total length.
pub type ProgressFn = Arc<dyn Fn(f64, u64, u64) + Send + Sync>;

/// Invoked once with the finished payload.
pub type CompleteFn = Arc<dyn Fn(&Payload) + Send + Sync>;

/// Invoked with the failure detail when a transfer errors. Cancellation is
/// not an error and never reaches this callback.
pub type ErrorFn = Arc<dyn Fn(&DownloadError) + Send + Sync>;

/// Configurable options for a download manager.
#[derive(Clone)]
pub struct DownloadConfig {
    /// Static per-platform URL pair
    pub urls: Option<PlatformUrls>,

    /// Caller-supplied URL resolver; takes precedence over `urls`
    pub resolver: Option<UrlResolver>,

    /// Persisted cache options
    pub cache: CacheConfig,

    pub on_progress: Option<ProgressFn>,
    pub on_complete: Option<CompleteFn>,
    pub on_error: Option<ErrorFn>,

    /// Overall timeout for the entire HTTP request; zero disables it
    pub timeout: Duration,

    /// Connection timeout; zero disables it
    pub connect_timeout: Duration,

    /// Whether to follow redirects
    pub follow_redirects: bool,

    /// User agent string
    pub user_agent: String,

    /// Custom HTTP headers for requests
    pub headers: HeaderMap,

    /// Proxy configuration (optional)
    pub proxy: Option<ProxyConfig>,

    /// Whether to use system proxy settings if available
    pub use_system_proxy: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            urls: None,
            resolver: None,
            cache: CacheConfig::default(),
            on_progress: None,
            on_complete: None,
            on_error: None,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: DownloadConfig::default_headers(),
            proxy: None,
            use_system_proxy: true,
        }
    }
}

impl DownloadConfig {
    pub fn builder() -> crate::builder::DownloadConfigBuilder {
        crate::builder::DownloadConfigBuilder::new()
    }

    pub fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(
            reqwest::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );

        headers
    }
}

impl std::fmt::Debug for DownloadConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadConfig")
            .field("urls", &self.urls)
            .field("resolver", &self.resolver.as_ref().map(|_| "<fn>"))
            .field("cache", &self.cache)
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("follow_redirects", &self.follow_redirects)
            .field("user_agent", &self.user_agent)
            .field("proxy", &self.proxy)
            .field("use_system_proxy", &self.use_system_proxy)
            .finish_non_exhaustive()
    }
}
