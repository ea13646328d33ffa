//! Proxy configuration for the HTTP client.

use reqwest::Proxy;

use crate::error::DownloadError;

/// Proxy protocol selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyKind {
    /// HTTP/HTTPS proxy
    Http,
    /// SOCKS5 proxy
    Socks5,
    /// Proxy all traffic regardless of scheme
    All,
}

/// Basic authentication for the proxy.
#[derive(Debug, Clone)]
pub struct ProxyAuth {
    pub username: String,
    pub password: String,
}

/// Proxy configuration.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Proxy server URL, e.g. "http://proxy.example.com:8080"
    pub url: String,
    pub kind: ProxyKind,
    pub auth: Option<ProxyAuth>,
}

/// Build a reqwest proxy from the configuration.
pub fn build_proxy(config: &ProxyConfig) -> Result<Proxy, DownloadError> {
    let mut proxy = match config.kind {
        ProxyKind::Http => Proxy::all(&config.url)
            .map_err(|e| DownloadError::Proxy(format!("invalid HTTP proxy URL: {e}")))?,
        ProxyKind::Socks5 => {
            let url = if config.url.starts_with("socks5://") {
                config.url.clone()
            } else {
                format!("socks5://{}", config.url)
            };
            Proxy::all(&url)
                .map_err(|e| DownloadError::Proxy(format!("invalid SOCKS5 proxy URL: {e}")))?
        }
        ProxyKind::All => Proxy::all(&config.url)
            .map_err(|e| DownloadError::Proxy(format!("invalid proxy URL: {e}")))?,
    };

    if let Some(auth) = &config.auth {
        proxy = proxy.basic_auth(&auth.username, &auth.password);
    }

    Ok(proxy)
}
