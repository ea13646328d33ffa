//! HTTP client construction.

use std::sync::Arc;

use reqwest::Client;
use rustls::{ClientConfig, crypto::ring};
use rustls_platform_verifier::BuilderVerifierExt;
use tracing::{debug, info};

use crate::config::DownloadConfig;
use crate::error::DownloadError;
use crate::proxy::build_proxy;

/// Create a reqwest client from the manager configuration.
///
/// TLS uses the platform certificate verifier on top of rustls, so downloads
/// trust the same roots the host OS does.
pub fn create_client(config: &DownloadConfig) -> Result<Client, DownloadError> {
    let provider = Arc::new(ring::default_provider());

    let tls_config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .expect("default TLS protocol versions")
        .with_platform_verifier()
        .expect("platform certificate verifier")
        .with_no_client_auth();

    let mut builder = Client::builder()
        .user_agent(&config.user_agent)
        .default_headers(config.headers.clone())
        .use_preconfigured_tls(tls_config)
        .redirect(if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        });

    if !config.timeout.is_zero() {
        builder = builder.timeout(config.timeout);
    }

    if !config.connect_timeout.is_zero() {
        builder = builder.connect_timeout(config.connect_timeout);
    }

    if let Some(proxy_config) = &config.proxy {
        let proxy = build_proxy(proxy_config)?;
        builder = builder.proxy(proxy);
        info!(proxy_url = %proxy_config.url, "using explicitly configured proxy for downloads");
    } else if config.use_system_proxy {
        // reqwest picks up system proxy settings unless no_proxy() is called
        debug!("using system proxy settings for downloads");
    } else {
        builder = builder.no_proxy();
        debug!("proxy disabled for downloads");
    }

    builder.build().map_err(DownloadError::from)
}
