//! URL source resolution.
//!
//! A manager fetches exactly one resource. Where that resource lives comes
//! either from a static per-platform URL pair or from a caller-supplied
//! resolver function; the resolver takes precedence when both are configured.
//! The URL is resolved once, at manager construction.

use std::sync::Arc;

use crate::error::DownloadError;
use crate::platform::{Platform, PlatformDetector};

/// Per-platform artifact URL pair.
#[derive(Debug, Clone)]
pub struct PlatformUrls {
    pub mac: String,
    pub windows: String,
}

impl PlatformUrls {
    pub fn new(mac: impl Into<String>, windows: impl Into<String>) -> Self {
        Self {
            mac: mac.into(),
            windows: windows.into(),
        }
    }

    /// The URL variant published for `platform`.
    pub fn for_platform(&self, platform: Platform) -> &str {
        match platform {
            Platform::MacOs => &self.mac,
            Platform::Windows => &self.windows,
        }
    }
}

/// Caller-supplied function producing the URL to fetch.
pub type UrlResolver = Arc<dyn Fn() -> String + Send + Sync>;

/// Resolve the download URL from the configured sources.
///
/// Returns [`DownloadError::MissingUrlSource`] when neither a resolver nor a
/// platform pair is configured; the caller treats that as a fatal setup error.
pub(crate) fn resolve_url(
    resolver: Option<&UrlResolver>,
    urls: Option<&PlatformUrls>,
    detector: &dyn PlatformDetector,
) -> Result<String, DownloadError> {
    if let Some(resolver) = resolver {
        return Ok(resolver());
    }

    if let Some(urls) = urls {
        return Ok(urls.for_platform(detector.detect()).to_string());
    }

    Err(DownloadError::MissingUrlSource)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::FixedPlatform;

    fn urls() -> PlatformUrls {
        PlatformUrls::new("https://x/a.dmg", "https://x/a.exe")
    }

    #[test]
    fn test_platform_pair_selection() {
        let detector = FixedPlatform(Platform::MacOs);
        let resolved = resolve_url(None, Some(&urls()), &detector).unwrap();
        assert_eq!(resolved, "https://x/a.dmg");

        let detector = FixedPlatform(Platform::Windows);
        let resolved = resolve_url(None, Some(&urls()), &detector).unwrap();
        assert_eq!(resolved, "https://x/a.exe");
    }

    #[test]
    fn test_resolver_takes_precedence() {
        let resolver: UrlResolver = Arc::new(|| "https://x/custom.bin".to_string());
        let detector = FixedPlatform(Platform::MacOs);
        let resolved = resolve_url(Some(&resolver), Some(&urls()), &detector).unwrap();
        assert_eq!(resolved, "https://x/custom.bin");
    }

    #[test]
    fn test_missing_source_is_fatal() {
        let detector = FixedPlatform(Platform::MacOs);
        let err = resolve_url(None, None, &detector).unwrap_err();
        assert!(matches!(err, DownloadError::MissingUrlSource));
        assert!(err.to_string().contains("URL source"));
    }
}
