use reqwest::StatusCode;

/// Error type for download operations.
///
/// Transfer failures (`Http`, `Status`) are surfaced through the session state
/// and the error callback; only configuration problems are returned directly
/// from the manager constructor.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("no download URL source configured: provide platform URLs or a URL resolver")]
    MissingUrlSource,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned status code {0}")]
    Status(StatusCode),

    #[error("invalid URL: {0}")]
    Url(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid proxy configuration: {0}")]
    Proxy(String),
}

impl DownloadError {
    /// Whether this error belongs to the transfer class (retryable by a new
    /// `start()`), as opposed to a static configuration problem.
    pub fn is_transfer_error(&self) -> bool {
        matches!(self, DownloadError::Http(_) | DownloadError::Status(_))
    }
}
