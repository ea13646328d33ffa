use cachet_engine::DownloadError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    #[error("Download did not finish: {0}")]
    Unfinished(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
