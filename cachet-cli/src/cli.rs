use clap::Parser;
use std::path::PathBuf;

/// Define CLI arguments
#[derive(Parser)]
#[command(
    version,
    about = "Cached artifact download tool",
    long_about = "Downloads a release artifact with streaming progress and a durable local cache.\n\
                  \n\
                  The artifact URL comes either from an explicit URL argument or from a\n\
                  per-platform pair (--mac-url/--win-url) selected for the current host.\n\
                  Completed payloads are cached under a stable key, so re-running the same\n\
                  fetch replays the payload without touching the network until the entry\n\
                  expires or is cleared."
)]
pub struct CliArgs {
    /// Explicit URL to download; overrides the platform pair
    pub url: Option<String>,

    /// URL of the macOS artifact variant
    #[arg(long, help = "URL of the macOS artifact variant")]
    pub mac_url: Option<String>,

    /// URL of the Windows artifact variant
    #[arg(long, help = "URL of the Windows artifact variant")]
    pub win_url: Option<String>,

    /// Override platform detection (macos|windows)
    #[arg(long, help = "Select the platform variant instead of detecting it")]
    pub platform: Option<String>,

    /// Where to save the downloaded artifact
    #[arg(
        short,
        long,
        help = "Output file for the artifact (default: ./artifact name from the URL)"
    )]
    pub output: Option<PathBuf>,

    /// Cache store directory
    #[arg(long, help = "Directory for the payload cache (default: system temp)")]
    pub cache_dir: Option<PathBuf>,

    /// Logical cache key overriding the URL-derived key
    #[arg(long, help = "Custom cache key (default: derived from the URL)")]
    pub cache_key: Option<String>,

    /// Cache entry TTL in seconds
    #[arg(long, help = "Expire cached payloads after this many seconds")]
    pub ttl: Option<u64>,

    /// Disable the payload cache entirely
    #[arg(long, help = "Skip both reading and writing the payload cache")]
    pub no_cache: bool,

    /// Remove the cached payload for this URL/key and exit
    #[arg(long, help = "Clear the cached entry instead of downloading")]
    pub clear_cache: bool,

    /// Overall HTTP timeout in seconds (0 disables)
    #[arg(long, default_value = "0", help = "Overall HTTP timeout in seconds, 0 for none")]
    pub timeout: u64,

    /// Connection timeout in seconds
    #[arg(long, default_value = "10", help = "Connection timeout in seconds")]
    pub connect_timeout: u64,

    /// Proxy URL (e.g. http://proxy:8080 or socks5://proxy:1080)
    #[arg(long, help = "Proxy server URL")]
    pub proxy: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable detailed debug logging")]
    pub verbose: bool,

    /// Hide the progress bar
    #[arg(long, help = "Disable the progress bar display")]
    pub no_progress: bool,
}
