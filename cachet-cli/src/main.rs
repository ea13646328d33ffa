use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

use cachet_engine::{
    DownloadConfig, DownloadManager, DownloadState, FixedPlatform, Platform, PlatformDetector,
    PlatformUrls, ProxyConfig, ProxyKind, SystemPlatform,
};

mod cli;
mod error;

use cli::CliArgs;
use error::AppError;

fn main() {
    if let Err(e) = bootstrap() {
        eprintln!("Error: {e}");
        error!(error = ?e, "Application failed");
        std::process::exit(1);
    }
}

fn download_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} {msg}\n[{elapsed_precise}] [{bar:40.green/white}] {bytes}/{total_bytes} @ {bytes_per_sec}")
        .unwrap()
        .progress_chars("=> ")
}

#[tokio::main]
async fn bootstrap() -> Result<(), AppError> {
    let args = CliArgs::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| AppError::Initialization(e.to_string()))?;

    // Progress bar fed by the engine's progress callback
    let bar = if args.no_progress {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(0);
        bar.set_style(download_style());
        bar
    };

    let mut builder = DownloadConfig::builder()
        .with_connect_timeout(Duration::from_secs(args.connect_timeout))
        .with_timeout(Duration::from_secs(args.timeout))
        .with_caching_enabled(!args.no_cache);

    match (&args.url, &args.mac_url, &args.win_url) {
        (Some(url), _, _) => {
            let url = url.clone();
            builder = builder.with_url_resolver(move || url.clone());
        }
        (None, Some(mac), Some(win)) => {
            builder = builder.with_platform_urls(PlatformUrls::new(mac, win));
        }
        _ => {
            return Err(AppError::InvalidInput(
                "provide a URL, or both --mac-url and --win-url".to_string(),
            ));
        }
    }

    if let Some(key) = &args.cache_key {
        builder = builder.with_cache_key(key);
    }
    if let Some(ttl) = args.ttl {
        builder = builder.with_cache_ttl(Duration::from_secs(ttl));
    }
    if let Some(dir) = &args.cache_dir {
        builder = builder.with_cache_dir(dir);
    }

    if let Some(proxy_url) = &args.proxy {
        let kind = if proxy_url.starts_with("socks5://") {
            ProxyKind::Socks5
        } else {
            ProxyKind::Http
        };
        info!(proxy_url = %proxy_url, "using explicit proxy for downloads");
        builder = builder.with_proxy(ProxyConfig {
            url: proxy_url.clone(),
            kind,
            auth: None,
        });
    }

    let progress_bar = bar.clone();
    let config: DownloadConfig = builder
        .on_progress(move |_, received, total| {
            progress_bar.set_length(total);
            progress_bar.set_position(received);
        })
        .build();

    let detector: Box<dyn PlatformDetector> = match &args.platform {
        Some(name) => {
            let platform: Platform = name
                .parse()
                .map_err(AppError::InvalidInput)?;
            Box::new(FixedPlatform(platform))
        }
        None => Box::new(SystemPlatform),
    };

    let manager = DownloadManager::with_detector(config, detector.as_ref()).await?;
    info!(url = %manager.resolved_url(), "resolved artifact URL");

    if args.clear_cache {
        manager.clear_cache().await;
        info!(key = %manager.cache_key(), "cache entry cleared");
        return Ok(());
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output(manager.resolved_url()));

    if manager.state() == DownloadState::Finished {
        info!("payload replayed from cache, no transfer needed");
    } else {
        bar.set_message(format!("Downloading {}", manager.resolved_url()));
        manager.start().await;
    }

    match manager.state() {
        DownloadState::Finished => {
            bar.finish_with_message("Download complete");
            manager.save(&output).await?;
            info!(path = %output.display(), "artifact saved");
            Ok(())
        }
        state => {
            bar.abandon_with_message("Download failed");
            let detail = manager
                .last_error()
                .unwrap_or_else(|| state.as_str().to_string());
            Err(AppError::Unfinished(detail))
        }
    }
}

/// Default output path: the file name from the resolved URL.
fn default_output(url: &str) -> PathBuf {
    let name = url
        .rsplit('/')
        .next()
        .map(|name| name.split(['?', '#']).next().unwrap_or(name))
        .filter(|name| !name.is_empty())
        .unwrap_or("artifact.bin");
    PathBuf::from(name)
}
