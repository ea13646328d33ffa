//! End-to-end engine tests against a local HTTP fixture.
//!
//! Each test binds a plain TCP listener on an ephemeral port and speaks just
//! enough HTTP/1.1 to exercise the streaming path: chunk pacing for progress,
//! error statuses, stalled bodies for cancellation, and connection sequencing
//! for superseding starts.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::sleep;

use cachet_engine::{
    CacheRecord, CacheStore, DownloadConfig, DownloadManager, DownloadState, EvictionRegistry,
    FixedPlatform, Platform, PlatformUrls, derive_cache_key,
};

const BODY: &[u8] = b"0123456789";

async fn bind() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Drain the request head so the client sees a well-behaved peer.
async fn read_request(stream: &mut TcpStream) {
    let mut buf = [0u8; 1024];
    let mut head = Vec::new();
    loop {
        let n = stream.read(&mut buf).await.unwrap_or(0);
        if n == 0 {
            return;
        }
        head.extend_from_slice(&buf[..n]);
        if head.windows(4).any(|w| w == b"\r\n\r\n") {
            return;
        }
    }
}

fn header(status: &str, content_length: Option<usize>) -> String {
    let mut head = format!("HTTP/1.1 {status}\r\n");
    if let Some(len) = content_length {
        head.push_str(&format!("Content-Length: {len}\r\n"));
    }
    head.push_str("Content-Type: application/octet-stream\r\n");
    head.push_str("Connection: close\r\n\r\n");
    head
}

fn config_for(addr: SocketAddr, dir: &std::path::Path, key: &str) -> DownloadConfig {
    DownloadConfig::builder()
        .with_platform_urls(PlatformUrls::new(
            format!("http://{addr}/artifact.dmg"),
            format!("http://{addr}/artifact.exe"),
        ))
        .with_cache_key(key)
        .with_cache_dir(dir)
        .build()
}

async fn mac_manager(config: DownloadConfig) -> DownloadManager {
    DownloadManager::with_detector(config, &FixedPlatform(Platform::MacOs))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_two_chunk_transfer_reports_monotonic_progress() {
    let (listener, addr) = bind().await;
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request(&mut stream).await;
        stream
            .write_all(header("200 OK", Some(BODY.len())).as_bytes())
            .await
            .unwrap();
        stream.write_all(&BODY[..5]).await.unwrap();
        stream.flush().await.unwrap();
        sleep(Duration::from_millis(80)).await;
        stream.write_all(&BODY[5..]).await.unwrap();
        stream.flush().await.unwrap();
    });

    let dir = tempfile::TempDir::new().unwrap();
    let progress_log: Arc<Mutex<Vec<(f64, u64, u64)>>> = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&progress_log);

    let config = DownloadConfig::builder()
        .with_platform_urls(PlatformUrls::new(
            format!("http://{addr}/artifact.dmg"),
            format!("http://{addr}/artifact.exe"),
        ))
        .with_cache_dir(dir.path())
        .with_caching_enabled(false)
        .on_progress(move |progress, received, total| {
            log.lock().push((progress, received, total));
        })
        .build();

    let manager = mac_manager(config).await;
    let rx = manager.subscribe();
    manager.start().await;

    assert_eq!(manager.state(), DownloadState::Finished);
    assert_eq!(manager.progress(), 100.0);
    assert!(manager.last_error().is_none());
    assert_eq!(rx.borrow().state, DownloadState::Finished);

    let payload = manager.payload().expect("finished payload");
    assert_eq!(payload.bytes, Bytes::from_static(BODY));
    assert_eq!(payload.mime_type.as_deref(), Some("application/octet-stream"));

    let log = progress_log.lock();
    assert!(!log.is_empty(), "progress callback never fired");
    for pair in log.windows(2) {
        assert!(pair[1].0 >= pair[0].0, "progress went backwards: {pair:?}");
        assert!(pair[1].1 >= pair[0].1);
    }
    let last = log.last().unwrap();
    assert_eq!(*last, (100.0, BODY.len() as u64, BODY.len() as u64));
    for (_, received, total) in log.iter() {
        assert_eq!(*total, BODY.len() as u64);
        assert!(*received <= *total);
    }
}

#[tokio::test]
async fn test_unknown_total_completes_without_fabricated_progress() {
    let (listener, addr) = bind().await;
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request(&mut stream).await;
        // No Content-Length: the body ends when the connection closes
        stream
            .write_all(header("200 OK", None).as_bytes())
            .await
            .unwrap();
        stream.write_all(BODY).await.unwrap();
        stream.flush().await.unwrap();
    });

    let dir = tempfile::TempDir::new().unwrap();
    let progress_calls = Arc::new(AtomicUsize::new(0));
    let calls = Arc::clone(&progress_calls);

    let mut config = config_for(addr, dir.path(), "no-total");
    config.cache.enabled = false;
    config.on_progress = Some(Arc::new(move |_, _, _| {
        calls.fetch_add(1, Ordering::SeqCst);
    }));

    let manager = mac_manager(config).await;
    manager.start().await;

    assert_eq!(manager.state(), DownloadState::Finished);
    assert_eq!(manager.progress(), 100.0);
    assert_eq!(manager.payload().unwrap().bytes, Bytes::from_static(BODY));
    assert_eq!(progress_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_http_error_status_enters_error_state() {
    let (listener, addr) = bind().await;
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request(&mut stream).await;
        stream
            .write_all(header("404 Not Found", Some(0)).as_bytes())
            .await
            .unwrap();
    });

    let dir = tempfile::TempDir::new().unwrap();
    let error_detail: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let detail = Arc::clone(&error_detail);

    let mut config = config_for(addr, dir.path(), "err");
    config.cache.enabled = false;
    config.on_error = Some(Arc::new(move |err| {
        *detail.lock() = Some(err.to_string());
    }));

    let manager = mac_manager(config).await;
    manager.start().await;

    assert_eq!(manager.state(), DownloadState::Error);
    assert!(manager.payload().is_none());
    assert!(manager.last_error().unwrap().contains("404"));
    assert!(error_detail.lock().as_ref().unwrap().contains("404"));

    // The error state is recoverable: a new start re-enters downloading and,
    // with the fixture gone, terminates in error again rather than sticking.
    manager.start().await;
    assert_eq!(manager.state(), DownloadState::Error);
}

#[tokio::test]
async fn test_abort_before_first_chunk() {
    let (listener, addr) = bind().await;
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request(&mut stream).await;
        stream
            .write_all(header("200 OK", Some(BODY.len())).as_bytes())
            .await
            .unwrap();
        stream.flush().await.unwrap();
        // Stall the body until the client goes away
        sleep(Duration::from_secs(10)).await;
    });

    let dir = tempfile::TempDir::new().unwrap();
    let mut config = config_for(addr, dir.path(), "abort");
    config.cache.enabled = false;

    let manager = Arc::new(mac_manager(config).await);
    let runner = Arc::clone(&manager);
    let handle = tokio::spawn(async move { runner.start().await });

    sleep(Duration::from_millis(150)).await;
    manager.abort();
    handle.await.unwrap();

    assert_eq!(manager.state(), DownloadState::Aborted);
    assert!(manager.last_error().is_none());
    assert!(manager.payload().is_none());
}

#[tokio::test]
async fn test_superseding_start_aborts_prior_transfer() {
    let (listener, addr) = bind().await;
    let connections = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&connections);
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            let n = seen.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                read_request(&mut stream).await;
                if n == 0 {
                    // First attempt stalls after the header
                    stream
                        .write_all(header("200 OK", Some(BODY.len())).as_bytes())
                        .await
                        .unwrap();
                    stream.flush().await.unwrap();
                    sleep(Duration::from_secs(10)).await;
                } else {
                    stream
                        .write_all(header("200 OK", Some(BODY.len())).as_bytes())
                        .await
                        .unwrap();
                    stream.write_all(BODY).await.unwrap();
                    stream.flush().await.unwrap();
                }
            });
        }
    });

    let dir = tempfile::TempDir::new().unwrap();
    let completions = Arc::new(AtomicUsize::new(0));
    let errors = Arc::new(AtomicUsize::new(0));
    let done = Arc::clone(&completions);
    let failed = Arc::clone(&errors);

    let mut config = config_for(addr, dir.path(), "supersede");
    config.cache.enabled = false;
    config.on_complete = Some(Arc::new(move |_| {
        done.fetch_add(1, Ordering::SeqCst);
    }));
    config.on_error = Some(Arc::new(move |_| {
        failed.fetch_add(1, Ordering::SeqCst);
    }));

    let manager = Arc::new(mac_manager(config).await);

    let first = Arc::clone(&manager);
    let first_handle = tokio::spawn(async move { first.start().await });
    sleep(Duration::from_millis(150)).await;

    // The second start cancels the stalled attempt and completes on its own
    manager.start().await;
    first_handle.await.unwrap();

    assert_eq!(manager.state(), DownloadState::Finished);
    assert_eq!(manager.progress(), 100.0);
    assert_eq!(manager.payload().unwrap().bytes, Bytes::from_static(BODY));
    assert_eq!(completions.load(Ordering::SeqCst), 1);
    assert_eq!(errors.load(Ordering::SeqCst), 0);
    assert_eq!(connections.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_finished_payload_persists_and_replays() {
    let (listener, addr) = bind().await;
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request(&mut stream).await;
        stream
            .write_all(header("200 OK", Some(BODY.len())).as_bytes())
            .await
            .unwrap();
        stream.write_all(BODY).await.unwrap();
        stream.flush().await.unwrap();
    });

    let dir = tempfile::TempDir::new().unwrap();
    let manager = mac_manager(config_for(addr, dir.path(), "replay")).await;
    let key = manager.cache_key().to_string();

    manager.start().await;
    assert_eq!(manager.state(), DownloadState::Finished);
    assert!(dir.path().join(&key).exists());

    // A fresh manager for the same key replays the payload with no listener
    // accepting further connections.
    let replay = mac_manager(config_for(addr, dir.path(), "replay")).await;
    assert_eq!(replay.state(), DownloadState::Finished);
    assert_eq!(replay.progress(), 100.0);
    assert_eq!(replay.payload().unwrap().bytes, Bytes::from_static(BODY));

    // Save is one-shot: the first call writes the file, the second has
    // nothing left to release.
    let target = dir.path().join("saved.bin");
    assert!(replay.save(&target).await.unwrap());
    assert_eq!(std::fs::read(&target).unwrap(), BODY);
    assert!(!replay.save(&target).await.unwrap());
    assert_eq!(replay.state(), DownloadState::Finished);
}

#[tokio::test]
async fn test_expired_entry_at_construction_is_removed() {
    let dir = tempfile::TempDir::new().unwrap();
    let addr: SocketAddr = "127.0.0.1:9".parse().unwrap();

    // Seed a record stored 10s ago with a 5s TTL
    let key = derive_cache_key(&format!("http://{addr}/artifact.dmg"), Some("k"));
    let mut record = CacheRecord::new(String::new(), None);
    record.stored_at -= 10_000;
    std::fs::create_dir_all(dir.path()).unwrap();
    std::fs::write(dir.path().join(&key), serde_json::to_vec(&record).unwrap()).unwrap();

    let mut config = config_for(addr, dir.path(), "k");
    config.cache.ttl = Some(Duration::from_millis(5_000));

    let manager = mac_manager(config).await;
    assert_eq!(manager.state(), DownloadState::Idle);
    assert!(!dir.path().join(&key).exists());
}

#[tokio::test]
async fn test_clear_cache_after_finish_resets_everything() {
    let (listener, addr) = bind().await;
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request(&mut stream).await;
        stream
            .write_all(header("200 OK", Some(BODY.len())).as_bytes())
            .await
            .unwrap();
        stream.write_all(BODY).await.unwrap();
        stream.flush().await.unwrap();
    });

    let dir = tempfile::TempDir::new().unwrap();
    let manager = mac_manager(config_for(addr, dir.path(), "reset")).await;
    let key = manager.cache_key().to_string();

    manager.start().await;
    assert_eq!(manager.state(), DownloadState::Finished);
    assert!(dir.path().join(&key).exists());

    manager.clear_cache().await;
    assert_eq!(manager.state(), DownloadState::Idle);
    assert_eq!(manager.progress(), 0.0);
    assert!(manager.last_error().is_none());
    assert!(manager.payload().is_none());
    assert!(!dir.path().join(&key).exists());
}

#[tokio::test]
async fn test_shared_store_with_separate_registry() {
    let (listener, addr) = bind().await;
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request(&mut stream).await;
        stream
            .write_all(header("200 OK", Some(BODY.len())).as_bytes())
            .await
            .unwrap();
        stream.write_all(BODY).await.unwrap();
        stream.flush().await.unwrap();
    });

    let dir = tempfile::TempDir::new().unwrap();
    let store = CacheStore::new(dir.path().to_path_buf(), true, EvictionRegistry::new());

    let manager = DownloadManager::with_store(
        config_for(addr, dir.path(), "shared"),
        &FixedPlatform(Platform::MacOs),
        store.clone(),
    )
    .await
    .unwrap();

    manager.start().await;
    assert_eq!(manager.state(), DownloadState::Finished);

    // The injected store sees the entry directly
    let (bytes, _) = store.load(manager.cache_key(), None).await.unwrap();
    assert_eq!(bytes, Bytes::from_static(BODY));
}

/// The cache probe keys on the URL resolved at construction, so a resolver
/// that returns a different URL per call derives a different key each time;
/// an earlier resolution's payload is replayed only when the keys match.
#[tokio::test]
async fn test_drifting_resolver_still_replays_constructed_key() {
    let (listener, addr) = bind().await;
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request(&mut stream).await;
        stream
            .write_all(header("200 OK", Some(BODY.len())).as_bytes())
            .await
            .unwrap();
        stream.write_all(BODY).await.unwrap();
        stream.flush().await.unwrap();
    });

    let dir = tempfile::TempDir::new().unwrap();
    let counter = Arc::new(AtomicUsize::new(0));

    let make_config = {
        let dir = dir.path().to_path_buf();
        move |counter: Arc<AtomicUsize>| {
            DownloadConfig::builder()
                .with_url_resolver(move || {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    format!("http://{addr}/artifact-v{n}.bin")
                })
                .with_cache_dir(&dir)
                .build()
        }
    };

    let manager = mac_manager(make_config(Arc::clone(&counter))).await;
    assert_eq!(manager.resolved_url(), format!("http://{addr}/artifact-v0.bin"));
    manager.start().await;
    assert_eq!(manager.state(), DownloadState::Finished);
    assert!(dir.path().join(manager.cache_key()).exists());

    // The second manager resolves a different URL, derives a different key,
    // and therefore does NOT replay the v0 payload.
    let second = mac_manager(make_config(Arc::clone(&counter))).await;
    assert_eq!(second.resolved_url(), format!("http://{addr}/artifact-v1.bin"));
    assert_ne!(second.cache_key(), manager.cache_key());
    assert_eq!(second.state(), DownloadState::Idle);
}
