//! Cached download manager.
//!
//! One manager instance drives one resource: it resolves the URL once at
//! construction, replays a valid cache entry as an immediately finished
//! session, and otherwise streams the payload with progress reporting,
//! cancellation, and best-effort persistence.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::BytesMut;
use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use reqwest::Client;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::{CacheStore, EvictionRegistry, derive_cache_key};
use crate::client::create_client;
use crate::config::DownloadConfig;
use crate::error::DownloadError;
use crate::platform::{PlatformDetector, SystemPlatform};
use crate::session::{DownloadSession, DownloadSnapshot, DownloadState, Payload};
use crate::source::resolve_url;

/// Why a transfer stopped short of completion.
enum TransferHalt {
    Aborted,
    Failed(DownloadError),
}

pub struct DownloadManager {
    config: DownloadConfig,
    client: Client,
    resolved_url: String,
    cache_key: String,
    store: CacheStore,
    session: Arc<RwLock<DownloadSession>>,
    watch_tx: watch::Sender<DownloadSnapshot>,
    /// Cancellation token of the transfer currently in flight
    in_flight: Mutex<Option<CancellationToken>>,
    /// Attempt counter; stale attempts may not write the session
    generation: AtomicU64,
}

impl std::fmt::Debug for DownloadManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadManager")
            .field("resolved_url", &self.resolved_url)
            .field("cache_key", &self.cache_key)
            .finish_non_exhaustive()
    }
}

impl DownloadManager {
    /// Create a manager using compile-time platform detection.
    ///
    /// Fails with [`DownloadError::MissingUrlSource`] when neither platform
    /// URLs nor a resolver are configured.
    pub async fn new(config: DownloadConfig) -> Result<Self, DownloadError> {
        Self::with_detector(config, &SystemPlatform).await
    }

    /// Create a manager with an injected platform detector.
    pub async fn with_detector(
        config: DownloadConfig,
        detector: &dyn PlatformDetector,
    ) -> Result<Self, DownloadError> {
        let dir = config
            .cache
            .dir
            .clone()
            .unwrap_or_else(CacheStore::default_dir);
        let store = CacheStore::new(dir, config.cache.enabled, EvictionRegistry::new());
        Self::with_store(config, detector, store).await
    }

    /// Create a manager around an externally owned store, so several managers
    /// (or tests) can share one store and eviction registry.
    pub async fn with_store(
        config: DownloadConfig,
        detector: &dyn PlatformDetector,
        store: CacheStore,
    ) -> Result<Self, DownloadError> {
        let resolved_url = resolve_url(config.resolver.as_ref(), config.urls.as_ref(), detector)?;
        Url::parse(&resolved_url)
            .map_err(|e| DownloadError::Url(format!("{resolved_url}: {e}")))?;
        let client = create_client(&config)?;
        let cache_key = derive_cache_key(&resolved_url, config.cache.key.as_deref());

        let mut session = DownloadSession::idle();

        // A valid cached payload synthesizes a finished session directly,
        // skipping the transfer. An expired entry is removed by the load.
        if config.cache.enabled {
            if let Some((bytes, mime_type)) = store.load(&cache_key, config.cache.ttl).await {
                info!(url = %resolved_url, size = bytes.len(), "restored finished payload from cache");
                session.complete(Payload { bytes, mime_type });
            }
        }

        let (watch_tx, _) = watch::channel(session.snapshot());

        Ok(Self {
            config,
            client,
            resolved_url,
            cache_key,
            store,
            session: Arc::new(RwLock::new(session)),
            watch_tx,
            in_flight: Mutex::new(None),
            generation: AtomicU64::new(0),
        })
    }

    /// Start (or restart) the transfer, driving it to a terminal state.
    ///
    /// A transfer already in flight is superseded: its request is cancelled
    /// before the new one is issued, and its writes are discarded. Transfer
    /// failures surface through the session state and the error callback,
    /// never as a panic or return value.
    pub async fn start(&self) {
        let token = CancellationToken::new();
        let generation;
        {
            let mut in_flight = self.in_flight.lock();
            if let Some(old) = in_flight.take() {
                old.cancel();
            }
            *in_flight = Some(token.clone());

            let mut session = self.session.write();
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            session.begin();
            self.watch_tx.send_replace(session.snapshot());
        }

        match self.transfer(&token, generation).await {
            Ok(payload) => self.finish(generation, payload).await,
            Err(TransferHalt::Aborted) => {
                if self.apply(generation, |session| session.abort()) {
                    info!(url = %self.resolved_url, "download aborted");
                }
            }
            Err(TransferHalt::Failed(err)) => {
                warn!(url = %self.resolved_url, error = %err, "download failed");
                if self.apply(generation, |session| session.fail(err.to_string())) {
                    if let Some(on_error) = &self.config.on_error {
                        on_error(&err);
                    }
                }
            }
        }

        let mut in_flight = self.in_flight.lock();
        if self.generation.load(Ordering::SeqCst) == generation {
            *in_flight = None;
        }
    }

    /// Cancel the in-flight transfer, if any. The session transitions to
    /// `Aborted`, which is distinct from `Error`.
    pub fn abort(&self) {
        let in_flight = self.in_flight.lock();
        if let Some(token) = in_flight.as_ref() {
            debug!(url = %self.resolved_url, "abort requested");
            token.cancel();
        }
    }

    /// Write the finished payload to `path` and release it.
    ///
    /// One-shot: a second `save` without a new transfer has nothing left to
    /// write and returns `Ok(false)`, as does a session that never finished.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<bool, DownloadError> {
        let payload = self.session.write().take_payload();
        let Some(payload) = payload else {
            debug!("save requested with no finished payload");
            return Ok(false);
        };

        tokio::fs::write(path.as_ref(), &payload.bytes).await?;
        info!(
            path = %path.as_ref().display(),
            size = payload.bytes.len(),
            "payload saved"
        );
        Ok(true)
    }

    /// Remove the persisted cache entry, cancel its eviction timer, release
    /// the payload handle, and reset the session to idle. Cancels any
    /// in-flight transfer. Idempotent.
    pub async fn clear_cache(&self) {
        {
            let mut in_flight = self.in_flight.lock();
            if let Some(token) = in_flight.take() {
                token.cancel();
            }

            let mut session = self.session.write();
            self.generation.fetch_add(1, Ordering::SeqCst);
            session.reset();
            self.watch_tx.send_replace(session.snapshot());
        }

        self.store.clear(&self.cache_key).await;
        debug!(key = %self.cache_key, "cache cleared and session reset");
    }

    pub fn state(&self) -> DownloadState {
        self.session.read().state
    }

    pub fn progress(&self) -> f64 {
        self.session.read().progress
    }

    pub fn last_error(&self) -> Option<String> {
        self.session.read().error.clone()
    }

    /// The finished payload, if present and not yet released.
    pub fn payload(&self) -> Option<Payload> {
        self.session.read().payload.clone()
    }

    pub fn resolved_url(&self) -> &str {
        &self.resolved_url
    }

    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Observe session snapshots as they change.
    pub fn subscribe(&self) -> watch::Receiver<DownloadSnapshot> {
        self.watch_tx.subscribe()
    }

    /// Apply a session mutation unless this attempt has been superseded.
    /// Returns whether the write went through.
    fn apply(&self, generation: u64, f: impl FnOnce(&mut DownloadSession)) -> bool {
        let mut session = self.session.write();
        if self.generation.load(Ordering::SeqCst) != generation {
            return false;
        }
        f(&mut session);
        self.watch_tx.send_replace(session.snapshot());
        true
    }

    async fn transfer(
        &self,
        token: &CancellationToken,
        generation: u64,
    ) -> Result<Payload, TransferHalt> {
        info!(url = %self.resolved_url, "starting download request");

        let response = tokio::select! {
            _ = token.cancelled() => return Err(TransferHalt::Aborted),
            result = self.client.get(&self.resolved_url).send() => {
                result.map_err(|e| TransferHalt::Failed(DownloadError::Http(e)))?
            }
        };

        // HTTP error statuses and network failures both end in the error
        // state; only the detail differs.
        if !response.status().is_success() {
            return Err(TransferHalt::Failed(DownloadError::Status(
                response.status(),
            )));
        }

        let total_bytes = response.content_length();
        match total_bytes {
            Some(total) => debug!(url = %self.resolved_url, total, "download size advertised"),
            None => debug!(url = %self.resolved_url, "content length not available"),
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut stream = response.bytes_stream();
        let mut received = BytesMut::new();

        loop {
            let next = tokio::select! {
                _ = token.cancelled() => return Err(TransferHalt::Aborted),
                next = stream.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    received.extend_from_slice(&chunk);

                    // No advertised total means no progress is fabricated;
                    // the transfer still proceeds and completes.
                    if let Some(total) = total_bytes {
                        if total > 0 {
                            let progress =
                                (received.len() as f64 / total as f64 * 100.0).min(100.0);
                            let reported = received.len() as u64;
                            if self.apply(generation, |session| session.progress = progress) {
                                if let Some(on_progress) = &self.config.on_progress {
                                    on_progress(progress, reported, total);
                                }
                            }
                        }
                    }
                }
                Some(Err(e)) => return Err(TransferHalt::Failed(DownloadError::Http(e))),
                None => break,
            }
        }

        Ok(Payload {
            bytes: received.freeze(),
            mime_type,
        })
    }

    async fn finish(&self, generation: u64, payload: Payload) {
        if !self.apply(generation, |session| session.complete(payload.clone())) {
            return;
        }

        info!(
            url = %self.resolved_url,
            size = payload.bytes.len(),
            "download finished"
        );

        if let Some(on_complete) = &self.config.on_complete {
            on_complete(&payload);
        }

        // Persistence happens after the finished state is already exposed;
        // a failed write never downgrades it.
        if self.config.cache.enabled {
            self.store
                .save(
                    &self.cache_key,
                    &payload.bytes,
                    payload.mime_type,
                    self.config.cache.ttl,
                )
                .await;
        }
    }
}
