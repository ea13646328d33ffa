//! Download session state.
//!
//! A session tracks one manager instance through the lifecycle
//! `Idle -> Downloading -> {Finished | Error | Aborted}`. Terminal states
//! re-enter `Downloading` directly on a new `start()`; `clear_cache()` forces
//! `Idle` from anywhere.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadState {
    /// No transfer started and nothing restored from cache
    Idle,
    /// Transfer in flight
    Downloading,
    /// Payload fully received (or restored from cache)
    Finished,
    /// Transfer failed with a network or HTTP status error
    Error,
    /// Transfer cancelled, either explicitly or by a superseding start
    Aborted,
}

impl DownloadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadState::Idle => "idle",
            DownloadState::Downloading => "downloading",
            DownloadState::Finished => "finished",
            DownloadState::Error => "error",
            DownloadState::Aborted => "aborted",
        }
    }

    /// Whether no further progress occurs without a new `start()`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DownloadState::Finished | DownloadState::Error | DownloadState::Aborted
        )
    }
}

impl std::str::FromStr for DownloadState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "idle" => Ok(DownloadState::Idle),
            "downloading" => Ok(DownloadState::Downloading),
            "finished" => Ok(DownloadState::Finished),
            "error" => Ok(DownloadState::Error),
            "aborted" => Ok(DownloadState::Aborted),
            _ => Err(format!("unknown download state: {s}")),
        }
    }
}

/// Finished binary payload, held in memory until saved or released.
///
/// This is the transient handle of the session: it is released on every exit
/// path (`save`, `clear_cache`, supersession by a new `start`).
#[derive(Debug, Clone)]
pub struct Payload {
    pub bytes: Bytes,
    pub mime_type: Option<String>,
}

/// Cloneable view of the session published to observers.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadSnapshot {
    pub state: DownloadState,
    /// 0-100 while downloading with a known total; frozen at 100 when finished
    pub progress: f64,
    /// Failure detail, present only in the `Error` state
    pub error: Option<String>,
}

/// Mutable per-instance session owned by the manager.
#[derive(Debug)]
pub(crate) struct DownloadSession {
    pub state: DownloadState,
    pub progress: f64,
    pub error: Option<String>,
    pub payload: Option<Payload>,
}

impl DownloadSession {
    pub fn idle() -> Self {
        Self {
            state: DownloadState::Idle,
            progress: 0.0,
            error: None,
            payload: None,
        }
    }

    /// Enter `Downloading`, releasing any payload held by a prior attempt.
    pub fn begin(&mut self) {
        self.state = DownloadState::Downloading;
        self.progress = 0.0;
        self.error = None;
        self.payload = None;
    }

    pub fn complete(&mut self, payload: Payload) {
        self.state = DownloadState::Finished;
        self.progress = 100.0;
        self.error = None;
        self.payload = Some(payload);
    }

    pub fn fail(&mut self, detail: String) {
        self.state = DownloadState::Error;
        self.error = Some(detail);
        self.payload = None;
    }

    pub fn abort(&mut self) {
        self.state = DownloadState::Aborted;
        self.error = None;
        self.payload = None;
    }

    pub fn reset(&mut self) {
        *self = Self::idle();
    }

    /// Take the payload for a one-shot save; `None` unless finished and not
    /// already taken.
    pub fn take_payload(&mut self) -> Option<Payload> {
        if self.state == DownloadState::Finished {
            self.payload.take()
        } else {
            None
        }
    }

    pub fn snapshot(&self) -> DownloadSnapshot {
        DownloadSnapshot {
            state: self.state,
            progress: self.progress,
            error: self.error.clone(),
        }
    }
}
