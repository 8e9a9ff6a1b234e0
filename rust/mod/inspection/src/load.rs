//! Load state for screens waiting on the backend.
//!
//! The backend runs on a host that sleeps when idle, so the first request
//! after a pause can take tens of seconds. [`LoadTracker`] publishes
//! immutable [`LoadState`] snapshots on a watch channel: loading as soon as a
//! request starts, cold start once it has been pending past the threshold,
//! idle when the last request finishes.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

/// Shown while the backend is waking up.
pub const COLD_START_MESSAGE: &str = "서버 시작 중입니다. 잠시만 기다려 주세요...";

pub const DEFAULT_COLD_START_AFTER: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadState {
    pub is_loading: bool,
    pub is_cold_starting: bool,
    pub message: Option<String>,
}

impl LoadState {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn loading() -> Self {
        Self {
            is_loading: true,
            ..Self::default()
        }
    }

    pub fn cold_start() -> Self {
        Self {
            is_loading: true,
            is_cold_starting: true,
            message: Some(COLD_START_MESSAGE.to_string()),
        }
    }
}

/// Tracks in-flight backend calls. Overlapping calls share one loading
/// period that ends when the last of them finishes.
pub struct LoadTracker {
    tx: watch::Sender<LoadState>,
    in_flight: AtomicUsize,
    cold_after: Duration,
}

impl Default for LoadTracker {
    fn default() -> Self {
        Self::new(DEFAULT_COLD_START_AFTER)
    }
}

/// Ends one tracked call when dropped, so the state resets even if the
/// future errors or is cancelled.
struct InFlight<'a> {
    tracker: &'a LoadTracker,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let tracker = self.tracker;
        tracker.tx.send_modify(|state| {
            if tracker.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
                *state = LoadState::idle();
            }
        });
    }
}

impl LoadTracker {
    pub fn new(cold_after: Duration) -> Self {
        let (tx, _) = watch::channel(LoadState::idle());
        Self {
            tx,
            in_flight: AtomicUsize::new(0),
            cold_after,
        }
    }

    pub fn cold_after(&self) -> Duration {
        self.cold_after
    }

    pub fn subscribe(&self) -> watch::Receiver<LoadState> {
        self.tx.subscribe()
    }

    /// The latest snapshot.
    pub fn current(&self) -> LoadState {
        self.tx.borrow().clone()
    }

    fn begin(&self) -> InFlight<'_> {
        self.tx.send_modify(|state| {
            if self.in_flight.fetch_add(1, Ordering::SeqCst) == 0 {
                *state = LoadState::loading();
            }
        });
        InFlight { tracker: self }
    }

    fn mark_cold(&self) {
        self.tx.send_modify(|state| {
            if state.is_loading && !state.is_cold_starting {
                *state = LoadState::cold_start();
            }
        });
    }

    /// Run `fut` while publishing load state.
    pub async fn track<F: Future>(&self, fut: F) -> F::Output {
        let _in_flight = self.begin();
        tokio::pin!(fut);
        tokio::select! {
            out = &mut fut => return out,
            _ = tokio::time::sleep(self.cold_after) => {}
        }
        info!(after = ?self.cold_after, "backend is slow to answer, assuming cold start");
        self.mark_cold();
        let out = fut.await;
        debug!("cold start over");
        out
    }
}
