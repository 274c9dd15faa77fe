//! Network-idle detection from CDP `Network.*` events.
//!
//! The page counts as idle once no request has been in flight for
//! [`QUIET_PERIOD`], the same definition browsers' automation tools use
//! for "networkidle".

use super::cdp::CdpClient;
use blockharvest_core::{Error, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

pub const QUIET_PERIOD: Duration = Duration::from_millis(500);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub struct NetworkState {
    in_flight: HashSet<String>,
    last_activity: Instant,
}

impl NetworkState {
    pub fn new() -> Self {
        Self {
            in_flight: HashSet::new(),
            last_activity: Instant::now(),
        }
    }

    pub fn request_started(&mut self, request_id: &str) {
        self.in_flight.insert(request_id.to_string());
        self.last_activity = Instant::now();
    }

    pub fn request_done(&mut self, request_id: &str) {
        self.in_flight.remove(request_id);
        self.last_activity = Instant::now();
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_idle_at(&self, now: Instant, quiet: Duration) -> bool {
        self.in_flight.is_empty() && now.saturating_duration_since(self.last_activity) >= quiet
    }
}

impl Default for NetworkState {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks in-flight requests for one page target.
pub struct NetworkMonitor {
    state: Arc<Mutex<NetworkState>>,
    _task: tokio::task::JoinHandle<()>,
}

impl NetworkMonitor {
    /// Subscribe to the request lifecycle events. `Network` must be enabled.
    pub async fn attach(cdp: &CdpClient) -> Self {
        let started = cdp.subscribe_event("Network.requestWillBeSent").await;
        let finished = cdp.subscribe_event("Network.loadingFinished").await;
        let failed = cdp.subscribe_event("Network.loadingFailed").await;

        let state = Arc::new(Mutex::new(NetworkState::new()));
        let task = tokio::spawn(track(state.clone(), started, finished, failed));
        Self { state, _task: task }
    }

    pub fn in_flight(&self) -> usize {
        self.state.lock().map(|s| s.in_flight()).unwrap_or(0)
    }

    /// Wait until the network has been quiet for [`QUIET_PERIOD`].
    pub async fn wait_for_idle(&self, timeout: Duration) -> Result<()> {
        let start = Instant::now();
        loop {
            let idle = self
                .state
                .lock()
                .map(|s| s.is_idle_at(Instant::now(), QUIET_PERIOD))
                .unwrap_or(true);
            if idle {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                return Err(Error::Timeout(format!(
                    "network not idle after {}ms ({} requests in flight)",
                    timeout.as_millis(),
                    self.in_flight()
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

impl Drop for NetworkMonitor {
    fn drop(&mut self) {
        self._task.abort();
    }
}

async fn track(
    state: Arc<Mutex<NetworkState>>,
    mut started: mpsc::Receiver<Value>,
    mut finished: mpsc::Receiver<Value>,
    mut failed: mpsc::Receiver<Value>,
) {
    loop {
        let (event, begin) = tokio::select! {
            Some(ev) = started.recv() => (ev, true),
            Some(ev) = finished.recv() => (ev, false),
            Some(ev) = failed.recv() => (ev, false),
            else => break,
        };
        let Some(request_id) = event.get("requestId").and_then(|v| v.as_str()) else {
            continue;
        };
        if let Ok(mut s) = state.lock() {
            if begin {
                s.request_started(request_id);
            } else {
                s.request_done(request_id);
            }
        }
    }
}
