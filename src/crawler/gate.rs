//! Per-host gate shared by all fetch workers
//!
//! This module handles:
//! - A shared backoff budget per target host, so parallel workers do not
//!   multiply load on a host that is already failing
//! - Per-host request counting

use crate::state::HostState;
use crate::HarvestError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Shared per-host state
///
/// Cloning shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct HostGate {
    hosts: Arc<Mutex<HashMap<String, HostState>>>,
}

impl HostGate {
    /// Creates an empty gate
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until `host` may be requested
    ///
    /// The wait re-checks the host after every sleep since other workers may
    /// extend the cooldown meanwhile. Returns `Cancelled` as soon as the token
    /// fires.
    pub async fn wait_turn(
        &self,
        host: &str,
        cancel: &CancellationToken,
    ) -> Result<(), HarvestError> {
        loop {
            if cancel.is_cancelled() {
                return Err(HarvestError::Cancelled);
            }

            let wait = self.time_until_ready(host, Instant::now());
            let Some(wait) = wait else {
                return Ok(());
            };

            tracing::trace!("Host {} cooling down for {:?}", host, wait);
            tokio::select! {
                _ = cancel.cancelled() => return Err(HarvestError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Returns how long `host` is still cooling down
    pub fn time_until_ready(&self, host: &str, now: Instant) -> Option<Duration> {
        self.lock()
            .get(host)
            .and_then(|state| state.time_until_ready(now))
    }

    /// Records that a request is being issued to `host`
    pub fn record_request(&self, host: &str) {
        self.lock()
            .entry(host.to_string())
            .or_default()
            .record_request();
    }

    /// Records a transient failure and pushes the host's cooldown out
    pub fn record_failure(&self, host: &str, backoff: Duration) {
        self.lock()
            .entry(host.to_string())
            .or_default()
            .record_failure(Instant::now(), backoff);
    }

    /// Records that `host` answered
    pub fn record_response(&self, host: &str) {
        self.lock()
            .entry(host.to_string())
            .or_default()
            .record_response();
    }

    /// Snapshot of the state for `host`
    pub fn host_state(&self, host: &str) -> Option<HostState> {
        self.lock().get(host).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, HostState>> {
        // A panicking worker cannot leave a HostState half-updated
        self.hosts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
