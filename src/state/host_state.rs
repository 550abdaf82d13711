use std::time::Duration;
use tokio::time::Instant;

/// Longest cooldown a single failure can impose
pub const MAX_BACKOFF: Duration = Duration::from_secs(3600);

/// Tracks the state of a target host during a crawl
///
/// One `HostState` exists per host and is shared by every worker. A
/// transient failure seen by one worker delays the next attempt of all of
/// them.
#[derive(Debug, Clone, Default)]
pub struct HostState {
    /// Number of requests issued to this host
    pub request_count: u32,

    /// Failures since the last response from this host
    pub consecutive_failures: u32,

    /// No request may be issued before this instant
    pub cooldown_until: Option<Instant>,
}

impl HostState {
    /// Creates a new HostState with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how long a worker must wait before requesting this host
    ///
    /// `None` means a request may be issued now.
    pub fn time_until_ready(&self, now: Instant) -> Option<Duration> {
        self.cooldown_until
            .filter(|until| *until > now)
            .map(|until| until - now)
    }

    /// Records that a request is being issued
    pub fn record_request(&mut self) {
        self.request_count += 1;
    }

    /// Records a transient failure and extends the shared cooldown
    ///
    /// The backoff is capped at `MAX_BACKOFF`.
    pub fn record_failure(&mut self, now: Instant, backoff: Duration) {
        self.consecutive_failures += 1;
        let until = now + backoff.min(MAX_BACKOFF);
        self.cooldown_until = Some(match self.cooldown_until {
            Some(existing) if existing > until => existing,
            _ => until,
        });
    }

    /// Records that the host answered (any HTTP status)
    pub fn record_response(&mut self) {
        self.consecutive_failures = 0;
        self.cooldown_until = None;
    }
}
