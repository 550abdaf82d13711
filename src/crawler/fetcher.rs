//! Resilient HTTP fetcher
//!
//! This module handles every request the crawler makes, including:
//! - URL validation before any network I/O
//! - A single insecure retry after a TLS failure
//! - A bounded retry budget with backoff for transient failures
//! - Classification of outcomes into usable and unusable statuses

use crate::crawler::gate::HostGate;
use crate::crawler::session::{Method, RawResponse, Transport, TransportError, TransportRequest};
use crate::state::ItemState;
use crate::url::{extract_host, parse_web_url};
use crate::HarvestError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// HTTP statuses treated as a usable page
pub const USABLE_STATUSES: [u16; 3] = [200, 301, 302];

/// Default number of attempts per item
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Why no HTTP response was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorTag {
    Timeout,
    ConnectionError,
    TlsError,
    TooManyRedirects,
}

impl ErrorTag {
    /// Stable lowercase name, used in logs and result files
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::ConnectionError => "connection_error",
            Self::TlsError => "tls_error",
            Self::TooManyRedirects => "too_many_redirects",
        }
    }
}

impl fmt::Display for ErrorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&TransportError> for ErrorTag {
    fn from(error: &TransportError) -> Self {
        match error {
            TransportError::Timeout => Self::Timeout,
            TransportError::Tls(_) => Self::TlsError,
            TransportError::TooManyRedirects => Self::TooManyRedirects,
            TransportError::Connect(_) | TransportError::Other(_) => Self::ConnectionError,
        }
    }
}

/// Status of a fetch: an HTTP code or the reason there is none
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchStatus {
    Http(u16),
    Error(ErrorTag),
}

impl FetchStatus {
    /// Returns true for 200, 301 and 302
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Http(code) if USABLE_STATUSES.contains(code))
    }

    /// The HTTP code, if a response was obtained
    pub fn code(&self) -> Option<u16> {
        match self {
            Self::Http(code) => Some(*code),
            Self::Error(_) => None,
        }
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(code) => write!(f, "{}", code),
            Self::Error(tag) => write!(f, "{}", tag),
        }
    }
}

/// Result of one fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub status: FetchStatus,
    /// Response body; absent when no response was obtained
    pub body: Option<Vec<u8>>,
    /// URL after redirects; absent when no response was obtained
    pub final_url: Option<Url>,
}

impl FetchOutcome {
    /// Outcome for a response received from the network
    pub fn from_response(response: RawResponse) -> Self {
        Self {
            status: FetchStatus::Http(response.status),
            body: Some(response.body),
            final_url: Some(response.final_url),
        }
    }

    /// Synthesized outcome for an exchange that produced no response
    pub fn from_error(tag: ErrorTag) -> Self {
        Self {
            status: FetchStatus::Error(tag),
            body: None,
            final_url: None,
        }
    }

    /// Returns true for 200, 301 and 302
    pub fn is_usable(&self) -> bool {
        self.status.is_usable()
    }
}

/// Retry budget for transient failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_retries: u32,
    /// Delay before the next attempt after a failure
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: Duration::from_secs(2),
        }
    }
}

/// A request for the fetcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub method: Method,
    /// Form body, only sent with `Method::Post`
    pub form: Vec<(String, String)>,
    pub allow_redirects: bool,
    /// `None` for single-shot fetches
    pub retry: Option<RetryPolicy>,
}

impl FetchRequest {
    /// Single-shot GET that follows redirects
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: Method::Get,
            form: Vec::new(),
            allow_redirects: true,
            retry: None,
        }
    }

    /// Single-shot POST with a form body
    pub fn post(url: impl Into<String>, form: Vec<(String, String)>) -> Self {
        Self {
            url: url.into(),
            method: Method::Post,
            form,
            allow_redirects: true,
            retry: None,
        }
    }

    pub fn with_redirects(mut self, allow_redirects: bool) -> Self {
        self.allow_redirects = allow_redirects;
        self
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }
}

/// Issues requests through a `Transport` with retry and TLS fallback policy
///
/// # Request Flow
///
/// 1. Reject malformed URLs with `InvalidUrl` (no I/O)
/// 2. Wait until the host is out of its shared cooldown
/// 3. Send the request
/// 4. On a TLS failure, resend once without certificate verification
///
/// # Failure Handling
///
/// | Mode | Transient failure | Budget exhausted |
/// |------|-------------------|------------------|
/// | Single-shot | Error-tagged outcome | n/a |
/// | Retry | Backoff, then retry | `Connectivity` error |
///
/// The insecure TLS resend never consumes retry budget. Any HTTP status ends
/// the retry loop.
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    gate: HostGate,
    cancel: CancellationToken,
}

impl Fetcher {
    /// Creates a fetcher with a fresh host gate
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            gate: HostGate::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Returns a fetcher sharing transport and host gate, bound to `cancel`
    pub fn with_cancellation(&self, cancel: CancellationToken) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            gate: self.gate.clone(),
            cancel,
        }
    }

    /// Per-host state shared by clones of this fetcher
    pub fn gate(&self) -> &HostGate {
        &self.gate
    }

    /// Fetches a URL according to `request`
    ///
    /// # Returns
    ///
    /// * `Ok(FetchOutcome)` - A response, or an error-tagged outcome in
    ///   single-shot mode
    /// * `Err(InvalidUrl)` - The URL is malformed
    /// * `Err(Connectivity)` - The retry budget ran out without a response
    /// * `Err(Cancelled)` - The run was cancelled
    pub async fn fetch(&self, request: &FetchRequest) -> Result<FetchOutcome, HarvestError> {
        let url = parse_web_url(&request.url).ok_or_else(|| HarvestError::InvalidUrl {
            url: request.url.clone(),
        })?;
        let host = extract_host(&url).unwrap_or_default();

        let transport_request = TransportRequest {
            method: request.method,
            url,
            form: request.form.clone(),
            allow_redirects: request.allow_redirects,
            insecure: false,
        };

        match request.retry {
            None => self.fetch_once(&host, &transport_request).await,
            Some(policy) => {
                self.fetch_with_retry(&host, &transport_request, policy)
                    .await
            }
        }
    }

    async fn fetch_once(
        &self,
        host: &str,
        request: &TransportRequest,
    ) -> Result<FetchOutcome, HarvestError> {
        self.gate.wait_turn(host, &self.cancel).await?;

        match self.attempt(host, request).await {
            Ok(response) => {
                self.gate.record_response(host);
                Ok(FetchOutcome::from_response(response))
            }
            Err(error) => {
                let tag = ErrorTag::from(&error);
                tracing::debug!("Fetch of {} failed: {}", request.url, error);
                Ok(FetchOutcome::from_error(tag))
            }
        }
    }

    async fn fetch_with_retry(
        &self,
        host: &str,
        request: &TransportRequest,
        policy: RetryPolicy,
    ) -> Result<FetchOutcome, HarvestError> {
        let mut state = ItemState::Pending;
        let mut attempts = 0;

        loop {
            self.gate.wait_turn(host, &self.cancel).await?;
            state = state.transition(ItemState::Requesting)?;
            attempts += 1;

            match self.attempt(host, request).await {
                Ok(response) => {
                    self.gate.record_response(host);
                    state = state.transition(ItemState::Success(response.status))?;
                    tracing::debug!(
                        "{} -> {} after {} attempt(s)",
                        request.url,
                        state,
                        attempts
                    );
                    return Ok(FetchOutcome::from_response(response));
                }
                Err(error) => {
                    let tag = ErrorTag::from(&error);
                    if attempts >= policy.max_retries {
                        state = state.transition(ItemState::Failed(tag))?;
                        tracing::warn!(
                            "{} -> {} after {} attempt(s): {}",
                            request.url,
                            state,
                            attempts,
                            error
                        );
                        return Err(HarvestError::Connectivity {
                            url: request.url.to_string(),
                            attempts,
                            last: tag,
                        });
                    }

                    state = state.transition(ItemState::Retrying)?;
                    self.gate.record_failure(host, policy.backoff);
                    tracing::debug!(
                        "Attempt {}/{} for {} failed ({}); retrying in {:?}",
                        attempts,
                        policy.max_retries,
                        request.url,
                        error,
                        policy.backoff
                    );
                }
            }
        }
    }

    /// Sends one request, with the insecure resend after a TLS failure
    async fn attempt(
        &self,
        host: &str,
        request: &TransportRequest,
    ) -> Result<RawResponse, TransportError> {
        self.gate.record_request(host);
        match self.transport.send(request).await {
            Err(TransportError::Tls(reason)) if !request.insecure => {
                tracing::warn!(
                    "TLS failure for {} ({}); retrying once without certificate verification",
                    request.url,
                    reason
                );
                let insecure = TransportRequest {
                    insecure: true,
                    ..request.clone()
                };
                self.gate.record_request(host);
                self.transport.send(&insecure).await
            }
            other => other,
        }
    }
}
