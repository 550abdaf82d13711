//! HTTP session and transport
//!
//! This module owns the process-facing side of HTTP:
//! - The `Transport` trait, one exchange per call, so the fetch policy can be
//!   exercised against scripted transports
//! - `CrawlSession`, the reqwest-backed transport with a shared cookie jar,
//!   a fixed browser identity, and per-run headers
//! - Classification of reqwest failures into transport error kinds

use crate::HarvestError;
use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{redirect::Policy, Client};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Browser identity attached to every request unless overridden
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_9_3) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/35.0.1916.47 Safari/537.36";

/// Redirect hops followed before giving up with `TooManyRedirects`
pub const MAX_REDIRECTS: usize = 30;

/// HTTP method of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A single HTTP exchange to perform
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    /// Form body, only sent with `Method::Post`
    pub form: Vec<(String, String)>,
    pub allow_redirects: bool,
    /// Skip certificate verification
    pub insecure: bool,
}

/// A response as received from the network
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    /// URL after redirects
    pub final_url: Url,
    pub body: Vec<u8>,
}

/// Why an exchange produced no response
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("TLS failure: {0}")]
    Tls(String),

    #[error("too many redirects")]
    TooManyRedirects,

    #[error("request failed: {0}")]
    Other(String),
}

/// Performs one HTTP exchange
///
/// Implementations must not retry on their own; retry and fallback policy
/// lives in the fetcher.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &TransportRequest) -> Result<RawResponse, TransportError>;
}

/// Options for building a `CrawlSession`
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl From<&crate::config::FetchConfig> for SessionOptions {
    fn from(config: &crate::config::FetchConfig) -> Self {
        Self {
            user_agent: config
                .user_agent
                .clone()
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }
}

/// Pooled clients sharing one cookie jar
struct SessionClients {
    verified_follow: Client,
    verified_manual: Client,
    insecure_follow: Client,
    insecure_manual: Client,
    jar: Arc<Jar>,
}

/// HTTP client state shared by every fetch of a crawl run
///
/// Cloning is cheap and shares the connection pools and the cookie jar.
/// Headers are never mutated in place: `with_headers` returns a new session
/// carrying the merged header set. Pooled connections are released when the
/// last clone is dropped.
#[derive(Clone)]
pub struct CrawlSession {
    clients: Arc<SessionClients>,
    headers: Arc<HeaderMap>,
}

impl CrawlSession {
    /// Builds a session with the given identity and timeout
    ///
    /// # Example
    ///
    /// ```no_run
    /// use search_harvest::crawler::{CrawlSession, SessionOptions};
    ///
    /// let session = CrawlSession::new(&SessionOptions::default()).unwrap();
    /// let session = session.with_headers([("cookie", "region=eu")]).unwrap();
    /// ```
    pub fn new(options: &SessionOptions) -> Result<Self, HarvestError> {
        let jar = Arc::new(Jar::default());
        let clients = SessionClients {
            verified_follow: build_http_client(options, &jar, false, true)?,
            verified_manual: build_http_client(options, &jar, false, false)?,
            insecure_follow: build_http_client(options, &jar, true, true)?,
            insecure_manual: build_http_client(options, &jar, true, false)?,
            jar,
        };

        Ok(Self {
            clients: Arc::new(clients),
            headers: Arc::new(HeaderMap::new()),
        })
    }

    /// Returns a session with `headers` merged over the current ones
    ///
    /// The receiver is left untouched; both sessions keep sharing the
    /// connection pools and cookie jar.
    pub fn with_headers<'a, I>(&self, headers: I) -> Result<Self, HarvestError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut merged = (*self.headers).clone();
        for (name, value) in headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                HarvestError::InvalidHeader {
                    name: name.to_string(),
                    message: e.to_string(),
                }
            })?;
            let header_value =
                HeaderValue::from_str(value).map_err(|e| HarvestError::InvalidHeader {
                    name: name.to_string(),
                    message: e.to_string(),
                })?;
            merged.insert(header_name, header_value);
        }

        Ok(Self {
            clients: Arc::clone(&self.clients),
            headers: Arc::new(merged),
        })
    }

    /// Headers attached to every request of this session
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Cookie jar shared by all clients of this session
    pub fn cookie_jar(&self) -> &Arc<Jar> {
        &self.clients.jar
    }

    fn client_for(&self, insecure: bool, allow_redirects: bool) -> &Client {
        match (insecure, allow_redirects) {
            (false, true) => &self.clients.verified_follow,
            (false, false) => &self.clients.verified_manual,
            (true, true) => &self.clients.insecure_follow,
            (true, false) => &self.clients.insecure_manual,
        }
    }
}

#[async_trait]
impl Transport for CrawlSession {
    async fn send(&self, request: &TransportRequest) -> Result<RawResponse, TransportError> {
        let client = self.client_for(request.insecure, request.allow_redirects);
        let builder = match request.method {
            Method::Get => client.get(request.url.clone()),
            Method::Post => client.post(request.url.clone()).form(&request.form),
        };

        let response = builder
            .headers((*self.headers).clone())
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let body = response.bytes().await.map_err(classify_error)?;

        Ok(RawResponse {
            status,
            final_url,
            body: body.to_vec(),
        })
    }
}

/// Builds one pooled client
fn build_http_client(
    options: &SessionOptions,
    jar: &Arc<Jar>,
    insecure: bool,
    follow_redirects: bool,
) -> Result<Client, reqwest::Error> {
    let redirect = if follow_redirects {
        Policy::limited(MAX_REDIRECTS)
    } else {
        Policy::none()
    };

    Client::builder()
        .user_agent(options.user_agent.as_str())
        .timeout(options.timeout)
        .connect_timeout(Duration::from_secs(10))
        .redirect(redirect)
        .cookie_provider(Arc::clone(jar))
        .danger_accept_invalid_certs(insecure)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Classifies a reqwest failure
///
/// reqwest reports TLS handshake and certificate failures as connect errors,
/// so the source chain is inspected to tell them apart. The URL is dropped
/// first: a key such as "ssl certificate" must not read as a TLS failure.
pub fn classify_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        return TransportError::Timeout;
    }
    if error.is_redirect() {
        return TransportError::TooManyRedirects;
    }

    let error = error.without_url();
    let message = error_chain(&error);
    if looks_like_tls_failure(&message) {
        TransportError::Tls(message)
    } else if error.is_connect() || error.is_request() {
        TransportError::Connect(message)
    } else {
        TransportError::Other(message)
    }
}

/// Joins an error and all of its sources into one message
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn looks_like_tls_failure(message: &str) -> bool {
    let lower = message.to_lowercase();
    ["certificate", "tls", "ssl", "handshake"]
        .iter()
        .any(|needle| lower.contains(needle))
}
