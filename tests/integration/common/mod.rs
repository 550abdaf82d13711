//! Shared fixtures for integration tests

use async_trait::async_trait;
use search_harvest::crawler::{
    CrawlPlan, CrawlSession, Fetcher, RawResponse, SessionOptions, Transport, TransportError,
    TransportRequest,
};
use std::collections::VecDeque;
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A session with default identity and a short timeout
pub fn session() -> CrawlSession {
    CrawlSession::new(&SessionOptions {
        timeout: Duration::from_secs(5),
        ..SessionOptions::default()
    })
    .expect("Failed to build session")
}

/// A fetcher over a fresh real session
pub fn fetcher() -> Fetcher {
    Fetcher::new(Arc::new(session()))
}

/// A GET plan with zero backoff
pub fn plan(url_template: &str) -> CrawlPlan {
    let mut plan = CrawlPlan::new(url_template);
    plan.wait_seconds = 0;
    plan
}

/// URL of a local port nothing listens on
pub fn refused_url(path_and_query: &str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
    let port = listener.local_addr().expect("No local address").port();
    drop(listener);
    format!("http://127.0.0.1:{}{}", port, path_and_query)
}

/// Replays scripted statuses or errors and records every request
pub struct Scripted {
    replies: Mutex<VecDeque<Result<u16, TransportError>>>,
    fallback: Result<u16, TransportError>,
    body: String,
    seen: Mutex<Vec<TransportRequest>>,
}

impl Scripted {
    pub fn new(
        replies: Vec<Result<u16, TransportError>>,
        fallback: Result<u16, TransportError>,
        body: &str,
    ) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            fallback,
            body: body.to_string(),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn always(reply: Result<u16, TransportError>) -> Arc<Self> {
        Self::new(vec![], reply, "<html><body></body></html>")
    }

    pub fn seen(&self) -> Vec<TransportRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for Scripted {
    async fn send(&self, request: &TransportRequest) -> Result<RawResponse, TransportError> {
        self.seen.lock().unwrap().push(request.clone());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        reply.map(|status| RawResponse {
            status,
            final_url: request.url.clone(),
            body: self.body.as_bytes().to_vec(),
        })
    }
}

pub fn refused() -> TransportError {
    TransportError::Connect("connection refused".to_string())
}

pub fn bad_cert() -> TransportError {
    TransportError::Tls("invalid peer certificate: UnknownIssuer".to_string())
}
