//! Crawler module for search-page fetching and batch processing
//!
//! This module contains the core crawling logic, including:
//! - The HTTP session and the transport seam
//! - Resilient fetching with retry and TLS fallback
//! - A per-host backoff gate shared by all workers
//! - Batch coordination over a work-item list

mod coordinator;
mod fetcher;
mod gate;
mod session;

pub use coordinator::{BatchCrawler, CrawlPlan, ResultRecord, WorkItem};
pub use fetcher::{
    ErrorTag, FetchOutcome, FetchRequest, FetchStatus, Fetcher, RetryPolicy, DEFAULT_MAX_RETRIES,
    USABLE_STATUSES,
};
pub use gate::HostGate;
pub use session::{
    classify_error, CrawlSession, Method, RawResponse, SessionOptions, Transport, TransportError,
    TransportRequest, DEFAULT_USER_AGENT, MAX_REDIRECTS,
};
