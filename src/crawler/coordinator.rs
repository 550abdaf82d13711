//! Batch crawl orchestration
//!
//! This module contains the per-item pipeline and the worker pool that runs
//! it over a whole work-item list, including:
//! - Building the search request for each key
//! - Fetching with the retry policy (GET) or single-shot (POST)
//! - Optional link extraction and page archiving for usable outcomes
//! - Reordering results into input order
//! - Cancelling all workers on the first fatal error

use crate::archive::{destination_for, PageArchiver};
use crate::config::{Config, DEFAULT_PLACEHOLDER};
use crate::crawler::fetcher::{FetchOutcome, FetchRequest, FetchStatus, Fetcher, RetryPolicy};
use crate::crawler::session::CrawlSession;
use crate::document::{Document, DocumentFormat};
use crate::extract::{extract, ExtractionPattern};
use crate::url::{parse_web_url, substitute_key};
use crate::HarvestError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// One search key and the label carried through to its result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub key: String,
    pub identifier: String,
}

impl WorkItem {
    pub fn new(key: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            identifier: identifier.into(),
        }
    }
}

/// Outcome of one work item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    pub identifier: String,
    pub key: String,
    pub status: FetchStatus,
    /// Link found on the search page, when extraction ran and matched
    pub extracted_link: Option<String>,
}

/// Everything a run needs to know besides the items themselves
#[derive(Debug, Clone)]
pub struct CrawlPlan {
    /// Search URL containing `placeholder` once
    pub url_template: String,
    pub placeholder: String,
    /// POST the form instead of GET with retry
    pub use_post: bool,
    /// Form fields for POST; `placeholder` in a value is replaced by the key
    pub post_form: BTreeMap<String, String>,
    /// Headers for every request; when empty a `domain` header is sent
    pub headers: BTreeMap<String, String>,
    /// Backoff between attempts
    pub wait_seconds: u64,
    /// Total attempts per item
    pub max_retries: u32,
    pub allow_redirects: bool,
    /// Number of parallel workers
    pub concurrency: usize,
}

impl CrawlPlan {
    /// Creates a GET plan with default settings
    pub fn new(url_template: impl Into<String>) -> Self {
        let mut post_form = BTreeMap::new();
        post_form.insert("keywords".to_string(), DEFAULT_PLACEHOLDER.to_string());
        post_form.insert("submit".to_string(), "Search".to_string());

        Self {
            url_template: url_template.into(),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            use_post: false,
            post_form,
            headers: BTreeMap::new(),
            wait_seconds: 2,
            max_retries: crate::crawler::DEFAULT_MAX_RETRIES,
            allow_redirects: true,
            concurrency: 1,
        }
    }

    /// Builds the plan described by a loaded configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            url_template: config.search.url_template.clone(),
            placeholder: config.search.placeholder.clone(),
            use_post: config.search.use_post,
            post_form: config.search.post_form(),
            headers: config.headers.clone(),
            wait_seconds: config.fetch.wait_seconds,
            max_retries: config.fetch.max_retries,
            allow_redirects: config.search.allow_redirects,
            concurrency: config.fetch.concurrency as usize,
        }
    }

    /// Search URL for `key`
    pub fn search_url(&self, key: &str) -> String {
        substitute_key(&self.url_template, &self.placeholder, key)
    }

    /// Request issued for `key`
    ///
    /// POST requests are single-shot; GET requests carry the retry policy.
    pub fn request_for(&self, key: &str) -> FetchRequest {
        let url = self.search_url(key);

        if self.use_post {
            let form = self
                .post_form
                .iter()
                .map(|(name, value)| (name.clone(), substitute_key(value, &self.placeholder, key)))
                .collect();
            FetchRequest::post(url, form).with_redirects(self.allow_redirects)
        } else {
            FetchRequest::get(url)
                .with_redirects(self.allow_redirects)
                .with_retry(RetryPolicy {
                    max_retries: self.max_retries,
                    backoff: Duration::from_secs(self.wait_seconds),
                })
        }
    }

    /// Headers actually sent during the run
    pub fn effective_headers(&self) -> BTreeMap<String, String> {
        if !self.headers.is_empty() {
            return self.headers.clone();
        }

        let mut headers = BTreeMap::new();
        if let Some(domain) = self.search_domain() {
            headers.insert("domain".to_string(), domain);
        }
        headers
    }

    /// `host[:port]` of the search endpoint
    fn search_domain(&self) -> Option<String> {
        let url = parse_web_url(&self.search_url("key"))?;
        let host = url.host_str()?;
        Some(match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        })
    }
}

/// Extraction and archiving applied to usable search pages
struct HarvestStep {
    pattern: ExtractionPattern,
    archive_dir: Option<PathBuf>,
}

/// Runs the per-item pipeline over a work-item list
///
/// # Pipeline
///
/// 1. Substitute the key into the search URL (or POST form)
/// 2. Fetch; GET retries on transient failures, POST does not
/// 3. Exhausted retries abort the whole run with `Connectivity`
/// 4. Any outcome, usable or not, becomes a `ResultRecord`
///
/// With `concurrency > 1` items are processed by a pool of workers sharing
/// one fetcher, and therefore one per-host backoff budget. Records are
/// returned in input order either way.
pub struct BatchCrawler {
    fetcher: Fetcher,
    plan: Arc<CrawlPlan>,
}

impl BatchCrawler {
    /// Creates a crawler sending through `session` with the plan's headers
    ///
    /// The session itself is left untouched.
    pub fn new(session: &CrawlSession, plan: CrawlPlan) -> Result<Self, HarvestError> {
        let headers = plan.effective_headers();
        let session = session.with_headers(
            headers
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str())),
        )?;
        Ok(Self::with_fetcher(Fetcher::new(Arc::new(session)), plan))
    }

    /// Creates a crawler around an existing fetcher
    pub fn with_fetcher(fetcher: Fetcher, plan: CrawlPlan) -> Self {
        Self {
            fetcher,
            plan: Arc::new(plan),
        }
    }

    pub fn plan(&self) -> &CrawlPlan {
        &self.plan
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Fetches the search page of every item and records its status
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<ResultRecord>)` - One record per item, in input order
    /// * `Err(Connectivity)` - An item ran out of retries; no records
    pub async fn run(&self, items: &[WorkItem]) -> Result<Vec<ResultRecord>, HarvestError> {
        self.execute(items, None).await
    }

    /// Like `run`, extracting a link from every usable search page
    ///
    /// When `archive_dir` is given, each extracted link is fetched once and
    /// saved as `<archive_dir>/<identifier>.html`. The directory must exist.
    pub async fn harvest(
        &self,
        items: &[WorkItem],
        pattern: &ExtractionPattern,
        archive_dir: Option<&Path>,
    ) -> Result<Vec<ResultRecord>, HarvestError> {
        let step = HarvestStep {
            pattern: pattern.clone(),
            archive_dir: archive_dir.map(Path::to_path_buf),
        };
        self.execute(items, Some(Arc::new(step))).await
    }

    async fn execute(
        &self,
        items: &[WorkItem],
        step: Option<Arc<HarvestStep>>,
    ) -> Result<Vec<ResultRecord>, HarvestError> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let cancel = CancellationToken::new();
        let fetcher = self.fetcher.with_cancellation(cancel.clone());
        let items = Arc::new(items.to_vec());
        let next = Arc::new(AtomicUsize::new(0));
        let workers = self.plan.concurrency.clamp(1, items.len());

        tracing::info!(
            "Starting batch of {} items with {} worker(s)",
            items.len(),
            workers
        );

        let mut set = JoinSet::new();
        for _ in 0..workers {
            let worker = Worker {
                archiver: PageArchiver::new(fetcher.clone()),
                fetcher: fetcher.clone(),
                plan: Arc::clone(&self.plan),
                step: step.clone(),
                items: Arc::clone(&items),
                next: Arc::clone(&next),
                cancel: cancel.clone(),
            };
            set.spawn(worker.run());
        }

        let mut slots: Vec<Option<ResultRecord>> = vec![None; items.len()];
        let mut failure: Option<HarvestError> = None;

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(records)) => {
                    for (index, record) in records {
                        slots[index] = Some(record);
                    }
                }
                Ok(Err(HarvestError::Cancelled)) => {}
                Ok(Err(error)) => {
                    cancel.cancel();
                    failure.get_or_insert(error);
                }
                Err(error) => {
                    cancel.cancel();
                    failure.get_or_insert(HarvestError::Join(error));
                }
            }
        }

        if let Some(error) = failure {
            tracing::error!("Batch aborted: {}", error);
            return Err(error);
        }

        slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or(HarvestError::Cancelled)
    }
}

/// One pool worker; pulls item indices until the list or the run ends
struct Worker {
    fetcher: Fetcher,
    archiver: PageArchiver,
    plan: Arc<CrawlPlan>,
    step: Option<Arc<HarvestStep>>,
    items: Arc<Vec<WorkItem>>,
    next: Arc<AtomicUsize>,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(self) -> Result<Vec<(usize, ResultRecord)>, HarvestError> {
        let mut records = Vec::new();

        loop {
            if self.cancel.is_cancelled() {
                return Err(HarvestError::Cancelled);
            }

            let index = self.next.fetch_add(1, Ordering::SeqCst);
            let Some(item) = self.items.get(index) else {
                break;
            };

            match self.process(item).await {
                Ok(record) => records.push((index, record)),
                Err(error) => {
                    if !matches!(error, HarvestError::Cancelled) {
                        self.cancel.cancel();
                    }
                    return Err(error);
                }
            }
        }

        Ok(records)
    }

    async fn process(&self, item: &WorkItem) -> Result<ResultRecord, HarvestError> {
        let request = self.plan.request_for(&item.key);
        let outcome = self.fetcher.fetch(&request).await?;
        tracing::info!("{} {} {}", item.identifier, item.key, outcome.status);

        let extracted_link = match &self.step {
            Some(step) if outcome.is_usable() => self.harvest(item, &outcome, step).await?,
            _ => None,
        };

        Ok(ResultRecord {
            identifier: item.identifier.clone(),
            key: item.key.clone(),
            status: outcome.status,
            extracted_link,
        })
    }

    async fn harvest(
        &self,
        item: &WorkItem,
        outcome: &FetchOutcome,
        step: &HarvestStep,
    ) -> Result<Option<String>, HarvestError> {
        let link = extract_link(outcome, &step.pattern);

        let (Some(link), Some(dir)) = (&link, &step.archive_dir) else {
            if link.is_none() {
                tracing::debug!("No link matched for {}", item.identifier);
            }
            return Ok(link);
        };

        let destination = destination_for(dir, &item.identifier);
        match self
            .archiver
            .save(link, &destination, self.plan.allow_redirects)
            .await
        {
            Ok(_) => {}
            Err(HarvestError::InvalidUrl { url }) => {
                tracing::warn!("Skipping archive of {}: invalid URL {}", item.identifier, url);
            }
            Err(error) => return Err(error),
        }

        Ok(Some(link.clone()))
    }
}

/// Parses a search page and applies the pattern
fn extract_link(outcome: &FetchOutcome, pattern: &ExtractionPattern) -> Option<String> {
    let document = Document::from_outcome(outcome, DocumentFormat::Html);
    extract(&document, pattern)
}
