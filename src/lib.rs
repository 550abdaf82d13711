//! Search-Harvest: batch-driven web discovery
//!
//! This crate takes a list of search keys, queries a templated search endpoint
//! for each key, extracts a target link from the result page with a declarative
//! HTML pattern, and archives the linked pages as normalized snapshots.

pub mod archive;
pub mod config;
pub mod crawler;
pub mod document;
pub mod extract;
pub mod input;
pub mod output;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Search-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Input error: {0}")]
    Input(#[from] InputError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("Invalid URL: {url}")]
    InvalidUrl { url: String },

    #[error("No such file: {path}")]
    NotFound { path: String },

    #[error("Lost connectivity to {url} after {attempts} attempts (last error: {last})")]
    Connectivity {
        url: String,
        attempts: u32,
        last: crawler::ErrorTag,
    },

    #[error("Crawl cancelled")]
    Cancelled,

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::ItemState,
        to: state::ItemState,
    },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid header {name}: {message}")]
    InvalidHeader { name: String, message: String },

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Work-item file errors
#[derive(Debug, Error)]
pub enum InputError {
    #[error("Work-item file not found: {0}")]
    NotFound(String),

    #[error("Malformed work-item line {line}: {content:?}")]
    Malformed { line: u64, content: String },

    #[error("Failed to read work items: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type alias for Search-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use archive::PageArchiver;
pub use config::Config;
pub use crawler::{
    BatchCrawler, CrawlPlan, CrawlSession, ErrorTag, FetchOutcome, FetchStatus, Fetcher,
    ResultRecord, WorkItem,
};
pub use document::{Document, DocumentFormat, Source};
pub use extract::{extract, ExtractionPattern};
pub use state::ItemState;
