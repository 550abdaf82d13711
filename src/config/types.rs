use serde::Deserialize;
use std::collections::BTreeMap;

/// Placeholder token replaced by each work item's key
pub const DEFAULT_PLACEHOLDER: &str = "XXXX";

/// Main configuration structure for Search-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub search: SearchConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Extra request headers (cookies, domain header, ...)
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub pattern: PatternConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Search endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Search URL with a placeholder where the key goes
    #[serde(rename = "url-template")]
    pub url_template: String,

    /// Token in the template (and form values) replaced by the key
    #[serde(default = "default_placeholder")]
    pub placeholder: String,

    /// Send the key in a POST form instead of a GET query
    #[serde(rename = "use-post", default)]
    pub use_post: bool,

    /// Follow HTTP redirects
    #[serde(rename = "allow-redirects", default = "default_true")]
    pub allow_redirects: bool,

    /// Form fields sent with POST searches; values may contain the placeholder
    pub form: Option<BTreeMap<String, String>>,
}

impl SearchConfig {
    /// Returns the POST form, defaulting to `keywords=<key>&submit=Search`
    pub fn post_form(&self) -> BTreeMap<String, String> {
        self.form.clone().unwrap_or_else(|| {
            BTreeMap::from([
                ("keywords".to_string(), self.placeholder.clone()),
                ("submit".to_string(), "Search".to_string()),
            ])
        })
    }
}

/// Fetch behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Attempts per item before the run is aborted
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff between attempts (seconds)
    #[serde(rename = "wait-seconds", default = "default_wait_seconds")]
    pub wait_seconds: u64,

    /// Number of work items fetched in parallel
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-seconds", default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Overrides the built-in browser user agent
    #[serde(rename = "user-agent")]
    pub user_agent: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            wait_seconds: default_wait_seconds(),
            concurrency: default_concurrency(),
            timeout_seconds: default_timeout_seconds(),
            user_agent: None,
        }
    }
}

/// Link extraction pattern
#[derive(Debug, Clone, Deserialize)]
pub struct PatternConfig {
    /// Tag of the element wrapping the target link
    pub tag: String,

    /// Attributes the wrapping element must carry (exact values)
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    /// Tag of the nested link element
    #[serde(rename = "link-tag", default = "default_link_tag")]
    pub link_tag: String,

    /// Attribute of the link element holding the URL
    #[serde(rename = "link-attribute", default = "default_link_attribute")]
    pub link_attribute: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path of the results CSV file
    #[serde(rename = "results-path", default = "default_results_path")]
    pub results_path: String,

    /// Directory for archived pages; archiving is off when absent
    #[serde(rename = "archive-dir")]
    pub archive_dir: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_path: default_results_path(),
            archive_dir: None,
        }
    }
}

fn default_placeholder() -> String {
    DEFAULT_PLACEHOLDER.to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    5
}

fn default_wait_seconds() -> u64 {
    2
}

fn default_concurrency() -> u32 {
    1
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_link_tag() -> String {
    "a".to_string()
}

fn default_link_attribute() -> String {
    "href".to_string()
}

fn default_results_path() -> String {
    "results.csv".to_string()
}
