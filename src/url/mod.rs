//! URL handling module for Search-Harvest
//!
//! This module provides URL validation, host extraction, and search-template
//! substitution.

mod domain;

pub use domain::extract_host;

use url::Url;

/// Parses a string as a well-formed web URL
///
/// Only `http` and `https` URLs with a host are accepted; everything else
/// (relative paths, filesystem paths, other schemes) returns `None`.
///
/// # Examples
///
/// ```
/// use search_harvest::url::parse_web_url;
///
/// assert!(parse_web_url("https://example.com/search?q=abc").is_some());
/// assert!(parse_web_url("/tmp/page.html").is_none());
/// assert!(parse_web_url("mailto:someone@example.com").is_none());
/// ```
pub fn parse_web_url(input: &str) -> Option<Url> {
    let url = Url::parse(input.trim()).ok()?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some_and(|h| !h.is_empty()) => Some(url),
        _ => None,
    }
}

/// Replaces the placeholder token in a template with a search key
///
/// Only the first occurrence is replaced; templates are validated to carry
/// a single placeholder.
///
/// # Examples
///
/// ```
/// use search_harvest::url::substitute_key;
///
/// let url = substitute_key("https://example.test/search?q=XXXX", "XXXX", "abc");
/// assert_eq!(url, "https://example.test/search?q=abc");
/// ```
pub fn substitute_key(template: &str, placeholder: &str, key: &str) -> String {
    template.replacen(placeholder, key, 1)
}
