use url::Url;

/// Extracts the host from a URL, lowercased
///
/// The port is ignored, so `example.com:8080` and `example.com` share a host.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use search_harvest::url::extract_host;
///
/// let url = Url::parse("https://Shop.Example.com:8443/search").unwrap();
/// assert_eq!(extract_host(&url), Some("shop.example.com".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}
