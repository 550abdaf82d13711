use crate::config::types::{Config, FetchConfig, OutputConfig, PatternConfig, SearchConfig};
use crate::ConfigError;
use url::Url;

/// Upper bound for `fetch.wait-seconds`
const MAX_WAIT_SECONDS: u64 = 3600;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_search_config(&config.search)?;
    validate_fetch_config(&config.fetch)?;
    validate_pattern_config(&config.pattern)?;
    validate_output_config(&config.output)?;
    validate_headers(config)?;
    Ok(())
}

/// Validates the search template and placeholder
fn validate_search_config(config: &SearchConfig) -> Result<(), ConfigError> {
    if config.placeholder.is_empty() {
        return Err(ConfigError::Validation(
            "placeholder cannot be empty".to_string(),
        ));
    }

    // POST searches may carry the key only in the form body
    let occurrences = config.url_template.matches(&config.placeholder).count();
    if occurrences > 1 || (occurrences == 0 && !config.use_post) {
        return Err(ConfigError::Validation(format!(
            "url-template must contain the placeholder '{}' exactly once, found {}",
            config.placeholder, occurrences
        )));
    }

    // The template must still be a valid URL once a key is substituted
    let sample = config.url_template.replace(&config.placeholder, "key");
    let url = Url::parse(&sample)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid url-template: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "url-template must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if config.use_post && config.post_form().is_empty() {
        return Err(ConfigError::Validation(
            "search.form cannot be empty when use-post is set".to_string(),
        ));
    }

    Ok(())
}

/// Validates fetch limits
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.max_retries < 1 || config.max_retries > 100 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be between 1 and 100, got {}",
            config.max_retries
        )));
    }

    if config.concurrency < 1 || config.concurrency > 64 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 64, got {}",
            config.concurrency
        )));
    }

    if config.wait_seconds > MAX_WAIT_SECONDS {
        return Err(ConfigError::Validation(format!(
            "wait-seconds must be at most {}, got {}",
            MAX_WAIT_SECONDS, config.wait_seconds
        )));
    }

    if config.timeout_seconds < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout-seconds must be >= 1, got {}",
            config.timeout_seconds
        )));
    }

    if matches!(&config.user_agent, Some(agent) if agent.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the extraction pattern
fn validate_pattern_config(config: &PatternConfig) -> Result<(), ConfigError> {
    for (field, value) in [
        ("tag", &config.tag),
        ("link-tag", &config.link_tag),
        ("link-attribute", &config.link_attribute),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "pattern {} cannot be empty",
                field
            )));
        }
    }

    if config.attributes.keys().any(|name| name.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "pattern attribute names cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.results_path.is_empty() {
        return Err(ConfigError::Validation(
            "results-path cannot be empty".to_string(),
        ));
    }

    if matches!(&config.archive_dir, Some(dir) if dir.is_empty()) {
        return Err(ConfigError::Validation(
            "archive-dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Header names must be usable as HTTP header names
fn validate_headers(config: &Config) -> Result<(), ConfigError> {
    for name in config.headers.keys() {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(ConfigError::Validation(format!(
                "invalid header name '{}'",
                name
            )));
        }
    }
    Ok(())
}
