//! Pattern-based link extraction
//!
//! This module locates one link inside a parsed document:
//! - The first container element matching a tag and a set of attributes
//! - The first nested link element carrying the link attribute
//! - Resolution of the attribute value against the document base URL

use crate::config::PatternConfig;
use crate::document::Document;
use scraper::{ElementRef, Html};
use std::collections::BTreeMap;
use url::Url;

/// Declares which element holds the target link
///
/// Tag and attribute names are stored lowercased, matching how HTML parsers
/// report them. Attribute values compare exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionPattern {
    tag: String,
    attributes: BTreeMap<String, String>,
    link_tag: String,
    link_attribute: String,
}

impl ExtractionPattern {
    /// Creates a pattern with no attribute constraints
    ///
    /// # Example
    ///
    /// ```
    /// use search_harvest::ExtractionPattern;
    ///
    /// let pattern = ExtractionPattern::new("div", "a", "href").with_attribute("class", "result");
    /// assert_eq!(pattern.tag(), "div");
    /// ```
    pub fn new(
        tag: impl Into<String>,
        link_tag: impl Into<String>,
        link_attribute: impl Into<String>,
    ) -> Self {
        Self {
            tag: tag.into().to_lowercase(),
            attributes: BTreeMap::new(),
            link_tag: link_tag.into().to_lowercase(),
            link_attribute: link_attribute.into().to_lowercase(),
        }
    }

    /// Adds a required attribute to the container
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes
            .insert(name.into().to_lowercase(), value.into());
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn link_tag(&self) -> &str {
        &self.link_tag
    }

    pub fn link_attribute(&self) -> &str {
        &self.link_attribute
    }

    fn matches_container(&self, element: &ElementRef<'_>) -> bool {
        let value = element.value();
        value.name() == self.tag
            && self
                .attributes
                .iter()
                .all(|(name, expected)| value.attr(name) == Some(expected.as_str()))
    }

    fn link_value<'a>(&self, element: &ElementRef<'a>) -> Option<&'a str> {
        let value = element.value();
        if value.name() == self.link_tag {
            value.attr(&self.link_attribute)
        } else {
            None
        }
    }
}

impl From<&PatternConfig> for ExtractionPattern {
    fn from(config: &PatternConfig) -> Self {
        config.attributes.iter().fold(
            Self::new(&config.tag, &config.link_tag, &config.link_attribute),
            |pattern, (name, value)| pattern.with_attribute(name, value),
        )
    }
}

/// Extracts the link declared by `pattern` from `document`
///
/// # Rules
///
/// - The container is the first element in document order matching the tag
///   and every required attribute
/// - The link is the first descendant of the container with the link tag and
///   the link attribute; the container itself is used when it qualifies and
///   has no such descendant
/// - No container, or no link inside it, yields `None`
///
/// # Example
///
/// ```
/// use search_harvest::{extract, Document, DocumentFormat, ExtractionPattern};
/// use url::Url;
///
/// let document = Document::parse(
///     r#"<div class="hit"><a href="/item/7">Item</a></div>"#,
///     DocumentFormat::Html,
/// )
/// .with_base_url(Url::parse("https://shop.example/search?q=7").unwrap());
///
/// let pattern = ExtractionPattern::new("div", "a", "href").with_attribute("class", "hit");
/// assert_eq!(
///     extract(&document, &pattern),
///     Some("https://shop.example/item/7".to_string())
/// );
/// ```
pub fn extract(document: &Document, pattern: &ExtractionPattern) -> Option<String> {
    let container = find_container(document.html(), pattern)?;
    let raw = find_link_value(&container, pattern)?;
    resolve_link(raw, document.base_url().as_ref())
}

fn find_container<'a>(html: &'a Html, pattern: &ExtractionPattern) -> Option<ElementRef<'a>> {
    html.tree
        .root()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|element| pattern.matches_container(element))
}

fn find_link_value<'a>(container: &ElementRef<'a>, pattern: &ExtractionPattern) -> Option<&'a str> {
    container
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .find_map(|element| pattern.link_value(&element))
        .or_else(|| pattern.link_value(container))
}

/// Resolves a raw attribute value to an absolute URL
///
/// Returns None if the value should be excluded:
/// - Empty values
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only values
/// - Relative values with no base to resolve against
fn resolve_link(raw: &str, base_url: Option<&Url>) -> Option<String> {
    let value = raw.trim();

    if value.is_empty() {
        return None;
    }

    let lower = value.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    if value.starts_with('#') {
        return None;
    }

    match base_url {
        Some(base) => base.join(value).ok().map(|url| url.to_string()),
        None => Url::parse(value).ok().map(|url| url.to_string()),
    }
}
