//! Content normalization
//!
//! Turns any supported input into a parsed `Document`:
//! - In-memory text or bytes
//! - A fetched response
//! - An open reader (file handle)
//! - A filesystem path
//! - A URL, fetched once without retry

mod pretty;

use crate::crawler::{FetchOutcome, FetchRequest, Fetcher};
use crate::url::parse_web_url;
use crate::HarvestError;
use scraper::{Html, Node, Selector};
use std::fmt;
use std::io::Read;
use std::path::PathBuf;
use url::Url;

/// How input markup is parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentFormat {
    /// A complete HTML document
    #[default]
    Html,
    /// A markup fragment, parsed in a `<body>` context
    Fragment,
}

/// Input accepted by the normalizer
pub enum Source {
    Text(String),
    Bytes(Vec<u8>),
    Response(FetchOutcome),
    Reader(Box<dyn Read + Send>),
    Path(PathBuf),
    Url(String),
    /// Explicitly requests an empty document
    Empty,
}

impl Source {
    /// Classifies a string: well-formed web URLs are fetched, anything else
    /// is treated as a filesystem path
    pub fn guess(input: &str) -> Self {
        if parse_web_url(input).is_some() {
            Self::Url(input.to_string())
        } else {
            Self::Path(PathBuf::from(input))
        }
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(&text.len()).finish(),
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::Response(outcome) => f.debug_tuple("Response").field(&outcome.status).finish(),
            Self::Reader(_) => f.write_str("Reader"),
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Url(url) => f.debug_tuple("Url").field(url).finish(),
            Self::Empty => f.write_str("Empty"),
        }
    }
}

/// A parsed markup tree with the URL relative links resolve against
#[derive(Debug)]
pub struct Document {
    html: Html,
    base_url: Option<Url>,
}

impl Document {
    /// A document with no content
    pub fn empty() -> Self {
        Self {
            html: Html::new_document(),
            base_url: None,
        }
    }

    /// Parses markup text
    pub fn parse(text: &str, format: DocumentFormat) -> Self {
        let html = match format {
            DocumentFormat::Html => Html::parse_document(text),
            DocumentFormat::Fragment => Html::parse_fragment(text),
        };
        Self {
            html,
            base_url: None,
        }
    }

    /// Parses raw bytes; invalid UTF-8 sequences are replaced
    pub fn parse_bytes(bytes: &[u8], format: DocumentFormat) -> Self {
        Self::parse(&String::from_utf8_lossy(bytes), format)
    }

    /// Parses a fetched response body, using its final URL as base
    ///
    /// Outcomes without a body produce an empty document.
    pub fn from_outcome(outcome: &FetchOutcome, format: DocumentFormat) -> Self {
        let document = match &outcome.body {
            Some(body) => Self::parse_bytes(body, format),
            None => Self::empty(),
        };
        match &outcome.final_url {
            Some(url) => document.with_base_url(url.clone()),
            None => document,
        }
    }

    /// Sets the URL this document was retrieved from
    pub fn with_base_url(mut self, url: Url) -> Self {
        self.base_url = Some(url);
        self
    }

    /// URL relative links resolve against
    ///
    /// A `<base href>` in the document wins over the retrieval URL.
    pub fn base_url(&self) -> Option<Url> {
        let declared = Selector::parse("base[href]")
            .ok()
            .and_then(|selector| {
                self.html
                    .select(&selector)
                    .next()
                    .and_then(|base| base.value().attr("href"))
                    .map(str::to_string)
            });

        match (declared, &self.base_url) {
            (Some(href), Some(origin)) => origin.join(href.trim()).ok().or(Some(origin.clone())),
            (Some(href), None) => Url::parse(href.trim()).ok(),
            (None, origin) => origin.clone(),
        }
    }

    /// The underlying tree
    pub fn html(&self) -> &Html {
        &self.html
    }

    /// Returns true when the document holds no content
    ///
    /// Implicit `html`/`head`/`body` wrappers and whitespace do not count.
    pub fn is_empty(&self) -> bool {
        self.html.tree.root().descendants().all(|node| match node.value() {
            Node::Element(element) => matches!(element.name(), "html" | "head" | "body"),
            Node::Text(text) => text.trim().is_empty(),
            _ => true,
        })
    }

    /// Serializes the tree as indented markup
    ///
    /// Output is deterministic: parsing the same input twice yields
    /// byte-identical text.
    pub fn prettify(&self) -> String {
        pretty::prettify(&self.html)
    }
}

/// Parses a source without network access
///
/// URL sources are read as paths here; use `Normalizer` to fetch them.
pub fn parse_local(source: Source, format: DocumentFormat) -> Result<Document, HarvestError> {
    match source {
        Source::Text(text) => Ok(Document::parse(&text, format)),
        Source::Bytes(bytes) => Ok(Document::parse_bytes(&bytes, format)),
        Source::Response(outcome) => Ok(Document::from_outcome(&outcome, format)),
        Source::Reader(mut reader) => {
            let mut buffer = Vec::new();
            reader.read_to_end(&mut buffer)?;
            Ok(Document::parse_bytes(&buffer, format))
        }
        Source::Path(path) => read_path(path, format),
        Source::Url(input) => read_path(PathBuf::from(input), format),
        Source::Empty => Ok(Document::empty()),
    }
}

fn read_path(path: PathBuf, format: DocumentFormat) -> Result<Document, HarvestError> {
    match std::fs::read(&path) {
        Ok(bytes) => Ok(Document::parse_bytes(&bytes, format)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(HarvestError::NotFound {
            path: path.display().to_string(),
        }),
        Err(e) => Err(e.into()),
    }
}

/// Normalizes any `Source` into a `Document`
#[derive(Clone)]
pub struct Normalizer {
    fetcher: Fetcher,
}

impl Normalizer {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    /// Parses `source`, fetching it first when it is a URL
    ///
    /// URLs get a single attempt without retry; whatever body comes back is
    /// parsed regardless of status.
    ///
    /// # Returns
    ///
    /// * `Ok(Document)` - The parsed document (possibly empty)
    /// * `Err(NotFound)` - A path source does not exist
    pub async fn parse(
        &self,
        source: Source,
        format: DocumentFormat,
    ) -> Result<Document, HarvestError> {
        match source {
            Source::Url(input) if parse_web_url(&input).is_some() => {
                let outcome = self.fetcher.fetch(&FetchRequest::get(input)).await?;
                tracing::debug!("Fetched document with status {}", outcome.status);
                Ok(Document::from_outcome(&outcome, format))
            }
            other => parse_local(other, format),
        }
    }
}
