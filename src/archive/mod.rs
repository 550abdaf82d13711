//! Page archiving
//!
//! Fetches a page once and stores it as indented markup on disk.

use crate::crawler::{FetchRequest, Fetcher};
use crate::document::{Document, DocumentFormat};
use crate::HarvestError;
use std::path::{Path, PathBuf};

/// Extension given to destinations that have none
pub const DEFAULT_EXTENSION: &str = "html";

/// Saves fetched pages as normalized snapshots
#[derive(Clone)]
pub struct PageArchiver {
    fetcher: Fetcher,
}

impl PageArchiver {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    /// Fetches `url` once and writes it to `destination`
    ///
    /// The page is fetched without retry. An unusable status is logged
    /// together with the URL and reported as `false`; nothing is written in
    /// that case. Existing files are overwritten.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The page was written
    /// * `Ok(false)` - The fetch did not produce a usable page
    /// * `Err(InvalidUrl)` - `url` is malformed
    /// * `Err(Io)` - The destination could not be written
    pub async fn save(
        &self,
        url: &str,
        destination: &Path,
        allow_redirects: bool,
    ) -> Result<bool, HarvestError> {
        let request = FetchRequest::get(url).with_redirects(allow_redirects);
        let outcome = self.fetcher.fetch(&request).await?;

        if !outcome.is_usable() {
            tracing::warn!("Error {} caused by URL: {}", outcome.status, url);
            return Ok(false);
        }

        let markup = Document::from_outcome(&outcome, DocumentFormat::Html).prettify();
        let path = with_default_extension(destination);
        tokio::fs::write(&path, markup.as_bytes()).await?;

        tracing::debug!("Archived {} to {}", url, path.display());
        Ok(true)
    }
}

/// Appends `.html` when `destination` has no extension
pub fn with_default_extension(destination: &Path) -> PathBuf {
    if destination.extension().is_some() {
        destination.to_path_buf()
    } else {
        destination.with_extension(DEFAULT_EXTENSION)
    }
}

/// Archive path for an item identifier inside `dir`
///
/// Characters that cannot appear in a file name are replaced with `_`.
pub fn destination_for(dir: &Path, identifier: &str) -> PathBuf {
    let name: String = identifier
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let name = match name.trim() {
        "" | "." | ".." => "_".to_string(),
        trimmed => trimmed.to_string(),
    };
    dir.join(format!("{}.{}", name, DEFAULT_EXTENSION))
}
