//! URL evidence: the pattern scan, the blocklist, and the result set.
//!
//! Scanning and filtering are separate steps: [`scan_urls`] reports every
//! candidate, and [`UrlSet::insert`] applies the blocklist at the point of
//! insertion.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info};

/// `http://` or `https://` followed by the longest run of non-whitespace.
static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("URL pattern is valid"));

/// Every URL-looking substring of `text`, in order of appearance.
pub fn scan_urls(text: &str) -> impl Iterator<Item = &str> {
    URL_PATTERN.find_iter(text).map(|m| m.as_str())
}

/// Substrings that disqualify a URL wherever they occur in it.
#[derive(Debug, Clone, Default)]
pub struct Blocklist {
    entries: Vec<String>,
}

impl Blocklist {
    pub fn new(entries: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            entries: entries.into_iter().map(Into::into).collect(),
        }
    }

    /// The first entry contained in `url`, if any.
    pub fn matching_entry(&self, url: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| url.contains(entry.as_str()))
            .map(String::as_str)
    }

    pub fn is_blocked(&self, url: &str) -> bool {
        self.matching_entry(url).is_some()
    }
}

/// Deduplicated URLs collected over one run.
#[derive(Debug, Default, Clone)]
pub struct UrlSet {
    urls: BTreeSet<String>,
    /// Candidates rejected by the blocklist, counted per attempt.
    pub blocked: usize,
}

impl UrlSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `url` unless the blocklist rejects it. Returns `true` if the set
    /// grew.
    pub fn insert(&mut self, url: &str, blocklist: &Blocklist) -> bool {
        if let Some(entry) = blocklist.matching_entry(url) {
            debug!(url, entry, "blocked url");
            self.blocked += 1;
            return false;
        }
        if self.urls.contains(url) {
            return false;
        }
        self.urls.insert(url.to_string())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// URLs in lexicographic order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.urls.iter().map(String::as_str)
    }
}

/// Write one URL per line. An empty set skips the write entirely and
/// returns `None`; otherwise returns the number of lines written.
pub fn write_url_file(urls: &UrlSet, path: &Path) -> Result<Option<usize>> {
    if urls.is_empty() {
        info!("no URLs found, skipping write to {}", path.display());
        return Ok(None);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create folder for URL file: {}", path.display()))?;
    }

    let mut body = String::new();
    for url in urls.iter() {
        body.push_str(url);
        body.push('\n');
    }
    std::fs::write(path, body)
        .with_context(|| format!("Failed to write URL file: {}", path.display()))?;

    info!("wrote {} URLs to {}", urls.len(), path.display());
    Ok(Some(urls.len()))
}
