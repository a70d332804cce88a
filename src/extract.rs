//! Recursive value extractor.
//!
//! Walks any [`Value`] and records every URL reachable from a textual leaf
//! into the run's [`UrlSet`]. Byte blobs whose lossy text carries the
//! embedded-document signature are decoded and walked as well.
//!
//! Dispatch per variant:
//!
//! | Variant | Action |
//! |---------|--------|
//! | `Scalar` | scan its text form |
//! | `Bytes` | decode an embedded document if the signature is present and walk it, then scan the lossy text |
//! | `Mapping` | scan each key, walk each value |
//! | `Sequence` | walk each element, same order and arity |
//! | `Set` | walk each member, equal results collapse |
//!
//! Every walk returns a freshly built tree and never mutates its input. A
//! `Bytes` leaf comes back as the original bytes: the decoded document is
//! explored for URLs but not substituted into the returned tree.
//!
//! Depth is bounded by [`ExtractContext::max_depth`]. Each container level
//! and each embedded decode adds one. A subtree past the ceiling is returned
//! untouched and not scanned.

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::HarnessError;
use crate::models::RawRow;
use crate::plist_decode::decode_embedded;
use crate::urls::{scan_urls, Blocklist, UrlSet};
use crate::value::Value;

/// Counters for one run, reported in the summary.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExtractStats {
    pub rows: usize,
    pub leaves_scanned: usize,
    pub embedded_decoded: usize,
    pub decode_failures: usize,
    pub depth_limit_hits: usize,
}

/// State shared by every walk in a run: the result set, the blocklist, and
/// the limits. Owned by the top-level run and passed down by reference.
#[derive(Debug)]
pub struct ExtractContext {
    pub urls: UrlSet,
    pub blocklist: Blocklist,
    pub max_depth: usize,
    pub signature: String,
    pub stats: ExtractStats,
    /// Label of the row being walked, for warnings.
    origin: String,
}

impl ExtractContext {
    pub fn new(blocklist: Blocklist, max_depth: usize, signature: impl Into<String>) -> Self {
        Self {
            urls: UrlSet::new(),
            blocklist,
            max_depth,
            signature: signature.into(),
            stats: ExtractStats::default(),
            origin: String::new(),
        }
    }

    /// Walk every column of a raw row as one sequence.
    pub fn extract_row(&mut self, row: &RawRow) {
        self.origin = row.label();
        self.stats.rows += 1;
        for column in &row.columns {
            self.walk(column, 1);
        }
        self.origin.clear();
    }

    /// Walk `value` from the top and return its reconstruction.
    pub fn extract_value(&mut self, value: &Value) -> Value {
        self.walk(value, 0)
    }

    fn walk(&mut self, value: &Value, depth: usize) -> Value {
        if depth > self.max_depth {
            self.depth_exceeded(depth, value.kind());
            return value.clone();
        }

        match value {
            Value::Scalar(scalar) => {
                if let Some(text) = scalar.as_text() {
                    self.scan(&text);
                }
                value.clone()
            }
            Value::Bytes(bytes) => {
                let text = lossy_ascii(bytes);
                if text.contains(self.signature.as_str()) {
                    self.walk_embedded(bytes, depth);
                }
                self.scan(&text);
                value.clone()
            }
            Value::Mapping(map) => Value::Mapping(
                map.iter()
                    .map(|(key, inner)| {
                        self.scan(key);
                        (key.clone(), self.walk(inner, depth + 1))
                    })
                    .collect(),
            ),
            Value::Sequence(items) => {
                Value::Sequence(items.iter().map(|item| self.walk(item, depth + 1)).collect())
            }
            Value::Set(members) => {
                let walked: Vec<Value> = members.iter().map(|m| self.walk(m, depth + 1)).collect();
                Value::set(walked)
            }
        }
    }

    fn walk_embedded(&mut self, bytes: &[u8], depth: usize) {
        let root_depth = depth + 1;
        if root_depth > self.max_depth {
            self.depth_exceeded(root_depth, "embedded document");
            return;
        }

        match decode_embedded(bytes, &self.signature, self.max_depth - root_depth) {
            Ok(document) => {
                self.stats.embedded_decoded += 1;
                if document.truncated {
                    self.depth_exceeded(self.max_depth + 1, "embedded document");
                }
                debug!(
                    origin = %self.origin,
                    kind = document.value.kind(),
                    "walking embedded document"
                );
                self.walk(&document.value, root_depth);
            }
            Err(e) => {
                self.stats.decode_failures += 1;
                warn!(origin = %self.origin, "{}, treating blob as opaque bytes", e);
            }
        }
    }

    fn depth_exceeded(&mut self, depth: usize, kind: &str) {
        self.stats.depth_limit_hits += 1;
        warn!(
            origin = %self.origin,
            kind,
            "{}, leaving subtree unexplored",
            HarnessError::RecursionLimitExceeded { depth }
        );
    }

    fn scan(&mut self, text: &str) {
        self.stats.leaves_scanned += 1;
        for url in scan_urls(text) {
            self.urls.insert(url, &self.blocklist);
        }
    }
}

/// Keep only ASCII bytes, dropping everything else.
pub fn lossy_ascii(bytes: &[u8]) -> String {
    bytes
        .iter()
        .filter(|b| b.is_ascii())
        .map(|&b| char::from(b))
        .collect()
}
