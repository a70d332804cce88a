//! Core data models that flow through the correlation pipeline.
//!
//! A [`RawRow`] is what the loader reads from one table row; a
//! [`ManifestRecord`] is its normalized form, later filled in with the
//! on-disk location and content type by the correlator.

use std::path::{Path, PathBuf};

use crate::value::Value;

/// Placeholder for a path or content type that was never resolved.
pub const UNKNOWN: &str = "Unknown";

/// One data row read from a table, columns in declaration order.
#[derive(Debug, Clone)]
pub struct RawRow {
    pub table: String,
    /// Textual form of column 0, used only to label log lines.
    pub key: String,
    pub columns: Vec<Value>,
}

impl RawRow {
    /// `table/key` label used in warnings.
    pub fn label(&self) -> String {
        format!("{}/{}", self.table, self.key)
    }
}

/// A normalized manifest entry.
#[derive(Debug, Clone)]
pub struct ManifestRecord {
    /// Content-addressed identifier; also the on-disk blob name.
    pub identifier: String,
    pub domain: String,
    /// Relative path of the logical file inside its domain.
    pub path_hint: String,
    pub auxiliary: Value,
    pub payload: Value,
    /// Absolute blob path, once correlated.
    pub resolved_path: Option<PathBuf>,
    pub content_type: String,
}

impl ManifestRecord {
    pub fn new(
        identifier: String,
        domain: String,
        path_hint: String,
        auxiliary: Value,
        payload: Value,
    ) -> Self {
        Self {
            identifier,
            domain,
            path_hint,
            auxiliary,
            payload,
            resolved_path: None,
            content_type: UNKNOWN.to_string(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved_path.is_some()
    }

    pub fn resolved_path(&self) -> Option<&Path> {
        self.resolved_path.as_deref()
    }

    /// Resolved path for display, or [`UNKNOWN`].
    pub fn resolved_path_display(&self) -> String {
        match &self.resolved_path {
            Some(p) => p.display().to_string(),
            None => UNKNOWN.to_string(),
        }
    }
}
