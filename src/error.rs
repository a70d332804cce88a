//! Error taxonomy for the correlation and extraction engine.
//!
//! Only [`HarnessError::Storage`] raised for the primary manifest aborts a
//! run. Every other variant is isolated to one row, file, or leaf: the
//! caller logs it, counts it, and keeps going.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    /// Manifest missing, unreadable, or not a recognized database.
    #[error("storage error for {path}: {reason}")]
    Storage { path: PathBuf, reason: String },

    /// A row that cannot be normalized into a manifest record.
    #[error("malformed row {key}: {reason}")]
    Row { key: String, reason: String },

    /// An embedded document that failed to parse.
    #[error("embedded document decode failed: {0}")]
    Decode(String),

    /// Unreadable directory or file during the walk or the export copy.
    #[error("filesystem error at {path}: {reason}")]
    Filesystem { path: PathBuf, reason: String },

    /// External content-type lookup failed or timed out.
    #[error("content-type lookup failed for {path}: {reason}")]
    ContentType { path: PathBuf, reason: String },

    #[error("recursion limit exceeded at depth {depth}")]
    RecursionLimitExceeded { depth: usize },
}

impl HarnessError {
    pub fn storage(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        HarnessError::Storage {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn row(key: impl ToString, reason: impl ToString) -> Self {
        HarnessError::Row {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn filesystem(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        HarnessError::Filesystem {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn content_type(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        HarnessError::ContentType {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// True for the one category that aborts a run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HarnessError::Storage { .. })
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;
