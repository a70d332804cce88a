//! Joins catalog records with the filesystem index.
//!
//! A record whose identifier names an indexed blob gets its absolute path
//! and a content type. A failed content-type lookup leaves the type at
//! `"Unknown"` but keeps the path. Records without a blob stay unresolved
//! and are invisible to every query.

use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::content_type::ContentTypeResolver;
use crate::fs_index::FilesystemIndex;
use crate::models::{ManifestRecord, UNKNOWN};
use crate::normalize::Catalog;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CorrelationStats {
    pub records: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub content_type_failures: usize,
}

struct Resolution {
    path: PathBuf,
    content_type: Option<String>,
}

async fn resolve_record(
    record: &ManifestRecord,
    index: &FilesystemIndex,
    resolver: &dyn ContentTypeResolver,
) -> Option<Resolution> {
    let path = index.get(&record.identifier)?;
    let content_type = match resolver.resolve(path).await {
        Ok(label) => Some(label),
        Err(e) => {
            warn!(identifier = %record.identifier, "{}", e);
            None
        }
    };
    Some(Resolution {
        path: path.to_path_buf(),
        content_type,
    })
}

/// Fill in `resolved_path` and `content_type` for every record with a blob.
pub async fn correlate(
    catalog: &mut Catalog,
    index: &FilesystemIndex,
    resolver: &dyn ContentTypeResolver,
) -> CorrelationStats {
    let mut stats = CorrelationStats::default();

    for record in catalog.iter_mut() {
        stats.records += 1;
        let Some(resolution) = resolve_record(record, index, resolver).await else {
            stats.unresolved += 1;
            continue;
        };

        stats.resolved += 1;
        record.resolved_path = Some(resolution.path);
        record.content_type = match resolution.content_type {
            Some(label) => label,
            None => {
                stats.content_type_failures += 1;
                UNKNOWN.to_string()
            }
        };
    }

    info!(
        resolver = resolver.name(),
        records = stats.records,
        resolved = stats.resolved,
        unresolved = stats.unresolved,
        content_type_failures = stats.content_type_failures,
        "correlated records with backup blobs"
    );
    stats
}
