//! Copy selected blobs into a timestamped export directory.
//!
//! Destination names come from the path hint's basename with spaces turned
//! into underscores. When a name is already taken, by an earlier record in
//! this export or by a file left in a reused folder, the later record gets
//! `_<identifier>` inserted before its extension (then `_<identifier>_2`,
//! `_<identifier>_3`, ... if that is taken too). Nothing is overwritten.

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::HarnessError;
use crate::models::ManifestRecord;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub dir: PathBuf,
    pub copied: usize,
    pub skipped: usize,
    pub renamed: usize,
}

/// `YYYYmmdd-HHMMSS` followed by `suffix`.
pub fn export_dir_name<Tz: TimeZone>(now: &DateTime<Tz>, suffix: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}{}", now.format("%Y%m%d-%H%M%S"), suffix)
}

/// Sanitized basename of the record's path hint, or its identifier when the
/// hint has no basename.
pub fn sanitized_name(record: &ManifestRecord) -> String {
    let base = record
        .path_hint
        .rsplit('/')
        .find(|part| !part.is_empty())
        .unwrap_or("");
    if base.is_empty() {
        record.identifier.clone()
    } else {
        base.replace(' ', "_")
    }
}

fn disambiguate(name: &str, tag: &str) -> String {
    let path = Path::new(name);
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => format!(
            "{}_{}.{}",
            stem.to_string_lossy(),
            tag,
            ext.to_string_lossy()
        ),
        _ => format!("{}_{}", name, tag),
    }
}

/// First free destination name for `record` in `dir`, and whether it had
/// to be renamed.
fn free_name(dir: &Path, name: String, identifier: &str, used: &HashSet<String>) -> (String, bool) {
    let taken = |candidate: &str| used.contains(candidate) || dir.join(candidate).exists();
    if !taken(&name) {
        return (name, false);
    }
    let mut candidate = disambiguate(&name, identifier);
    let mut attempt = 1;
    while taken(&candidate) {
        attempt += 1;
        candidate = disambiguate(&name, &format!("{}_{}", identifier, attempt));
    }
    (candidate, true)
}

/// Copy each resolved record's blob into `base/dir_name`.
pub fn export_records(
    records: &[&ManifestRecord],
    base: &Path,
    dir_name: &str,
) -> Result<ExportSummary> {
    let dir = base.join(dir_name);
    if dir.exists() {
        warn!("export folder already exists, reusing: {}", dir.display());
    } else {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create export folder: {}", dir.display()))?;
    }

    let mut summary = ExportSummary {
        dir: dir.clone(),
        ..Default::default()
    };
    let mut used: HashSet<String> = HashSet::new();

    for record in records {
        let Some(source) = record.resolved_path() else {
            warn!(
                identifier = %record.identifier,
                path = %record.path_hint,
                "no blob on disk for record, not exported"
            );
            summary.skipped += 1;
            continue;
        };
        if !source.is_file() {
            warn!("{}", HarnessError::filesystem(source, "source not found or not a file"));
            summary.skipped += 1;
            continue;
        }

        let (name, renamed) = free_name(&dir, sanitized_name(record), &record.identifier, &used);
        if renamed {
            summary.renamed += 1;
        }
        let dest = dir.join(&name);

        match std::fs::copy(source, &dest) {
            Ok(_) => {
                info!("copied {} -> {}", source.display(), dest.display());
                used.insert(name);
                summary.copied += 1;
            }
            Err(e) => {
                warn!("{}", HarnessError::filesystem(&dest, e));
                summary.skipped += 1;
            }
        }
    }

    info!(
        dir = %summary.dir.display(),
        copied = summary.copied,
        skipped = summary.skipped,
        renamed = summary.renamed,
        "export finished"
    );
    Ok(summary)
}
