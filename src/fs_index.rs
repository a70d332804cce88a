//! Filesystem indexer for the backup's blob store.
//!
//! Walks the storage root once and maps every regular file's name (the
//! content-addressed identifier) to its absolute path.
//!
//! Duplicate names resolve last-seen-wins. The walk is bottom-up and sorted
//! by file name, so "last" is deterministic: the entry visited latest in
//! that order replaces earlier ones, and the replacement is counted.

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::HarnessError;

#[derive(Debug, Default, Clone)]
pub struct FilesystemIndex {
    root: PathBuf,
    entries: HashMap<String, PathBuf>,
    /// Names seen more than once; each replacement counts once.
    pub duplicates: usize,
    /// Directories or files the walk could not read.
    pub skipped: usize,
}

impl FilesystemIndex {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn get(&self, name: &str) -> Option<&Path> {
        self.entries.get(name).map(PathBuf::as_path)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, name: String, path: PathBuf) {
        if let Some(previous) = self.entries.insert(name, path) {
            self.duplicates += 1;
            debug!(replaced = %previous.display(), "duplicate blob name, keeping last seen");
        }
    }
}

/// Index every regular file under `root`, skipping unreadable entries and
/// paths (relative to `root`) that match `exclude_globs`.
pub fn index_backup(root: &Path, exclude_globs: &[String]) -> Result<FilesystemIndex> {
    if !root.is_dir() {
        return Err(HarnessError::filesystem(root, "backup root is not a directory").into());
    }

    let root = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    let exclude_set = build_globset(exclude_globs)?;

    let mut index = FilesystemIndex {
        root: root.clone(),
        ..Default::default()
    };

    let walker = WalkDir::new(&root).contents_first(true).sort_by_file_name();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
                warn!("{}", HarnessError::filesystem(path, &e));
                index.skipped += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(&root).unwrap_or(path);
        if exclude_set.is_match(relative) {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        index.insert(name, path.to_path_buf());
    }

    info!(
        root = %root.display(),
        files = index.len(),
        duplicates = index.duplicates,
        skipped = index.skipped,
        "indexed backup blobs"
    );
    Ok(index)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, body: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    #[test]
    fn indexes_nested_files_by_name() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "ab/ab12cd", b"one");
        write(tmp.path(), "ff/ffee00", b"two");
        write(tmp.path(), "Manifest.db", b"");

        let index = index_backup(tmp.path(), &[]).unwrap();
        assert_eq!(index.len(), 3);
        assert!(index.get("ab12cd").unwrap().ends_with("ab/ab12cd"));
        assert!(index.get("ab12cd").unwrap().is_absolute());
        assert!(index.contains("Manifest.db"));
        assert!(index.get("missing").is_none());
    }

    #[test]
    fn duplicate_names_keep_last_seen() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "0a/dup", b"first");
        write(tmp.path(), "1b/dup", b"second");

        let index = index_backup(tmp.path(), &[]).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.duplicates, 1);
        assert!(index.get("dup").unwrap().ends_with("1b/dup"));
    }

    #[test]
    fn exclude_globs_apply_to_relative_paths() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "ab/ab12cd", b"one");
        write(tmp.path(), "Manifest.plist", b"");

        let index = index_backup(tmp.path(), &["*.plist".to_string()]).unwrap();
        assert!(index.contains("ab12cd"));
        assert!(!index.contains("Manifest.plist"));
    }

    #[test]
    fn missing_root_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(index_backup(&tmp.path().join("gone"), &[]).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_directory_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "ok/visible", b"1");
        write(tmp.path(), "locked/hidden", b"2");
        let locked = tmp.path().join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        let index = index_backup(tmp.path(), &[]).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(index.contains("visible"));
        // Running as root bypasses the permission bits.
        if !index.contains("hidden") {
            assert!(index.skipped >= 1);
        }
    }
}
