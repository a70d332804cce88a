//! Record normalization, the record catalog, and the secondary-database marker.
//!
//! Positional contract for manifest rows: column 0 identifier, 1 domain,
//! 2 path hint, 3 auxiliary flag, 4 payload. Extra trailing columns are
//! ignored.
//!
//! Two ambiguity policies live here and are both first-wins:
//! - [`Catalog::insert`] keeps the first record for an identifier and
//!   counts later ones as duplicates.
//! - [`SmsMarker::observe`] latches onto the first record whose path hint
//!   contains the marker filename; later matches are counted and ignored.

use std::collections::btree_map::{self, BTreeMap};
use tracing::{debug, warn};

use crate::error::{HarnessError, Result};
use crate::models::{ManifestRecord, RawRow};
use crate::value::Value;

/// Minimum number of columns a manifest row must carry.
pub const FIELD_COUNT: usize = 5;

/// Convert one raw row into a record with unresolved path and content type.
pub fn normalize_row(row: &RawRow) -> Result<ManifestRecord> {
    if row.columns.len() < FIELD_COUNT {
        return Err(HarnessError::row(
            row.label(),
            format!(
                "expected at least {} columns, found {}",
                FIELD_COUNT,
                row.columns.len()
            ),
        ));
    }

    let identifier = text_field(row, 0, "identifier")?;
    if identifier.is_empty() {
        return Err(HarnessError::row(row.label(), "empty identifier"));
    }
    let domain = text_field(row, 1, "domain")?;
    let path_hint = text_field(row, 2, "path hint")?;

    Ok(ManifestRecord::new(
        identifier,
        domain,
        path_hint,
        row.columns[3].clone(),
        row.columns[4].clone(),
    ))
}

fn text_field(row: &RawRow, idx: usize, name: &str) -> Result<String> {
    let value = &row.columns[idx];
    match value {
        Value::Scalar(_) => value
            .scalar_text()
            .map(|t| t.into_owned())
            .ok_or_else(|| HarnessError::row(row.label(), format!("{} is null", name))),
        Value::Bytes(bytes) => String::from_utf8(bytes.clone())
            .map_err(|_| HarnessError::row(row.label(), format!("{} is not valid UTF-8", name))),
        other => Err(HarnessError::row(
            row.label(),
            format!("{} has unsupported shape {}", name, other.kind()),
        )),
    }
}

/// Normalized records keyed by identifier.
#[derive(Debug, Default)]
pub struct Catalog {
    records: BTreeMap<String, ManifestRecord>,
    /// Records dropped because their identifier was already present.
    pub duplicates: usize,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless the identifier is taken. Returns `false` when the
    /// record was dropped.
    pub fn insert(&mut self, record: ManifestRecord) -> bool {
        match self.records.entry(record.identifier.clone()) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
            btree_map::Entry::Occupied(_) => {
                warn!(identifier = %record.identifier, "duplicate identifier, keeping first record");
                self.duplicates += 1;
                false
            }
        }
    }

    pub fn get(&self, identifier: &str) -> Option<&ManifestRecord> {
        self.records.get(identifier)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn resolved_count(&self) -> usize {
        self.records.values().filter(|r| r.is_resolved()).count()
    }

    /// Records in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &ManifestRecord> {
        self.records.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ManifestRecord> {
        self.records.values_mut()
    }
}

/// Points at the manifest record of the secondary SMS database, if any.
#[derive(Debug, Clone)]
pub struct SmsMarker {
    needle: String,
    identifier: Option<String>,
    /// Later matches that were ignored.
    pub ignored: usize,
}

impl SmsMarker {
    pub fn new(needle: impl Into<String>) -> Self {
        Self {
            needle: needle.into(),
            identifier: None,
            ignored: 0,
        }
    }

    /// Latch onto `record` if its path hint names the secondary database and
    /// nothing was latched yet. Returns `true` when this call set the marker.
    pub fn observe(&mut self, record: &ManifestRecord) -> bool {
        if self.needle.is_empty() || !record.path_hint.contains(&self.needle) {
            return false;
        }
        match &self.identifier {
            None => {
                debug!(identifier = %record.identifier, path = %record.path_hint, "secondary database located");
                self.identifier = Some(record.identifier.clone());
                true
            }
            Some(existing) if existing == &record.identifier => false,
            Some(existing) => {
                warn!(
                    kept = %existing,
                    ignored = %record.identifier,
                    path = %record.path_hint,
                    "another record matches the secondary database name, ignoring it"
                );
                self.ignored += 1;
                false
            }
        }
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }
}
