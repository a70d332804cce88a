//! Run orchestration.
//!
//! Stage order is fixed and single-threaded:
//! index → load → normalize + extract → correlate → secondary database →
//! queries → export → URL file.
//!
//! [`analyze`] runs everything up to and including the secondary database
//! pass and has no output side effects. [`run_scan`] adds the reporting,
//! export, and URL-file stages used by the `bkh` binary.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::content_type::build_resolver;
use crate::correlate::{correlate, CorrelationStats};
use crate::export::{export_dir_name, export_records, ExportSummary};
use crate::extract::{ExtractContext, ExtractStats};
use crate::fs_index::{index_backup, FilesystemIndex};
use crate::manifest::{check_database, load_manifest};
use crate::models::ManifestRecord;
use crate::normalize::{normalize_row, Catalog, SmsMarker};
use crate::query::{print_report, report_json, run_query, Query};
use crate::urls::{write_url_file, Blocklist};

/// Totals reported at the end of a run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RunSummary {
    pub rows_loaded: usize,
    pub rows_skipped: usize,
    pub failed_tables: usize,
    pub records: usize,
    pub duplicate_identifiers: usize,
    pub files_indexed: usize,
    pub correlation: CorrelationStats,
    pub extract: ExtractStats,
    pub urls_found: usize,
    pub urls_blocked: usize,
    /// Rows walked from the secondary database, when it was processed.
    pub secondary_rows: Option<usize>,
    pub urls_written: Option<usize>,
    pub export: Option<ExportSummary>,
    /// URL file or export folder that could not be written.
    pub output_failures: usize,
}

/// Everything the pipeline knows after the analysis stages.
#[derive(Debug)]
pub struct Analysis {
    pub catalog: Catalog,
    pub index: FilesystemIndex,
    pub context: ExtractContext,
    pub sms: SmsMarker,
    pub summary: RunSummary,
}

/// Run index, load, normalize/extract, correlate, and the secondary pass.
///
/// Fails only when the manifest itself is missing or not a database, or
/// when the configuration names an unusable backend.
pub async fn analyze(config: &Config, manifest: &Path) -> Result<Analysis> {
    check_database(manifest)?;

    let root = manifest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let index = index_backup(root, &config.index.exclude_globs)?;

    let loaded = load_manifest(manifest).await?;
    if loaded.rows.is_empty() {
        warn!("no rows found in {}", manifest.display());
    }

    let mut context = ExtractContext::new(
        Blocklist::new(config.urls.blocklist.iter().cloned()),
        config.extract.max_depth,
        config.extract.signature.clone(),
    );
    let mut sms = SmsMarker::new(config.secondary.marker.clone());
    let mut catalog = Catalog::new();
    let mut summary = RunSummary {
        rows_loaded: loaded.rows.len(),
        rows_skipped: loaded.skipped_rows,
        failed_tables: loaded.failed_tables,
        files_indexed: index.len(),
        ..Default::default()
    };

    for row in &loaded.rows {
        context.extract_row(row);
        match normalize_row(row) {
            Ok(record) => {
                sms.observe(&record);
                catalog.insert(record);
            }
            Err(e) => {
                warn!("{}", e);
                summary.rows_skipped += 1;
            }
        }
    }

    let resolver = build_resolver(&config.content_type)?;
    summary.correlation = correlate(&mut catalog, &index, resolver.as_ref()).await;

    if config.secondary.enabled {
        summary.secondary_rows = process_secondary(&catalog, &sms, &mut context).await;
    }

    summary.records = catalog.len();
    summary.duplicate_identifiers = catalog.duplicates;
    summary.extract = context.stats;
    summary.urls_found = context.urls.len();
    summary.urls_blocked = context.urls.blocked;

    Ok(Analysis {
        catalog,
        index,
        context,
        sms,
        summary,
    })
}

/// Walk every row of the marked secondary database with the run's context.
/// Returns the number of rows walked, or `None` when there was nothing to
/// process or the database could not be read.
async fn process_secondary(
    catalog: &Catalog,
    sms: &SmsMarker,
    context: &mut ExtractContext,
) -> Option<usize> {
    let identifier = sms.identifier()?;
    let Some(record) = catalog.get(identifier) else {
        warn!(identifier, "secondary database record missing from catalog");
        return None;
    };
    let Some(path) = record.resolved_path() else {
        warn!(
            identifier,
            path = %record.path_hint,
            "secondary database is not present on disk"
        );
        return None;
    };

    match load_manifest(path).await {
        Ok(loaded) => {
            for row in &loaded.rows {
                context.extract_row(row);
            }
            info!(
                path = %path.display(),
                rows = loaded.rows.len(),
                "walked secondary database"
            );
            Some(loaded.rows.len())
        }
        Err(e) => {
            warn!("skipping secondary database: {}", e);
            None
        }
    }
}

/// Output options for [`run_scan`].
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub queries: Vec<Query>,
    pub export: bool,
    /// Parent of the timestamped export folder.
    pub export_base: PathBuf,
    /// Overrides `[urls] output`.
    pub urls_out: Option<PathBuf>,
    pub json: bool,
}

/// Full run: analysis, query reports, optional export, URL file, summary.
pub async fn run_scan(config: &Config, manifest: &Path, options: &ScanOptions) -> Result<RunSummary> {
    let analysis = analyze(config, manifest)
        .await
        .with_context(|| format!("Failed to analyze {}", manifest.display()))?;
    let Analysis {
        catalog,
        context,
        mut summary,
        ..
    } = analysis;

    let mut selected: BTreeSet<&str> = BTreeSet::new();
    let mut reports = Vec::new();
    for query in &options.queries {
        let result = run_query(&catalog, query);
        if options.json {
            reports.push(report_json(&result));
        } else {
            print_report(&result);
        }
        selected.extend(result.records.iter().map(|r| r.identifier.as_str()));
    }

    if options.export {
        let records: Vec<&ManifestRecord> =
            selected.iter().filter_map(|id| catalog.get(id)).collect();
        let dir_name = export_dir_name(&chrono::Local::now(), &config.export.suffix);
        match export_records(&records, &options.export_base, &dir_name) {
            Ok(export) => summary.export = Some(export),
            Err(e) => {
                warn!("export skipped: {:#}", e);
                summary.output_failures += 1;
            }
        }
    }

    let urls_out = options
        .urls_out
        .clone()
        .unwrap_or_else(|| config.urls.output.clone());
    match write_url_file(&context.urls, &urls_out) {
        Ok(written) => summary.urls_written = written,
        Err(e) => {
            warn!("URLs not saved: {:#}", e);
            summary.output_failures += 1;
        }
    }

    if options.json {
        let out = serde_json::json!({
            "queries": reports,
            "summary": summary,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_summary(manifest, &summary);
    }

    Ok(summary)
}

fn print_summary(manifest: &Path, summary: &RunSummary) {
    println!("scan {}", manifest.display());
    println!("  rows loaded: {}", summary.rows_loaded);
    println!("  rows skipped: {}", summary.rows_skipped);
    if summary.failed_tables > 0 {
        println!("  tables failed: {}", summary.failed_tables);
    }
    println!("  records: {}", summary.records);
    if summary.duplicate_identifiers > 0 {
        println!("  duplicate identifiers dropped: {}", summary.duplicate_identifiers);
    }
    println!("  files indexed: {}", summary.files_indexed);
    println!("  files correlated: {}", summary.correlation.resolved);
    println!(
        "  content-type failures: {}",
        summary.correlation.content_type_failures
    );
    println!("  embedded documents decoded: {}", summary.extract.embedded_decoded);
    println!("  decode failures: {}", summary.extract.decode_failures);
    if summary.extract.depth_limit_hits > 0 {
        println!("  recursion limit hits: {}", summary.extract.depth_limit_hits);
    }
    if let Some(rows) = summary.secondary_rows {
        println!("  secondary database rows: {}", rows);
    }
    println!("  urls found: {}", summary.urls_found);
    println!("  urls blocked: {}", summary.urls_blocked);
    if let Some(export) = &summary.export {
        println!(
            "  exported: {} files to {}",
            export.copied,
            export.dir.display()
        );
    }
    if summary.output_failures > 0 {
        println!("  output failures: {}", summary.output_failures);
    }
    println!("ok");
}

/// Elapsed wall time as `MM:SS`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_is_minutes_and_seconds() {
        assert_eq!(format_elapsed(Duration::from_secs(0)), "00:00");
        assert_eq!(format_elapsed(Duration::from_millis(59_999)), "00:59");
        assert_eq!(format_elapsed(Duration::from_secs(61)), "01:01");
        assert_eq!(format_elapsed(Duration::from_secs(3_725)), "62:05");
    }

    #[tokio::test]
    async fn non_database_manifest_is_fatal() {
        let tmp = tempfile::TempDir::new().unwrap();
        let manifest = tmp.path().join("Manifest.db");
        std::fs::write(&manifest, b"plain text pretending to be a database").unwrap();

        let err = analyze(&Config::default(), &manifest).await.unwrap_err();
        assert!(err.to_string().contains("not a SQLite 3 database"));
    }
}
