//! # Backup Harness CLI (`bkh`)
//!
//! ## Usage
//!
//! ```bash
//! bkh [--config ./bkh.toml] [-v|-q] <MANIFEST> [queries] [--export]
//! ```
//!
//! The backup root is the directory containing `<MANIFEST>`.
//!
//! ## Examples
//!
//! ```bash
//! # Harvest URLs only
//! bkh ./backup/Manifest.db
//!
//! # Report every camera roll blob and copy it out
//! bkh ./backup/Manifest.db --domain CameraRollDomain --export --export-dir ./out
//!
//! # Everything that looks like a SQLite database, as JSON
//! bkh ./backup/Manifest.db --content-type sqlite --json
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use backup_harness::config::{self, Config};
use backup_harness::pipeline::{format_elapsed, run_scan, ScanOptions};
use backup_harness::query::Query;

/// Backup Harness: correlate a backup manifest with its blobs and harvest
/// URLs from every row.
#[derive(Parser)]
#[command(
    name = "bkh",
    version,
    about = "Correlate a mobile backup manifest with its blobs and harvest URLs"
)]
struct Cli {
    /// Path to configuration file (TOML). Built-in defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Debug-level logging.
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Warnings and errors only.
    #[arg(short, long)]
    quiet: bool,

    /// Path to the backup's manifest database (e.g. `Manifest.db`).
    manifest: PathBuf,

    /// Report resolved records whose domain equals NAME.
    #[arg(long, value_name = "NAME")]
    domain: Option<String>,

    /// Report resolved records whose content type contains SUBSTR.
    #[arg(long, value_name = "SUBSTR")]
    content_type: Option<String>,

    /// Report resolved records whose path hint contains SUBSTR.
    #[arg(long, value_name = "SUBSTR")]
    path_hint: Option<String>,

    /// Copy every queried record's blob into a timestamped folder.
    #[arg(long)]
    export: bool,

    /// Parent directory for the export folder.
    #[arg(long, value_name = "DIR", default_value = ".")]
    export_dir: PathBuf,

    /// Where to write harvested URLs; overrides `[urls] output`.
    #[arg(long, value_name = "PATH")]
    urls_out: Option<PathBuf>,

    /// Print query reports and the summary as JSON.
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn queries(&self) -> Vec<Query> {
        let mut queries = Vec::new();
        if let Some(d) = &self.domain {
            queries.push(Query::Domain(d.clone()));
        }
        if let Some(t) = &self.content_type {
            queries.push(Query::ContentType(t.clone()));
        }
        if let Some(p) = &self.path_hint {
            queries.push(Query::PathHint(p.clone()));
        }
        queries
    }

    fn default_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.default_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    let queries = cli.queries();
    if cli.export && queries.is_empty() {
        anyhow::bail!("--export needs at least one of --domain, --content-type, --path-hint");
    }

    let cfg = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => Config::default(),
    };

    let options = ScanOptions {
        queries,
        export: cli.export,
        export_base: cli.export_dir.clone(),
        urls_out: cli.urls_out.clone(),
        json: cli.json,
    };

    let started = Instant::now();
    run_scan(&cfg, &cli.manifest, &options).await?;
    eprintln!("elapsed: {}", format_elapsed(started.elapsed()));

    Ok(())
}
