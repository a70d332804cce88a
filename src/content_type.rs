//! Content-type lookup for correlated blobs.
//!
//! Two backends implement [`ContentTypeResolver`]:
//!
//! - [`FileCommand`] runs the host's `file --brief --mime-type` under a
//!   per-call timeout.
//! - [`SignatureSniffer`] reads the first bytes and matches a small table of
//!   magic numbers. It needs nothing from the host.
//!
//! Callers treat any error as `"Unknown"`; see [`crate::correlate`].

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncReadExt;

use crate::config::ContentTypeConfig;
use crate::error::{HarnessError, Result};

/// Resolves a file on disk to a MIME-style content-type label.
#[async_trait]
pub trait ContentTypeResolver: Send + Sync {
    /// Backend name for logs and the summary.
    fn name(&self) -> &str;

    async fn resolve(&self, path: &Path) -> Result<String>;
}

/// Build the backend named in the configuration.
pub fn build_resolver(config: &ContentTypeConfig) -> Result<Box<dyn ContentTypeResolver>> {
    match config.backend.as_str() {
        "file" => Ok(Box::new(FileCommand::new(
            config.command.clone(),
            Duration::from_secs(config.timeout_secs),
        ))),
        "signature" => Ok(Box::new(SignatureSniffer)),
        other => Err(HarnessError::content_type(
            Path::new(""),
            format!("unknown backend '{}'", other),
        )),
    }
}

// ─── External `file` command ────────────────────────────────────────────

pub struct FileCommand {
    program: String,
    timeout: Duration,
}

impl FileCommand {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ContentTypeResolver for FileCommand {
    fn name(&self) -> &str {
        "file"
    }

    async fn resolve(&self, path: &Path) -> Result<String> {
        let mut command = tokio::process::Command::new(&self.program);
        command
            .arg("--brief")
            .arg("--mime-type")
            .arg(path)
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                HarnessError::content_type(path, format!("timed out after {:?}", self.timeout))
            })?
            .map_err(|e| HarnessError::content_type(path, format!("{}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HarnessError::content_type(
                path,
                format!("{} exited with {}: {}", self.program, output.status, stderr.trim()),
            ));
        }

        let label = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if label.is_empty() {
            return Err(HarnessError::content_type(path, "empty output"));
        }
        Ok(label)
    }
}

// ─── Built-in signature table ───────────────────────────────────────────

/// Bytes read from the head of each file.
const SNIFF_LEN: usize = 64;

pub struct SignatureSniffer;

#[async_trait]
impl ContentTypeResolver for SignatureSniffer {
    fn name(&self) -> &str {
        "signature"
    }

    async fn resolve(&self, path: &Path) -> Result<String> {
        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|e| HarnessError::content_type(path, e))?;
        let mut head = Vec::with_capacity(SNIFF_LEN);
        (&mut file)
            .take(SNIFF_LEN as u64)
            .read_to_end(&mut head)
            .await
            .map_err(|e| HarnessError::content_type(path, e))?;
        Ok(sniff(&head).to_string())
    }
}

/// Classify a file by its leading bytes.
pub fn sniff(head: &[u8]) -> &'static str {
    if head.is_empty() {
        return "application/x-empty";
    }
    if head.starts_with(b"SQLite format 3\0") {
        return "application/vnd.sqlite3";
    }
    if head.starts_with(b"bplist") {
        return "application/x-bplist";
    }
    if head.starts_with(b"\x89PNG\r\n\x1a\n") {
        return "image/png";
    }
    if head.starts_with(&[0xff, 0xd8, 0xff]) {
        return "image/jpeg";
    }
    if head.starts_with(b"GIF87a") || head.starts_with(b"GIF89a") {
        return "image/gif";
    }
    if head.starts_with(b"%PDF-") {
        return "application/pdf";
    }
    if head.starts_with(b"PK\x03\x04") {
        return "application/zip";
    }
    if head.len() >= 12 && &head[4..8] == b"ftyp" {
        return match &head[8..12] {
            b"heic" | b"heix" | b"hevc" | b"mif1" => "image/heic",
            b"qt  " => "video/quicktime",
            b"M4A " => "audio/x-m4a",
            _ => "video/mp4",
        };
    }
    if head.starts_with(b"<?xml") {
        return "text/xml";
    }
    if looks_like_text(head) {
        return "text/plain";
    }
    "application/octet-stream"
}

fn looks_like_text(head: &[u8]) -> bool {
    // A multi-byte character may be cut at the sniff boundary.
    let valid = match std::str::from_utf8(head) {
        Ok(s) => s,
        Err(e) if e.error_len().is_none() => match std::str::from_utf8(&head[..e.valid_up_to()]) {
            Ok(s) => s,
            Err(_) => return false,
        },
        Err(_) => return false,
    };
    valid
        .chars()
        .all(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
}
