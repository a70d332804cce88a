use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub urls: UrlsConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub secondary: SecondaryConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub content_type: ContentTypeConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UrlsConfig {
    #[serde(default = "default_blocklist")]
    pub blocklist: Vec<String>,
    #[serde(default = "default_urls_output")]
    pub output: PathBuf,
}

impl Default for UrlsConfig {
    fn default() -> Self {
        Self {
            blocklist: default_blocklist(),
            output: default_urls_output(),
        }
    }
}

fn default_blocklist() -> Vec<String> {
    vec!["content.icloud.com".to_string()]
}
fn default_urls_output() -> PathBuf {
    PathBuf::from("urls.txt")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractConfig {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_signature")]
    pub signature: String,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            signature: default_signature(),
        }
    }
}

fn default_max_depth() -> usize {
    64
}
fn default_signature() -> String {
    "bplist".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SecondaryConfig {
    #[serde(default = "default_marker")]
    pub marker: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for SecondaryConfig {
    fn default() -> Self {
        Self {
            marker: default_marker(),
            enabled: true,
        }
    }
}

fn default_marker() -> String {
    "sms.db".to_string()
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct IndexConfig {
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContentTypeConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_command")]
    pub command: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ContentTypeConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            command: default_command(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_backend() -> String {
    "file".to_string()
}
fn default_command() -> String {
    "file".to_string()
}
fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    #[serde(default = "default_export_suffix")]
    pub suffix: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            suffix: default_export_suffix(),
        }
    }
}

fn default_export_suffix() -> String {
    "_output".to_string()
}

impl Config {
    /// Checks bounds and enum values. Called by [`load_config`]; callers that
    /// build a `Config` in code can call it directly.
    pub fn validate(&self) -> Result<()> {
        if self.extract.max_depth == 0 {
            anyhow::bail!("extract.max_depth must be >= 1");
        }
        if self.extract.signature.is_empty() {
            anyhow::bail!("extract.signature must not be empty");
        }
        if self.secondary.enabled && self.secondary.marker.is_empty() {
            anyhow::bail!("secondary.marker must not be empty when secondary.enabled is true");
        }
        if self.content_type.timeout_secs == 0 {
            anyhow::bail!("content_type.timeout_secs must be >= 1");
        }
        if self.urls.blocklist.iter().any(|b| b.is_empty()) {
            // An empty entry is a substring of every URL.
            anyhow::bail!("urls.blocklist must not contain empty entries");
        }

        match self.content_type.backend.as_str() {
            "file" | "signature" => {}
            other => anyhow::bail!(
                "Unknown content_type backend: '{}'. Must be file or signature.",
                other
            ),
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}
