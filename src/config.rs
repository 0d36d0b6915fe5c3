//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.dmarcsift.toml` files.

use crate::cli::OutputFormat;
use crate::models::FailurePolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name, looked up in the current directory.
pub const CONFIG_FILE_NAME: &str = ".dmarcsift.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Archive discovery and failure handling.
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Output settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Number of documents parsed at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    1
}

/// Ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Extensions of multi-file containers.
    #[serde(default = "default_container_extensions")]
    pub container_extensions: Vec<String>,

    /// Extensions of single-stream compressed reports.
    #[serde(default = "default_stream_extensions")]
    pub stream_extensions: Vec<String>,

    /// Largest decoded document accepted, in bytes.
    #[serde(default = "default_max_document_bytes")]
    pub max_document_bytes: u64,

    /// `strict` aborts on the first bad file, `lenient` skips and reports it.
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            container_extensions: default_container_extensions(),
            stream_extensions: default_stream_extensions(),
            max_document_bytes: default_max_document_bytes(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

fn default_container_extensions() -> Vec<String> {
    vec!["zip".to_string()]
}

fn default_stream_extensions() -> Vec<String> {
    vec!["gz".to_string()]
}

fn default_max_document_bytes() -> u64 {
    100 * 1024 * 1024 // 100MB
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Output format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Print record counts after the table.
    #[serde(default = "default_true")]
    pub show_summary: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            show_summary: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// Only values the user actually passed override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }

        if args.lenient {
            self.ingest.failure_policy = FailurePolicy::Lenient;
        }

        if let Some(format) = args.format {
            self.report.format = format;
        }

        if args.no_summary {
            self.report.show_summary = false;
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Log level for this run. `quiet` wins over `general.verbose`.
    pub fn log_level(&self, quiet: bool) -> tracing::Level {
        if quiet {
            tracing::Level::ERROR
        } else if self.general.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Check values that serde cannot constrain.
    pub fn validate(&self) -> Result<()> {
        if self.general.concurrency == 0 {
            anyhow::bail!("general.concurrency must be at least 1");
        }
        if self.ingest.container_extensions.is_empty() && self.ingest.stream_extensions.is_empty() {
            anyhow::bail!("At least one container or stream extension must be configured");
        }
        if self.ingest.max_document_bytes == 0 {
            anyhow::bail!("ingest.max_document_bytes must be greater than zero");
        }
        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
