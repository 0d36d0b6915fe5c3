//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation, default values, and the interactive
//! prompt for the reports directory.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

/// Prompt shown when `--reports` is not given.
pub const REPORTS_PROMPT: &str = "Path to directory with DMARC reports";

/// dmarcsift - flatten DMARC aggregate reports into one table
///
/// Reads every .zip and .gz DMARC aggregate report in a directory and
/// prints one row per reported source: source IP, DKIM, SPF, disposition.
///
/// Examples:
///   dmarcsift --reports ./reports
///   dmarcsift --reports ./reports --format csv --output results.csv
///   dmarcsift --reports ./reports --lenient --format json
///   dmarcsift --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to directory with DMARC reports
    ///
    /// Only files directly inside the directory are read. When omitted,
    /// the path is asked for interactively.
    #[arg(short, long, value_name = "DIR", env = "DMARCSIFT_REPORTS")]
    pub reports: Option<PathBuf>,

    /// Write the output to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (table, csv, json)
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Skip unreadable archives and malformed reports instead of aborting
    ///
    /// Skipped files are listed on stderr and in JSON output.
    #[arg(long)]
    pub lenient: bool,

    /// Number of documents parsed concurrently
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .dmarcsift.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Do not print the record summary after the table
    #[arg(long)]
    pub no_summary: bool,

    /// Generate a default .dmarcsift.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the dataset.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Aligned text table (default)
    #[default]
    Table,
    /// Comma-separated values
    Csv,
    /// JSON document
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(0) = self.concurrency {
            return Err("Concurrency must be at least 1".to_string());
        }

        if let Some(ref output) = self.output {
            if output.is_dir() {
                return Err(format!("Output path is a directory: {}", output.display()));
            }
        }

        Ok(())
    }

    /// The reports directory from `--reports`, or asked for on stdin.
    pub fn reports_dir(&self) -> io::Result<PathBuf> {
        match self.reports {
            Some(ref dir) => Ok(dir.clone()),
            None => prompt_reports_dir(&mut io::stdin().lock(), &mut io::stderr()),
        }
    }
}

/// Ask for the reports directory until a non-empty answer is given.
pub fn prompt_reports_dir<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> io::Result<PathBuf> {
    loop {
        write!(output, "{}: ", REPORTS_PROMPT)?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "no reports directory given",
            ));
        }

        let answer = line.trim();
        if !answer.is_empty() {
            return Ok(PathBuf::from(answer));
        }
    }
}

/// Resolve `path` against the current directory without touching the filesystem.
pub fn resolve_path(path: &Path) -> io::Result<PathBuf> {
    std::path::absolute(path)
}
