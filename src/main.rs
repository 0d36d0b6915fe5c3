//! dmarcsift - DMARC aggregate report flattener
//!
//! A CLI tool that unpacks zip and gzip DMARC aggregate reports from a
//! directory, parses every `<record>` and prints one table of
//! source / DKIM / SPF / disposition rows.
//!
//! Exit codes:
//!   0 - Success (including lenient runs that skipped files)
//!   1 - Any error (missing directory, corrupt archive, malformed report, ...)

mod analysis;
mod archive;
mod cli;
mod config;
mod error;
mod models;
mod parser;
mod pipeline;
mod report;
#[cfg(test)]
mod test_support;

use anyhow::{Context, Result};
use cli::Args;
use config::{Config, CONFIG_FILE_NAME};
use pipeline::PipelineOptions;
use std::io::Write;
use std::path::Path;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration first so its verbosity applies to logging
    let config = match prepare_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(config.log_level(args.quiet));

    info!("dmarcsift v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    debug!("Configuration: {:?}", config);

    match run(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .dmarcsift.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to change archive extensions, failure policy, and output.");
    Ok(())
}

/// Initialize logging at `level`.
///
/// Logs go to stderr so that table, CSV and JSON output on stdout stay clean.
/// `RUST_LOG` overrides the level derived from the config and flags.
fn init_logging(level: tracing::Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete ingestion workflow. Returns the exit code.
async fn run(args: Args, config: Config) -> Result<i32> {
    // Resolve the reports directory
    let reports = args
        .reports_dir()
        .context("Failed to read the reports directory")?;
    let reports = cli::resolve_path(&reports)
        .with_context(|| format!("Failed to resolve {}", reports.display()))?;

    if !args.quiet {
        eprintln!("Working with reports at {}", reports.display());
    }

    // Ingest
    let options = PipelineOptions::from_config(&config, !args.quiet);
    let outcome = pipeline::run(&reports, &options)
        .await
        .with_context(|| format!("Failed to process reports in {}", reports.display()))?;

    // Render
    let output = report::render(&outcome, config.report.format, config.report.show_summary)?;

    match args.output {
        Some(ref path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write output to {}", path.display()))?;
            if !args.quiet {
                eprintln!(
                    "✅ Wrote {} record(s) to {}",
                    outcome.dataset.len(),
                    path.display()
                );
            }
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(output.as_bytes())
                .context("Failed to write output")?;
            stdout.flush().context("Failed to write output")?;
        }
    }

    if !outcome.is_complete() && !args.quiet {
        eprintln!(
            "\n⚠️  {} file(s) were skipped; the dataset is partial:",
            outcome.failures.len()
        );
        for failure in &outcome.failures {
            eprintln!(
                "   - {} ({} error): {}",
                failure.path.display(),
                failure.stage,
                failure.message
            );
        }
    }

    Ok(0)
}

/// Load the config file, apply CLI overrides and validate the result.
fn prepare_config(args: &Args) -> Result<Config> {
    let mut config = load_config(args)?;
    config.merge_with_args(args);
    config.validate()?;
    Ok(config)
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is set up, so problems are reported on stderr directly.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("⚠️  Ignoring {}: {:#}", CONFIG_FILE_NAME, e);
            Ok(Config::default())
        }
    }
}
