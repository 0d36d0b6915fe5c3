//! One ingestion run: normalize archives, parse documents, aggregate rows.
//!
//! The scratch area is created after the input directory has been checked
//! and is removed before [`run`] returns, whichever stage failed.

use crate::analysis::{aggregate, aggregate_concurrent};
use crate::archive::{self, NormalizeConfig, ScratchArea};
use crate::config::Config;
use crate::error::IngestError;
use crate::models::{FailurePolicy, IngestOutcome};
use crate::parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tracing::info;

/// Settings for one run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub normalize: NormalizeConfig,
    pub policy: FailurePolicy,
    /// Documents parsed at once; 1 parses on the calling task.
    pub concurrency: usize,
    pub show_progress: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            normalize: NormalizeConfig::default(),
            policy: FailurePolicy::Strict,
            concurrency: 1,
            show_progress: false,
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &Config, show_progress: bool) -> Self {
        Self {
            normalize: NormalizeConfig::from(&config.ingest),
            policy: config.ingest.failure_policy,
            concurrency: config.general.concurrency.max(1),
            show_progress,
        }
    }
}

/// Run the whole pipeline over the archives directly inside `input`.
pub async fn run(input: &Path, options: &PipelineOptions) -> Result<IngestOutcome, IngestError> {
    archive::check_input_dir(input)?;

    let scratch = ScratchArea::create()?;
    let result = run_in(input, &scratch, options).await;
    scratch.close();

    result
}

async fn run_in(
    input: &Path,
    scratch: &ScratchArea,
    options: &PipelineOptions,
) -> Result<IngestOutcome, IngestError> {
    let normalized = archive::normalize(input, scratch, &options.normalize, options.policy)?;
    info!("Decoded {} document(s)", normalized.documents.len());

    let progress = progress_bar(normalized.documents.len() as u64, options.show_progress);
    let tick = progress.clone();
    let parse = move |path: &Path| {
        let parsed = parser::parse_document(path);
        tick.inc(1);
        parsed
    };

    let result = if options.concurrency > 1 {
        aggregate_concurrent(
            &normalized.documents,
            parse,
            options.policy,
            options.concurrency,
        )
        .await
    } else {
        aggregate(&normalized.documents, parse, options.policy)
    };
    progress.finish_and_clear();

    let mut outcome = result?;
    let mut failures = normalized.failures;
    failures.append(&mut outcome.failures);
    outcome.failures = failures;

    info!(
        "Collected {} record(s) from {} document(s)",
        outcome.dataset.len(),
        outcome.documents
    );
    Ok(outcome)
}

fn progress_bar(len: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len);
    if let Ok(style) =
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FailureStage;
    use crate::test_support::{report_xml, write_gzip, write_zip};
    use std::fs;

    fn run_blocking(input: &Path, options: &PipelineOptions) -> Result<IngestOutcome, IngestError> {
        tokio_test::block_on(run(input, options))
    }

    fn lenient() -> PipelineOptions {
        PipelineOptions {
            policy: FailurePolicy::Lenient,
            ..PipelineOptions::default()
        }
    }

    #[test]
    fn test_container_with_two_documents() {
        let input = tempfile::tempdir().unwrap();
        let first = report_xml(&[
            ("192.0.2.1", "pass", "pass", "none"),
            ("192.0.2.2", "fail", "pass", "none"),
            ("192.0.2.3", "fail", "fail", "reject"),
        ]);
        let second = report_xml(&[
            ("198.51.100.1", "pass", "fail", "quarantine"),
            ("198.51.100.2", "pass", "pass", "none"),
        ]);
        write_zip(
            &input.path().join("reports.zip"),
            &[("first.xml", &first), ("second.xml", &second)],
        );

        let outcome = run_blocking(input.path(), &PipelineOptions::default()).unwrap();
        assert_eq!(outcome.dataset.len(), 5);
        assert_eq!(outcome.documents, 2);
        assert_eq!(outcome.dataset.records()[3].source, "198.51.100.1");
        assert!(outcome.is_complete());
    }

    #[test]
    fn test_single_gzip_report() {
        let input = tempfile::tempdir().unwrap();
        write_gzip(
            &input.path().join("report1.xml.gz"),
            &report_xml(&[("203.0.113.5", "pass", "pass", "none")]),
        );

        let outcome = run_blocking(input.path(), &PipelineOptions::default()).unwrap();
        assert_eq!(outcome.dataset.len(), 1);
        assert_eq!(outcome.dataset.records()[0].source, "203.0.113.5");
    }

    #[test]
    fn test_empty_directory() {
        let input = tempfile::tempdir().unwrap();
        let outcome = run_blocking(input.path(), &PipelineOptions::default()).unwrap();
        assert!(outcome.dataset.is_empty());
        assert_eq!(outcome.documents, 0);
    }

    #[test]
    fn test_missing_directory() {
        let input = tempfile::tempdir().unwrap();
        let err = run_blocking(&input.path().join("nope"), &PipelineOptions::default()).unwrap_err();
        assert!(matches!(err, IngestError::Precondition { .. }));
    }

    #[test]
    fn test_corrupt_container_strict() {
        let input = tempfile::tempdir().unwrap();
        fs::write(input.path().join("corrupt.zip"), b"garbage").unwrap();
        write_gzip(
            &input.path().join("good.xml.gz"),
            &report_xml(&[("203.0.113.5", "pass", "pass", "none")]),
        );

        let err = run_blocking(input.path(), &PipelineOptions::default()).unwrap_err();
        match err {
            IngestError::Archive { path, .. } => assert!(path.ends_with("corrupt.zip")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_corrupt_container_lenient() {
        let input = tempfile::tempdir().unwrap();
        fs::write(input.path().join("corrupt.zip"), b"garbage").unwrap();
        write_gzip(
            &input.path().join("good.xml.gz"),
            &report_xml(&[("203.0.113.5", "pass", "pass", "none")]),
        );

        let outcome = run_blocking(input.path(), &lenient()).unwrap();
        assert_eq!(outcome.dataset.len(), 1);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].stage, FailureStage::Archive);
        assert!(outcome.failures[0].path.ends_with("corrupt.zip"));
    }

    #[test]
    fn test_failures_keep_stage_order() {
        let input = tempfile::tempdir().unwrap();
        fs::write(input.path().join("corrupt.zip"), b"garbage").unwrap();
        write_gzip(&input.path().join("broken.xml.gz"), "<feedback><record>");

        let outcome = run_blocking(input.path(), &lenient()).unwrap();
        let stages: Vec<_> = outcome.failures.iter().map(|f| f.stage).collect();
        assert_eq!(stages, vec![FailureStage::Archive, FailureStage::Parse]);
        assert!(outcome.dataset.is_empty());
    }

    #[test]
    fn test_schema_error_aborts_strict_run() {
        let input = tempfile::tempdir().unwrap();
        write_gzip(&input.path().join("odd.xml.gz"), "<report><record/></report>");

        let err = run_blocking(input.path(), &PipelineOptions::default()).unwrap_err();
        match err {
            IngestError::Schema { path, .. } => {
                assert_eq!(path, input.path().join("odd.xml.gz"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_xml_entries_are_not_parsed() {
        let input = tempfile::tempdir().unwrap();
        let xml = report_xml(&[("192.0.2.1", "pass", "pass", "none")]);
        write_zip(
            &input.path().join("r.zip"),
            &[("report.xml", &xml), ("README.txt", "signed by example.net")],
        );

        let outcome = run_blocking(input.path(), &PipelineOptions::default()).unwrap();
        assert_eq!(outcome.dataset.len(), 1);
        assert_eq!(outcome.documents, 1);
    }

    #[test]
    fn test_clashing_entries_skip_only_that_archive() {
        let input = tempfile::tempdir().unwrap();
        write_zip(
            &input.path().join("bad.zip"),
            &[("a", "plain file"), ("a/b.xml", "<feedback/>")],
        );
        write_gzip(
            &input.path().join("good.xml.gz"),
            &report_xml(&[("203.0.113.5", "pass", "pass", "none")]),
        );

        let outcome = run_blocking(input.path(), &lenient()).unwrap();
        assert_eq!(outcome.dataset.len(), 1);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].stage, FailureStage::Archive);
        assert_eq!(outcome.failures[0].path, input.path().join("bad.zip"));
    }

    #[test]
    fn test_document_failures_name_the_archive_entry() {
        let input = tempfile::tempdir().unwrap();
        write_zip(
            &input.path().join("a.zip"),
            &[("r.xml", "<feedback><record></feedback>")],
        );

        let outcome = run_blocking(input.path(), &lenient()).unwrap();
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].path, input.path().join("a.zip").join("r.xml"));
        assert!(!outcome.failures[0]
            .path
            .to_string_lossy()
            .contains("dmarcsift-"));
    }

    #[test]
    fn test_concurrent_matches_sequential() {
        let input = tempfile::tempdir().unwrap();
        for (i, name) in ["a", "b", "c", "d"].iter().enumerate() {
            let rows: Vec<_> = (0..=i)
                .map(|_| ("192.0.2.1", "pass", "pass", *name))
                .collect();
            write_gzip(&input.path().join(format!("{name}.xml.gz")), &report_xml(&rows));
        }

        let sequential = run_blocking(input.path(), &PipelineOptions::default()).unwrap();
        let concurrent = run_blocking(
            input.path(),
            &PipelineOptions {
                concurrency: 3,
                ..PipelineOptions::default()
            },
        )
        .unwrap();

        assert_eq!(sequential.dataset, concurrent.dataset);
        assert_eq!(concurrent.dataset.len(), 10);
    }
}
