//! Data models for the report pipeline.
//!
//! This module contains the records produced by parsing, the dataset that
//! collects them, and the bookkeeping for files that failed under the
//! lenient policy.

use crate::error::IngestError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use tracing::warn;

/// One authentication-outcome row taken from a `<record>` element.
///
/// All fields are kept verbatim as reported; nothing is validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResult {
    /// Reporting-source IP address.
    pub source: String,
    /// DKIM evaluation outcome.
    pub dkim: String,
    /// SPF evaluation outcome.
    pub spf: String,
    /// Policy disposition applied by the receiver.
    pub disposition: String,
}

impl AuthResult {
    /// Column names in output order.
    pub const COLUMNS: [&'static str; 4] = ["source", "dkim", "spf", "disposition"];

    /// Field values in column order.
    pub fn fields(&self) -> [&str; 4] {
        [&self.source, &self.dkim, &self.spf, &self.disposition]
    }
}

/// Ordered, append-only collection of every parsed row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportDataset {
    records: Vec<AuthResult>,
}

impl ReportDataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one document's rows, keeping their order.
    pub fn extend(&mut self, rows: impl IntoIterator<Item = AuthResult>) {
        self.records.extend(rows);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[AuthResult] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AuthResult> {
        self.records.iter()
    }
}

impl<'a> IntoIterator for &'a ReportDataset {
    type Item = &'a AuthResult;
    type IntoIter = std::slice::Iter<'a, AuthResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// What to do when a single archive or document cannot be processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Abort the whole run on the first bad file.
    #[default]
    Strict,
    /// Record the bad file, skip it, and keep going.
    Lenient,
}

impl FailurePolicy {
    /// Apply the policy to one file's result.
    ///
    /// Returns `Ok(None)` when a per-file error was recorded in `failures`
    /// and processing should continue. Run-level errors always propagate.
    pub fn isolate<T>(
        self,
        result: Result<T, IngestError>,
        failures: &mut Vec<FileFailure>,
    ) -> Result<Option<T>, IngestError> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if self == FailurePolicy::Lenient && e.is_per_file() => {
                if let Some(failure) = e.to_failure() {
                    warn!("Skipping {}: {}", failure.path.display(), failure.message);
                    failures.push(failure);
                }
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// Pipeline stage a lenient-mode failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    Archive,
    Parse,
    Schema,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureStage::Archive => write!(f, "archive"),
            FailureStage::Parse => write!(f, "parse"),
            FailureStage::Schema => write!(f, "schema"),
        }
    }
}

/// A file skipped under the lenient policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileFailure {
    /// Offending archive or decoded document.
    pub path: PathBuf,
    /// Stage that rejected it.
    pub stage: FailureStage,
    /// Human-readable reason.
    pub message: String,
}

/// Result of one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct IngestOutcome {
    /// All rows that were parsed successfully.
    pub dataset: ReportDataset,
    /// Files skipped under the lenient policy. Always empty in strict mode.
    pub failures: Vec<FileFailure>,
    /// Number of decoded documents handed to the parser.
    pub documents: usize,
}

impl IngestOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Counts shown beneath the table output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSummary {
    /// Total number of rows.
    pub total: usize,
    /// Number of distinct source addresses.
    pub distinct_sources: usize,
    /// Rows per disposition value.
    pub by_disposition: BTreeMap<String, usize>,
}

impl DatasetSummary {
    /// Creates a summary from a dataset.
    pub fn from_dataset(dataset: &ReportDataset) -> Self {
        let mut summary = Self {
            total: dataset.len(),
            ..Self::default()
        };

        let mut sources = std::collections::BTreeSet::new();
        for record in dataset {
            sources.insert(record.source.as_str());
            *summary
                .by_disposition
                .entry(record.disposition.clone())
                .or_insert(0) += 1;
        }
        summary.distinct_sources = sources.len();

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(source: &str, disposition: &str) -> AuthResult {
        AuthResult {
            source: source.to_string(),
            dkim: "pass".to_string(),
            spf: "fail".to_string(),
            disposition: disposition.to_string(),
        }
    }

    #[test]
    fn test_dataset_preserves_insertion_order() {
        let mut dataset = ReportDataset::new();
        dataset.extend(vec![row("10.0.0.2", "none"), row("10.0.0.1", "none")]);
        dataset.extend(vec![row("10.0.0.0", "reject")]);

        let sources: Vec<_> = dataset.iter().map(|r| r.source.as_str()).collect();
        assert_eq!(sources, vec!["10.0.0.2", "10.0.0.1", "10.0.0.0"]);
    }

    #[test]
    fn test_fields_follow_columns() {
        let r = row("192.0.2.1", "quarantine");
        assert_eq!(r.fields(), ["192.0.2.1", "pass", "fail", "quarantine"]);
        assert_eq!(AuthResult::COLUMNS[3], "disposition");
    }

    #[test]
    fn test_summary() {
        let mut dataset = ReportDataset::new();
        dataset.extend(vec![
            row("192.0.2.1", "none"),
            row("192.0.2.1", "reject"),
            row("192.0.2.7", "none"),
        ]);

        let summary = DatasetSummary::from_dataset(&dataset);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.distinct_sources, 2);
        assert_eq!(summary.by_disposition.get("none"), Some(&2));
        assert_eq!(summary.by_disposition.get("reject"), Some(&1));
    }

    #[test]
    fn test_isolate() {
        let mut failures = Vec::new();
        let bad = || {
            Err::<(), _>(IngestError::Parse {
                path: PathBuf::from("x.xml"),
                source: crate::error::ParseFault::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "bad",
                )),
            })
        };

        assert_eq!(
            FailurePolicy::Lenient.isolate(Ok(7), &mut failures).unwrap(),
            Some(7)
        );
        assert!(FailurePolicy::Lenient
            .isolate(bad(), &mut failures)
            .unwrap()
            .is_none());
        assert_eq!(failures.len(), 1);

        assert!(FailurePolicy::Strict.isolate(bad(), &mut failures).is_err());
        assert_eq!(failures.len(), 1);
    }

    #[test]
    fn test_dataset_serializes_as_array() {
        let mut dataset = ReportDataset::new();
        dataset.extend(vec![row("192.0.2.1", "none")]);
        let json = serde_json::to_value(&dataset).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["source"], "192.0.2.1");
    }
}
