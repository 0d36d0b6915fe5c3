//! Error taxonomy for the ingestion pipeline.
//!
//! Every error that is tied to a single input file carries that file's path,
//! so the caller can always name the offending archive or document.

use crate::models::{FailureStage, FileFailure};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error returned by the pipeline.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The input directory is missing, not a directory, or unreadable.
    #[error("Input directory {} is not usable: {reason}", .path.display())]
    Precondition { path: PathBuf, reason: String },

    /// The scratch area could not be created or written.
    #[error("Scratch storage failure: {0}")]
    Scratch(#[source] io::Error),

    /// A container or compressed stream could not be opened or decoded.
    #[error("Failed to unpack {}: {source}", .path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: ArchiveFault,
    },

    /// A decoded document could not be read or is not well-formed XML.
    #[error("Failed to read {} as XML: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseFault,
    },

    /// A document is well-formed but lacks the DMARC aggregate structure.
    #[error("{} does not match the DMARC aggregate schema: {source}", .path.display())]
    Schema {
        path: PathBuf,
        #[source]
        source: SchemaError,
    },
}

impl IngestError {
    /// Whether this error concerns a single input file and may be skipped
    /// under the lenient policy.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            IngestError::Archive { .. } | IngestError::Parse { .. } | IngestError::Schema { .. }
        )
    }

    /// Re-point a parse or schema error at `source`, the document's name in
    /// the input directory. Other errors are returned unchanged.
    pub fn attributed_to(self, source: PathBuf) -> Self {
        match self {
            IngestError::Parse { source: fault, .. } => IngestError::Parse {
                path: source,
                source: fault,
            },
            IngestError::Schema { source: fault, .. } => IngestError::Schema {
                path: source,
                source: fault,
            },
            other => other,
        }
    }

    /// Describe a per-file error as a [`FileFailure`]; `None` for run-level errors.
    pub fn to_failure(&self) -> Option<FileFailure> {
        let (path, stage, message) = match self {
            IngestError::Archive { path, source } => {
                (path, FailureStage::Archive, source.to_string())
            }
            IngestError::Parse { path, source } => {
                (path, FailureStage::Parse, source.to_string())
            }
            IngestError::Schema { path, source } => {
                (path, FailureStage::Schema, source.to_string())
            }
            IngestError::Precondition { .. } | IngestError::Scratch(_) => return None,
        };
        Some(FileFailure {
            path: path.clone(),
            stage,
            message,
        })
    }
}

/// Why an archive could not be unpacked.
#[derive(Error, Debug)]
pub enum ArchiveFault {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Corrupt zip container: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Entry name escapes the extraction root: {0}")]
    UnsafeEntryName(String),

    #[error("Decoded payload exceeds {limit} bytes")]
    TooLarge { limit: u64 },
}

/// Why a decoded document could not be read as XML.
#[derive(Error, Debug)]
pub enum ParseFault {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Document is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),

    #[error("Unsupported document encoding {0:?}")]
    UnsupportedEncoding(String),

    #[error("{0}")]
    Xml(#[from] roxmltree::Error),
}

/// Structural mismatch against the DMARC aggregate-report schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Root element is <{found}>, expected <feedback>")]
    MissingFeedback { found: String },

    #[error("Required element {path} is missing")]
    Missing { path: String },

    #[error("Element {path} occurs {count} times, expected exactly one")]
    Ambiguous { path: String, count: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_level_errors_have_no_failure() {
        let precondition = IngestError::Precondition {
            path: PathBuf::from("/missing"),
            reason: "does not exist".to_string(),
        };
        assert!(!precondition.is_per_file());
        assert!(precondition.to_failure().is_none());

        let schema = IngestError::Schema {
            path: PathBuf::from("a.xml"),
            source: SchemaError::Missing {
                path: "record[0].row".to_string(),
            },
        };
        assert!(schema.is_per_file());
        let failure = schema.to_failure().unwrap();
        assert_eq!(failure.stage, FailureStage::Schema);
        assert!(failure.message.contains("record[0].row"));
    }

    #[test]
    fn test_attributed_to_renames_document_errors_only() {
        let err = IngestError::Schema {
            path: PathBuf::from("/tmp/dmarcsift-x/a.zip/r.xml"),
            source: SchemaError::MissingFeedback {
                found: "report".to_string(),
            },
        }
        .attributed_to(PathBuf::from("/in/a.zip/r.xml"));
        assert_eq!(
            err.to_failure().unwrap().path,
            PathBuf::from("/in/a.zip/r.xml")
        );

        let err = IngestError::Archive {
            path: PathBuf::from("/in/a.zip"),
            source: ArchiveFault::TooLarge { limit: 1 },
        }
        .attributed_to(PathBuf::from("/elsewhere"));
        assert_eq!(err.to_failure().unwrap().path, PathBuf::from("/in/a.zip"));
    }

    #[test]
    fn test_to_failure() {
        let err = IngestError::Parse {
            path: PathBuf::from("doc.xml"),
            source: ParseFault::Io(io::Error::new(io::ErrorKind::NotFound, "gone")),
        };
        let failure = err.to_failure().unwrap();
        assert_eq!(failure.stage, FailureStage::Parse);
        assert_eq!(failure.path, PathBuf::from("doc.xml"));
        assert!(failure.message.contains("gone"));

        assert!(IngestError::Scratch(io::Error::new(io::ErrorKind::Other, "x"))
            .to_failure()
            .is_none());
    }

    #[test]
    fn test_messages_name_the_file() {
        let err = IngestError::Archive {
            path: PathBuf::from("/in/bad.zip"),
            source: ArchiveFault::UnsafeEntryName("../evil.xml".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("/in/bad.zip"));
        assert!(msg.contains("unpack"));
    }

    #[test]
    fn test_schema_error_paths() {
        let err = SchemaError::Ambiguous {
            path: "record[1].row.source_ip".to_string(),
            count: 2,
        };
        assert_eq!(
            err.to_string(),
            "Element record[1].row.source_ip occurs 2 times, expected exactly one"
        );
    }
}
