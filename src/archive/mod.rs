//! Archive normalizer.
//!
//! Turns a directory of mixed report archives into a set of decoded XML
//! documents inside a [`ScratchArea`]. Containers (zip) are processed first,
//! then single-stream compressed files (gzip), each group in file-name order.
//!
//! Discovery is non-recursive: only regular files directly inside the input
//! directory are considered.

mod container;
mod scratch;
mod stream;

pub use container::extract_container;
pub use scratch::ScratchArea;
pub use stream::decompress_stream;

use crate::error::{ArchiveFault, IngestError};
use crate::models::{FailurePolicy, FileFailure};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Kind of report archive, decided by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveKind {
    /// Multi-file container; every entry is extracted.
    Container,
    /// Single compressed stream; decompressed to `<name>.xml`.
    Stream,
}

/// Settings for discovery and extraction.
#[derive(Debug, Clone)]
pub struct NormalizeConfig {
    /// Extensions treated as containers (without dot).
    pub container_extensions: Vec<String>,
    /// Extensions treated as compressed streams (without dot).
    pub stream_extensions: Vec<String>,
    /// Upper bound for one decoded document in bytes.
    pub max_document_bytes: u64,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            container_extensions: vec!["zip".to_string()],
            stream_extensions: vec!["gz".to_string()],
            max_document_bytes: 100 * 1024 * 1024,
        }
    }
}

impl From<&crate::config::IngestConfig> for NormalizeConfig {
    fn from(config: &crate::config::IngestConfig) -> Self {
        Self {
            container_extensions: config.container_extensions.clone(),
            stream_extensions: config.stream_extensions.clone(),
            max_document_bytes: config.max_document_bytes,
        }
    }
}

impl NormalizeConfig {
    /// Classify a file name by its final extension, ignoring ASCII case.
    pub fn detect_kind(&self, name: &str) -> Option<ArchiveKind> {
        let (_, ext) = name.rsplit_once('.')?;
        let matches = |list: &[String]| list.iter().any(|e| e.eq_ignore_ascii_case(ext));

        if matches(&self.container_extensions) {
            Some(ArchiveKind::Container)
        } else if matches(&self.stream_extensions) {
            Some(ArchiveKind::Stream)
        } else {
            None
        }
    }
}

/// A decoded XML document in the scratch area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedDocument {
    /// Location of the decoded bytes.
    pub path: PathBuf,
    /// Archive it was recovered from.
    pub origin: PathBuf,
    /// Entry name inside a container; `None` for compressed streams.
    pub entry: Option<PathBuf>,
}

impl DecodedDocument {
    /// Name of the document in terms of the input directory, e.g.
    /// `/in/a.zip/r.xml` or `/in/r.xml.gz`. Outlives the scratch area.
    pub fn source(&self) -> PathBuf {
        match self.entry {
            Some(ref entry) => self.origin.join(entry),
            None => self.origin.clone(),
        }
    }
}

/// Archives found in the input directory, grouped by kind.
#[derive(Debug, Clone, Default)]
pub struct Discovered {
    pub containers: Vec<PathBuf>,
    pub streams: Vec<PathBuf>,
}

impl Discovered {
    pub fn len(&self) -> usize {
        self.containers.len() + self.streams.len()
    }
}

/// Output of a normalization pass.
#[derive(Debug, Default)]
pub struct Normalized {
    /// Documents in processing order.
    pub documents: Vec<DecodedDocument>,
    /// Archives skipped under the lenient policy.
    pub failures: Vec<FileFailure>,
}

/// Check that the input directory exists and is a readable directory.
pub fn check_input_dir(input: &Path) -> Result<(), IngestError> {
    let precondition = |reason: String| IngestError::Precondition {
        path: input.to_path_buf(),
        reason,
    };

    let metadata = std::fs::metadata(input).map_err(|e| precondition(e.to_string()))?;
    if !metadata.is_dir() {
        return Err(precondition("not a directory".to_string()));
    }
    std::fs::read_dir(input).map_err(|e| precondition(e.to_string()))?;

    Ok(())
}

/// List report archives directly inside `input`, sorted by file name.
pub fn discover(input: &Path, config: &NormalizeConfig) -> Result<Discovered, IngestError> {
    check_input_dir(input)?;

    let mut found = Discovered::default();
    let walker = WalkDir::new(input)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(IngestError::Precondition {
                    path: input.to_path_buf(),
                    reason: e.to_string(),
                })
            }
            Err(e) => {
                debug!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        let Some(kind) = config.detect_kind(&entry.file_name().to_string_lossy()) else {
            debug!("Ignoring unrecognized file {}", entry.path().display());
            continue;
        };

        // Symlinks are resolved here; a dangling link with an archive name is
        // kept so that opening it reports an error against that file.
        let is_file = if entry.path_is_symlink() {
            std::fs::metadata(entry.path()).map_or(true, |m| m.is_file())
        } else {
            entry.file_type().is_file()
        };
        if !is_file {
            debug!("Skipping non-file {}", entry.path().display());
            continue;
        }

        match kind {
            ArchiveKind::Container => found.containers.push(entry.into_path()),
            ArchiveKind::Stream => found.streams.push(entry.into_path()),
        }
    }

    Ok(found)
}

/// Discover and decode every archive in `input` into `scratch`.
///
/// Under [`FailurePolicy::Strict`] the first bad archive aborts the pass.
/// Under [`FailurePolicy::Lenient`] it is recorded and skipped; any documents
/// it produced before failing are left out.
pub fn normalize(
    input: &Path,
    scratch: &ScratchArea,
    config: &NormalizeConfig,
    policy: FailurePolicy,
) -> Result<Normalized, IngestError> {
    let found = discover(input, config)?;
    debug!("{} archive(s) in {}", found.len(), input.display());
    info!(
        "Found {} container(s) and {} compressed stream(s)",
        found.containers.len(),
        found.streams.len()
    );

    let mut normalized = Normalized::default();

    for archive in &found.containers {
        let result = extract_container(archive, scratch, config.max_document_bytes);
        if let Some(docs) = policy.isolate(result, &mut normalized.failures)? {
            normalized.documents.extend(docs);
        }
    }

    for archive in &found.streams {
        let result = decompress_stream(archive, scratch, config.max_document_bytes);
        if let Some(doc) = policy.isolate(result, &mut normalized.failures)? {
            normalized.documents.push(doc);
        }
    }

    Ok(normalized)
}

/// Copy at most `limit` bytes; more than that is an error.
pub(crate) fn copy_limited<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    limit: u64,
) -> Result<u64, ArchiveFault> {
    let copied = io::copy(&mut reader.take(limit.saturating_add(1)), writer)?;
    if copied > limit {
        return Err(ArchiveFault::TooLarge { limit });
    }
    Ok(copied)
}
