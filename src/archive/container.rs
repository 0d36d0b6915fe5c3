//! Zip container extraction.
//!
//! Every file entry is materialized under `scratch/<archive file name>/`,
//! keeping the entry's own relative path. Only entries named `*.xml` are
//! returned as documents; the rest stay on disk unparsed.

use super::{copy_limited, DecodedDocument, ScratchArea};
use crate::error::{ArchiveFault, IngestError};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, warn};
use zip::ZipArchive;

/// Extract all entries of the zip container at `archive` into `scratch`.
///
/// Returns the `.xml` documents in central-directory order.
pub fn extract_container(
    archive: &Path,
    scratch: &ScratchArea,
    max_entry_bytes: u64,
) -> Result<Vec<DecodedDocument>, IngestError> {
    let fail = |source: ArchiveFault| IngestError::Archive {
        path: archive.to_path_buf(),
        source,
    };

    debug!("Extracting container {}", archive.display());

    let file = File::open(archive).map_err(|e| fail(e.into()))?;
    let mut zip = ZipArchive::new(BufReader::new(file)).map_err(|e| fail(e.into()))?;

    let namespace = archive
        .file_name()
        .ok_or_else(|| fail(ArchiveFault::UnsafeEntryName(archive.display().to_string())))?;
    let root = scratch.path().join(namespace);
    fs::create_dir_all(&root).map_err(IngestError::Scratch)?;

    let mut documents: Vec<DecodedDocument> = Vec::with_capacity(zip.len());

    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).map_err(|e| fail(e.into()))?;
        if entry.is_dir() {
            continue;
        }

        let relative = entry
            .enclosed_name()
            .ok_or_else(|| fail(ArchiveFault::UnsafeEntryName(entry.name().to_string())))?;
        let dest = root.join(&relative);

        // Layout clashes inside the archive (a file and a directory sharing
        // a name) belong to this archive, not to the scratch area.
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| fail(e.into()))?;
        }
        let mut out = File::create(&dest).map_err(|e| fail(e.into()))?;
        let written = copy_limited(&mut entry, &mut out, max_entry_bytes).map_err(fail)?;
        debug!("  {} ({} bytes)", entry.name(), written);

        if !is_xml_name(&relative) {
            debug!("  {} is not an XML document, leaving it unparsed", entry.name());
            continue;
        }

        if documents.iter().any(|d| d.path == dest) {
            warn!(
                "Duplicate entry {} in {}; keeping the last one",
                entry.name(),
                archive.display()
            );
            continue;
        }

        documents.push(DecodedDocument {
            path: dest,
            origin: archive.to_path_buf(),
            entry: Some(relative),
        });
    }

    Ok(documents)
}

fn is_xml_name(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
}
