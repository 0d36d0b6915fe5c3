//! Gzip stream decompression.

use super::{copy_limited, DecodedDocument, ScratchArea};
use crate::error::{ArchiveFault, IngestError};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

/// Suffix appended to a decompressed stream's original file name.
pub const XML_SUFFIX: &str = ".xml";

/// Decompress the gzip file at `archive` to `scratch/<file name>.xml`.
///
/// The original name is kept whole, so `a.xml.gz` and `a.gz` never collide.
/// Concatenated gzip members are decoded as one stream.
pub fn decompress_stream(
    archive: &Path,
    scratch: &ScratchArea,
    max_bytes: u64,
) -> Result<DecodedDocument, IngestError> {
    let fail = |source: ArchiveFault| IngestError::Archive {
        path: archive.to_path_buf(),
        source,
    };

    let mut name = archive
        .file_name()
        .ok_or_else(|| fail(ArchiveFault::UnsafeEntryName(archive.display().to_string())))?
        .to_os_string();
    name.push(XML_SUFFIX);
    let dest = scratch.path().join(name);

    let file = File::open(archive).map_err(|e| fail(e.into()))?;
    let mut decoder = MultiGzDecoder::new(BufReader::new(file));
    let mut out = File::create(&dest).map_err(IngestError::Scratch)?;
    let written = copy_limited(&mut decoder, &mut out, max_bytes).map_err(fail)?;

    debug!(
        "Decompressed {} -> {} ({} bytes)",
        archive.display(),
        dest.display(),
        written
    );

    Ok(DecodedDocument {
        path: dest,
        origin: archive.to_path_buf(),
        entry: None,
    })
}
