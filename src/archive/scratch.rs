//! Scoped scratch storage for decoded documents.
//!
//! The directory lives exactly as long as the [`ScratchArea`] value; dropping
//! it removes every file written during the run, on success or on error.

use crate::error::IngestError;
use std::path::Path;
use tempfile::TempDir;
use tracing::{debug, warn};

/// Fresh, per-run temporary directory.
pub struct ScratchArea {
    dir: TempDir,
}

impl ScratchArea {
    /// Create a new empty scratch directory under the system temp dir.
    pub fn create() -> Result<Self, IngestError> {
        let dir = tempfile::Builder::new()
            .prefix("dmarcsift-")
            .tempdir()
            .map_err(IngestError::Scratch)?;
        debug!("Scratch area at {}", dir.path().display());
        Ok(Self { dir })
    }

    /// Root of the scratch directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the directory now and report failures instead of ignoring them.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!("Failed to remove scratch area {}: {}", path.display(), e);
        } else {
            debug!("Removed scratch area {}", path.display());
        }
    }
}
