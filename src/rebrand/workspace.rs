//! Ephemeral scratch directory for one pipeline run.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::Result;

/// Scratch directory exclusively owned by one pipeline run.
///
/// Everything transient lands here: the downloaded package, the exploded
/// tree, synthesized icons, the generated entitlement descriptor. The
/// directory is removed exactly once - on [`Workspace::close`] after a
/// successful run, or on drop for every other exit path - so no scratch
/// state survives the process.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh workspace under the system temp directory.
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("munki-rebrand").tempdir()?;
        log::debug!("workspace at {}", dir.path().display());
        Ok(Workspace { dir })
    }

    /// The workspace directory itself.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Destination for the exploded package tree.
    pub fn root(&self) -> PathBuf {
        self.dir.path().join("root")
    }

    /// Remove the workspace, surfacing removal errors.
    pub fn close(self) -> Result<()> {
        log::info!("Cleaning up...");
        self.dir.close()?;
        Ok(())
    }
}
