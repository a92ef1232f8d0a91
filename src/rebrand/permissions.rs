//! Payload ownership normalization.
//!
//! Installer packaging enforces ownership at build time and code signatures
//! capture file state, so this walk must run strictly after all content
//! mutation and strictly before signing and repackaging.

use std::path::Path;

use nix::unistd::{Gid, Uid, chown};
use walkdir::WalkDir;

use crate::error::Result;

/// Owner required throughout installer payloads (root).
pub const PAYLOAD_UID: u32 = 0;
/// Group required throughout installer payloads (admin).
pub const PAYLOAD_GID: u32 = 80;

/// Set root:admin ownership on every directory and file under `root`.
pub fn normalize(root: &Path) -> Result<()> {
    log::info!("Setting root:admin ownership throughout the payload...");
    let uid = Uid::from_raw(PAYLOAD_UID);
    let gid = Gid::from_raw(PAYLOAD_GID);
    for entry in WalkDir::new(root) {
        let entry = entry?;
        chown(entry.path(), Some(uid), Some(gid))
            .map_err(|errno| std::io::Error::from_raw_os_error(errno as i32))?;
    }
    Ok(())
}
