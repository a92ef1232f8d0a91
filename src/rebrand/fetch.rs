//! Release metadata and package download.
//!
//! Both operations go through the transfer tool (`curl`) via the injected
//! runner; the only parsing done here is the release-metadata document,
//! from which exactly one field is read - the download URL of the first
//! listed asset.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::rebrand::exec::{CommandRunner, CURL, path_str};

/// Release metadata endpoint for munkitools.
pub const RELEASE_METADATA_URL: &str = "https://api.github.com/repos/munki/munki/releases/latest";

#[derive(Debug, Deserialize)]
struct ReleaseMetadata {
    assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Deserialize)]
struct ReleaseAsset {
    browser_download_url: String,
}

/// Download URL of the first asset of the latest release.
pub fn latest_release_url(runner: &dyn CommandRunner, endpoint: &str) -> Result<String> {
    let output = runner.run(CURL, &[endpoint])?;
    let metadata: ReleaseMetadata = serde_json::from_str(&output.stdout)?;
    metadata
        .assets
        .into_iter()
        .next()
        .map(|asset| asset.browser_download_url)
        .ok_or_else(|| Error::lookup("release asset", endpoint))
}

/// Fetch `url` to `dest`.
pub fn download(runner: &dyn CommandRunner, url: &str, dest: &Path) -> Result<()> {
    log::info!("Downloading munkitools from {url}...");
    runner.run(CURL, &["--location", "--output", path_str(dest)?, url])?;
    Ok(())
}
