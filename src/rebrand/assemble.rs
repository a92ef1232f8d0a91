//! Final artifact assembly.
//!
//! The product and application versions come from the distribution
//! descriptor of the exploded tree; the artifact name is deterministic,
//! `<base>-<product version>.pkg`. An optional final step re-signs the
//! assembled product, replacing the unsigned artifact only once the signed
//! copy is confirmed on disk.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::{Error, Result};
use crate::rebrand::archive;
use crate::rebrand::exec::{CommandRunner, PRODUCTSIGN, path_str};

/// Versions recorded by the distribution descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductVersions {
    /// Version of the product node matching the identifier prefix
    pub product: String,
    /// Version of the app component's pkg-ref node
    pub app: String,
}

/// Read product and application versions from the descriptor at `dist`.
pub fn discover_versions(dist: &Path, prefix: &str) -> Result<ProductVersions> {
    if !dist.is_file() {
        return Err(Error::lookup("distribution descriptor", dist));
    }
    let xml = fs::read_to_string(dist)?;

    let product = element_version(&xml, "product", prefix)?
        .ok_or_else(|| Error::lookup(format!("product node with id {prefix}"), dist))?;
    let app_id = format!("{prefix}.app");
    let app = element_version(&xml, "pkg-ref", &app_id)?
        .ok_or_else(|| Error::lookup(format!("pkg-ref node with id {app_id}"), dist))?;

    Ok(ProductVersions { product, app })
}

/// Version attribute of a component's pkg-ref, when the descriptor has one.
pub fn component_version(dist: &Path, id: &str) -> Result<Option<String>> {
    if !dist.is_file() {
        return Err(Error::lookup("distribution descriptor", dist));
    }
    element_version(&fs::read_to_string(dist)?, "pkg-ref", id)
}

/// Version attribute of the first `<tag>` element whose id matches.
///
/// The descriptor typically repeats pkg-ref elements for one identifier;
/// only the declaration form carries a version attribute, so elements
/// without one are passed over.
fn element_version(xml: &str, tag: &str, id: &str) -> Result<Option<String>> {
    let element = Regex::new(&format!(r"<{}\b[^>]*>", regex::escape(tag)))?;
    let attr = Regex::new(r#"([A-Za-z][\w.-]*)\s*=\s*"([^"]*)""#)?;

    for m in element.find_iter(xml) {
        let mut id_matches = false;
        let mut version = None;
        for capture in attr.captures_iter(m.as_str()) {
            match &capture[1] {
                "id" if &capture[2] == id => id_matches = true,
                "version" => version = Some(capture[2].to_string()),
                _ => {}
            }
        }
        if id_matches && version.is_some() {
            return Ok(version);
        }
    }
    Ok(None)
}

/// Flatten the mutated tree into `<base>-<version>.pkg` under `out_dir`.
pub fn assemble(
    runner: &dyn CommandRunner,
    root: &Path,
    out_dir: &Path,
    base: &str,
    version: &str,
) -> Result<PathBuf> {
    let artifact = out_dir.join(format!("{base}-{version}.pkg"));
    log::info!("Building output pkg at {}...", artifact.display());
    archive::flatten(runner, root, &artifact)?;
    Ok(artifact)
}

/// Re-sign the assembled product in place.
///
/// The signed copy is written alongside the artifact first; the unsigned
/// artifact is replaced only after that copy is confirmed written.
pub fn sign_product(runner: &dyn CommandRunner, identity: &str, pkg: &Path) -> Result<()> {
    let mut signed = pkg.as_os_str().to_os_string();
    signed.push("-signed");
    let signed = PathBuf::from(signed);

    log::info!("Signing pkg...");
    runner.run(PRODUCTSIGN, &["--sign", identity, path_str(pkg)?, path_str(&signed)?])?;

    if !signed.is_file() {
        return Err(Error::lookup("signed package", &signed));
    }
    log::info!("Moving {} to {}...", signed.display(), pkg.display());
    fs::rename(&signed, pkg)?;
    Ok(())
}
