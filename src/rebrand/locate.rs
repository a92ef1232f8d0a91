//! Discovery inside the exploded product tree.
//!
//! Two jobs: match component packages against the layout's glob patterns
//! (fatal when absent - every later stage leans on them), and enumerate the
//! per-locale resource bundles of each application bundle. Locale
//! directories with codes the layout does not know are skipped without
//! error, so new upstream localizations never break a run.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::rebrand::exec::path_str;
use crate::rebrand::layout::{AppBundle, ProductLayout};

/// One named sub-unit of the multi-component product.
#[derive(Debug, Clone)]
pub struct ComponentPackage {
    /// pkg-ref identifier, e.g. `com.googlecode.munki.app`
    pub identifier: String,
    /// Version recorded in the distribution descriptor, when present
    pub version: Option<String>,
    /// Exploded component directory
    pub dir: PathBuf,
    /// Extracted payload tree
    pub payload: PathBuf,
    /// Install scripts directory
    pub scripts: PathBuf,
}

impl ComponentPackage {
    /// Locate the first component under `root` matching `pattern`.
    pub fn locate(root: &Path, pattern: &str, identifier: String) -> Result<Self> {
        let full = format!("{}/{}", path_str(root)?, pattern);
        let dir = glob::glob(&full)?
            .next()
            .transpose()?
            .ok_or_else(|| Error::lookup(format!("component package {identifier}"), root))?;
        Ok(ComponentPackage {
            identifier,
            version: None,
            payload: dir.join("Payload"),
            scripts: dir.join("Scripts"),
            dir,
        })
    }
}

/// Format of one localized resource file, derived from its suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalizedFormat {
    /// Plain key-value string table (`.strings`)
    Strings,
    /// Compiled property-list UI archive (`.nib`)
    CompiledPlist,
}

/// One file the rewriter will mutate exactly once per run.
#[derive(Debug, Clone)]
pub struct LocalizedFile {
    pub path: PathBuf,
    pub format: LocalizedFormat,
}

/// One locale's resource directory inside an application bundle.
#[derive(Debug, Clone)]
pub struct ResourceBundle {
    /// Locale code, already validated against the layout's name table
    pub locale: String,
    /// The `<code>.lproj` directory
    pub dir: PathBuf,
    /// Localized files collected recursively beneath it
    pub files: Vec<LocalizedFile>,
}

/// Enumerate the known-locale resource bundles of `app` under `payload`.
///
/// An application bundle absent from this product generation yields an
/// empty list rather than an error; presence of every bundle is not a
/// layout guarantee, only their location when present.
pub fn localized_bundles(payload: &Path, app: &AppBundle, layout: &ProductLayout) -> Result<Vec<ResourceBundle>> {
    let resources = payload.join(app.resources_path());
    if !resources.is_dir() {
        log::debug!("no resources directory at {}", resources.display());
        return Ok(Vec::new());
    }

    let mut bundles = Vec::new();
    let mut entries: Vec<PathBuf> = std::fs::read_dir(&resources)?
        .collect::<std::io::Result<Vec<_>>>()?
        .into_iter()
        .map(|e| e.path())
        .collect();
    entries.sort();

    for dir in entries {
        if !dir.is_dir() || dir.extension().and_then(|e| e.to_str()) != Some("lproj") {
            continue;
        }
        let Some(code) = locale_code(&dir) else {
            continue;
        };
        if layout.localized_name(&code).is_none() {
            log::debug!("skipping unrecognized locale {code}");
            continue;
        }
        bundles.push(ResourceBundle {
            files: collect_localized_files(&dir)?,
            locale: code,
            dir,
        });
    }
    Ok(bundles)
}

/// Locale code of an `.lproj` directory: the name up to the first dot.
fn locale_code(dir: &Path) -> Option<String> {
    let name = dir.file_name()?.to_str()?;
    Some(name.split('.').next().unwrap_or(name).to_string())
}

fn collect_localized_files(lproj: &Path) -> Result<Vec<LocalizedFile>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(lproj).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let format = match entry.path().extension().and_then(|e| e.to_str()) {
            Some("strings") => LocalizedFormat::Strings,
            Some("nib") => LocalizedFormat::CompiledPlist,
            _ => continue,
        };
        files.push(LocalizedFile {
            path: entry.into_path(),
            format,
        });
    }
    Ok(files)
}
