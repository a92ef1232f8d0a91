//! Encoding-safe substitution of the product name in localized resources.
//!
//! Two algorithms, selected by file format:
//!
//! * `.strings` tables are rewritten line by line, replacing the canonical
//!   name only on the right-hand side of `=` and never in comment lines.
//!   The file's own encoding is detected up front and preserved on output,
//!   and the result is persisted via write-to-backup-then-rename so an
//!   interrupted run can never leave a truncated table behind.
//! * `.nib` archives are round-tripped through `plutil` to XML, substituted
//!   with a whole-file literal replacement, and compiled back. The coarser
//!   whole-file approach is deliberate: the serialized structure has no
//!   stable line-oriented key/value shape to be precise against.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE};

use crate::error::{Error, Result};
use crate::rebrand::exec::{CommandRunner, FILE, PLUTIL, path_str};
use crate::rebrand::locate::{LocalizedFile, LocalizedFormat};

/// Substitute `old` with `new` in one localized file, dispatching on format.
pub fn rewrite_file(
    runner: &dyn CommandRunner,
    file: &LocalizedFile,
    old: &str,
    new: &str,
) -> Result<()> {
    log::debug!("Replacing '{old}' in {} with '{new}'...", file.path.display());
    match file.format {
        LocalizedFormat::Strings => rewrite_strings(runner, &file.path, old, new),
        LocalizedFormat::CompiledPlist => rewrite_compiled(runner, &file.path, old, new),
    }
}

/// Rewrite a plain key-value string table, preserving its encoding.
pub fn rewrite_strings(runner: &dyn CommandRunner, path: &Path, old: &str, new: &str) -> Result<()> {
    let encoding = detect_encoding(runner, path)?;
    let bytes = fs::read(path)?;

    let (text, actual, malformed) = encoding.decode(&bytes);
    if malformed {
        return Err(Error::UnsupportedEncoding {
            label: actual.name().to_string(),
            path: path.to_path_buf(),
        });
    }

    let replaced = substitute_lines(&text, old, new);
    let output = encode_text(actual, &replaced, has_bom(&bytes))?;

    let backup = backup_path(path);
    fs::write(&backup, output)?;
    fs::rename(&backup, path)?;
    Ok(())
}

/// Rewrite a compiled property-list UI archive via the plist converter.
pub fn rewrite_compiled(runner: &dyn CommandRunner, path: &Path, old: &str, new: &str) -> Result<()> {
    runner.run(PLUTIL, &["-convert", "xml1", path_str(path)?])?;
    let text = fs::read_to_string(path)?;
    fs::write(path, text.replace(old, new))?;
    runner.run(PLUTIL, &["-convert", "binary1", path_str(path)?])?;
    Ok(())
}

/// Detect a file's text encoding with the content sniffing tool.
///
/// An `ascii` verdict is read as UTF-8; `binary` means the file is not a
/// plain-text target for this algorithm and is rejected.
fn detect_encoding(runner: &dyn CommandRunner, path: &Path) -> Result<&'static Encoding> {
    let output = runner.run(FILE, &["--brief", "--mime-encoding", path_str(path)?])?;
    let label = output.stdout_trimmed();
    if label.contains("ascii") {
        return Ok(UTF_8);
    }
    if label == "binary" {
        return Err(Error::UnsupportedEncoding {
            label: label.to_string(),
            path: path.to_path_buf(),
        });
    }
    Encoding::for_label(label.as_bytes()).ok_or_else(|| Error::UnsupportedEncoding {
        label: label.to_string(),
        path: path.to_path_buf(),
    })
}

fn substitute_lines(text: &str, old: &str, new: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        out.push_str(&substitute_line(line, old, new));
    }
    out
}

/// Substitution is applied only to the right-hand side of the first `=`,
/// and never to comment lines.
fn substitute_line<'a>(line: &'a str, old: &str, new: &str) -> Cow<'a, str> {
    if line.starts_with("/*") {
        return Cow::Borrowed(line);
    }
    match line.split_once('=') {
        Some((left, right)) => Cow::Owned(format!("{left}={}", right.replace(old, new))),
        None => Cow::Borrowed(line),
    }
}

/// Encode rewritten text back to the file's original encoding, restoring
/// the byte-order mark when the original carried one.
fn encode_text(encoding: &'static Encoding, text: &str, with_bom: bool) -> Result<Vec<u8>> {
    if encoding == UTF_16LE || encoding == UTF_16BE {
        // The Encoding Standard defines no UTF-16 encoder; serialize the
        // code units directly in the detected byte order.
        let le = encoding == UTF_16LE;
        let mut out = Vec::with_capacity(text.len() * 2 + 2);
        if with_bom {
            out.extend_from_slice(if le { &[0xFF, 0xFE] } else { &[0xFE, 0xFF] });
        }
        for unit in text.encode_utf16() {
            out.extend_from_slice(&if le { unit.to_le_bytes() } else { unit.to_be_bytes() });
        }
        return Ok(out);
    }

    let (bytes, _, unmappable) = encoding.encode(text);
    if unmappable {
        return Err(Error::precondition(format!(
            "replacement name cannot be represented in {}",
            encoding.name()
        )));
    }
    let mut out = Vec::with_capacity(bytes.len() + 3);
    if with_bom && encoding == UTF_8 {
        out.extend_from_slice(&[0xEF, 0xBB, 0xBF]);
    }
    out.extend_from_slice(&bytes);
    Ok(out)
}

fn has_bom(bytes: &[u8]) -> bool {
    bytes.starts_with(&[0xFF, 0xFE])
        || bytes.starts_with(&[0xFE, 0xFF])
        || bytes.starts_with(&[0xEF, 0xBB, 0xBF])
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".bak");
    PathBuf::from(name)
}
