//! Error types for rebrand operations.
//!
//! One taxonomy for the whole pipeline: precondition violations detected
//! before any mutation, external tool failures (fatal, never retried), and
//! lookup failures for paths the product layout promises to exist.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for rebrand operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for all rebrand operations
#[derive(Error, Debug)]
pub enum Error {
    /// A requirement that must hold before the pipeline mutates anything:
    /// missing privilege, missing required argument, malformed icon input.
    #[error("{0}")]
    Precondition(String),

    /// A wrapped external command exited with a nonzero status. The tool's
    /// diagnostic stream is carried verbatim; the pipeline aborts.
    #[error("`{program}` failed with status {status}: {stderr}")]
    Tool {
        /// Program that was invoked
        program: String,
        /// Exit status (-1 if terminated by signal)
        status: i32,
        /// Stderr captured from the tool, unmodified
        stderr: String,
    },

    /// A path or identifier the product layout assumes is absent from the
    /// exploded tree or the distribution descriptor.
    #[error("missing expected {what}: {path}")]
    Lookup {
        /// What was being looked for
        what: String,
        /// Where it was expected
        path: PathBuf,
    },

    /// A localized file declared an encoding the rewriter cannot round-trip
    /// (including `binary`, which is never a plain-text target).
    #[error("unsupported text encoding {label:?} for {path}")]
    UnsupportedEncoding {
        /// Label reported by the encoding sniffer
        label: String,
        /// File the label was reported for
        path: PathBuf,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON errors (release metadata, asset-catalog manifest)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Property list errors (entitlement descriptor)
    #[error("plist error: {0}")]
    Plist(#[from] plist::Error),

    /// Master icon decoding errors
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Invalid component package pattern
    #[error("glob pattern error: {0}")]
    Pattern(#[from] glob::PatternError),

    /// Component package enumeration errors
    #[error("glob error: {0}")]
    Glob(#[from] glob::GlobError),

    /// Payload traversal errors
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// Distribution descriptor pattern errors
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl Error {
    /// Precondition error from anything displayable.
    pub fn precondition(reason: impl Into<String>) -> Self {
        Error::Precondition(reason.into())
    }

    /// Lookup error for an expected path that was not found.
    pub fn lookup(what: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Error::Lookup {
            what: what.into(),
            path: path.into(),
        }
    }
}
