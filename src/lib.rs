//! Rebrands Munki's Managed Software Center.
//!
//! This library drives the full rebrand pipeline against a munkitools
//! distribution package: expanding the flat package, substituting the
//! product's display name across localized resources, regenerating icon
//! assets at every required resolution, re-applying code signatures in
//! dependency order, and reassembling (and optionally signing) the final
//! installer artifact.
//!
//! It can be used both as a CLI tool and as a library dependency.

pub mod cli;
pub mod error;
pub mod rebrand;

// Re-export commonly used types
pub use error::{Error, Result};
