//! Conversion between flat installer packages and exploded trees.
//!
//! Thin, fail-fast wrappers over `pkgutil`. Any nonzero status is fatal and
//! surfaces the tool's diagnostics untouched; archive tools are
//! deterministic, so a failed expand is a structural defect in the input,
//! not something a retry can fix.

use std::path::Path;

use crate::error::{Error, Result};
use crate::rebrand::exec::{CommandRunner, PKGUTIL, TAR, path_str};

/// Expand a flat package (including nested component payloads) to a tree.
pub fn expand(runner: &dyn CommandRunner, pkg: &Path, dest: &Path) -> Result<()> {
    if !pkg.is_file() {
        return Err(Error::lookup("installer package", pkg));
    }
    runner.run(PKGUTIL, &["--expand-full", path_str(pkg)?, path_str(dest)?])?;
    Ok(())
}

/// Flatten an exploded tree back into a flat package.
pub fn flatten(runner: &dyn CommandRunner, tree: &Path, pkg: &Path) -> Result<()> {
    runner.run(PKGUTIL, &["--flatten-full", path_str(tree)?, path_str(pkg)?])?;
    Ok(())
}

/// Expand a nested content archive (a component's `Payload` file) in place.
///
/// Only needed when operating on a package that was expanded without full
/// payload extraction; `bsdtar` understands the cpio payload containers.
pub fn expand_payload(runner: &dyn CommandRunner, payload: &Path, dest: &Path) -> Result<()> {
    if !payload.is_file() {
        return Err(Error::lookup("component payload archive", payload));
    }
    std::fs::create_dir_all(dest)?;
    runner.run(TAR, &["-xf", path_str(payload)?, "-C", path_str(dest)?])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rebrand::exec::testing::ok_runner;

    #[test]
    fn expand_requires_an_existing_package() {
        let runner = ok_runner("");
        let err = expand(&runner, Path::new("/nonexistent/munkitools.pkg"), Path::new("/tmp/x"))
            .unwrap_err();
        assert!(matches!(err, Error::Lookup { .. }));
        assert!(runner.calls.borrow().is_empty(), "tool must not run on a missing input");
    }

    #[test]
    fn payload_archives_are_expanded_with_tar() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let payload = tmp.path().join("Payload");
        std::fs::write(&payload, b"cpio").expect("write payload");

        let runner = ok_runner("");
        let dest = tmp.path().join("payload-root");
        expand_payload(&runner, &payload, &dest).expect("expand payload");

        assert!(dest.is_dir(), "destination is created for the tool");
        let calls = runner.calls_for(TAR);
        assert_eq!(calls[0][0], "-xf");
        assert_eq!(calls[0][2], "-C");
    }

    #[test]
    fn expand_and_flatten_invoke_pkgutil_full_modes() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let pkg = tmp.path().join("in.pkg");
        std::fs::write(&pkg, b"flat").expect("write pkg");

        let runner = ok_runner("");
        expand(&runner, &pkg, &tmp.path().join("root")).expect("expand");
        flatten(&runner, &tmp.path().join("root"), &tmp.path().join("out.pkg")).expect("flatten");

        let calls = runner.calls_for(PKGUTIL);
        assert_eq!(calls[0][0], "--expand-full");
        assert_eq!(calls[1][0], "--flatten-full");
    }
}
