//! External tool invocation.
//!
//! Every platform tool the pipeline touches goes through [`CommandRunner`]:
//! one synchronous, blocking call contract with a uniform failure shape
//! (nonzero exit status becomes [`Error::Tool`] carrying the tool's stderr
//! verbatim). Stages take `&dyn CommandRunner` so tests can substitute
//! scripted fakes without invoking real platform tools.

use std::path::Path;
use std::process::Command;

use crate::error::{Error, Result};

/// Absolute paths of the platform tools consumed by the pipeline.
///
/// These are fixed install locations on macOS; none of them are looked up
/// via `PATH` except `actool`, which ships with Xcode and is discovered at
/// runtime (see `icons::find_actool`).
pub const PKGUTIL: &str = "/usr/sbin/pkgutil";
pub const PRODUCTSIGN: &str = "/usr/bin/productsign";
pub const CODESIGN: &str = "/usr/bin/codesign";
pub const FILE: &str = "/usr/bin/file";
pub const PLUTIL: &str = "/usr/bin/plutil";
pub const SIPS: &str = "/usr/bin/sips";
pub const ICONUTIL: &str = "/usr/bin/iconutil";
pub const CURL: &str = "/usr/bin/curl";
pub const TAR: &str = "/usr/bin/tar";

/// Captured streams of a successful tool invocation.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    /// Stdout, lossily decoded
    pub stdout: String,
    /// Stderr, lossily decoded
    pub stderr: String,
}

impl ToolOutput {
    /// Stdout with trailing whitespace stripped, for tools whose single-line
    /// output is consumed directly (encoding labels, content sniffs).
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim_end()
    }
}

/// Synchronous external command execution.
///
/// Implementations must block until the tool exits and must map any nonzero
/// exit status to [`Error::Tool`]. There are no retries at this layer:
/// archive mutation and signing are not safely idempotent to blindly rerun.
pub trait CommandRunner {
    /// Run `program` with `args`, returning captured output on success.
    fn run(&self, program: &str, args: &[&str]) -> Result<ToolOutput>;
}

/// [`CommandRunner`] backed by `std::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<ToolOutput> {
        log::debug!("running {} {}", program, args.join(" "));
        let output = Command::new(program).args(args).output()?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(Error::Tool {
                program: program.to_string(),
                status: output.status.code().unwrap_or(-1),
                stderr,
            });
        }

        if !stdout.is_empty() {
            log::debug!("{} output: {}", program, stdout.trim_end());
        }

        Ok(ToolOutput { stdout, stderr })
    }
}

/// Borrow a path as UTF-8 for tool argument lists.
///
/// Tool argument vectors are `&str`; payload paths originate from a tempdir
/// plus layout tables, so non-UTF-8 here means the input package itself
/// carries unrepresentable names.
pub fn path_str(path: &Path) -> Result<&str> {
    path.to_str().ok_or_else(|| {
        Error::precondition(format!("path is not valid UTF-8: {}", path.display()))
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_on_success() {
        let out = ProcessRunner
            .run("/bin/sh", &["-c", "echo hello"])
            .expect("sh should succeed");
        assert_eq!(out.stdout_trimmed(), "hello");
    }

    #[test]
    fn nonzero_status_is_a_tool_error_with_stderr() {
        let err = ProcessRunner
            .run("/bin/sh", &["-c", "echo broken >&2; exit 3"])
            .unwrap_err();
        match err {
            Error::Tool {
                program,
                status,
                stderr,
            } => {
                assert_eq!(program, "/bin/sh");
                assert_eq!(status, 3);
                assert!(stderr.contains("broken"));
            }
            other => panic!("expected Tool error, got {other:?}"),
        }
    }

    #[test]
    fn non_utf8_paths_are_rejected_for_arguments() {
        #[cfg(unix)]
        {
            use std::ffi::OsStr;
            use std::os::unix::ffi::OsStrExt;
            let path = Path::new(OsStr::from_bytes(b"/tmp/\xff"));
            assert!(path_str(path).is_err());
        }
    }
}
