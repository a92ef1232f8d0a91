//! Dependency-ordered code signing.
//!
//! A container bundle's signature is invalidated by any later modification
//! to its contents, so every embedded plugin, helper application, and
//! dynamic library is signed strictly before the bundle containing it; the
//! top-level application bundle and the runtime framework come last. The
//! executable and library inventory inside the embedded Python runtime is
//! build-dependent and therefore discovered by scanning, never hardcoded.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::rebrand::exec::{CODESIGN, CommandRunner, FILE, path_str};
use crate::rebrand::layout::SigningLayout;

/// One binary or bundle in the signing sequence.
#[derive(Debug, Clone)]
pub struct SigningTarget {
    /// Absolute path inside a component payload
    pub path: PathBuf,
    /// Whether the relaxed executable-memory entitlement is applied
    pub entitlements: bool,
    /// Whether the hardened-runtime option is requested
    pub hardened_runtime: bool,
    /// Position in the signing order; strictly lower than any container
    pub rank: usize,
}

/// The complete ordered signing sequence for one run.
#[derive(Debug, Clone)]
pub struct SigningPlan {
    pub targets: Vec<SigningTarget>,
}

impl SigningPlan {
    /// Check the ordering invariant: a target nested inside another
    /// target's bundle must be signed strictly before it.
    pub fn verify_order(&self) -> Result<()> {
        for (i, earlier) in self.targets.iter().enumerate() {
            for later in &self.targets[i + 1..] {
                if later.path != earlier.path && later.path.starts_with(&earlier.path) {
                    return Err(Error::precondition(format!(
                        "signing order violation: {} would be signed after its container {}",
                        later.path.display(),
                        earlier.path.display()
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Assemble the signing sequence from the layout and the two payloads.
///
/// Order: embedded app-bundle items, the application bundle itself, the
/// scanned runtime inventory, conditional wrapper binaries, entitled
/// binaries, and finally the runtime framework.
pub fn build_plan(
    runner: &dyn CommandRunner,
    layout: &SigningLayout,
    app_payload: &Path,
    python_payload: &Path,
) -> Result<SigningPlan> {
    let mut paths: Vec<(PathBuf, bool, bool)> = Vec::new();

    for target in layout.app_targets {
        paths.push((app_payload.join(target), false, true));
    }

    for dir in layout.runtime_scan_dirs {
        let dir = python_payload.join(dir);
        for binary in scan_runtime_dir(&dir)? {
            paths.push((binary, false, true));
        }
    }

    for target in layout.conditional_targets {
        let path = python_payload.join(target);
        // A script in some product generations, a compiled wrapper in others.
        if path.is_file() && is_macho(runner, &path)? {
            paths.push((path, false, true));
        }
    }

    for target in layout.entitled_targets {
        paths.push((python_payload.join(target), true, true));
    }

    paths.push((python_payload.join(layout.framework), false, false));

    let targets = paths
        .into_iter()
        .enumerate()
        .map(|(rank, (path, entitlements, hardened_runtime))| SigningTarget {
            path,
            entitlements,
            hardened_runtime,
            rank,
        })
        .collect();

    let plan = SigningPlan { targets };
    plan.verify_order()?;
    Ok(plan)
}

/// Sign every target in plan order, aborting on the first failure.
pub fn sign_all(
    runner: &dyn CommandRunner,
    identity: &str,
    plan: &SigningPlan,
    entitlements_file: &Path,
) -> Result<()> {
    log::info!("Signing binaries (this may take a while)...");
    let entitlements = path_str(entitlements_file)?;
    for target in &plan.targets {
        log::debug!("Signing {}...", target.path.display());
        let path = path_str(&target.path)?;
        let mut args = vec!["--sign", identity, "--force", "--deep"];
        if target.hardened_runtime {
            args.extend_from_slice(&["--options", "runtime"]);
        }
        if target.entitlements {
            args.extend_from_slice(&["--entitlements", entitlements]);
        }
        args.push(path);
        runner.run(CODESIGN, &args)?;
    }
    Ok(())
}

/// Write the relaxed executable-memory entitlement descriptor.
pub fn write_entitlements(dir: &Path) -> Result<PathBuf> {
    #[derive(Serialize)]
    struct Entitlements {
        #[serde(rename = "com.apple.security.cs.allow-unsigned-executable-memory")]
        allow_unsigned_executable_memory: bool,
    }

    let path = dir.join("entitlements.plist");
    plist::to_file_xml(
        &path,
        &Entitlements {
            allow_unsigned_executable_memory: true,
        },
    )?;
    Ok(path)
}

/// Scan a runtime directory for signable content: immediate children with
/// the executable bit, plus shared libraries anywhere beneath it.
fn scan_runtime_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::lookup("runtime binary directory", dir));
    }

    let mut found = Vec::new();

    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .collect::<std::io::Result<Vec<_>>>()?
        .into_iter()
        .map(|e| e.path())
        .collect();
    entries.sort();
    for path in entries {
        if is_signable_bin(&path)? {
            found.push(path);
        }
    }

    for entry in walkdir::WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() && is_signable_lib(entry.path()) {
            found.push(entry.into_path());
        }
    }

    Ok(found)
}

/// A regular file with the owner-executable bit set.
fn is_signable_bin(path: &Path) -> Result<bool> {
    use std::os::unix::fs::PermissionsExt;
    if !path.is_file() {
        return Ok(false);
    }
    let mode = fs::metadata(path)?.permissions().mode();
    Ok(mode & 0o100 != 0)
}

/// A regular file with a known shared-library suffix.
fn is_signable_lib(path: &Path) -> bool {
    path.is_file()
        && matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("so") | Some("dylib")
        )
}

/// Whether content sniffing reports a genuine compiled binary.
fn is_macho(runner: &dyn CommandRunner, path: &Path) -> Result<bool> {
    let output = runner.run(FILE, &["--brief", path_str(path)?])?;
    Ok(output.stdout_trimmed().contains("Mach-O"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rebrand::exec::ToolOutput;
    use crate::rebrand::exec::testing::ScriptedRunner;
    use crate::rebrand::layout::ProductLayout;
    use std::os::unix::fs::PermissionsExt;

    fn write_file(path: &Path, executable: bool) {
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, b"content").expect("write");
        let mode = if executable { 0o755 } else { 0o644 };
        fs::set_permissions(path, fs::Permissions::from_mode(mode)).expect("chmod");
    }

    fn fixture(python_sniff: &'static str) -> (tempfile::TempDir, SigningPlan) {
        let tmp = tempfile::tempdir().expect("tempdir");
        let layout = ProductLayout::builtin();
        let app_payload = tmp.path().join("app/Payload");
        let python_payload = tmp.path().join("python/Payload");

        for target in layout.signing.app_targets {
            fs::create_dir_all(app_payload.join(target)).expect("mkdir");
        }

        let cur = python_payload.join("usr/local/munki/Python.Framework/Versions/Current");
        write_file(&cur.join("bin/python3"), true);
        write_file(&cur.join("bin/pip3"), true);
        write_file(&cur.join("bin/README"), false);
        write_file(&cur.join("lib/libpython3.dylib"), false);
        write_file(&cur.join("lib/python3.11/lib-dynload/_ssl.so"), false);
        write_file(&cur.join("lib/python3.11/turtle.py"), false);
        fs::create_dir_all(cur.join("Resources/Python.app")).expect("mkdir");
        write_file(&python_payload.join("usr/local/munki/munki-python"), true);

        let runner = ScriptedRunner::new(move |_, _| {
            Ok(ToolOutput {
                stdout: python_sniff.to_string(),
                stderr: String::new(),
            })
        });
        let plan =
            build_plan(&runner, &layout.signing, &app_payload, &python_payload).expect("plan");
        (tmp, plan)
    }

    #[test]
    fn embedded_items_rank_before_their_containers() {
        let (_tmp, plan) = fixture("Mach-O 64-bit executable arm64");
        plan.verify_order().expect("order holds");

        // And concretely: the app bundle outranks its plugin and helpers.
        let rank_of = |needle: &str| {
            plan.targets
                .iter()
                .find(|t| t.path.to_string_lossy().ends_with(needle))
                .map(|t| t.rank)
                .unwrap_or_else(|| panic!("{needle} missing from plan"))
        };
        let container = rank_of("Managed Software Center.app");
        assert!(rank_of("MSCDockTilePlugin.docktileplugin") < container);
        assert!(rank_of("munki-notifier.app") < container);
        assert!(rank_of("MunkiStatus.app") < container);
    }

    #[test]
    fn the_runtime_inventory_is_discovered_not_hardcoded() {
        let (_tmp, plan) = fixture("Mach-O 64-bit executable arm64");
        let paths: Vec<String> = plan
            .targets
            .iter()
            .map(|t| t.path.to_string_lossy().into_owned())
            .collect();

        assert!(paths.iter().any(|p| p.ends_with("bin/pip3")));
        assert!(paths.iter().any(|p| p.ends_with("lib/libpython3.dylib")));
        assert!(paths.iter().any(|p| p.ends_with("lib-dynload/_ssl.so")));
        assert!(!paths.iter().any(|p| p.ends_with("bin/README")));
        assert!(!paths.iter().any(|p| p.ends_with("turtle.py")));
    }

    #[test]
    fn the_framework_is_signed_last_without_hardened_runtime() {
        let (_tmp, plan) = fixture("Mach-O 64-bit executable arm64");
        let last = plan.targets.last().expect("nonempty plan");
        assert!(last.path.ends_with("usr/local/munki/Python.Framework"));
        assert!(!last.hardened_runtime);
        assert!(!last.entitlements);

        let nested = plan.targets[..plan.targets.len() - 1]
            .iter()
            .filter(|t| t.path.starts_with(&last.path))
            .count();
        assert!(nested > 0, "the scanned inventory lives inside the framework");
    }

    #[test]
    fn exactly_the_interpreter_and_embedded_app_get_entitlements() {
        let (_tmp, plan) = fixture("Mach-O 64-bit executable arm64");
        let entitled: Vec<String> = plan
            .targets
            .iter()
            .filter(|t| t.entitlements)
            .map(|t| t.path.to_string_lossy().into_owned())
            .collect();
        assert_eq!(entitled.len(), 2);
        assert!(entitled.iter().any(|p| p.ends_with("Resources/Python.app")));
        assert!(entitled.iter().any(|p| p.ends_with("bin/python3")));
    }

    #[test]
    fn the_wrapper_binary_is_skipped_when_it_is_a_script() {
        let (_tmp, script_plan) = fixture("a /usr/bin/env python3 script text executable");
        assert!(
            !script_plan
                .targets
                .iter()
                .any(|t| t.path.ends_with("munki-python"))
        );

        let (_tmp2, macho_plan) = fixture("Mach-O 64-bit executable arm64");
        assert!(
            macho_plan
                .targets
                .iter()
                .any(|t| t.path.ends_with("munki-python"))
        );
    }

    #[test]
    fn out_of_order_plans_are_rejected() {
        let plan = SigningPlan {
            targets: vec![
                SigningTarget {
                    path: PathBuf::from("/payload/A.app"),
                    entitlements: false,
                    hardened_runtime: true,
                    rank: 0,
                },
                SigningTarget {
                    path: PathBuf::from("/payload/A.app/Contents/PlugIns/p.plugin"),
                    entitlements: false,
                    hardened_runtime: true,
                    rank: 1,
                },
            ],
        };
        assert!(plan.verify_order().is_err());
    }

    #[test]
    fn signing_passes_entitlements_only_where_marked() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let entitlements = write_entitlements(tmp.path()).expect("entitlements");
        let plan = SigningPlan {
            targets: vec![
                SigningTarget {
                    path: tmp.path().join("bin/python3"),
                    entitlements: true,
                    hardened_runtime: true,
                    rank: 0,
                },
                SigningTarget {
                    path: tmp.path().join("Python.Framework"),
                    entitlements: false,
                    hardened_runtime: false,
                    rank: 1,
                },
            ],
        };

        let runner = ScriptedRunner::new(|_, _| Ok(ToolOutput::default()));
        sign_all(&runner, "Developer ID Application: Acme (TEAM1D)", &plan, &entitlements)
            .expect("sign");

        let calls = runner.calls_for(CODESIGN);
        assert_eq!(calls.len(), 2);
        assert!(calls[0].iter().any(|a| a == "--entitlements"));
        assert!(calls[0].iter().any(|a| a == "runtime"));
        assert!(!calls[1].iter().any(|a| a == "--entitlements"));
        assert!(!calls[1].iter().any(|a| a == "--options"));
    }

    #[test]
    fn the_entitlement_descriptor_grants_relaxed_executable_memory() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = write_entitlements(tmp.path()).expect("entitlements");
        let text = fs::read_to_string(&path).expect("read");
        assert!(text.contains("com.apple.security.cs.allow-unsigned-executable-memory"));
        assert!(text.contains("<true/>"));
    }
}
