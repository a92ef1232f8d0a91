//! Binary surface checks: argument preconditions and the version query.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn missing_appname_exits_one_with_a_diagnostic() {
    Command::cargo_bin("munki-rebrand")
        .expect("binary built")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("appname"));
}

#[test]
fn empty_appname_is_rejected() {
    Command::cargo_bin("munki-rebrand")
        .expect("binary built")
        .args(["--appname", ""])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("appname"));
}

#[test]
fn version_query_succeeds_without_privilege() {
    Command::cargo_bin("munki-rebrand")
        .expect("binary built")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
