//! munki-rebrand - customizes a munkitools installer package.
//!
//! Gives Managed Software Center a new display name, optionally new icons
//! and code signatures, and rebuilds the distribution package.

use std::process;

fn main() {
    let exit_code = match munki_rebrand::cli::run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            1
        }
    };

    process::exit(exit_code);
}
