//! Command line interface.

mod args;

pub use args::Args;

use anyhow::Context;

use crate::rebrand::{Pipeline, ProcessRunner, ProductLayout};

/// Main CLI entry point
pub fn run() -> anyhow::Result<i32> {
    let args = Args::parse_args();
    init_logging(args.verbose);

    if let Err(reason) = args.validate() {
        anyhow::bail!("{reason}");
    }

    #[cfg(unix)]
    if !nix::unistd::Uid::effective().is_root() {
        anyhow::bail!(
            "you must run this tool as root in order to build your new munki installer pkg"
        );
    }

    let config = args.into_config()?;
    let runner = ProcessRunner;
    let artifact = Pipeline::new(config, ProductLayout::builtin(), &runner)?
        .run()
        .context("rebrand failed")?;

    println!("{}", artifact.display());
    Ok(0)
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .try_init()
        .ok();
}
