//! Command line argument parsing and validation.

use std::path::PathBuf;

use clap::Parser;

use crate::error::{Error, Result};
use crate::rebrand::{Config, PackageSource};

/// Rebrands Munki's Managed Software Center
#[derive(Parser, Debug)]
#[command(
    name = "munki-rebrand",
    version,
    about = "Rebrands Munki's Managed Software Center",
    long_about = "Rebrands Munki's Managed Software Center - gives the app a new name in Finder, \
and can also replace its icon and re-sign its binaries. Xcode command-line tools are required, \
and the tool must run as root so the rebuilt payload keeps installer ownership.

Exit code 0 = the customized pkg exists in the working directory."
)]
pub struct Args {
    /// Your desired app name for Managed Software Center
    #[arg(short = 'a', long, value_name = "NAME")]
    pub appname: Option<String>,

    /// Prebuilt munkitools pkg to rebrand: local path or URL. When omitted
    /// the latest munki release is downloaded
    #[arg(short = 'k', long, value_name = "PATH|URL")]
    pub pkg: Option<String>,

    /// Icon file to replace Managed Software Center's. Should be a
    /// 1024x1024 .png with alpha channel
    #[arg(short = 'i', long, value_name = "PNG")]
    pub icon_file: Option<PathBuf>,

    /// Base name for the customized pkg outputted by this tool
    #[arg(short = 'o', long, value_name = "NAME", default_value = "munkitools")]
    pub output_file: String,

    /// Identifier prefix of the product's pkg-refs
    #[arg(long, value_name = "ID", default_value = "com.googlecode.munki")]
    pub pkg_prefix: String,

    /// Postinstall script to include in the output pkg
    #[arg(short = 'p', long, value_name = "FILE")]
    pub postinstall: Option<PathBuf>,

    /// Extra resource file staged next to the postinstall script
    #[arg(short = 'r', long, value_name = "FILE")]
    pub resource: Option<PathBuf>,

    /// Sign the distribution package with a Developer ID Installer
    /// certificate from keychain. Provide the certificate's Common Name
    #[arg(short = 's', long, value_name = "CN")]
    pub sign_package: Option<String>,

    /// Sign the app binaries with a Developer ID Application certificate
    /// from keychain. Provide the certificate's Common Name
    #[arg(short = 'S', long, value_name = "CN")]
    pub sign_binaries: Option<String>,

    /// Be more verbose
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.appname.as_deref().is_none_or(str::is_empty) {
            return Err("-a/--appname is required".to_string());
        }
        Ok(())
    }

    /// Build the pipeline configuration, checking input files exist before
    /// anything is mutated.
    pub fn into_config(self) -> Result<Config> {
        for input in [&self.icon_file, &self.postinstall, &self.resource]
            .into_iter()
            .flatten()
        {
            if !input.is_file() {
                return Err(Error::precondition(format!(
                    "input file not found: {}",
                    input.display()
                )));
            }
        }

        let source = match self.pkg {
            None => PackageSource::LatestRelease,
            Some(s) if s.starts_with("http://") || s.starts_with("https://") => {
                PackageSource::Url(s)
            }
            Some(s) => PackageSource::File(PathBuf::from(s)),
        };

        let app_name = self
            .appname
            .ok_or_else(|| Error::precondition("-a/--appname is required"))?;

        Ok(Config {
            app_name,
            source,
            icon: self.icon_file,
            output_base: self.output_file,
            output_dir: std::env::current_dir()?,
            identifier_prefix: self.pkg_prefix,
            postinstall: self.postinstall,
            resource: self.resource,
            package_identity: self.sign_package,
            binary_identity: self.sign_binaries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appname_is_required() {
        let args = Args::parse_from(["munki-rebrand"]);
        assert!(args.validate().is_err());

        let args = Args::parse_from(["munki-rebrand", "-a", "Acme Software Center"]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn pkg_argument_selects_the_source() {
        let args = Args::parse_from(["munki-rebrand", "-a", "Acme"]);
        assert!(matches!(
            args.into_config().expect("config").source,
            PackageSource::LatestRelease
        ));

        let args = Args::parse_from([
            "munki-rebrand",
            "-a",
            "Acme",
            "-k",
            "https://example.com/munkitools.pkg",
        ]);
        assert!(matches!(
            args.into_config().expect("config").source,
            PackageSource::Url(_)
        ));

        let args = Args::parse_from(["munki-rebrand", "-a", "Acme", "-k", "/tmp/munkitools.pkg"]);
        assert!(matches!(
            args.into_config().expect("config").source,
            PackageSource::File(_)
        ));
    }

    #[test]
    fn missing_input_files_fail_before_any_mutation() {
        let args = Args::parse_from([
            "munki-rebrand",
            "-a",
            "Acme",
            "-i",
            "/nonexistent/icon.png",
        ]);
        assert!(matches!(
            args.into_config(),
            Err(Error::Precondition(_))
        ));
    }
}
