//! The rebrand pipeline.
//!
//! [`Pipeline`] owns the ephemeral workspace and sequences every stage:
//! icon synthesis, package acquisition, expansion, resource discovery,
//! localization rewriting, icon replacement, ownership normalization,
//! dependency-ordered signing, and final assembly. Stages are fail-fast -
//! the first error aborts the run and the workspace is discarded, so a run
//! either yields the complete artifact or nothing.

pub mod archive;
pub mod assemble;
pub mod checksum;
pub mod exec;
pub mod fetch;
pub mod icons;
pub mod layout;
pub mod locate;
pub mod permissions;
pub mod rewrite;
pub mod signing;
pub mod workspace;

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use assemble::ProductVersions;
use icons::IconSet;
use locate::ComponentPackage;

pub use exec::{CommandRunner, ProcessRunner};
pub use layout::ProductLayout;
pub use workspace::Workspace;

/// Where the input package comes from.
#[derive(Debug, Clone)]
pub enum PackageSource {
    /// A flat package already on disk
    File(PathBuf),
    /// A URL to fetch
    Url(String),
    /// The latest release from the metadata endpoint
    LatestRelease,
}

/// Everything one pipeline run needs, passed in explicitly.
#[derive(Debug, Clone)]
pub struct Config {
    /// Replacement display name for the product
    pub app_name: String,
    /// Input package source
    pub source: PackageSource,
    /// Master icon image, when icons are to be replaced
    pub icon: Option<PathBuf>,
    /// Base name of the output artifact
    pub output_base: String,
    /// Directory the artifact is written to
    pub output_dir: PathBuf,
    /// Identifier prefix of the product's pkg-refs
    pub identifier_prefix: String,
    /// Postinstall script staged into the app component
    pub postinstall: Option<PathBuf>,
    /// Extra resource file staged next to the postinstall script
    pub resource: Option<PathBuf>,
    /// Identity for signing the assembled product
    pub package_identity: Option<String>,
    /// Identity for signing embedded binaries and bundles
    pub binary_identity: Option<String>,
}

/// The product after expansion and discovery.
#[derive(Debug, Clone)]
pub struct LocatedProduct {
    /// Distribution descriptor of the exploded product
    pub distribution: PathBuf,
    /// The app component package
    pub app: ComponentPackage,
    /// The embedded-runtime component package
    pub python: ComponentPackage,
    /// Versions recorded by the descriptor
    pub versions: ProductVersions,
}

/// One rebrand run over one workspace.
pub struct Pipeline<'a> {
    config: Config,
    layout: ProductLayout,
    runner: &'a dyn CommandRunner,
    workspace: Workspace,
}

impl<'a> Pipeline<'a> {
    /// Create a pipeline with a fresh workspace.
    pub fn new(
        config: Config,
        layout: ProductLayout,
        runner: &'a dyn CommandRunner,
    ) -> Result<Self> {
        Ok(Pipeline {
            config,
            layout,
            runner,
            workspace: Workspace::new()?,
        })
    }

    /// Run every stage and return the path of the assembled artifact.
    pub fn run(self) -> Result<PathBuf> {
        let icons = self.synthesize_icons()?;
        let pkg = self.obtain_package()?;

        let root = self.workspace.root();
        log::info!("Expanding {}...", pkg.display());
        archive::expand(self.runner, &pkg, &root)?;

        let product = self.locate_product(&root)?;
        self.stage_scripts(&product)?;
        self.rewrite_localizations(&product)?;
        if let Some(set) = &icons {
            self.replace_icons(&product, set)?;
        }

        permissions::normalize(&root)?;
        self.sign_binaries(&product)?;

        let artifact = assemble::assemble(
            self.runner,
            &root,
            &self.config.output_dir,
            &self.config.output_base,
            &product.versions.product,
        )?;
        if let Some(identity) = &self.config.package_identity {
            assemble::sign_product(self.runner, identity, &artifact)?;
        }

        let digest = checksum::file_sha256(&artifact)?;
        log::info!("✓ Built {} (sha256 {digest})", artifact.display());

        self.workspace.close()?;
        Ok(artifact)
    }

    fn synthesize_icons(&self) -> Result<Option<IconSet>> {
        let Some(master) = &self.config.icon else {
            return Ok(None);
        };
        icons::validate_master(master)?;

        log::info!("Converting .png file to .icns...");
        let actool = icons::find_actool();
        let set = icons::synthesize(
            self.runner,
            &self.layout,
            master,
            self.workspace.path(),
            actool.as_deref(),
        )?;
        if set.is_empty() {
            return Err(Error::lookup(
                "synthesized icon artifacts",
                self.workspace.path().join("icons"),
            ));
        }
        Ok(Some(set))
    }

    fn obtain_package(&self) -> Result<PathBuf> {
        match &self.config.source {
            PackageSource::File(path) => {
                if !path.is_file() {
                    return Err(Error::lookup("installer package", path));
                }
                Ok(path.clone())
            }
            PackageSource::Url(url) => self.download(url),
            PackageSource::LatestRelease => {
                let url = fetch::latest_release_url(self.runner, fetch::RELEASE_METADATA_URL)?;
                self.download(&url)
            }
        }
    }

    fn download(&self, url: &str) -> Result<PathBuf> {
        let dest = self.workspace.path().join("munkitools.pkg");
        fetch::download(self.runner, url, &dest)?;
        Ok(dest)
    }

    fn locate_product(&self, root: &Path) -> Result<LocatedProduct> {
        let prefix = &self.config.identifier_prefix;
        let mut app =
            ComponentPackage::locate(root, self.layout.app_pkg_glob, format!("{prefix}.app"))?;
        let mut python = ComponentPackage::locate(
            root,
            self.layout.python_pkg_glob,
            format!("{prefix}.python"),
        )?;

        let distribution = root.join("Distribution");
        let versions = assemble::discover_versions(&distribution, prefix)?;
        app.version = Some(versions.app.clone());
        python.version = assemble::component_version(&distribution, &python.identifier)?;

        log::info!(
            "Found munkitools version {} (app {})",
            versions.product,
            versions.app
        );
        Ok(LocatedProduct {
            distribution,
            app,
            python,
            versions,
        })
    }

    fn stage_scripts(&self, product: &LocatedProduct) -> Result<()> {
        if let Some(script) = &self.config.postinstall {
            use std::os::unix::fs::PermissionsExt;
            let dest = product.app.scripts.join("postinstall");
            log::info!("Copying postinstall script {} to {}...", script.display(), dest.display());
            fs::create_dir_all(&product.app.scripts)?;
            fs::copy(script, &dest)?;
            fs::set_permissions(&dest, fs::Permissions::from_mode(0o755))?;
        }

        if let Some(resource) = &self.config.resource {
            let name = resource
                .file_name()
                .ok_or_else(|| Error::precondition("resource file has no file name"))?;
            let dest = product.app.scripts.join(name);
            log::info!("Copying resource {} to {}...", resource.display(), dest.display());
            fs::create_dir_all(&product.app.scripts)?;
            fs::copy(resource, &dest)?;
        }
        Ok(())
    }

    fn rewrite_localizations(&self, product: &LocatedProduct) -> Result<()> {
        log::info!("Replacing app name with {}...", self.config.app_name);
        for app in self.layout.apps {
            for bundle in locate::localized_bundles(&product.app.payload, app, &self.layout)? {
                let Some(old) = self.layout.localized_name(&bundle.locale) else {
                    continue;
                };
                for file in &bundle.files {
                    rewrite::rewrite_file(self.runner, file, old, &self.config.app_name)?;
                }
            }
        }
        Ok(())
    }

    fn replace_icons(&self, product: &LocatedProduct, set: &IconSet) -> Result<()> {
        for app in self.layout.apps {
            icons::replace_in_app(&product.app.payload, app, set)?;
        }
        Ok(())
    }

    fn sign_binaries(&self, product: &LocatedProduct) -> Result<()> {
        let Some(identity) = &self.config.binary_identity else {
            return Ok(());
        };
        let entitlements = signing::write_entitlements(self.workspace.path())?;
        let plan = signing::build_plan(
            self.runner,
            &self.layout.signing,
            &product.app.payload,
            &product.python.payload,
        )?;
        signing::sign_all(self.runner, identity, &plan, &entitlements)
    }
}
