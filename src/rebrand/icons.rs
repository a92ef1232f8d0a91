//! Icon asset synthesis and replacement.
//!
//! From one square master PNG the synthesizer derives every rendition in
//! the layout's size table, then produces whichever final containers the
//! host can build: a compiled asset archive when the asset-catalog compiler
//! is available, otherwise a legacy single-file icon via `iconutil`.
//! Replacement never assumes an icon resource file name - the name in use
//! has changed across product generations, so the candidate actually
//! present in each bundle is discovered first.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::rebrand::exec::{CommandRunner, ICONUTIL, SIPS, path_str};
use crate::rebrand::layout::{AppBundle, ProductLayout};

/// Asset-catalog compiler location inside an Xcode install.
const XCODE_ACTOOL: &str = "/Applications/Xcode.app/Contents/Developer/usr/bin/actool";

/// Final icon containers actually produced by synthesis.
#[derive(Debug, Clone, Default)]
pub struct IconSet {
    /// Legacy single-file icon, when `iconutil` built one
    pub icns: Option<PathBuf>,
    /// Compiled asset archive, when the asset-catalog compiler ran
    pub assets_car: Option<PathBuf>,
}

impl IconSet {
    /// True when synthesis produced nothing usable for replacement.
    pub fn is_empty(&self) -> bool {
        self.icns.is_none() && self.assets_car.is_none()
    }
}

#[derive(Serialize)]
struct AssetCatalogContents {
    images: Vec<AssetImage>,
}

#[derive(Serialize)]
struct AssetImage {
    size: String,
    idiom: &'static str,
    filename: String,
    scale: String,
}

/// Reject a master image that is not a square PNG with an alpha channel.
pub fn validate_master(path: &Path) -> Result<()> {
    let reader = image::ImageReader::open(path)?.with_guessed_format()?;
    if reader.format() != Some(image::ImageFormat::Png) {
        return Err(Error::precondition(format!(
            "icon file must be a 1024x1024 .png: {}",
            path.display()
        )));
    }
    let img = reader.decode()?;
    if img.width() != img.height() {
        return Err(Error::precondition(format!(
            "icon file must be square, got {}x{}",
            img.width(),
            img.height()
        )));
    }
    if !img.color().has_alpha() {
        return Err(Error::precondition(
            "icon file must have an alpha channel".to_string(),
        ));
    }
    if img.width() != 1024 {
        log::warn!(
            "icon is {0}x{0}, expected 1024x1024; upscaled renditions will be soft",
            img.width()
        );
    }
    Ok(())
}

/// Locate the asset-catalog compiler, if this host has one.
pub fn find_actool() -> Option<PathBuf> {
    which::which("actool")
        .ok()
        .or_else(|| {
            let xcode = Path::new(XCODE_ACTOOL);
            xcode.is_file().then(|| xcode.to_path_buf())
        })
}

/// Derive the full icon set from `master` under `work_dir`.
///
/// Every entry of the layout's size table yields exactly one resized
/// rendition. With an asset-catalog compiler those renditions plus a
/// generated manifest are compiled into `Assets.car`; without one the
/// renditions are folded into a legacy `.icns` instead.
pub fn synthesize(
    runner: &dyn CommandRunner,
    layout: &ProductLayout,
    master: &Path,
    work_dir: &Path,
    actool: Option<&Path>,
) -> Result<IconSet> {
    let icon_dir = work_dir.join("icons");
    let xcassets = icon_dir.join("Assets.xcassets");
    let iconset = xcassets.join("AppIcon.appiconset");
    fs::create_dir_all(&iconset)?;

    let mut images = Vec::with_capacity(layout.icon_sizes.len());
    for size in layout.icon_sizes {
        let pixels = size.pixels.to_string();
        let filename = format!("AppIcon_{}.png", size.suffix);
        let out = iconset.join(&filename);
        runner.run(
            SIPS,
            &["-z", &pixels, &pixels, path_str(master)?, "--out", path_str(&out)?],
        )?;
        images.push(AssetImage {
            size: format!("{0}x{0}", size.points()),
            idiom: "mac",
            filename,
            scale: if size.is_retina() { "2x" } else { "1x" }.to_string(),
        });
    }

    let icns_path = icon_dir.join("AppIcon.icns");
    match actool {
        Some(actool) => {
            let contents = serde_json::to_string(&AssetCatalogContents { images })?;
            fs::write(iconset.join("Contents.json"), contents)?;
            runner.run(
                path_str(actool)?,
                &[
                    "--compile",
                    path_str(&icon_dir)?,
                    "--app-icon",
                    "AppIcon",
                    "--minimum-deployment-target",
                    "10.11",
                    "--output-partial-info-plist",
                    path_str(&icon_dir.join("Info.plist"))?,
                    "--platform",
                    "macosx",
                    "--errors",
                    "--warnings",
                    path_str(&xcassets)?,
                ],
            )?;
        }
        None => {
            log::warn!("actool not found; compiled asset archives will not be replaced");
            runner.run(
                ICONUTIL,
                &["-c", "icns", path_str(&iconset)?, "-o", path_str(&icns_path)?],
            )?;
        }
    }

    let car_path = icon_dir.join("Assets.car");
    Ok(IconSet {
        icns: icns_path.is_file().then_some(icns_path),
        assets_car: car_path.is_file().then_some(car_path),
    })
}

/// Overwrite `app`'s icon resources with the synthesized set.
///
/// The bundle's current icon file name is discovered from the layout's
/// candidate list; a bundle missing from this product generation is
/// skipped, but a present bundle with no recognizable icon resource is a
/// broken layout assumption and fatal.
pub fn replace_in_app(payload: &Path, app: &AppBundle, set: &IconSet) -> Result<()> {
    let resources = payload.join(app.resources_path());
    if !resources.is_dir() {
        log::debug!("no bundle at {}, skipping icon replacement", app.path);
        return Ok(());
    }

    if let Some(icns) = &set.icns {
        let current = app
            .icon_candidates
            .iter()
            .map(|name| resources.join(name))
            .find(|path| path.is_file())
            .ok_or_else(|| Error::lookup("icon resource file", &resources))?;
        log::info!("Replacing icons in {} ...", current.display());
        fs::copy(icns, &current)?;
    }

    if let Some(car) = &set.assets_car {
        let dest = resources.join("Assets.car");
        if dest.is_file() {
            log::info!("Replacing icons in {} ...", dest.display());
            fs::copy(car, &dest)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rebrand::exec::ToolOutput;
    use crate::rebrand::exec::testing::ScriptedRunner;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    fn square_master(dir: &Path) -> PathBuf {
        let path = dir.join("master.png");
        RgbaImage::from_pixel(64, 64, Rgba([10, 20, 30, 255]))
            .save(&path)
            .expect("save master");
        path
    }

    /// Runner that materializes the file named by `--out`/`-o` arguments,
    /// like the real resize and icon tools do.
    fn producing_runner() -> ScriptedRunner<impl Fn(&str, &[&str]) -> Result<ToolOutput>> {
        ScriptedRunner::new(|_, args: &[&str]| {
            for flag in ["--out", "-o"] {
                if let Some(i) = args.iter().position(|a| *a == flag) {
                    fs::write(args[i + 1], b"image").expect("produce output");
                }
            }
            Ok(ToolOutput::default())
        })
    }

    #[test]
    fn non_png_masters_are_rejected() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("master.jpg");
        RgbImage::from_pixel(64, 64, Rgb([1, 2, 3])).save(&path).expect("save");
        assert!(matches!(validate_master(&path), Err(Error::Precondition(_))));
    }

    #[test]
    fn masters_without_alpha_are_rejected() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("master.png");
        RgbImage::from_pixel(64, 64, Rgb([1, 2, 3])).save(&path).expect("save");
        assert!(matches!(validate_master(&path), Err(Error::Precondition(_))));
    }

    #[test]
    fn rectangular_masters_are_rejected() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("master.png");
        RgbaImage::from_pixel(64, 32, Rgba([1, 2, 3, 255]))
            .save(&path)
            .expect("save");
        assert!(matches!(validate_master(&path), Err(Error::Precondition(_))));
    }

    #[test]
    fn square_alpha_master_is_accepted() {
        let tmp = tempfile::tempdir().expect("tempdir");
        validate_master(&square_master(tmp.path())).expect("valid master");
    }

    #[test]
    fn every_size_table_entry_yields_one_resize_call() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let layout = ProductLayout::builtin();
        let master = square_master(tmp.path());

        let runner = producing_runner();
        let set = synthesize(&runner, &layout, &master, tmp.path(), None).expect("synthesize");

        let sips = runner.calls_for(SIPS);
        assert_eq!(sips.len(), layout.icon_sizes.len());
        for (call, size) in sips.iter().zip(layout.icon_sizes) {
            assert_eq!(call[0], "-z");
            assert_eq!(call[1], size.pixels.to_string());
            assert_eq!(call[2], size.pixels.to_string());
            assert!(call[5].ends_with(&format!("AppIcon_{}.png", size.suffix)));
        }
        assert!(set.icns.is_some());
        assert!(set.assets_car.is_none());
    }

    #[test]
    fn without_the_catalog_compiler_the_legacy_icon_is_built() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let layout = ProductLayout::builtin();
        let master = square_master(tmp.path());

        let runner = producing_runner();
        let set = synthesize(&runner, &layout, &master, tmp.path(), None).expect("synthesize");

        assert_eq!(runner.calls_for(ICONUTIL).len(), 1);
        assert!(!set.is_empty());
    }

    #[test]
    fn with_the_catalog_compiler_a_manifest_is_generated() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let layout = ProductLayout::builtin();
        let master = square_master(tmp.path());
        let actool = tmp.path().join("actool");

        let runner = ScriptedRunner::new(|program: &str, args: &[&str]| {
            if program.ends_with("actool") {
                // The compiler drops Assets.car next to the compile target.
                fs::write(Path::new(args[1]).join("Assets.car"), b"car").expect("car");
            }
            Ok(ToolOutput::default())
        });
        let set =
            synthesize(&runner, &layout, &master, tmp.path(), Some(&actool)).expect("synthesize");

        assert!(set.assets_car.is_some());
        assert!(set.icns.is_none(), "iconutil must not run when actool is present");
        assert!(runner.calls_for(ICONUTIL).is_empty());

        let manifest = fs::read_to_string(
            tmp.path().join("icons/Assets.xcassets/AppIcon.appiconset/Contents.json"),
        )
        .expect("manifest");
        let parsed: serde_json::Value = serde_json::from_str(&manifest).expect("json");
        let images = parsed["images"].as_array().expect("images");
        assert_eq!(images.len(), layout.icon_sizes.len());

        let retina16 = images
            .iter()
            .find(|i| i["filename"] == "AppIcon_16x16@2x.png")
            .expect("16x16@2x entry");
        assert_eq!(retina16["size"], "16x16");
        assert_eq!(retina16["scale"], "2x");
        assert_eq!(retina16["idiom"], "mac");
    }

    #[test]
    fn replacement_discovers_the_icon_name_in_use() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let layout = ProductLayout::builtin();
        let app = layout.apps[0];

        let resources = tmp.path().join(app.resources_path());
        fs::create_dir_all(&resources).expect("mkdir");
        // This generation uses the second candidate name.
        fs::write(resources.join("AppIcon.icns"), b"old").expect("seed icon");

        let icns = tmp.path().join("AppIcon.icns");
        fs::write(&icns, b"new icon").expect("new icon");
        let set = IconSet {
            icns: Some(icns),
            assets_car: None,
        };

        replace_in_app(tmp.path(), &app, &set).expect("replace");
        assert_eq!(
            fs::read(resources.join("AppIcon.icns")).expect("read"),
            b"new icon"
        );
    }

    #[test]
    fn a_present_bundle_without_icon_resources_is_fatal() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let layout = ProductLayout::builtin();
        let app = layout.apps[0];
        fs::create_dir_all(tmp.path().join(app.resources_path())).expect("mkdir");

        let set = IconSet {
            icns: Some(tmp.path().join("AppIcon.icns")),
            assets_car: None,
        };
        let err = replace_in_app(tmp.path(), &app, &set).unwrap_err();
        assert!(matches!(err, Error::Lookup { .. }));
    }
}
