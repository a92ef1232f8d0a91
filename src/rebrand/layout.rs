//! Declarative description of the product being rebranded.
//!
//! The munkitools package layout has shifted across product generations:
//! bundle locations, icon resource file names, and the signable inventory
//! inside the embedded Python runtime have all changed. Rather than
//! branching pipeline code per generation, everything version-dependent
//! lives here as data. [`ProductLayout::builtin`] describes the current
//! generation; an older generation is a different table, not different
//! code.

/// One application bundle inside the app component's payload.
#[derive(Debug, Clone, Copy)]
pub struct AppBundle {
    /// Bundle path relative to the payload root
    pub path: &'static str,
    /// Icon resource file names this bundle has used, newest first. The
    /// name actually present in the payload is discovered at runtime.
    pub icon_candidates: &'static [&'static str],
}

impl AppBundle {
    /// `Contents/Resources` of this bundle, relative to the payload root.
    pub fn resources_path(&self) -> String {
        format!("{}/Contents/Resources", self.path)
    }
}

/// One output of the icon synthesizer.
#[derive(Debug, Clone, Copy)]
pub struct IconSize {
    /// Rendered pixel dimensions (square)
    pub pixels: u32,
    /// Icon-set suffix, e.g. `"32x32@2x"`
    pub suffix: &'static str,
}

impl IconSize {
    /// Logical point size: half the pixel size for `@2x` entries.
    pub fn points(&self) -> u32 {
        if self.is_retina() { self.pixels / 2 } else { self.pixels }
    }

    /// Whether this entry is a 2x-scale rendition.
    pub fn is_retina(&self) -> bool {
        self.suffix.ends_with("@2x")
    }
}

/// Ordered code-signing inventory, expressed relative to component payloads.
#[derive(Debug, Clone, Copy)]
pub struct SigningLayout {
    /// Bundles and plugins in the app payload, embedded items first. The
    /// containing application bundle must be the final entry.
    pub app_targets: &'static [&'static str],
    /// Python runtime directories (relative to the python payload) whose
    /// executable and shared-library inventory is discovered by scanning;
    /// that inventory is build-dependent, never hardcoded.
    pub runtime_scan_dirs: &'static [&'static str],
    /// Wrapper binaries that are a script in some product generations and a
    /// compiled binary in others; signed only when content sniffing reports
    /// a genuine Mach-O.
    pub conditional_targets: &'static [&'static str],
    /// Binaries that need the relaxed executable-memory entitlement: the
    /// runtime's primary interpreter and its embedded app.
    pub entitled_targets: &'static [&'static str],
    /// The runtime framework itself, signed after everything it contains.
    pub framework: &'static str,
}

/// Complete layout descriptor for one product generation.
#[derive(Debug, Clone)]
pub struct ProductLayout {
    /// Glob matching the app component package inside the exploded product
    pub app_pkg_glob: &'static str,
    /// Glob matching the python component package
    pub python_pkg_glob: &'static str,
    /// Default identifier prefix of the product's pkg-refs
    pub identifier_prefix: &'static str,
    /// Application bundles whose localized resources and icons are rebranded
    pub apps: &'static [AppBundle],
    /// Locale code to canonical product name. Locales not listed here are
    /// left untouched so new upstream localizations cannot break a run.
    pub localized_names: &'static [(&'static str, &'static str)],
    /// Icon renditions, one output image per entry
    pub icon_sizes: &'static [IconSize],
    /// Code-signing inventory
    pub signing: SigningLayout,
}

impl ProductLayout {
    /// Layout of the current munkitools generation.
    pub fn builtin() -> Self {
        ProductLayout {
            app_pkg_glob: "munkitools_app[-.]*",
            python_pkg_glob: "munkitools_python[-.]*",
            identifier_prefix: "com.googlecode.munki",
            apps: &[
                AppBundle {
                    path: "Applications/Managed Software Center.app",
                    icon_candidates: &["Managed Software Center.icns", "AppIcon.icns"],
                },
                AppBundle {
                    path: "Applications/Managed Software Center.app/Contents/Resources/MunkiStatus.app",
                    icon_candidates: &["MunkiStatus.icns", "AppIcon.icns"],
                },
                AppBundle {
                    path: "Applications/Managed Software Center.app/Contents/Resources/munki-notifier.app",
                    icon_candidates: &["AppIcon.icns"],
                },
            ],
            localized_names: &[
                ("Base", "Managed Software Center"),
                ("da", "Managed Software Center"),
                ("de", "Geführte Softwareaktualisierung"),
                ("en", "Managed Software Center"),
                ("en-AU", "Managed Software Centre"),
                ("en-GB", "Managed Software Centre"),
                ("en-CA", "Managed Software Centre"),
                ("en_AU", "Managed Software Centre"),
                ("en_GB", "Managed Software Centre"),
                ("en_CA", "Managed Software Centre"),
                ("es", "Centro de aplicaciones"),
                ("fi", "Managed Software Center"),
                ("fr", "Centre de gestion des logiciels"),
                ("it", "Centro Gestione Applicazioni"),
                ("ja", "Managed Software Center"),
                ("nb", "Managed Software Center"),
                ("nl", "Managed Software Center"),
                ("ru", "Центр Управления ПО"),
                ("sv", "Managed Software Center"),
            ],
            icon_sizes: &[
                IconSize { pixels: 16, suffix: "16x16" },
                IconSize { pixels: 32, suffix: "16x16@2x" },
                IconSize { pixels: 32, suffix: "32x32" },
                IconSize { pixels: 64, suffix: "32x32@2x" },
                IconSize { pixels: 128, suffix: "128x128" },
                IconSize { pixels: 256, suffix: "128x128@2x" },
                IconSize { pixels: 256, suffix: "256x256" },
                IconSize { pixels: 512, suffix: "256x256@2x" },
                IconSize { pixels: 512, suffix: "512x512" },
                IconSize { pixels: 1024, suffix: "512x512@2x" },
            ],
            signing: SigningLayout {
                app_targets: &[
                    "Applications/Managed Software Center.app/Contents/PlugIns/MSCDockTilePlugin.docktileplugin",
                    "Applications/Managed Software Center.app/Contents/Resources/munki-notifier.app",
                    "Applications/Managed Software Center.app/Contents/Resources/MunkiStatus.app",
                    "Applications/Managed Software Center.app",
                ],
                runtime_scan_dirs: &[
                    "usr/local/munki/Python.Framework/Versions/Current/lib",
                    "usr/local/munki/Python.Framework/Versions/Current/bin",
                ],
                conditional_targets: &["usr/local/munki/munki-python"],
                entitled_targets: &[
                    "usr/local/munki/Python.Framework/Versions/Current/Resources/Python.app",
                    "usr/local/munki/Python.Framework/Versions/Current/bin/python3",
                ],
                framework: "usr/local/munki/Python.Framework",
            },
        }
    }

    /// Canonical product name for a locale code, or `None` for locales the
    /// layout does not know about.
    pub fn localized_name(&self, code: &str) -> Option<&'static str> {
        self.localized_names
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, name)| *name)
    }
}
