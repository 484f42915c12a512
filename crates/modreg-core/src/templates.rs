//! Template override resolution.
//!
//! A module bundles templates under `modules/<module>/templets/<name>`. A
//! site theme may override them by shipping
//! `templets/<theme>/templets/modules/<module>/templets/<name>`; those are
//! addressed as `@<theme>/<name>` so the two sets never collide.

use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;

use modreg_fs::{SitePath, io, subdirectories};
use modreg_manifest::LocalizedText;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::config::RegistryConfig;
use crate::instance::ModuleLocation;

/// Enumerates installed site themes and their module override directories.
pub trait ThemeSource: Send + Sync + Debug {
    /// Installed theme identifiers, in enumeration order.
    fn themes(&self) -> Vec<String>;

    /// Override directory of `theme` for `module`, if the theme has one.
    fn override_location(&self, theme: &str, module: &str) -> Option<ModuleLocation>;
}

/// Themes as subdirectories of `<root>/templets`.
#[derive(Debug, Clone)]
pub struct FsThemeSource {
    root: ModuleLocation,
}

impl FsThemeSource {
    pub fn new(config: &RegistryConfig) -> Self {
        Self {
            root: ModuleLocation {
                path: config.templates_dir(),
                dir: config.web_path(SitePath::Templates.as_str()),
            },
        }
    }
}

impl ThemeSource for FsThemeSource {
    fn themes(&self) -> Vec<String> {
        subdirectories(&self.root.path)
    }

    fn override_location(&self, theme: &str, module: &str) -> Option<ModuleLocation> {
        modreg_fs::validate_identifier(theme).ok()?;
        let mut location = self.root.join(theme);
        for segment in SitePath::ThemeModules.as_str().split('/') {
            location = location.join(segment);
        }
        let location = location.join(module);
        location.path.is_dir().then_some(location)
    }
}

/// Where a template package comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateOrigin {
    /// Bundled with the module
    Module,
    /// Supplied by a site theme
    Site { theme: String },
}

/// A template name as addressed by callers: `name` or `@theme/name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateRef {
    Module(String),
    Site { theme: String, name: String },
}

impl TemplateRef {
    /// Parse `name` or `@theme/name`. Returns `None` for malformed
    /// composite names.
    pub fn parse(name: &str) -> Option<Self> {
        match name.strip_prefix('@') {
            Some(rest) => {
                let (theme, name) = rest.split_once('/')?;
                if theme.is_empty() || name.is_empty() || name.contains('/') {
                    return None;
                }
                Some(Self::Site {
                    theme: theme.to_string(),
                    name: name.to_string(),
                })
            }
            None if name.is_empty() || name.contains('/') => None,
            None => Some(Self::Module(name.to_string())),
        }
    }
}

impl std::fmt::Display for TemplateRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Module(name) => f.write_str(name),
            Self::Site { theme, name } => write!(f, "@{theme}/{name}"),
        }
    }
}

/// A discovered template package.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplatePackage {
    /// Display name: bare for module templates, `@theme/name` for overrides
    pub name: String,
    /// Title resolved for the runtime locale
    pub title: String,
    pub language: Option<String>,
    pub origin: TemplateOrigin,
    pub path: PathBuf,
    pub dir: String,
    /// Remaining manifest fields, verbatim
    pub extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct TemplateManifest {
    #[serde(default)]
    title: LocalizedText,
    #[serde(default)]
    language: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Lists module templates and the site overrides targeting them.
#[derive(Debug, Clone)]
pub struct TemplateResolver {
    modules: ModuleLocation,
    themes: Arc<dyn ThemeSource>,
    manifest_file: String,
    locale: String,
}

impl TemplateResolver {
    pub fn new(config: &RegistryConfig, themes: Arc<dyn ThemeSource>) -> Self {
        Self {
            modules: ModuleLocation {
                path: config.modules_dir(),
                dir: config.web_path(SitePath::Modules.as_str()),
            },
            themes,
            manifest_file: config.manifest_file.clone(),
            locale: config.locale.clone(),
        }
    }

    /// Module-owned templates, then (optionally) site overrides, each group
    /// in directory enumeration order.
    pub fn list(&self, module: &str, include_site_overrides: bool) -> Vec<TemplatePackage> {
        if modreg_fs::validate_identifier(module).is_err() {
            return Vec::new();
        }

        let owned = self.modules.join(module).join(SitePath::Templates.as_str());
        let mut packages: Vec<TemplatePackage> = subdirectories(&owned.path)
            .into_iter()
            .filter_map(|name| self.package(&owned, &name, name.clone(), TemplateOrigin::Module))
            .collect();

        if include_site_overrides {
            for theme in self.themes.themes() {
                let Some(base) = self.themes.override_location(&theme, module) else {
                    continue;
                };
                let base = base.join(SitePath::Templates.as_str());
                for name in subdirectories(&base.path) {
                    let display = TemplateRef::Site {
                        theme: theme.clone(),
                        name: name.clone(),
                    }
                    .to_string();
                    let origin = TemplateOrigin::Site {
                        theme: theme.clone(),
                    };
                    packages.extend(self.package(&base, &name, display, origin));
                }
            }
        }
        packages
    }

    /// Look up one template by `name` or `@theme/name`.
    pub fn get(&self, module: &str, name: &str) -> Option<TemplatePackage> {
        modreg_fs::validate_identifier(module).ok()?;
        match TemplateRef::parse(name)? {
            TemplateRef::Module(name) => {
                modreg_fs::validate_identifier(&name).ok()?;
                let owned = self.modules.join(module).join(SitePath::Templates.as_str());
                self.package(&owned, &name, name.clone(), TemplateOrigin::Module)
            }
            TemplateRef::Site { theme, name: bare } => {
                modreg_fs::validate_identifier(&bare).ok()?;
                let base = self
                    .themes
                    .override_location(&theme, module)?
                    .join(SitePath::Templates.as_str());
                self.package(&base, &bare, name.to_string(), TemplateOrigin::Site { theme })
            }
        }
    }

    /// Read `<base>/<name>`'s manifest. Missing or unparsable manifests
    /// exclude the directory.
    fn package(
        &self,
        base: &ModuleLocation,
        name: &str,
        display: String,
        origin: TemplateOrigin,
    ) -> Option<TemplatePackage> {
        let location = base.join(name);
        let manifest_path = location.path.join(&self.manifest_file);
        let content = match io::read_text_if_exists(&manifest_path) {
            Ok(Some(content)) => content,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(path = ?manifest_path, error = %e, "Skipping unreadable template");
                return None;
            }
        };
        let manifest: TemplateManifest = match serde_json::from_str(&content) {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::warn!(path = ?manifest_path, error = %e, "Skipping template with invalid manifest");
                return None;
            }
        };

        let title = manifest
            .title
            .resolve(&self.locale, manifest.language.as_deref())
            .unwrap_or_default()
            .to_string();

        Some(TemplatePackage {
            name: display,
            title,
            language: manifest.language,
            origin,
            path: location.path,
            dir: location.dir,
            extra: manifest.extra,
        })
    }
}
