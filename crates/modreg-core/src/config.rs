//! Registry configuration.
//!
//! ```toml
//! root = "/srv/site"
//! web_root = "/site"
//! locale = "ko"
//! platform_version = "3.0.0"
//! listing_staleness_secs = 60
//! ```

use std::path::{Path, PathBuf};

use modreg_fs::{ConfigStore, SitePath};
use serde::{Deserialize, Serialize};

use crate::Result;

fn default_platform_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_staleness() -> u64 {
    modreg_store::cache::DEFAULT_STALENESS_SECS
}

fn default_partition() -> String {
    "default".to_string()
}

fn default_module_table() -> String {
    "module".to_string()
}

fn default_manifest_file() -> String {
    SitePath::Manifest.as_str().to_string()
}

/// Settings of one registry instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Filesystem root holding `modules/` and `templets/`
    pub root: PathBuf,
    /// URL prefix of `root` for web-reachable locations
    #[serde(default)]
    pub web_root: String,
    /// Where attachment namespaces are created; `<root>/attachments` if unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_path: Option<PathBuf>,
    /// Version the `core` dependency is checked against
    #[serde(default = "default_platform_version")]
    pub platform_version: String,
    /// Runtime locale for title and description lookup
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default = "default_staleness")]
    pub listing_staleness_secs: u64,
    /// Partition holding the module table, and the default install target
    #[serde(default = "default_partition")]
    pub default_partition: String,
    #[serde(default = "default_module_table")]
    pub module_table: String,
    #[serde(default = "default_manifest_file")]
    pub manifest_file: String,
}

impl RegistryConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            web_root: String::new(),
            attachment_path: None,
            platform_version: default_platform_version(),
            locale: default_locale(),
            listing_staleness_secs: default_staleness(),
            default_partition: default_partition(),
            module_table: default_module_table(),
            manifest_file: default_manifest_file(),
        }
    }

    /// Load from a TOML, JSON or YAML file. A relative `root` is taken
    /// relative to the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config: Self = ConfigStore::new().load(path)?;
        if config.root.is_relative() {
            if let Some(parent) = path.parent() {
                config.root = parent.join(&config.root);
            }
        }
        tracing::debug!(?path, root = ?config.root, "Loaded registry config");
        Ok(config)
    }

    /// Write to `path` in the format its extension names.
    pub fn save(&self, path: &Path) -> Result<()> {
        ConfigStore::new().save(path, self)?;
        Ok(())
    }

    pub fn with_web_root(mut self, web_root: impl Into<String>) -> Self {
        self.web_root = web_root.into();
        self
    }

    pub fn with_attachment_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.attachment_path = Some(path.into());
        self
    }

    pub fn with_platform_version(mut self, version: impl Into<String>) -> Self {
        self.platform_version = version.into();
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn with_listing_staleness_secs(mut self, secs: u64) -> Self {
        self.listing_staleness_secs = secs;
        self
    }

    pub fn with_default_partition(mut self, partition: impl Into<String>) -> Self {
        self.default_partition = partition.into();
        self
    }

    pub fn with_module_table(mut self, table: impl Into<String>) -> Self {
        self.module_table = table.into();
        self
    }

    pub fn with_manifest_file(mut self, file: impl Into<String>) -> Self {
        self.manifest_file = file.into();
        self
    }

    pub fn modules_dir(&self) -> PathBuf {
        self.root.join(SitePath::Modules.as_str())
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.root.join(SitePath::Templates.as_str())
    }

    pub fn attachment_dir(&self) -> PathBuf {
        self.attachment_path
            .clone()
            .unwrap_or_else(|| self.root.join(SitePath::Attachments.as_str()))
    }

    /// Web location of `relative` under the root.
    pub fn web_path(&self, relative: &str) -> String {
        format!("{}/{}", self.web_root.trim_end_matches('/'), relative)
    }
}
