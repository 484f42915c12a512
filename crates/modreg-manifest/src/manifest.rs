//! Module manifest parsing for `package.json` files.
//!
//! Every module directory carries one manifest. The module identifier is
//! implied by the directory name; a manifest may repeat it in `name`, in
//! which case the two must agree.
//!
//! # Example
//!
//! ```json
//! {
//!   "version": "3.1.0",
//!   "language": "ko",
//!   "title": { "ko": "게시판", "en": "Board" },
//!   "dependencies": { "core": "3.0.0", "member": "3.0.0" },
//!   "global": false,
//!   "admin": true,
//!   "context": true,
//!   "article": true,
//!   "attachments": ["board"],
//!   "configs": {
//!     "limit": { "type": "number", "value": 10 },
//!     "use_rss": { "type": "boolean", "value": false }
//!   },
//!   "targets": { "member": { "delete": "*" } },
//!   "databases": { "board_post_table": { "columns": { "idx": { "type": "int" } } } }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::locale::LocalizedText;
use crate::schema::{ConfigField, TableSchema};
use crate::targets::EventTargets;
use crate::version::{VersionRequirement, normalize_version};

/// Extension points a module can participate in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Loaded on every page render.
    Global,
    /// Provides a site administration panel.
    Admin,
    /// Renders page contexts.
    Context,
    /// Contributes to the article index.
    Article,
}

impl Capability {
    pub const ALL: [Capability; 4] = [Self::Global, Self::Admin, Self::Context, Self::Article];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Admin => "admin",
            Self::Context => "context",
            Self::Article => "article",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four capability booleans of a module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityFlags {
    pub global: bool,
    pub admin: bool,
    pub context: bool,
    pub article: bool,
}

impl CapabilityFlags {
    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::Global => self.global,
            Capability::Admin => self.admin,
            Capability::Context => self.context,
            Capability::Article => self.article,
        }
    }
}

/// A module's package descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleManifest {
    /// Identifier taken from the directory the manifest was loaded from.
    #[serde(skip)]
    id: String,
    /// Optional explicit name; must equal the directory identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub version: String,
    /// Default locale for `title`/`description` fallback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub title: LocalizedText,
    #[serde(default)]
    pub description: LocalizedText,
    /// Dependency id to version requirement; `core` is the platform itself.
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub global: bool,
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub context: bool,
    #[serde(default)]
    pub article: bool,
    /// Attachment namespaces to provision.
    #[serde(default)]
    pub attachments: Vec<String>,
    /// Tables to provision in the install partition.
    #[serde(default)]
    pub databases: BTreeMap<String, TableSchema>,
    #[serde(default)]
    pub configs: BTreeMap<String, ConfigField>,
    #[serde(default)]
    pub targets: EventTargets,
    /// Fields this crate does not interpret (author, homepage, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ModuleManifest {
    /// Parse and validate the manifest of module `id` from JSON.
    pub fn from_json(id: &str, content: &str) -> Result<Self> {
        let mut manifest: Self =
            serde_json::from_str(content).map_err(|e| Error::ManifestParse {
                module: id.to_string(),
                message: e.to_string(),
            })?;
        manifest.id = id.to_string();
        manifest.validate()?;
        Ok(manifest)
    }

    /// The module identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn capabilities(&self) -> CapabilityFlags {
        CapabilityFlags {
            global: self.global,
            admin: self.admin,
            context: self.context,
            article: self.article,
        }
    }

    /// Title for `locale`, falling back to the manifest's own language.
    pub fn title(&self, locale: &str) -> &str {
        self.title
            .resolve(locale, self.language.as_deref())
            .unwrap_or_default()
    }

    /// Description for `locale`, falling back to the manifest's own language.
    pub fn description(&self, locale: &str) -> &str {
        self.description
            .resolve(locale, self.language.as_deref())
            .unwrap_or_default()
    }

    /// Declared event subscriptions.
    pub fn targets(&self) -> &EventTargets {
        &self.targets
    }

    fn validate(&self) -> Result<()> {
        if let Some(ref declared) = self.name {
            if declared != &self.id {
                return Err(Error::IdentityMismatch {
                    expected: self.id.clone(),
                    declared: declared.clone(),
                });
            }
        }

        normalize_version(&self.version)?;

        for requirement in self.dependencies.values() {
            VersionRequirement::parse(requirement)?;
        }

        for namespace in &self.attachments {
            modreg_fs::validate_identifier(namespace).map_err(|e| Error::InvalidManifest {
                module: self.id.clone(),
                reason: format!("attachment namespace: {e}"),
            })?;
        }

        for (table, schema) in &self.databases {
            if schema.columns.is_empty() {
                return Err(Error::InvalidManifest {
                    module: self.id.clone(),
                    reason: format!("table '{table}' declares no columns"),
                });
            }
        }

        Ok(())
    }
}
