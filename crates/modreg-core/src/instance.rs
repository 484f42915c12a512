//! Module instantiation.
//!
//! A module's runtime behavior is supplied by an implementation registered
//! under its identifier in an [`ImplementationRegistry`]. Resolving a module
//! checks that it is on disk and installed, then hands the factory a
//! [`LoadedModuleContext`] describing it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use modreg_manifest::{ManifestLoader, ModuleManifest};
use modreg_store::{InstalledModuleRecord, InstalledStore};
use serde_json::{Map, Value};

use crate::config::RegistryConfig;
use crate::error::ResolveError;

/// Optional behaviors a module implementation may provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleFeature {
    Contexts,
    ContextConfigs,
    ContextTitle,
    ConfigPanel,
    ArticleReset,
}

/// Runtime behavior of a module.
///
/// Every method has an inert default; [`ModuleBehavior::features`] lists
/// the ones an implementation actually overrides.
pub trait ModuleBehavior: Send + Sync {
    fn features(&self) -> &[ModuleFeature];

    fn supports(&self, feature: ModuleFeature) -> bool {
        self.features().contains(&feature)
    }

    /// Context names the module can render.
    fn contexts(&self) -> Vec<String> {
        Vec::new()
    }

    /// Configuration fields of `context` for `site`.
    fn context_configs(&self, _site: &str, _context: &str) -> Map<String, Value> {
        Map::new()
    }

    fn context_title(&self, _context: &str) -> Option<String> {
        None
    }

    /// Administration panel markup.
    fn config_panel(&self) -> Option<String> {
        None
    }

    /// Rebuild the module's article index.
    fn reset_articles(&self) -> crate::Result<()> {
        Ok(())
    }
}

/// Filesystem and web location of a module or package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleLocation {
    pub path: PathBuf,
    pub dir: String,
}

impl ModuleLocation {
    pub fn join(&self, segment: &str) -> Self {
        Self {
            path: self.path.join(segment),
            dir: format!("{}/{}", self.dir.trim_end_matches('/'), segment),
        }
    }
}

/// Installed hash compared with the manifest on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriftStatus {
    InSync,
    Drifted { installed: String, current: String },
    NotInstalled,
    ManifestMissing,
}

impl DriftStatus {
    /// Compare the hash recorded at install time with the current one.
    pub fn compare(installed: Option<&str>, current: Option<&str>) -> Self {
        match (installed, current) {
            (_, None) => Self::ManifestMissing,
            (None, Some(_)) => Self::NotInstalled,
            (Some(installed), Some(current)) if installed == current => Self::InSync,
            (Some(installed), Some(current)) => Self::Drifted {
                installed: installed.to_string(),
                current: current.to_string(),
            },
        }
    }

    pub fn is_drifted(&self) -> bool {
        matches!(self, Self::Drifted { .. })
    }
}

/// Everything known about a resolved module.
#[derive(Debug, Clone)]
pub struct LoadedModuleContext {
    manifest: Arc<ModuleManifest>,
    record: InstalledModuleRecord,
    location: ModuleLocation,
    drift: DriftStatus,
}

impl LoadedModuleContext {
    pub fn new(
        manifest: Arc<ModuleManifest>,
        record: InstalledModuleRecord,
        location: ModuleLocation,
        drift: DriftStatus,
    ) -> Self {
        Self {
            manifest,
            record,
            location,
            drift,
        }
    }

    pub fn id(&self) -> &str {
        self.manifest.id()
    }

    pub fn manifest(&self) -> &ModuleManifest {
        &self.manifest
    }

    pub fn record(&self) -> &InstalledModuleRecord {
        &self.record
    }

    pub fn location(&self) -> &ModuleLocation {
        &self.location
    }

    /// Whether the manifest changed since install, as seen at resolve time.
    pub fn drift(&self) -> &DriftStatus {
        &self.drift
    }

    /// All installed configuration values.
    pub fn configs(&self) -> &Map<String, Value> {
        &self.record.configs
    }

    /// Installed value of `key`, or `None` if it is absent or empty
    /// (`null`, `false`, `0`, `""`, `"0"`, `[]`, `{}`).
    pub fn config(&self, key: &str) -> Option<&Value> {
        self.record.configs.get(key).filter(|v| !is_empty_value(v))
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty() || s == "0",
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

type Factory = Arc<dyn Fn(&LoadedModuleContext) -> Box<dyn ModuleBehavior> + Send + Sync>;

/// Module identifier to implementation factory.
#[derive(Clone, Default)]
pub struct ImplementationRegistry {
    factories: HashMap<String, Factory>,
}

impl std::fmt::Debug for ImplementationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<&String> = self.factories.keys().collect();
        ids.sort();
        f.debug_struct("ImplementationRegistry")
            .field("modules", &ids)
            .finish()
    }
}

impl ImplementationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the factory for module `id`, replacing any previous one.
    pub fn register<F>(&mut self, id: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&LoadedModuleContext) -> Box<dyn ModuleBehavior> + Send + Sync + 'static,
    {
        self.factories.insert(id.into(), Arc::new(factory));
        self
    }

    /// Builder form of [`ImplementationRegistry::register`].
    pub fn with<F>(mut self, id: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&LoadedModuleContext) -> Box<dyn ModuleBehavior> + Send + Sync + 'static,
    {
        self.register(id, factory);
        self
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Deterministic implementation name of module `id` (`board` becomes
    /// `ModuleBoard`).
    pub fn implementation_name(id: &str) -> String {
        let mut chars = id.chars();
        match chars.next() {
            Some(first) => format!("Module{}{}", first.to_uppercase(), chars.as_str()),
            None => "Module".to_string(),
        }
    }

    pub fn instantiate(&self, context: &LoadedModuleContext) -> Option<Box<dyn ModuleBehavior>> {
        self.factories
            .get(context.id())
            .map(|factory| factory(context))
    }
}

/// A resolved module: its context plus its behavior.
pub struct ModuleHandle {
    context: LoadedModuleContext,
    behavior: Box<dyn ModuleBehavior>,
}

impl std::fmt::Debug for ModuleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleHandle")
            .field("module", &self.context.id())
            .field("features", &self.behavior.features())
            .finish()
    }
}

impl ModuleHandle {
    pub fn id(&self) -> &str {
        self.context.id()
    }

    pub fn context(&self) -> &LoadedModuleContext {
        &self.context
    }

    pub fn behavior(&self) -> &dyn ModuleBehavior {
        self.behavior.as_ref()
    }

    pub fn supports(&self, feature: ModuleFeature) -> bool {
        self.behavior.supports(feature)
    }

    pub fn into_parts(self) -> (LoadedModuleContext, Box<dyn ModuleBehavior>) {
        (self.context, self.behavior)
    }
}

/// Resolves module identifiers into handles.
pub struct ModuleInstantiator<'a> {
    pub(crate) config: &'a RegistryConfig,
    pub(crate) loader: &'a ManifestLoader,
    pub(crate) store: &'a InstalledStore,
    pub(crate) implementations: &'a ImplementationRegistry,
}

impl ModuleInstantiator<'_> {
    /// Manifest, then installed record, then implementation.
    pub fn resolve(&self, id: &str) -> Result<ModuleHandle, ResolveError> {
        let Some(manifest) = self.loader.load(id)? else {
            tracing::debug!(module = %id, "Cannot resolve: no manifest");
            return Err(ResolveError::NotFound {
                module: id.to_string(),
            });
        };

        let Some(record) = self.store.get(id)? else {
            tracing::debug!(module = %id, "Cannot resolve: not installed");
            return Err(ResolveError::NotInstalled {
                module: id.to_string(),
            });
        };

        let location = ModuleLocation {
            path: self.loader.module_path(id),
            dir: self.config.web_path(&format!("modules/{id}")),
        };
        let current = self.loader.hash(id)?;
        let drift = DriftStatus::compare(Some(record.hash.as_str()), current.as_deref());
        if drift != DriftStatus::InSync {
            tracing::debug!(module = %id, ?drift, "Resolved module differs from its install");
        }
        let context = LoadedModuleContext::new(manifest, record, location, drift);

        let Some(behavior) = self.implementations.instantiate(&context) else {
            let implementation = ImplementationRegistry::implementation_name(id);
            tracing::warn!(module = %id, %implementation, "No implementation registered");
            return Err(ResolveError::ImplementationMissing {
                module: id.to_string(),
                implementation,
            });
        };

        tracing::debug!(module = %id, "Resolved module");
        Ok(ModuleHandle { context, behavior })
    }
}
