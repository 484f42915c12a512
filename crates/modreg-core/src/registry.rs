//! The module registry façade.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use modreg_manifest::{
    Capability, DependencyChecker, DependencyViolation, ManifestLoader, ModuleManifest,
};
use modreg_store::{
    CacheBackend, Clock, Database, InstalledModuleRecord, InstalledStore, ListingCache,
    MemoryCache, Storage, SystemClock,
};
use serde_json::{Map, Value};

use crate::config::RegistryConfig;
use crate::error::{Error, InstallError, ResolveError, Result};
use crate::events::EventIndex;
use crate::instance::{
    DriftStatus, ImplementationRegistry, ModuleFeature, ModuleHandle, ModuleInstantiator,
};
use crate::lifecycle::LifecycleController;
use crate::templates::{FsThemeSource, TemplatePackage, TemplateResolver, ThemeSource};

/// An installed context-capable module with its resolved title.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextModule {
    pub record: InstalledModuleRecord,
    pub title: String,
}

/// Builder for [`ModuleRegistry`].
pub struct ModuleRegistryBuilder {
    config: RegistryConfig,
    storage: Arc<dyn Storage>,
    cache: Arc<dyn CacheBackend>,
    clock: Arc<dyn Clock>,
    themes: Option<Arc<dyn ThemeSource>>,
    implementations: ImplementationRegistry,
}

impl ModuleRegistryBuilder {
    /// Cache backend for the installed listing (process-local by default).
    pub fn cache_backend(mut self, cache: Arc<dyn CacheBackend>) -> Self {
        self.cache = cache;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Theme enumeration (themes under `<root>/templets` by default).
    pub fn theme_source(mut self, themes: Arc<dyn ThemeSource>) -> Self {
        self.themes = Some(themes);
        self
    }

    pub fn implementations(mut self, implementations: ImplementationRegistry) -> Self {
        self.implementations = implementations;
        self
    }

    /// Open the module table and assemble the registry.
    pub fn build(self) -> Result<ModuleRegistry> {
        let config = self.config;
        let db = Database::new(self.storage, config.default_partition.clone());
        let store = InstalledStore::open(db, config.module_table.clone())?;
        let listing = ListingCache::new(store.clone())
            .with_backend(self.cache)
            .with_clock(self.clock)
            .with_staleness_secs(config.listing_staleness_secs);
        let loader =
            ManifestLoader::new(config.modules_dir()).with_file_name(config.manifest_file.clone());
        let themes = self
            .themes
            .unwrap_or_else(|| Arc::new(FsThemeSource::new(&config)));
        let templates = TemplateResolver::new(&config, themes);
        let checker = DependencyChecker::new(config.platform_version.clone());

        tracing::debug!(root = ?config.root, platform = %config.platform_version, "Module registry ready");
        Ok(ModuleRegistry {
            config,
            loader,
            store,
            listing,
            checker,
            templates,
            implementations: self.implementations,
            events: OnceLock::new(),
        })
    }
}

/// Entry point for discovering, installing and resolving modules.
///
/// ```no_run
/// use std::sync::Arc;
/// use modreg_core::{ModuleRegistry, RegistryConfig};
/// use modreg_store::JsonFileStorage;
///
/// let storage = Arc::new(JsonFileStorage::open("/srv/site/data")?);
/// let registry = ModuleRegistry::builder(RegistryConfig::new("/srv/site"), storage).build()?;
/// registry.install("board", &Default::default(), None)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct ModuleRegistry {
    config: RegistryConfig,
    loader: ManifestLoader,
    store: InstalledStore,
    listing: ListingCache,
    checker: DependencyChecker,
    templates: TemplateResolver,
    implementations: ImplementationRegistry,
    events: OnceLock<Arc<EventIndex>>,
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("root", &self.config.root)
            .field("implementations", &self.implementations)
            .finish_non_exhaustive()
    }
}

impl ModuleRegistry {
    pub fn builder(config: RegistryConfig, storage: Arc<dyn Storage>) -> ModuleRegistryBuilder {
        ModuleRegistryBuilder {
            config,
            storage,
            cache: Arc::new(MemoryCache::new()),
            clock: Arc::new(SystemClock),
            themes: None,
            implementations: ImplementationRegistry::new(),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn loader(&self) -> &ManifestLoader {
        &self.loader
    }

    pub fn store(&self) -> &InstalledStore {
        &self.store
    }

    pub fn listing(&self) -> &ListingCache {
        &self.listing
    }

    // --- manifests ---

    pub fn manifest(&self, id: &str) -> Result<Option<Arc<ModuleManifest>>> {
        Ok(self.loader.load(id)?)
    }

    /// Fresh content hash of the manifest on disk.
    pub fn hash(&self, id: &str) -> Result<Option<String>> {
        Ok(self.loader.hash(id)?)
    }

    /// Title for the runtime locale, empty if the module has no manifest.
    pub fn title(&self, id: &str) -> Result<String> {
        Ok(self
            .manifest(id)?
            .map(|m| m.title(&self.config.locale).to_string())
            .unwrap_or_default())
    }

    pub fn description(&self, id: &str) -> Result<String> {
        Ok(self
            .manifest(id)?
            .map(|m| m.description(&self.config.locale).to_string())
            .unwrap_or_default())
    }

    pub fn module_path(&self, id: &str) -> PathBuf {
        self.loader.module_path(id)
    }

    /// Web location of the module directory.
    pub fn module_dir(&self, id: &str) -> String {
        self.config.web_path(&format!("modules/{id}"))
    }

    // --- installed state ---

    /// Reads storage directly, never the listing cache.
    pub fn is_installed(&self, id: &str) -> Result<bool> {
        Ok(self.store.has(id)?)
    }

    pub fn installed(&self, id: &str) -> Result<Option<InstalledModuleRecord>> {
        Ok(self.store.get(id)?)
    }

    pub fn check_dependencies(&self, id: &str) -> Result<bool> {
        let manifest = self.require_manifest(id)?;
        Ok(self.checker.check(&manifest, &self.store)?)
    }

    pub fn dependency_violations(&self, id: &str) -> Result<Vec<DependencyViolation>> {
        let manifest = self.require_manifest(id)?;
        Ok(self.checker.violations(&manifest, &self.store)?)
    }

    /// Compare the installed hash with the manifest currently on disk.
    pub fn drift(&self, id: &str) -> Result<DriftStatus> {
        let current = self.hash(id)?;
        let installed = self.installed(id)?;
        let drift = DriftStatus::compare(
            installed.as_ref().map(|record| record.hash.as_str()),
            current.as_deref(),
        );
        if drift.is_drifted() {
            tracing::info!(module = %id, "Manifest changed since install");
        }
        Ok(drift)
    }

    /// Every installed module, from the listing cache.
    pub fn list_installed(&self) -> Result<Vec<InstalledModuleRecord>> {
        Ok(self.listing.list_all()?)
    }

    pub fn global_modules(&self) -> Result<Vec<InstalledModuleRecord>> {
        Ok(self.listing.list_where(Capability::Global)?)
    }

    pub fn admin_modules(&self) -> Result<Vec<InstalledModuleRecord>> {
        Ok(self.listing.list_where(Capability::Admin)?)
    }

    pub fn context_modules(&self) -> Result<Vec<ContextModule>> {
        self.listing
            .list_where(Capability::Context)?
            .into_iter()
            .map(|record| -> Result<ContextModule> {
                let title = self.title(&record.module)?;
                Ok(ContextModule { record, title })
            })
            .collect()
    }

    /// Resolve every global module. Modules that fail to resolve are logged
    /// and skipped.
    pub fn load_globals(&self) -> Result<Vec<ModuleHandle>> {
        let mut handles = Vec::new();
        for record in self.global_modules()? {
            match self.resolve(&record.module) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    tracing::warn!(module = %record.module, kind = %e.kind(), error = %e, "Skipping global module");
                }
            }
        }
        Ok(handles)
    }

    /// Ask every article-capable module to rebuild its article index.
    /// Returns the number of modules reset.
    pub fn reset_articles(&self) -> Result<usize> {
        let mut reset = 0;
        for record in self.store.list_where(Capability::Article)? {
            let handle = match self.resolve(&record.module) {
                Ok(handle) => handle,
                Err(e) => {
                    tracing::warn!(module = %record.module, error = %e, "Cannot reset articles");
                    continue;
                }
            };
            handle.behavior().reset_articles()?;
            reset += 1;
        }
        Ok(reset)
    }

    // --- module behavior ---

    pub fn contexts(&self, id: &str) -> std::result::Result<Vec<String>, ResolveError> {
        Ok(self.resolve(id)?.behavior().contexts())
    }

    pub fn context_configs(
        &self,
        id: &str,
        site: &str,
        context: &str,
    ) -> std::result::Result<Map<String, Value>, ResolveError> {
        Ok(self.resolve(id)?.behavior().context_configs(site, context))
    }

    pub fn context_title(
        &self,
        id: &str,
        context: &str,
    ) -> std::result::Result<String, ResolveError> {
        Ok(self
            .resolve(id)?
            .behavior()
            .context_title(context)
            .unwrap_or_default())
    }

    pub fn config_panel(&self, id: &str) -> std::result::Result<Option<String>, ResolveError> {
        Ok(self.resolve(id)?.behavior().config_panel())
    }

    pub fn supports(
        &self,
        id: &str,
        feature: ModuleFeature,
    ) -> std::result::Result<bool, ResolveError> {
        Ok(self.resolve(id)?.supports(feature))
    }

    // --- lifecycle ---

    /// Install or upgrade `id`, provisioning into `partition` (the default
    /// partition if `None`). The listing cache is invalidated on success.
    pub fn install(
        &self,
        id: &str,
        caller_values: &Map<String, Value>,
        partition: Option<&str>,
    ) -> std::result::Result<InstalledModuleRecord, InstallError> {
        let attachment_dir = self.config.attachment_dir();
        let partition = partition.unwrap_or(self.config.default_partition.as_str());
        let controller =
            LifecycleController::new(&self.loader, &self.checker, &self.store, &attachment_dir);
        let record = controller.install(id, caller_values, partition)?;
        self.listing.invalidate()?;
        Ok(record)
    }

    pub fn resolve(&self, id: &str) -> std::result::Result<ModuleHandle, ResolveError> {
        ModuleInstantiator {
            config: &self.config,
            loader: &self.loader,
            store: &self.store,
            implementations: &self.implementations,
        }
        .resolve(id)
    }

    // --- templates ---

    pub fn templates(&self, id: &str, include_site_overrides: bool) -> Vec<TemplatePackage> {
        self.templates.list(id, include_site_overrides)
    }

    /// One template by `name` or `@theme/name`.
    pub fn template(&self, id: &str, name: &str) -> Option<TemplatePackage> {
        self.templates.get(id, name)
    }

    // --- events ---

    /// The event index, built from the listing on first use and shared
    /// afterwards.
    pub fn event_index(&self) -> Result<Arc<EventIndex>> {
        if let Some(index) = self.events.get() {
            return Ok(Arc::clone(index));
        }
        let built = Arc::new(EventIndex::from_records(&self.listing.list_all()?));
        Ok(Arc::clone(self.events.get_or_init(|| built)))
    }

    fn require_manifest(&self, id: &str) -> Result<Arc<ModuleManifest>> {
        self.manifest(id)?.ok_or_else(|| Error::ModuleNotFound {
            module: id.to_string(),
        })
    }
}
