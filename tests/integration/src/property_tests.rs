//! Behavioral guarantees of the registry, one test group per guarantee.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use modreg_core::{FailureKind, ModuleRegistry, RegistryConfig, coerce};
use modreg_manifest::{ConfigType, TableSchema};
use modreg_store::{
    Filter, InstalledModuleRecord, ManualClock, MemoryStorage, Result as StoreResult, Row,
    Storage,
};
use modreg_test_utils::TestSite;
use pretty_assertions::assert_eq;
use serde_json::{Map, Value, json};

/// Storage that counts queries against the module table.
struct CountingStorage {
    inner: MemoryStorage,
    module_fetches: AtomicUsize,
}

impl CountingStorage {
    fn new() -> Self {
        Self {
            inner: MemoryStorage::new(),
            module_fetches: AtomicUsize::new(0),
        }
    }

    fn fetches(&self) -> usize {
        self.module_fetches.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.module_fetches.store(0, Ordering::SeqCst);
    }
}

impl Storage for CountingStorage {
    fn create_table(&self, partition: &str, table: &str, schema: &TableSchema) -> StoreResult<()> {
        self.inner.create_table(partition, table, schema)
    }

    fn has_table(&self, partition: &str, table: &str) -> StoreResult<bool> {
        self.inner.has_table(partition, table)
    }

    fn fetch(&self, partition: &str, table: &str, filter: &Filter) -> StoreResult<Vec<Row>> {
        if table == "module" {
            self.module_fetches.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.fetch(partition, table, filter)
    }

    fn insert(&self, partition: &str, table: &str, row: Row) -> StoreResult<()> {
        self.inner.insert(partition, table, row)
    }

    fn update(
        &self,
        partition: &str,
        table: &str,
        filter: &Filter,
        changes: &Row,
    ) -> StoreResult<usize> {
        self.inner.update(partition, table, filter, changes)
    }

    fn upsert(&self, partition: &str, table: &str, key_column: &str, row: Row) -> StoreResult<()> {
        self.inner.upsert(partition, table, key_column, row)
    }
}

fn config(site: &TestSite) -> RegistryConfig {
    RegistryConfig::new(site.root()).with_platform_version("3.0.0")
}

fn registry(site: &TestSite) -> ModuleRegistry {
    ModuleRegistry::builder(config(site), Arc::new(MemoryStorage::new()))
        .build()
        .unwrap()
}

fn values(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

// --- idempotent install ---

#[test]
fn test_install_twice_yields_one_record() {
    let site = TestSite::new();
    site.add_module(
        "board",
        json!({
            "version": "1.0.0",
            "attachments": ["board"],
            "configs": {
                "limit": {"type": "number", "value": 10},
                "use_rss": {"type": "boolean", "value": false}
            },
            "databases": {"board_post": {"columns": {"idx": {"type": "int"}}}}
        }),
    );
    let registry = registry(&site);
    let input = values(json!({"limit": 15, "use_rss": "yes"}));

    let first = registry.install("board", &input, None).unwrap();
    let second = registry.install("board", &input, None).unwrap();

    assert_eq!(registry.list_installed().unwrap().len(), 1);
    assert_eq!(first.configs, second.configs);
    assert_eq!(second.configs["limit"], json!(15));
    assert_eq!(second.configs["use_rss"], json!(true));
    assert_eq!(first, second);
}

// --- dependency gate ---

#[test]
fn test_core_requirement_above_platform_blocks_install() {
    let site = TestSite::new();
    site.add_module(
        "future",
        json!({"version": "1.0.0", "dependencies": {"core": "99.0.0"}}),
    );
    let registry = registry(&site);

    assert!(!registry.check_dependencies("future").unwrap());
    let err = registry.install("future", &Map::new(), None).unwrap_err();
    assert_eq!(err.kind(), FailureKind::Dependency);
    assert!(!registry.is_installed("future").unwrap());
}

#[test]
fn test_core_requirement_below_platform_passes() {
    let site = TestSite::new();
    site.add_module(
        "legacy",
        json!({"version": "1.0.0", "dependencies": {"core": "1.0.0"}}),
    );
    let registry = registry(&site);

    assert!(registry.check_dependencies("legacy").unwrap());
    registry.install("legacy", &Map::new(), None).unwrap();
    assert!(registry.is_installed("legacy").unwrap());
}

// --- configuration priority ---

fn limit_module(site: &TestSite) {
    site.add_module(
        "board",
        json!({
            "version": "1.0.0",
            "configs": {"limit": {"type": "number", "value": 10}}
        }),
    );
}

#[test]
fn test_schema_default_applies_without_caller_or_prior() {
    let site = TestSite::new();
    limit_module(&site);
    let registry = registry(&site);

    let record = registry.install("board", &Map::new(), None).unwrap();
    assert_eq!(record.configs["limit"], json!(10));
}

#[test]
fn test_prior_value_beats_schema_default() {
    let site = TestSite::new();
    limit_module(&site);
    let registry = registry(&site);
    registry
        .install("board", &values(json!({"limit": 20})), None)
        .unwrap();

    let record = registry.install("board", &Map::new(), None).unwrap();
    assert_eq!(record.configs["limit"], json!(20));
}

#[test]
fn test_caller_value_beats_prior_value() {
    let site = TestSite::new();
    limit_module(&site);
    let registry = registry(&site);
    registry
        .install("board", &values(json!({"limit": 20})), None)
        .unwrap();

    let record = registry
        .install("board", &values(json!({"limit": 30})), None)
        .unwrap();
    assert_eq!(record.configs["limit"], json!(30));
}

// --- type coercion ---

#[test]
fn test_coercion_of_caller_values() {
    assert_eq!(coerce(ConfigType::Boolean, json!("on")), json!(true));
    assert_eq!(coerce(ConfigType::Array, json!("x")), json!(["x"]));
}

#[test]
fn test_coercion_applied_on_install() {
    let site = TestSite::new();
    site.add_module(
        "board",
        json!({
            "version": "1.0.0",
            "configs": {
                "use_rss": {"type": "boolean", "value": false},
                "tags": {"type": "array", "value": []}
            }
        }),
    );
    let registry = registry(&site);

    let record = registry
        .install("board", &values(json!({"use_rss": "on", "tags": "x"})), None)
        .unwrap();

    assert_eq!(record.configs["use_rss"], json!(true));
    assert_eq!(record.configs["tags"], json!(["x"]));
}

// --- listing staleness ---

#[test]
fn test_listing_served_from_cache_within_window() {
    let site = TestSite::new();
    site.add_module("board", json!({"version": "1.0.0", "admin": true}));
    let storage = Arc::new(CountingStorage::new());
    let clock = Arc::new(ManualClock::default());
    let registry = ModuleRegistry::builder(config(&site), storage.clone())
        .clock(clock.clone())
        .build()
        .unwrap();
    registry.install("board", &Map::new(), None).unwrap();
    storage.reset();

    let first = registry.list_installed().unwrap();
    clock.advance_secs(59);
    let second = registry.list_installed().unwrap();

    assert_eq!(storage.fetches(), 1);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );

    clock.advance_secs(1);
    registry.list_installed().unwrap();
    assert_eq!(storage.fetches(), 2);
}

#[test]
fn test_direct_store_write_hidden_until_window_elapses() {
    let site = TestSite::new();
    let storage = Arc::new(CountingStorage::new());
    let clock = Arc::new(ManualClock::default());
    let registry = ModuleRegistry::builder(config(&site), storage.clone())
        .clock(clock.clone())
        .build()
        .unwrap();
    assert!(registry.list_installed().unwrap().is_empty());

    let record = InstalledModuleRecord {
        module: "board".into(),
        hash: "sha256:00".into(),
        version: "1.0.0".into(),
        database: "default".into(),
        flags: Default::default(),
        configs: Map::new(),
        targets: Default::default(),
    };
    registry.store().upsert(&record).unwrap();

    assert!(registry.list_installed().unwrap().is_empty());
    clock.advance_secs(60);
    assert_eq!(registry.list_installed().unwrap(), vec![record]);
}

// --- template override naming ---

#[test]
fn test_site_override_listed_after_owned_template() {
    let site = TestSite::new();
    site.add_module("blog", json!({"version": "1.0.0"}));
    site.add_module_template(
        "blog",
        "default",
        json!({"language": "en", "title": {"en": "Default", "ko": "기본"}}),
    );
    site.add_site_override(
        "acme",
        "blog",
        "fancy",
        json!({"language": "en", "title": {"en": "Fancy"}}),
    );
    let registry = ModuleRegistry::builder(
        config(&site).with_locale("ko"),
        Arc::new(MemoryStorage::new()),
    )
    .build()
    .unwrap();

    let listed: Vec<(String, String)> = registry
        .templates("blog", true)
        .into_iter()
        .map(|t| (t.name, t.title))
        .collect();

    assert_eq!(
        listed,
        vec![
            ("default".to_string(), "기본".to_string()),
            ("@acme/fancy".to_string(), "Fancy".to_string()),
        ]
    );
}

// --- subscriber lookup ---

fn notify_registry(site: &TestSite, callers: Value) -> ModuleRegistry {
    site.add_module(
        "notify",
        json!({"version": "1.0.0", "targets": {"post": {"create": callers}}}),
    );
    let registry = registry(site);
    registry.install("notify", &Map::new(), None).unwrap();
    registry
}

#[test]
fn test_wildcard_subscription_matches_any_caller() {
    let site = TestSite::new();
    let registry = notify_registry(&site, json!("*"));
    let index = registry.event_index().unwrap();

    assert_eq!(
        index.lookup_subscribers("post", "create", "anything"),
        vec!["notify"]
    );
}

#[test]
fn test_scoped_subscription_matches_exact_caller() {
    let site = TestSite::new();
    let registry = notify_registry(&site, json!(["admin"]));
    let index = registry.event_index().unwrap();

    assert_eq!(
        index.lookup_subscribers("post", "create", "admin"),
        vec!["notify"]
    );
    assert!(index.lookup_subscribers("post", "create", "anything").is_empty());
    assert!(index.lookup_subscribers("post", "delete", "admin").is_empty());
}
