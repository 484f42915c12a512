//! End-to-end flow over on-disk storage.
//!
//! Config file -> registry -> install -> reopen -> resolve -> events.

use std::fs;
use std::sync::Arc;

use modreg_core::{
    DriftStatus, FailureKind, ImplementationRegistry, LoadedModuleContext, ModuleBehavior,
    ModuleFeature, ModuleRegistry, RegistryConfig,
};
use modreg_store::{FileCache, JsonFileStorage};
use modreg_test_utils::TestSite;
use pretty_assertions::assert_eq;
use serde_json::{Map, json};

struct Member;

impl ModuleBehavior for Member {
    fn features(&self) -> &[ModuleFeature] {
        &[ModuleFeature::ConfigPanel]
    }

    fn config_panel(&self) -> Option<String> {
        Some("<form id=\"member\"></form>".to_string())
    }
}

/// A site with `member`, `board` (depends on member) and a config file.
fn setup_site() -> TestSite {
    let site = TestSite::new();
    site.add_module(
        "member",
        json!({
            "version": "3.0.0",
            "title": {"en": "Members"},
            "global": true,
            "admin": true,
            "attachments": ["member"],
            "databases": {
                "member_table": {
                    "columns": {
                        "idx": {"type": "int"},
                        "email": {"type": "varchar", "length": 255}
                    },
                    "indexes": {"idx": "primary_key", "email": "unique"},
                    "auto_increment": "idx"
                }
            }
        }),
    );
    site.add_module(
        "board",
        json!({
            "version": "3.1.0",
            "title": {"en": "Board"},
            "dependencies": {"core": "3.0", "member": "3.0.0"},
            "context": true,
            "article": true,
            "configs": {"limit": {"type": "number", "value": 10}},
            "targets": {"member": {"delete": "*"}}
        }),
    );
    fs::write(
        site.path("registry.toml"),
        r#"
root = "."
web_root = "/site"
platform_version = "3.0.0"
listing_staleness_secs = 60
"#,
    )
    .unwrap();
    site
}

fn open(site: &TestSite) -> ModuleRegistry {
    let config = RegistryConfig::load(&site.path("registry.toml")).unwrap();
    let storage = Arc::new(JsonFileStorage::open(site.path("data")).unwrap());
    let implementations = ImplementationRegistry::new()
        .with("member", |_: &LoadedModuleContext| Box::new(Member) as Box<dyn ModuleBehavior>);
    ModuleRegistry::builder(config, storage)
        .cache_backend(Arc::new(FileCache::new(site.path("cache"))))
        .implementations(implementations)
        .build()
        .unwrap()
}

#[test]
fn test_config_file_resolves_relative_root() {
    let site = setup_site();
    let config = RegistryConfig::load(&site.path("registry.toml")).unwrap();

    assert_eq!(config.modules_dir(), site.path("modules"));
    assert_eq!(config.web_path("modules/board"), "/site/modules/board");
    assert_eq!(config.platform_version, "3.0.0");
}

#[test]
fn test_install_order_follows_dependencies() {
    let site = setup_site();
    let registry = open(&site);

    let err = registry.install("board", &Map::new(), None).unwrap_err();
    assert_eq!(err.kind(), FailureKind::Dependency);
    assert!(err.to_string().contains("member"));

    registry.install("member", &Map::new(), None).unwrap();
    registry.install("board", &Map::new(), None).unwrap();

    let mut installed: Vec<String> = registry
        .list_installed()
        .unwrap()
        .into_iter()
        .map(|r| r.module)
        .collect();
    installed.sort();
    assert_eq!(installed, vec!["board", "member"]);
    site.assert_dir_exists("attachments/member");
    site.assert_file_exists("data/default.json");
}

#[test]
fn test_installed_state_survives_reopen() {
    let site = setup_site();
    {
        let registry = open(&site);
        registry.install("member", &Map::new(), None).unwrap();
        registry
            .install("board", &json!({"limit": 25}).as_object().cloned().unwrap(), None)
            .unwrap();
    }

    let registry = open(&site);

    let board = registry.installed("board").unwrap().unwrap();
    assert_eq!(board.configs["limit"], json!(25));
    assert_eq!(board.version, "3.1.0");
    assert_eq!(registry.drift("board").unwrap(), DriftStatus::InSync);
    assert!(
        registry
            .store()
            .database()
            .has_table("member_table")
            .unwrap()
    );
}

#[test]
fn test_resolve_and_dispatch() {
    let site = setup_site();
    let registry = open(&site);
    registry.install("member", &Map::new(), None).unwrap();
    registry.install("board", &Map::new(), None).unwrap();

    let globals = registry.load_globals().unwrap();
    assert_eq!(globals.len(), 1);
    assert_eq!(globals[0].id(), "member");
    assert_eq!(globals[0].context().location().dir, "/site/modules/member");

    assert_eq!(
        registry.config_panel("member").unwrap().as_deref(),
        Some("<form id=\"member\"></form>")
    );
    assert_eq!(
        registry.resolve("board").unwrap_err().kind(),
        FailureKind::ImplementationMissing
    );
    // No article implementation can be resolved; nothing is reset
    assert_eq!(registry.reset_articles().unwrap(), 0);
}

#[test]
fn test_event_index_after_installs() {
    let site = setup_site();
    let registry = open(&site);
    registry.install("member", &Map::new(), None).unwrap();
    registry.install("board", &Map::new(), None).unwrap();

    let index = registry.event_index().unwrap();

    assert_eq!(
        index.lookup_subscribers("member", "delete", "anyone"),
        vec!["board"]
    );
    assert!(index.lookup_subscribers("board", "delete", "anyone").is_empty());
}

#[test]
fn test_drift_after_manifest_edit() {
    let site = setup_site();
    let registry = open(&site);
    registry.install("member", &Map::new(), None).unwrap();

    site.add_module("member", json!({"version": "3.0.1", "global": true}));

    let DriftStatus::Drifted { installed, current } = registry.drift("member").unwrap() else {
        panic!("expected drift");
    };
    assert_ne!(installed, current);
}

#[test]
fn test_upgrade_in_place_is_in_sync_after_reopen() {
    let site = setup_site();
    {
        let registry = open(&site);
        registry.install("member", &Map::new(), None).unwrap();
        registry.install("board", &Map::new(), None).unwrap();

        site.add_module(
            "board",
            json!({
                "version": "4.0.0",
                "dependencies": {"member": "3.0.0"},
                "context": true,
                "configs": {
                    "limit": {"type": "number", "value": 10},
                    "per_page": {"type": "number", "value": 5}
                }
            }),
        );
        let upgraded = registry.install("board", &Map::new(), None).unwrap();

        assert_eq!(upgraded.version, "4.0.0");
        assert_eq!(upgraded.configs["per_page"], json!(5));
        assert_eq!(registry.drift("board").unwrap(), DriftStatus::InSync);
    }

    let registry = open(&site);

    assert_eq!(registry.manifest("board").unwrap().unwrap().version, "4.0.0");
    assert_eq!(registry.installed("board").unwrap().unwrap().version, "4.0.0");
    assert_eq!(registry.drift("board").unwrap(), DriftStatus::InSync);
}
