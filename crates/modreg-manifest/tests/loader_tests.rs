//! Integration tests for manifest loading from a modules directory

use modreg_manifest::{Capability, Error, ManifestLoader};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_module(root: &Path, id: &str, manifest: &str) {
    let dir = root.join(id);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("package.json"), manifest).unwrap();
}

#[test]
fn test_load_module_with_capabilities() {
    let temp = TempDir::new().unwrap();
    write_module(
        temp.path(),
        "page",
        r#"{"version": "2.0.0", "title": "Page", "context": true, "global": true}"#,
    );
    let loader = ManifestLoader::new(temp.path());

    let manifest = loader.load("page").unwrap().unwrap();

    assert_eq!(manifest.id(), "page");
    assert_eq!(manifest.title("en"), "Page");
    assert!(manifest.capabilities().has(Capability::Context));
    assert!(manifest.capabilities().has(Capability::Global));
    assert!(!manifest.capabilities().has(Capability::Admin));
}

#[test]
fn test_paths_follow_modules_dir() {
    let temp = TempDir::new().unwrap();
    let loader = ManifestLoader::new(temp.path());

    assert_eq!(loader.module_path("page"), temp.path().join("page"));
    assert_eq!(
        loader.manifest_path("page"),
        temp.path().join("page").join("package.json")
    );
}

#[test]
fn test_directory_without_manifest_is_none() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("empty")).unwrap();
    let loader = ManifestLoader::new(temp.path());

    assert!(loader.load("empty").unwrap().is_none());
    assert!(!loader.is_cached("empty"));
}

#[test]
fn test_identity_mismatch_is_error() {
    let temp = TempDir::new().unwrap();
    write_module(temp.path(), "page", r#"{"name": "wiki", "version": "1.0.0"}"#);
    let loader = ManifestLoader::new(temp.path());

    let err = loader.load("page").unwrap_err();
    assert!(matches!(err, Error::IdentityMismatch { .. }));
}

#[test]
fn test_hash_matches_content_checksum() {
    let temp = TempDir::new().unwrap();
    let content = r#"{"version": "1.0.0"}"#;
    write_module(temp.path(), "page", content);
    let loader = ManifestLoader::new(temp.path());

    let hash = loader.hash("page").unwrap().unwrap();

    assert_eq!(hash, modreg_fs::compute_content_checksum(content));
    assert!(hash.starts_with("sha256:"));
}

#[test]
fn test_loader_shared_across_threads() {
    let temp = TempDir::new().unwrap();
    write_module(temp.path(), "page", r#"{"version": "1.0.0"}"#);
    let loader = std::sync::Arc::new(ManifestLoader::new(temp.path()));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let loader = std::sync::Arc::clone(&loader);
            std::thread::spawn(move || loader.load("page").unwrap().unwrap())
        })
        .collect();
    let loaded: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    for manifest in &loaded[1..] {
        assert!(std::sync::Arc::ptr_eq(&loaded[0], manifest));
    }
}
