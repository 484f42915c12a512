//! [`TestSite`] builder for module registry test scenarios.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::TempDir;

/// A temporary site root laid out like a deployment:
///
/// ```text
/// <root>/modules/<module>/package.json
/// <root>/modules/<module>/templets/<name>/package.json
/// <root>/templets/<theme>/templets/modules/<module>/templets/<name>/package.json
/// ```
///
/// # Example
///
/// ```rust
/// use modreg_test_utils::TestSite;
/// use serde_json::json;
///
/// let site = TestSite::new();
/// site.add_module("blog", json!({"version": "1.0.0"}));
/// site.assert_file_exists("modules/blog/package.json");
/// ```
pub struct TestSite {
    temp_dir: TempDir,
}

impl Default for TestSite {
    fn default() -> Self {
        Self::new()
    }
}

impl TestSite {
    /// Create an empty site root with `modules/` and `templets/`.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("modules")).unwrap();
        fs::create_dir_all(temp_dir.path().join("templets")).unwrap();
        Self { temp_dir }
    }

    /// Return the site root.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Absolute path of `relative` under the root.
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }

    /// Write `modules/<id>/package.json`, replacing any previous manifest.
    pub fn add_module(&self, id: &str, manifest: Value) -> PathBuf {
        let dir = self.root().join("modules").join(id);
        write_json(&dir, &manifest);
        dir
    }

    /// Write raw manifest text, for malformed-manifest scenarios.
    pub fn add_module_raw(&self, id: &str, content: &str) -> PathBuf {
        let dir = self.root().join("modules").join(id);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("package.json"), content).unwrap();
        dir
    }

    /// Write a template bundled with module `id`.
    pub fn add_module_template(&self, id: &str, name: &str, manifest: Value) -> PathBuf {
        let dir = self
            .root()
            .join("modules")
            .join(id)
            .join("templets")
            .join(name);
        write_json(&dir, &manifest);
        dir
    }

    /// Create a theme directory with no module overrides.
    pub fn add_theme(&self, theme: &str) -> PathBuf {
        let dir = self.root().join("templets").join(theme);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Write an override template for module `id` provided by `theme`.
    pub fn add_site_override(&self, theme: &str, id: &str, name: &str, manifest: Value) -> PathBuf {
        let dir = self
            .add_theme(theme)
            .join("templets")
            .join("modules")
            .join(id)
            .join("templets")
            .join(name);
        write_json(&dir, &manifest);
        dir
    }

    /// Create an empty directory (a template without a manifest, say).
    pub fn add_dir(&self, relative: &str) -> PathBuf {
        let dir = self.path(relative);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Assert that `path` (relative to the root) exists.
    ///
    /// # Panics
    /// Panics with a descriptive message if the path does not exist.
    pub fn assert_file_exists(&self, path: &str) {
        let full_path = self.path(path);
        assert!(
            full_path.exists(),
            "Expected path to exist: {}",
            full_path.display()
        );
    }

    /// Assert that `path` (relative to the root) is a directory.
    ///
    /// # Panics
    /// Panics if the path is missing or not a directory.
    pub fn assert_dir_exists(&self, path: &str) {
        let full_path = self.path(path);
        assert!(
            full_path.is_dir(),
            "Expected directory: {}",
            full_path.display()
        );
    }
}

fn write_json(dir: &Path, manifest: &Value) {
    fs::create_dir_all(dir).unwrap();
    fs::write(
        dir.join("package.json"),
        serde_json::to_string_pretty(manifest).unwrap(),
    )
    .unwrap();
}
