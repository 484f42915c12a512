//! Install and upgrade.
//!
//! Installing is one forward-only sequence:
//!
//! 1. re-read the manifest from disk, hashing the bytes parsed
//! 2. check dependencies
//! 3. create attachment directories
//! 4. provision declared tables in the target partition
//! 5. reconcile configuration values
//! 6. upsert the installed record
//!
//! Re-installing an installed module runs the same sequence and updates the
//! record in place. A failure in step 4 leaves directories created in step 3
//! behind; nothing is rolled back.

use std::path::Path;

use modreg_fs::io;
use modreg_manifest::{DependencyChecker, ManifestLoader, ManifestSnapshot};
use modreg_store::{Database, InstalledModuleRecord, InstalledStore};
use serde_json::{Map, Value};

use crate::config_values::reconcile;
use crate::error::{Error, InstallError};

/// Runs installs against one storage and modules directory.
pub struct LifecycleController<'a> {
    pub(crate) loader: &'a ManifestLoader,
    pub(crate) checker: &'a DependencyChecker,
    pub(crate) store: &'a InstalledStore,
    pub(crate) attachment_dir: &'a Path,
}

impl<'a> LifecycleController<'a> {
    pub fn new(
        loader: &'a ManifestLoader,
        checker: &'a DependencyChecker,
        store: &'a InstalledStore,
        attachment_dir: &'a Path,
    ) -> Self {
        Self {
            loader,
            checker,
            store,
            attachment_dir,
        }
    }

    /// Install or upgrade module `id`, provisioning its tables in
    /// `partition`. Returns the record as stored.
    pub fn install(
        &self,
        id: &str,
        caller_values: &Map<String, Value>,
        partition: &str,
    ) -> Result<InstalledModuleRecord, InstallError> {
        let Some(ManifestSnapshot { manifest, hash }) = self.loader.reload(id)? else {
            tracing::debug!(module = %id, "Install requested for module without manifest");
            return Err(InstallError::NotFound {
                module: id.to_string(),
            });
        };

        let violations = self.checker.violations(&manifest, self.store)?;
        if !violations.is_empty() {
            tracing::debug!(module = %id, count = violations.len(), "Dependencies not satisfied");
            return Err(InstallError::Dependency {
                module: id.to_string(),
                violations,
            });
        }

        for namespace in &manifest.attachments {
            let dir = self.attachment_dir.join(namespace);
            match io::ensure_dir(&dir) {
                Ok(true) => tracing::debug!(module = %id, ?dir, "Created attachment directory"),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(module = %id, ?dir, error = %e, "Attachment provisioning failed");
                    return Err(InstallError::Provisioning {
                        module: id.to_string(),
                        target: format!("attachment directory '{namespace}'"),
                        source: Box::new(Error::Fs(e)),
                    });
                }
            }
        }

        let db: Database = self.store.database().with_partition(partition);
        for (table, schema) in &manifest.databases {
            if let Err(e) = db.create_table(table, schema) {
                tracing::warn!(module = %id, %partition, %table, error = %e, "Table provisioning failed");
                return Err(InstallError::Provisioning {
                    module: id.to_string(),
                    target: format!("table '{table}' in partition '{partition}'"),
                    source: Box::new(Error::Store(e)),
                });
            }
        }

        let previous = self.store.get(id)?;
        let configs = reconcile(
            &manifest.configs,
            caller_values,
            previous.as_ref().map(|record| &record.configs),
        );

        let record = InstalledModuleRecord {
            module: id.to_string(),
            hash,
            version: manifest.version.clone(),
            database: partition.to_string(),
            flags: manifest.capabilities(),
            configs,
            targets: manifest.targets().clone(),
        };
        self.store.upsert(&record)?;

        tracing::info!(
            module = %id,
            version = %record.version,
            upgrade = previous.is_some(),
            "Installed module"
        );
        Ok(record)
    }
}
