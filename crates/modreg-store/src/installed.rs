//! Typed access to the module table.

use modreg_manifest::{Capability, InstalledVersions};

use crate::record::{InstalledModuleRecord, module_table_schema};
use crate::storage::{Database, Row};
use crate::Result;

const KEY_COLUMN: &str = "module";

/// Installed-state adapter over the module table.
///
/// Owns no caching: every call reads storage. Listings that tolerate
/// staleness go through [`crate::ListingCache`] instead.
#[derive(Debug, Clone)]
pub struct InstalledStore {
    db: Database,
    table: String,
}

impl InstalledStore {
    /// Bind to `table` in `db`, creating the table if it does not exist.
    pub fn open(db: Database, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        if !db.has_table(&table)? {
            tracing::info!(partition = %db.partition(), %table, "Creating module table");
        }
        db.create_table(&table, &module_table_schema())?;
        Ok(Self { db, table })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn get(&self, module: &str) -> Result<Option<InstalledModuleRecord>> {
        self.db
            .select(&self.table)
            .where_eq(KEY_COLUMN, module)
            .get_one()?
            .map(|row| InstalledModuleRecord::from_row(&self.table, &row))
            .transpose()
    }

    pub fn has(&self, module: &str) -> Result<bool> {
        self.db
            .select(&self.table)
            .where_eq(KEY_COLUMN, module)
            .has()
    }

    /// Insert the record, or overwrite every field of the existing row.
    pub fn upsert(&self, record: &InstalledModuleRecord) -> Result<()> {
        self.db.upsert(&self.table, KEY_COLUMN, record.to_row()?)
    }

    /// Every installed module, in installation order.
    pub fn list_all(&self) -> Result<Vec<InstalledModuleRecord>> {
        self.decode(self.db.select(&self.table).get()?)
    }

    /// Installed modules with `capability` enabled.
    pub fn list_where(&self, capability: Capability) -> Result<Vec<InstalledModuleRecord>> {
        self.decode(
            self.db
                .select(&self.table)
                .where_eq(flag_column(capability), true)
                .get()?,
        )
    }

    fn decode(&self, rows: Vec<Row>) -> Result<Vec<InstalledModuleRecord>> {
        rows.iter()
            .map(|row| InstalledModuleRecord::from_row(&self.table, row))
            .collect()
    }
}

impl InstalledVersions for InstalledStore {
    type Error = crate::Error;

    fn installed_version(&self, module: &str) -> Result<Option<String>> {
        Ok(self.get(module)?.map(|record| record.version))
    }
}

fn flag_column(capability: Capability) -> &'static str {
    match capability {
        Capability::Global => "is_global",
        Capability::Admin => "is_admin",
        Capability::Context => "is_context",
        Capability::Article => "is_article",
    }
}
