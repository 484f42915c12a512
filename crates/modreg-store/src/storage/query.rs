//! Partition-bound query builder.

use std::sync::Arc;

use modreg_manifest::TableSchema;
use serde_json::Value;

use super::{Filter, Row, Storage};
use crate::Result;

/// A storage handle bound to one partition.
///
/// ```
/// use std::sync::Arc;
/// use modreg_store::{Database, MemoryStorage};
///
/// let db = Database::new(Arc::new(MemoryStorage::new()), "default");
/// assert!(!db.has_table("module").unwrap());
/// ```
#[derive(Clone)]
pub struct Database {
    storage: Arc<dyn Storage>,
    partition: String,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("partition", &self.partition)
            .finish_non_exhaustive()
    }
}

impl Database {
    pub fn new(storage: Arc<dyn Storage>, partition: impl Into<String>) -> Self {
        Self {
            storage,
            partition: partition.into(),
        }
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// The same storage bound to another partition.
    pub fn with_partition(&self, partition: impl Into<String>) -> Self {
        Self::new(Arc::clone(&self.storage), partition)
    }

    pub fn select<'a>(&'a self, table: &'a str) -> Select<'a> {
        Select {
            db: self,
            table,
            filter: Filter::all(),
        }
    }

    pub fn insert<'a>(&'a self, table: &'a str, row: Row) -> Insert<'a> {
        Insert {
            db: self,
            table,
            row,
        }
    }

    pub fn update<'a>(&'a self, table: &'a str, changes: Row) -> Update<'a> {
        Update {
            db: self,
            table,
            changes,
            filter: Filter::all(),
        }
    }

    /// Insert or overwrite the row identified by `key_column`.
    pub fn upsert(&self, table: &str, key_column: &str, row: Row) -> Result<()> {
        self.storage.upsert(&self.partition, table, key_column, row)
    }

    pub fn create_table(&self, table: &str, schema: &TableSchema) -> Result<()> {
        self.storage.create_table(&self.partition, table, schema)
    }

    pub fn has_table(&self, table: &str) -> Result<bool> {
        self.storage.has_table(&self.partition, table)
    }
}

/// A pending `select`.
#[must_use]
pub struct Select<'a> {
    db: &'a Database,
    table: &'a str,
    filter: Filter,
}

impl Select<'_> {
    pub fn where_eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filter = self.filter.and_eq(column, value);
        self
    }

    /// All matching rows.
    pub fn get(self) -> Result<Vec<Row>> {
        self.db
            .storage
            .fetch(&self.db.partition, self.table, &self.filter)
    }

    /// The first matching row.
    pub fn get_one(self) -> Result<Option<Row>> {
        Ok(self.get()?.into_iter().next())
    }

    /// Whether any row matches.
    pub fn has(self) -> Result<bool> {
        Ok(self.get_one()?.is_some())
    }

    pub fn count(self) -> Result<usize> {
        Ok(self.get()?.len())
    }
}

/// A pending `insert`.
#[must_use]
pub struct Insert<'a> {
    db: &'a Database,
    table: &'a str,
    row: Row,
}

impl Insert<'_> {
    pub fn execute(self) -> Result<()> {
        self.db.storage.insert(&self.db.partition, self.table, self.row)
    }
}

/// A pending `update`.
#[must_use]
pub struct Update<'a> {
    db: &'a Database,
    table: &'a str,
    changes: Row,
    filter: Filter,
}

impl Update<'_> {
    pub fn where_eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filter = self.filter.and_eq(column, value);
        self
    }

    /// Apply the update; returns the number of rows changed.
    pub fn execute(self) -> Result<usize> {
        self.db
            .storage
            .update(&self.db.partition, self.table, &self.filter, &self.changes)
    }
}
