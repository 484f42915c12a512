//! In-process storage backend.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use modreg_manifest::TableSchema;

use super::table::Partition;
use super::{Filter, Row, Storage};
use crate::Result;

/// Storage held in memory for the lifetime of the value.
///
/// Every operation runs under one mutex, so each call is atomic.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    partitions: Mutex<HashMap<String, Partition>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Partition>> {
        self.partitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn partition_mut<'a>(
    partitions: &'a mut HashMap<String, Partition>,
    name: &str,
) -> &'a mut Partition {
    partitions
        .entry(name.to_string())
        .or_insert_with(|| Partition::new(name))
}

impl Storage for MemoryStorage {
    fn create_table(&self, partition: &str, table: &str, schema: &TableSchema) -> Result<()> {
        let mut partitions = self.lock();
        partition_mut(&mut partitions, partition)
            .create_table(table, schema)?;
        Ok(())
    }

    fn has_table(&self, partition: &str, table: &str) -> Result<bool> {
        Ok(self
            .lock()
            .get(partition)
            .is_some_and(|p| p.has_table(table)))
    }

    fn fetch(&self, partition: &str, table: &str, filter: &Filter) -> Result<Vec<Row>> {
        let mut partitions = self.lock();
        partition_mut(&mut partitions, partition)
            .table(table)?
            .fetch(table, filter)
    }

    fn insert(&self, partition: &str, table: &str, row: Row) -> Result<()> {
        let mut partitions = self.lock();
        partition_mut(&mut partitions, partition)
            .table_mut(table)?
            .insert(table, row)
    }

    fn update(
        &self,
        partition: &str,
        table: &str,
        filter: &Filter,
        changes: &Row,
    ) -> Result<usize> {
        let mut partitions = self.lock();
        partition_mut(&mut partitions, partition)
            .table_mut(table)?
            .update(table, filter, changes)
    }

    fn upsert(&self, partition: &str, table: &str, key_column: &str, row: Row) -> Result<()> {
        let mut partitions = self.lock();
        partition_mut(&mut partitions, partition)
            .table_mut(table)?
            .upsert(table, key_column, row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use modreg_manifest::ColumnSpec;
    use serde_json::json;

    fn schema() -> TableSchema {
        let mut schema = TableSchema::default();
        schema.columns.insert("id".into(), ColumnSpec::new("varchar"));
        schema.columns.insert("n".into(), ColumnSpec::new("int"));
        schema
    }

    #[test]
    fn partitions_are_independent() {
        let storage = MemoryStorage::new();
        storage.create_table("a", "t", &schema()).unwrap();

        assert!(storage.has_table("a", "t").unwrap());
        assert!(!storage.has_table("b", "t").unwrap());
        assert!(matches!(
            storage.fetch("b", "t", &Filter::all()),
            Err(Error::TableNotFound { .. })
        ));
    }

    #[test]
    fn update_counts_affected_rows() {
        let storage = MemoryStorage::new();
        storage.create_table("a", "t", &schema()).unwrap();
        for (id, n) in [("x", 1), ("y", 1), ("z", 2)] {
            let row = json!({"id": id, "n": n}).as_object().cloned().unwrap();
            storage.insert("a", "t", row).unwrap();
        }

        let changes = json!({"n": 5}).as_object().cloned().unwrap();
        let affected = storage
            .update("a", "t", &Filter::eq("n", 1), &changes)
            .unwrap();

        assert_eq!(affected, 2);
        assert_eq!(storage.fetch("a", "t", &Filter::eq("n", 5)).unwrap().len(), 2);
    }

    #[test]
    fn insert_rejects_unknown_column() {
        let storage = MemoryStorage::new();
        storage.create_table("a", "t", &schema()).unwrap();
        let row = json!({"id": "x", "color": "red"}).as_object().cloned().unwrap();

        assert!(matches!(
            storage.insert("a", "t", row),
            Err(Error::UnknownColumn { .. })
        ));
    }
}
