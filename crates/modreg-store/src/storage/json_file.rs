//! File-backed storage backend.
//!
//! Each partition is one JSON document `<dir>/<partition>.json`. Readers take
//! a shared lock and mutators an exclusive lock on a sibling
//! `<partition>.lock` file, so the data file itself can be replaced by
//! write-temp-then-rename without invalidating anyone's lock.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use modreg_fs::{io, validate_identifier};
use modreg_manifest::TableSchema;

use super::table::Partition;
use super::{Filter, Row, Storage};
use crate::{Error, Result};

/// Storage persisted as one JSON file per partition.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    dir: PathBuf,
}

impl JsonFileStorage {
    /// Store partitions under `dir`, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        io::ensure_dir(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn data_path(&self, partition: &str) -> PathBuf {
        self.dir.join(format!("{partition}.json"))
    }

    fn lock_file(&self, partition: &str) -> Result<(File, PathBuf)> {
        validate_identifier(partition)?;
        let path = self.dir.join(format!("{partition}.lock"));
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| modreg_fs::Error::io(&path, e))?;
        Ok((file, path))
    }

    fn load(&self, partition: &str) -> Result<Partition> {
        let path = self.data_path(partition);
        match io::read_text_if_exists(&path)? {
            None => Ok(Partition::new(partition)),
            Some(content) => serde_json::from_str::<Partition>(&content)
                .map(|p| p.named(partition))
                .map_err(|e| Error::Corrupt {
                    path,
                    message: e.to_string(),
                }),
        }
    }

    fn save(&self, partition: &str, data: &Partition) -> Result<()> {
        let content = serde_json::to_string_pretty(data)?;
        io::write_text(&self.data_path(partition), &content)?;
        Ok(())
    }

    /// Run `f` against the partition under a shared lock.
    fn read<T>(&self, partition: &str, f: impl FnOnce(&Partition) -> Result<T>) -> Result<T> {
        let (lock, path) = self.lock_file(partition)?;
        lock.lock_shared()
            .map_err(move |_| Error::LockFailed { path })?;
        let result = self.load(partition).and_then(|data| f(&data));
        // Lock released when `lock` is dropped
        drop(lock);
        result
    }

    /// Run `f` against the partition under an exclusive lock and persist the
    /// result if `f` reports a change.
    fn mutate<T>(
        &self,
        partition: &str,
        f: impl FnOnce(&mut Partition) -> Result<(T, bool)>,
    ) -> Result<T> {
        let (lock, path) = self.lock_file(partition)?;
        lock.lock_exclusive()
            .map_err(move |_| Error::LockFailed { path })?;
        let mut data = self.load(partition)?;
        let (value, changed) = f(&mut data)?;
        if changed {
            self.save(partition, &data)?;
        }
        drop(lock);
        Ok(value)
    }
}

impl Storage for JsonFileStorage {
    fn create_table(&self, partition: &str, table: &str, schema: &TableSchema) -> Result<()> {
        self.mutate(partition, |data| Ok(((), data.create_table(table, schema)?)))
    }

    fn has_table(&self, partition: &str, table: &str) -> Result<bool> {
        self.read(partition, |data| Ok(data.has_table(table)))
    }

    fn fetch(&self, partition: &str, table: &str, filter: &Filter) -> Result<Vec<Row>> {
        self.read(partition, |data| data.table(table)?.fetch(table, filter))
    }

    fn insert(&self, partition: &str, table: &str, row: Row) -> Result<()> {
        self.mutate(partition, |data| {
            data.table_mut(table)?.insert(table, row)?;
            Ok(((), true))
        })
    }

    fn update(
        &self,
        partition: &str,
        table: &str,
        filter: &Filter,
        changes: &Row,
    ) -> Result<usize> {
        self.mutate(partition, |data| {
            let affected = data.table_mut(table)?.update(table, filter, changes)?;
            Ok((affected, affected > 0))
        })
    }

    fn upsert(&self, partition: &str, table: &str, key_column: &str, row: Row) -> Result<()> {
        self.mutate(partition, |data| {
            data.table_mut(table)?.upsert(table, key_column, row)?;
            Ok(((), true))
        })
    }
}
