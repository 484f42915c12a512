//! Generic storage query interface.
//!
//! Storage is organised as named partitions holding named tables of JSON
//! rows. The [`Storage`] trait is the seam between the registry and the
//! engine behind it; [`Database`] binds a storage to one partition and
//! offers the `select/insert/update/where/get/get_one/has/execute` query
//! surface the registry is written against.

mod json_file;
mod memory;
mod query;
mod table;

pub use json_file::JsonFileStorage;
pub use memory::MemoryStorage;
pub use query::{Database, Insert, Select, Update};

use modreg_manifest::TableSchema;
use serde_json::{Map, Value};

use crate::Result;

/// One stored row, keyed by column name.
pub type Row = Map<String, Value>;

/// Conjunction of column equality conditions.
///
/// An empty filter matches every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    /// A filter matching every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// A filter matching rows where `column == value`.
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::all().and_eq(column, value)
    }

    /// Add another equality condition.
    pub fn and_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((column.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Whether `row` satisfies every condition. A missing column compares
    /// as `null`.
    pub fn matches(&self, row: &Row) -> bool {
        self.conditions
            .iter()
            .all(|(column, expected)| row.get(column).unwrap_or(&Value::Null) == expected)
    }

    /// Columns referenced by the filter.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.conditions.iter().map(|(column, _)| column.as_str())
    }
}

/// A partitioned table store.
///
/// Implementations must make each method atomic with respect to the others:
/// in particular [`Storage::upsert`] never lets two concurrent writers with
/// the same key both insert.
pub trait Storage: Send + Sync {
    /// Create `table` in `partition`, or add the columns and indexes it is
    /// missing if it already exists.
    fn create_table(&self, partition: &str, table: &str, schema: &TableSchema) -> Result<()>;

    /// Whether `table` exists in `partition`.
    fn has_table(&self, partition: &str, table: &str) -> Result<bool>;

    /// Rows of `table` matching `filter`, in insertion order.
    fn fetch(&self, partition: &str, table: &str, filter: &Filter) -> Result<Vec<Row>>;

    /// Insert a new row.
    fn insert(&self, partition: &str, table: &str, row: Row) -> Result<()>;

    /// Apply `changes` to every row matching `filter`; returns the number of
    /// rows changed.
    fn update(&self, partition: &str, table: &str, filter: &Filter, changes: &Row)
    -> Result<usize>;

    /// Insert `row`, or overwrite the fields of the row whose `key_column`
    /// equals the one in `row`.
    fn upsert(&self, partition: &str, table: &str, key_column: &str, row: Row) -> Result<()>;
}
