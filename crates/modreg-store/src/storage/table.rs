//! Table model shared by the storage backends.

use std::collections::BTreeMap;

use modreg_manifest::{IndexKind, TableSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Filter, Row};
use crate::{Error, Result};

/// Column types a schema may declare.
const COLUMN_TYPES: &[&str] = &[
    "int",
    "integer",
    "tinyint",
    "smallint",
    "mediumint",
    "bigint",
    "float",
    "double",
    "decimal",
    "bool",
    "boolean",
    "char",
    "varchar",
    "text",
    "tinytext",
    "mediumtext",
    "longtext",
    "json",
    "blob",
    "longblob",
    "date",
    "time",
    "datetime",
    "timestamp",
    "enum",
];

/// All tables of one partition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Partition {
    #[serde(skip)]
    name: String,
    #[serde(default)]
    tables: BTreeMap<String, Table>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Table {
    schema: TableSchema,
    #[serde(default)]
    rows: Vec<Row>,
    #[serde(default = "first_id")]
    next_id: u64,
}

fn first_id() -> u64 {
    1
}

impl Partition {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tables: BTreeMap::new(),
        }
    }

    /// Rebind a deserialized partition to its name.
    pub(crate) fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub(crate) fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    /// Create or extend `table`. Returns `true` if anything changed.
    pub(crate) fn create_table(&mut self, table: &str, schema: &TableSchema) -> Result<bool> {
        validate_schema(table, schema)?;

        let Some(existing) = self.tables.get_mut(table) else {
            tracing::debug!(partition = %self.name, %table, "Creating table");
            self.tables.insert(
                table.to_string(),
                Table {
                    schema: schema.clone(),
                    rows: Vec::new(),
                    next_id: first_id(),
                },
            );
            return Ok(true);
        };

        let mut changed = false;
        for (column, spec) in &schema.columns {
            if existing.schema.columns.contains_key(column) {
                continue;
            }
            tracing::debug!(partition = %self.name, %table, %column, "Adding column");
            let fill = spec.default.clone().unwrap_or(Value::Null);
            for row in &mut existing.rows {
                row.insert(column.clone(), fill.clone());
            }
            existing.schema.columns.insert(column.clone(), spec.clone());
            changed = true;
        }
        for (key, kind) in &schema.indexes {
            if !existing.schema.indexes.contains_key(key) {
                existing.schema.indexes.insert(key.clone(), *kind);
                changed = true;
            }
        }
        if existing.schema.auto_increment.is_none() && schema.auto_increment.is_some() {
            existing.schema.auto_increment = schema.auto_increment.clone();
            changed = true;
        }
        Ok(changed)
    }

    pub(crate) fn table(&self, table: &str) -> Result<&Table> {
        self.tables.get(table).ok_or_else(|| Error::TableNotFound {
            partition: self.name.clone(),
            table: table.to_string(),
        })
    }

    pub(crate) fn table_mut(&mut self, table: &str) -> Result<&mut Table> {
        self.tables.get_mut(table).ok_or_else(|| Error::TableNotFound {
            partition: self.name.clone(),
            table: table.to_string(),
        })
    }
}

impl Table {
    pub(crate) fn fetch(&self, table: &str, filter: &Filter) -> Result<Vec<Row>> {
        self.check_columns(table, filter.columns())?;
        Ok(self
            .rows
            .iter()
            .filter(|row| filter.matches(row))
            .cloned()
            .collect())
    }

    pub(crate) fn insert(&mut self, table: &str, row: Row) -> Result<()> {
        let row = self.complete(table, row)?;
        if let Some(index) = self.conflict(&row, None) {
            return Err(Error::DuplicateKey {
                table: table.to_string(),
                index,
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub(crate) fn update(&mut self, table: &str, filter: &Filter, changes: &Row) -> Result<usize> {
        self.check_columns(table, filter.columns())?;
        self.check_columns(table, changes.keys().map(String::as_str))?;

        let positions: Vec<usize> = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| filter.matches(row))
            .map(|(i, _)| i)
            .collect();

        for &position in &positions {
            let mut candidate = self.rows[position].clone();
            for (column, value) in changes {
                candidate.insert(column.clone(), value.clone());
            }
            if let Some(index) = self.conflict(&candidate, Some(position)) {
                return Err(Error::DuplicateKey {
                    table: table.to_string(),
                    index,
                });
            }
            self.rows[position] = candidate;
        }
        Ok(positions.len())
    }

    pub(crate) fn upsert(&mut self, table: &str, key_column: &str, row: Row) -> Result<()> {
        self.check_columns(table, std::iter::once(key_column))?;
        let key = row.get(key_column).cloned().ok_or_else(|| Error::MissingKey {
            table: table.to_string(),
            column: key_column.to_string(),
        })?;

        let filter = Filter::eq(key_column, key);
        if self.rows.iter().any(|existing| filter.matches(existing)) {
            self.update(table, &filter, &row)?;
        } else {
            self.insert(table, row)?;
        }
        Ok(())
    }

    fn check_columns<'a>(&self, table: &str, columns: impl IntoIterator<Item = &'a str>) -> Result<()> {
        for column in columns {
            if !self.schema.columns.contains_key(column) {
                return Err(Error::UnknownColumn {
                    table: table.to_string(),
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Reject undeclared columns, fill defaults, assign auto-increment ids.
    fn complete(&mut self, table: &str, mut row: Row) -> Result<Row> {
        self.check_columns(table, row.keys().map(String::as_str))?;

        if let Some(ref column) = self.schema.auto_increment {
            match row.get(column).and_then(Value::as_u64) {
                Some(id) => self.next_id = self.next_id.max(id.saturating_add(1)),
                None => {
                    row.insert(column.clone(), Value::from(self.next_id));
                    self.next_id = self.next_id.saturating_add(1);
                }
            }
        }

        for (column, spec) in &self.schema.columns {
            if !row.contains_key(column) {
                row.insert(column.clone(), spec.default.clone().unwrap_or(Value::Null));
            }
        }
        Ok(row)
    }

    /// First unique index `candidate` would violate, ignoring the row at
    /// `skip`.
    fn conflict(&self, candidate: &Row, skip: Option<usize>) -> Option<String> {
        self.schema
            .indexes
            .iter()
            .filter(|(_, kind)| matches!(kind, IndexKind::PrimaryKey | IndexKind::Unique))
            .find(|(key, _)| {
                let columns: Vec<&str> = TableSchema::index_columns(key).collect();
                self.rows.iter().enumerate().any(|(i, existing)| {
                    Some(i) != skip
                        && columns
                            .iter()
                            .all(|c| existing.get(*c) == candidate.get(*c))
                })
            })
            .map(|(key, _)| key.clone())
    }
}

/// Check a schema before it is applied.
pub(crate) fn validate_schema(table: &str, schema: &TableSchema) -> Result<()> {
    let invalid = |reason: String| Error::InvalidSchema {
        table: table.to_string(),
        reason,
    };

    if schema.columns.is_empty() {
        return Err(invalid("no columns declared".to_string()));
    }
    for (column, spec) in &schema.columns {
        let column_type = spec.column_type.to_ascii_lowercase();
        if !COLUMN_TYPES.contains(&column_type.as_str()) {
            return Err(invalid(format!(
                "column '{column}' has unknown type '{}'",
                spec.column_type
            )));
        }
    }
    for key in schema.indexes.keys() {
        for column in TableSchema::index_columns(key) {
            if !schema.columns.contains_key(column) {
                return Err(invalid(format!("index '{key}' names undeclared column '{column}'")));
            }
        }
    }
    if let Some(ref column) = schema.auto_increment {
        if !schema.columns.contains_key(column) {
            return Err(invalid(format!("auto_increment names undeclared column '{column}'")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use modreg_manifest::ColumnSpec;
    use serde_json::json;

    fn post_schema() -> TableSchema {
        let mut schema = TableSchema::default();
        schema.columns.insert("idx".into(), ColumnSpec::new("int"));
        schema.columns.insert("title".into(), ColumnSpec::new("varchar"));
        schema.indexes.insert("idx".into(), IndexKind::PrimaryKey);
        schema.auto_increment = Some("idx".into());
        schema
    }

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn auto_increment_assigns_ids() {
        let mut partition = Partition::new("default");
        partition.create_table("post", &post_schema()).unwrap();
        let table = partition.table_mut("post").unwrap();

        table.insert("post", row(json!({"title": "a"}))).unwrap();
        table.insert("post", row(json!({"title": "b"}))).unwrap();

        let rows = table.fetch("post", &Filter::all()).unwrap();
        assert_eq!(rows[0]["idx"], json!(1));
        assert_eq!(rows[1]["idx"], json!(2));
    }

    #[test]
    fn explicit_max_id_saturates_counter() {
        let mut partition = Partition::new("default");
        partition.create_table("post", &post_schema()).unwrap();
        let table = partition.table_mut("post").unwrap();

        table
            .insert("post", row(json!({"idx": u64::MAX, "title": "last"})))
            .unwrap();
        let err = table.insert("post", row(json!({"title": "next"}))).unwrap_err();

        assert!(matches!(err, Error::DuplicateKey { .. }));
        assert_eq!(table.fetch("post", &Filter::all()).unwrap().len(), 1);
    }

    #[test]
    fn primary_key_rejects_duplicates() {
        let mut partition = Partition::new("default");
        partition.create_table("post", &post_schema()).unwrap();
        let table = partition.table_mut("post").unwrap();

        table.insert("post", row(json!({"idx": 7, "title": "a"}))).unwrap();
        let err = table
            .insert("post", row(json!({"idx": 7, "title": "b"})))
            .unwrap_err();

        assert!(matches!(err, Error::DuplicateKey { .. }));
    }

    #[test]
    fn create_table_adds_missing_columns() {
        let mut partition = Partition::new("default");
        partition.create_table("post", &post_schema()).unwrap();
        partition
            .table_mut("post")
            .unwrap()
            .insert("post", row(json!({"title": "a"})))
            .unwrap();

        let mut extended = post_schema();
        let mut hits = ColumnSpec::new("int");
        hits.default = Some(json!(0));
        extended.columns.insert("hits".into(), hits);

        assert!(partition.create_table("post", &extended).unwrap());
        assert!(!partition.create_table("post", &extended).unwrap());

        let rows = partition
            .table("post")
            .unwrap()
            .fetch("post", &Filter::all())
            .unwrap();
        assert_eq!(rows[0]["hits"], json!(0));
    }

    #[test]
    fn invalid_schemas_rejected() {
        let mut unknown_type = post_schema();
        unknown_type
            .columns
            .insert("body".into(), ColumnSpec::new("hologram"));
        assert!(validate_schema("post", &unknown_type).is_err());

        let mut bad_index = post_schema();
        bad_index.indexes.insert("idx,missing".into(), IndexKind::Index);
        assert!(validate_schema("post", &bad_index).is_err());

        assert!(validate_schema("post", &TableSchema::default()).is_err());
        assert!(validate_schema("post", &post_schema()).is_ok());
    }

    #[test]
    fn upsert_updates_in_place() {
        let mut partition = Partition::new("default");
        partition.create_table("post", &post_schema()).unwrap();
        let table = partition.table_mut("post").unwrap();

        table
            .upsert("post", "idx", row(json!({"idx": 1, "title": "a"})))
            .unwrap();
        table
            .upsert("post", "idx", row(json!({"idx": 1, "title": "b"})))
            .unwrap();

        let rows = table.fetch("post", &Filter::all()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["title"], json!("b"));
    }

    #[test]
    fn missing_table_is_error() {
        let partition = Partition::new("default");
        assert!(matches!(
            partition.table("ghost"),
            Err(Error::TableNotFound { .. })
        ));
    }
}
