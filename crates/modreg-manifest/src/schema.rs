//! Configuration schema and schema-provisioning directives declared by a
//! manifest.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Declared type of a configuration value.
///
/// Only `boolean`, `array` and `number` are coerced at install time; any
/// other declared type passes values through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigType {
    Boolean,
    Array,
    Number,
    String,
    #[serde(other)]
    Other,
}

/// One entry of a manifest's `configs` table: `{ "type": ..., "value": ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigField {
    #[serde(rename = "type")]
    pub kind: ConfigType,
    /// Default value used when neither the caller nor a prior install
    /// supplies one.
    #[serde(default)]
    pub value: Value,
}

/// Kind of index declared on a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    PrimaryKey,
    Unique,
    Index,
    Fulltext,
}

/// A column declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    #[serde(rename = "type")]
    pub column_type: String,
    /// Length or precision (`11`, `"10,2"`, or an enum value list).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default)]
    pub is_null: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl ColumnSpec {
    pub fn new(column_type: impl Into<String>) -> Self {
        Self {
            column_type: column_type.into(),
            length: None,
            default: None,
            is_null: false,
            comment: None,
        }
    }
}

/// A table a module needs provisioned in its storage partition.
///
/// Index keys name one column or several comma-separated columns:
///
/// ```json
/// "databases": {
///   "post_table": {
///     "columns": { "idx": { "type": "int", "length": 11 }, "title": { "type": "varchar", "length": 255 } },
///     "indexes": { "idx": "primary_key", "title": "index" },
///     "auto_increment": "idx"
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    #[serde(default)]
    pub columns: BTreeMap<String, ColumnSpec>,
    #[serde(default)]
    pub indexes: BTreeMap<String, IndexKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_increment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl TableSchema {
    /// Columns referenced by the index declared under `key`.
    pub fn index_columns(key: &str) -> impl Iterator<Item = &str> {
        key.split(',').map(str::trim).filter(|c| !c.is_empty())
    }

    /// Name of the primary key column, if a single-column primary key is
    /// declared.
    pub fn primary_key(&self) -> Option<&str> {
        self.indexes
            .iter()
            .find(|(_, kind)| **kind == IndexKind::PrimaryKey)
            .map(|(key, _)| key.as_str())
            .filter(|key| !key.contains(','))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_config_field_types() {
        let field: ConfigField =
            serde_json::from_value(json!({"type": "boolean", "value": true})).unwrap();
        assert_eq!(field.kind, ConfigType::Boolean);
        assert_eq!(field.value, json!(true));

        let other: ConfigField = serde_json::from_value(json!({"type": "color"})).unwrap();
        assert_eq!(other.kind, ConfigType::Other);
        assert_eq!(other.value, Value::Null);
    }

    #[test]
    fn parses_table_schema() {
        let schema: TableSchema = serde_json::from_value(json!({
            "columns": {
                "idx": {"type": "int", "length": 11},
                "title": {"type": "varchar", "length": 255, "comment": "title"}
            },
            "indexes": {"idx": "primary_key", "title,idx": "index"},
            "auto_increment": "idx"
        }))
        .unwrap();

        assert_eq!(schema.columns.len(), 2);
        assert_eq!(schema.primary_key(), Some("idx"));
        let cols: Vec<_> = TableSchema::index_columns("title,idx").collect();
        assert_eq!(cols, vec!["title", "idx"]);
    }
}
