//! The persisted installation row of a module.

use modreg_manifest::{CapabilityFlags, ColumnSpec, EventTargets, IndexKind, TableSchema};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::storage::Row;
use crate::{Error, Result};

/// Installation state of one module.
///
/// `configs` and `targets` are snapshots taken at install time; they are
/// not re-validated against the manifest on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstalledModuleRecord {
    /// Module identifier (primary key)
    pub module: String,
    /// Manifest hash at install time
    pub hash: String,
    pub version: String,
    /// Partition the module's tables were provisioned into
    pub database: String,
    pub flags: CapabilityFlags,
    pub configs: Map<String, Value>,
    pub targets: EventTargets,
}

impl InstalledModuleRecord {
    /// Installed configuration value for `key`.
    pub fn config(&self, key: &str) -> Option<&Value> {
        self.configs.get(key)
    }

    /// Encode as a module table row.
    pub fn to_row(&self) -> Result<Row> {
        let mut row = Row::new();
        row.insert("module".into(), Value::from(self.module.as_str()));
        row.insert("hash".into(), Value::from(self.hash.as_str()));
        row.insert("version".into(), Value::from(self.version.as_str()));
        row.insert("database".into(), Value::from(self.database.as_str()));
        row.insert("is_global".into(), Value::Bool(self.flags.global));
        row.insert("is_admin".into(), Value::Bool(self.flags.admin));
        row.insert("is_context".into(), Value::Bool(self.flags.context));
        row.insert("is_article".into(), Value::Bool(self.flags.article));
        row.insert("configs".into(), Value::String(serde_json::to_string(&self.configs)?));
        row.insert("targets".into(), Value::String(serde_json::to_string(&self.targets)?));
        Ok(row)
    }

    /// Decode a module table row.
    pub fn from_row(table: &str, row: &Row) -> Result<Self> {
        let malformed = |message: String| Error::MalformedRow {
            table: table.to_string(),
            message,
        };
        let text = |column: &str| -> Result<String> {
            match row.get(column) {
                Some(Value::String(s)) => Ok(s.clone()),
                Some(Value::Null) | None => Ok(String::new()),
                Some(other) => Err(malformed(format!("column '{column}' is not text: {other}"))),
            }
        };

        let module = text("module")?;
        if module.is_empty() {
            return Err(malformed("row has no module identifier".to_string()));
        }

        let configs = match decode_blob(row.get("configs")) {
            Ok(value) => value,
            Err(e) => return Err(malformed(format!("configs of '{module}': {e}"))),
        };
        let targets = match decode_blob(row.get("targets")) {
            Ok(value) => value,
            Err(e) => return Err(malformed(format!("targets of '{module}': {e}"))),
        };

        Ok(Self {
            hash: text("hash")?,
            version: text("version")?,
            database: text("database")?,
            flags: CapabilityFlags {
                global: flag(row.get("is_global")),
                admin: flag(row.get("is_admin")),
                context: flag(row.get("is_context")),
                article: flag(row.get("is_article")),
            },
            configs,
            targets,
            module,
        })
    }
}

/// Read a boolean column. Rows written by older installers store the
/// strings `"TRUE"`/`"FALSE"`.
fn flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    }
}

/// Read a JSON blob column stored as text (or, leniently, inline).
fn decode_blob<T>(value: Option<&Value>) -> serde_json::Result<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    match value {
        None | Some(Value::Null) => Ok(T::default()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(T::default()),
        Some(Value::String(s)) => serde_json::from_str(s),
        Some(other) => serde_json::from_value(other.clone()),
    }
}

/// Schema of the module table.
pub fn module_table_schema() -> TableSchema {
    let column = |column_type: &str, length: Option<u64>| {
        let mut spec = ColumnSpec::new(column_type);
        spec.length = length.map(Value::from);
        spec
    };
    let flag_column = || {
        let mut spec = ColumnSpec::new("bool");
        spec.default = Some(Value::Bool(false));
        spec
    };

    let mut schema = TableSchema::default();
    schema.columns.insert("module".into(), column("varchar", Some(50)));
    schema.columns.insert("hash".into(), column("varchar", Some(100)));
    schema.columns.insert("version".into(), column("varchar", Some(30)));
    schema.columns.insert("database".into(), column("varchar", Some(50)));
    for name in ["is_global", "is_admin", "is_context", "is_article"] {
        schema.columns.insert(name.into(), flag_column());
    }
    schema.columns.insert("configs".into(), column("longtext", None));
    schema.columns.insert("targets".into(), column("longtext", None));
    schema.indexes.insert("module".into(), IndexKind::PrimaryKey);
    schema.comment = Some("Installed modules".to_string());
    schema
}
