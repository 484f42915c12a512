//! Configuration value reconciliation for installs.
//!
//! For every key of a manifest's `configs` schema the effective value is the
//! caller's, else the previously installed one, else the declared default;
//! `null` counts as absent at each level. The chosen value is then coerced
//! to the declared type. Keys outside the schema are dropped.

use std::collections::BTreeMap;

use modreg_manifest::{ConfigField, ConfigType};
use serde_json::{Map, Number, Value};

/// Tokens read as `true` for `boolean` configs, compared case-insensitively.
const TRUTHY: &[&str] = &["on", "true", "1", "yes"];

/// Compute the configuration blob to persist.
pub fn reconcile(
    schema: &BTreeMap<String, ConfigField>,
    caller: &Map<String, Value>,
    installed: Option<&Map<String, Value>>,
) -> Map<String, Value> {
    let present = |map: Option<&Map<String, Value>>, key: &str| -> Option<Value> {
        map.and_then(|m| m.get(key))
            .filter(|v| !v.is_null())
            .cloned()
    };

    let mut values = Map::new();
    for (key, field) in schema {
        let value = present(Some(caller), key)
            .or_else(|| present(installed, key))
            .unwrap_or_else(|| field.value.clone());
        values.insert(key.clone(), coerce(field.kind, value));
    }

    for key in caller.keys().filter(|k| !schema.contains_key(*k)) {
        tracing::debug!(config = %key, "Dropping undeclared config value");
    }
    values
}

/// Coerce `value` to the declared `kind`.
///
/// - `boolean`: `true`, a truthy token (`on`, `true`, `1`, `yes`) or a
///   non-zero number is `true`; anything else is `false`
/// - `array`: lists pass through, `null` becomes `[]`, any other value
///   becomes a one-element list
/// - `number`: numbers pass through; strings are read by their longest
///   numeric prefix (`"12px"` is `12`, `"abc"` is `0`); booleans become
///   `1`/`0`; anything else is `0`
/// - other types pass through unchanged
pub fn coerce(kind: ConfigType, value: Value) -> Value {
    match kind {
        ConfigType::Boolean => Value::Bool(truthy(&value)),
        ConfigType::Array => match value {
            Value::Array(_) => value,
            Value::Null => Value::Array(Vec::new()),
            other => Value::Array(vec![other]),
        },
        ConfigType::Number => match value {
            Value::Number(_) => value,
            Value::String(s) => number(numeric_prefix(&s)),
            Value::Bool(b) => Value::from(u8::from(b)),
            _ => Value::from(0),
        },
        ConfigType::String | ConfigType::Other => value,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => {
            let s = s.trim();
            TRUTHY.iter().any(|token| s.eq_ignore_ascii_case(token))
        }
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    }
}

/// Integral results stay integers.
fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map_or(Value::from(0), Value::Number)
    }
}

/// Value of the longest prefix of `s` that reads as a decimal number, or `0`.
fn numeric_prefix(s: &str) -> f64 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let int_end = digits_from(end);
    let mut mantissa_end = int_end;
    let mut has_digits = int_end > end;
    if bytes.get(int_end) == Some(&b'.') {
        let frac_end = digits_from(int_end + 1);
        if frac_end > int_end + 1 || has_digits {
            has_digits |= frac_end > int_end + 1;
            mantissa_end = frac_end;
        }
    }
    if !has_digits {
        return 0.0;
    }

    end = mantissa_end;
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }

    s[..end].parse().unwrap_or(0.0)
}
