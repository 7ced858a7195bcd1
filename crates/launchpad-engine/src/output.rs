// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Resolved-output contract.
//!
//! Values returned from a module `setup` must be plain data. The
//! [`ModuleOutput`] bound requires `Serialize + DeserializeOwned`, which
//! futures and handles cannot satisfy, so a pending value cannot be placed in
//! a module output type.
//!
//! Provider plugins may still answer a preview with the [`UNKNOWN`]
//! sentinel for values they cannot predict. [`find_unresolved`] locates such
//! values; the engine rejects them outside of preview.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Sentinel string a plugin returns for a value that is not known yet.
pub const UNKNOWN: &str = "04da6b54-80e4-46f7-96ec-b56ff0331ba9";

/// Marker for values that may cross a module boundary.
pub trait ModuleOutput: Serialize + DeserializeOwned + Send + Sync + 'static {}

impl ModuleOutput for Value {}

impl ModuleOutput for () {}

/// Returns true if the value is the unknown sentinel.
pub fn is_unknown(value: &Value) -> bool {
    matches!(value, Value::String(s) if s == UNKNOWN)
}

/// Find the first unresolved value in a JSON document.
///
/// Returns the dotted path of the value (`$` for the root).
pub fn find_unresolved(value: &Value) -> Option<String> {
    fn walk(value: &Value, path: &str) -> Option<String> {
        if is_unknown(value) {
            return Some(if path.is_empty() {
                "$".to_string()
            } else {
                path.to_string()
            });
        }
        match value {
            Value::Object(map) => map.iter().find_map(|(k, v)| {
                let child = if path.is_empty() {
                    k.clone()
                } else {
                    format!("{}.{}", path, k)
                };
                walk(v, &child)
            }),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .find_map(|(i, v)| walk(v, &format!("{}[{}]", path, i))),
            _ => None,
        }
    }
    walk(value, "")
}

/// Serialize a module output and verify it is fully resolved.
pub fn to_resolved_json<T: ModuleOutput>(output: &T) -> crate::Result<Value> {
    let value = serde_json::to_value(output)?;
    match find_unresolved(&value) {
        Some(path) => Err(crate::EngineError::UnresolvedStackOutput(path)),
        None => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_find_unresolved_nested() {
        let value = json!({
            "vpc": {"id": "vpc-1", "subnets": ["subnet-a", UNKNOWN]},
        });
        assert_eq!(find_unresolved(&value), Some("vpc.subnets[1]".to_string()));
    }

    #[test]
    fn test_find_unresolved_root() {
        assert_eq!(find_unresolved(&json!(UNKNOWN)), Some("$".to_string()));
    }

    #[test]
    fn test_resolved_document() {
        let value = json!({"a": 1, "b": [true, null, "x"]});
        assert_eq!(find_unresolved(&value), None);
        assert!(to_resolved_json(&value).is_ok());
    }
}
