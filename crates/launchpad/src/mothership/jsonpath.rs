// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Dotted JSON paths with array indexes (`vpc.privateSubnetIds[0]`).

use serde_json::Value;

/// Look up `path` in `value`. `null` counts as absent.
///
/// An empty path returns `value` itself. Malformed paths never match.
pub fn extract<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    let mut current = value;
    for segment in path.split('.') {
        let (key, mut rest) = match segment.find('[') {
            Some(i) => (&segment[..i], &segment[i..]),
            None => (segment, ""),
        };
        if !key.is_empty() {
            current = current.get(key)?;
        } else if rest.is_empty() {
            return None;
        }
        while !rest.is_empty() {
            let close = rest.find(']')?;
            let index: usize = rest.get(1..close)?.parse().ok()?;
            current = current.get(index)?;
            rest = &rest[close + 1..];
            if !rest.is_empty() && !rest.starts_with('[') {
                return None;
            }
        }
    }
    (!current.is_null()).then_some(current)
}

/// String at `path`; numbers and booleans are rendered as text.
pub fn extract_string(value: &Value, path: &str) -> Option<String> {
    match extract(value, path)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn outputs() -> Value {
        json!({
            "planeId": 42,
            "eks": {"clusterName": "p42", "endpoint": "https://p42"},
            "vpc": {"privateSubnetIds": ["subnet-a", "subnet-b"]},
            "matrix": [[1, 2], [3, 4]],
            "msk": null
        })
    }

    #[test]
    fn test_extract_nested() {
        let v = outputs();
        assert_eq!(extract(&v, "eks.clusterName"), Some(&json!("p42")));
        assert_eq!(extract(&v, "vpc.privateSubnetIds[1]"), Some(&json!("subnet-b")));
        assert_eq!(extract(&v, "matrix[1][0]"), Some(&json!(3)));
        assert_eq!(extract(&v, ""), Some(&v));
    }

    #[test]
    fn test_extract_missing() {
        let v = outputs();
        assert_eq!(extract(&v, "eks.version"), None);
        assert_eq!(extract(&v, "vpc.privateSubnetIds[5]"), None);
        assert_eq!(extract(&v, "msk.bootstrapBrokersSaslScram"), None);
        assert_eq!(extract(&v, "msk"), None);
        assert_eq!(extract(&v, "vpc.privateSubnetIds[x]"), None);
        assert_eq!(extract(&v, "vpc.privateSubnetIds[0"), None);
        assert_eq!(extract(&v, "matrix[0]x"), None);
    }

    #[test]
    fn test_extract_string_renders_scalars() {
        let v = outputs();
        assert_eq!(extract_string(&v, "planeId").as_deref(), Some("42"));
        assert_eq!(extract_string(&v, "eks").as_deref(), None);
    }
}
