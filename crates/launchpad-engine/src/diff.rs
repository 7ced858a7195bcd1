// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Input diffing.
//!
//! Inputs are compared as JSON documents. Changed paths are reported in
//! dotted form (`spec.replicas`, `tags.Name`). A change under one of the
//! provider's replace keys turns an update into a replacement.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Kind of change between recorded and declared inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    /// No relevant change.
    Same,
    /// Change that can be applied in place.
    Update,
    /// Change that requires a new resource.
    Replace,
}

/// Result of comparing recorded and declared inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    /// Overall kind of change.
    pub kind: DiffKind,
    /// Changed input paths.
    pub changed: Vec<String>,
    /// Changed paths that forced a replacement.
    pub replaced_by: Vec<String>,
}

impl DiffResult {
    /// A diff with no changes.
    pub fn same() -> Self {
        Self {
            kind: DiffKind::Same,
            changed: Vec::new(),
            replaced_by: Vec::new(),
        }
    }
}

/// SHA-256 of the canonical JSON encoding of the inputs.
///
/// `serde_json::Map` keeps keys sorted, so equal documents hash equally.
pub fn hash_inputs(inputs: &Value) -> String {
    let canonical = inputs.to_string();
    let digest = Sha256::digest(canonical.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Collect the dotted paths at which two documents differ.
pub fn changed_paths(old: &Value, new: &Value) -> Vec<String> {
    fn walk(old: Option<&Value>, new: Option<&Value>, path: String, out: &mut Vec<String>) {
        match (old, new) {
            (Some(Value::Object(a)), Some(Value::Object(b))) => {
                let mut keys: Vec<&String> = a.keys().chain(b.keys()).collect();
                keys.sort();
                keys.dedup();
                for key in keys {
                    let child = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", path, key)
                    };
                    walk(a.get(key), b.get(key), child, out);
                }
            }
            (a, b) if a == b => {}
            _ => out.push(if path.is_empty() { "$".to_string() } else { path }),
        }
    }

    let mut out = Vec::new();
    walk(Some(old), Some(new), String::new(), &mut out);
    out
}

fn covers(prefix: &str, path: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('.') || rest.starts_with('['))
}

/// Diff two input documents.
///
/// Paths under any of `ignore` are dropped; paths under any of
/// `replace_keys` force [`DiffKind::Replace`].
pub fn diff_inputs(
    old: &Value,
    new: &Value,
    replace_keys: &[String],
    ignore: &[String],
) -> DiffResult {
    let changed: Vec<String> = changed_paths(old, new)
        .into_iter()
        .filter(|p| !ignore.iter().any(|i| covers(i, p)))
        .collect();

    if changed.is_empty() {
        return DiffResult::same();
    }

    let replaced_by: Vec<String> = changed
        .iter()
        .filter(|p| replace_keys.iter().any(|k| covers(k, p)))
        .cloned()
        .collect();

    let kind = if replaced_by.is_empty() {
        DiffKind::Update
    } else {
        DiffKind::Replace
    };

    DiffResult {
        kind,
        changed,
        replaced_by,
    }
}

/// Replace keys for well-known resource types.
///
/// Used by providers that do not supply their own schema.
pub fn default_replace_keys(type_token: &str) -> Vec<String> {
    let keys: &[&str] = match type_token {
        "aws:ec2/vpc:Vpc" => &["cidrBlock"],
        "aws:ec2/subnet:Subnet" => &["vpcId", "cidrBlock", "availabilityZone"],
        "aws:ec2/securityGroup:SecurityGroup" => &["vpcId", "name"],
        "aws:ec2/natGateway:NatGateway" => &["subnetId"],
        "aws:ec2/routeTable:RouteTable" => &["vpcId"],
        "aws:eks/cluster:Cluster" => &["name", "vpcConfig.subnetIds"],
        "aws:eks/nodeGroup:NodeGroup" => &["clusterName", "nodeGroupName", "instanceTypes"],
        "aws:rds/cluster:Cluster" => &["clusterIdentifier", "engine", "databaseName"],
        "aws:rds/clusterInstance:ClusterInstance" => &["identifier", "clusterIdentifier"],
        "aws:elasticache/replicationGroup:ReplicationGroup" => &["replicationGroupId"],
        "aws:msk/cluster:Cluster" => &["clusterName", "kafkaVersion", "numberOfBrokerNodes"],
        "aws:s3/bucket:Bucket" => &["bucket"],
        "aws:organizations/account:Account" => &["email"],
        "kafka:index/topic:Topic" => &["name", "replicationFactor"],
        "random:index/randomPassword:RandomPassword" => &["length", "special"],
        t if t.starts_with("kubernetes:") => &["metadata.name", "metadata.namespace"],
        "helm:v3:Release" => &["name", "namespace"],
        _ => &[],
    };
    keys.iter().map(|k| k.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hash_is_key_order_independent() {
        let a: Value = serde_json::from_str(r#"{"a":1,"b":{"c":2,"d":3}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"b":{"d":3,"c":2},"a":1}"#).unwrap();
        assert_eq!(hash_inputs(&a), hash_inputs(&b));
    }

    #[test]
    fn test_changed_paths_nested() {
        let old = json!({"spec": {"replicas": 1, "image": "x"}, "tags": {"a": "1"}});
        let new = json!({"spec": {"replicas": 2, "image": "x"}, "tags": {"a": "1", "b": "2"}});
        assert_eq!(changed_paths(&old, &new), vec!["spec.replicas", "tags.b"]);
    }

    #[test]
    fn test_diff_update() {
        let old = json!({"cidrBlock": "10.0.0.0/16", "tags": {"Name": "a"}});
        let new = json!({"cidrBlock": "10.0.0.0/16", "tags": {"Name": "b"}});
        let diff = diff_inputs(&old, &new, &default_replace_keys("aws:ec2/vpc:Vpc"), &[]);
        assert_eq!(diff.kind, DiffKind::Update);
        assert_eq!(diff.changed, vec!["tags.Name"]);
    }

    #[test]
    fn test_diff_replace() {
        let old = json!({"cidrBlock": "10.0.0.0/16"});
        let new = json!({"cidrBlock": "10.1.0.0/16"});
        let diff = diff_inputs(&old, &new, &default_replace_keys("aws:ec2/vpc:Vpc"), &[]);
        assert_eq!(diff.kind, DiffKind::Replace);
        assert_eq!(diff.replaced_by, vec!["cidrBlock"]);
    }

    #[test]
    fn test_diff_ignore_changes() {
        let old = json!({"desiredSize": 2, "tags": {}});
        let new = json!({"desiredSize": 5, "tags": {}});
        let diff = diff_inputs(&old, &new, &[], &["desiredSize".to_string()]);
        assert_eq!(diff.kind, DiffKind::Same);
    }

    #[test]
    fn test_replace_key_prefix_matches_nested_paths_only() {
        let old = json!({"metadata": {"name": "a"}, "metadataExtra": 1});
        let new = json!({"metadata": {"name": "a"}, "metadataExtra": 2});
        let diff = diff_inputs(&old, &new, &["metadata".to_string()], &[]);
        assert_eq!(diff.kind, DiffKind::Update);
    }
}
