// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Stack configuration records.
//!
//! Records are read from JSON files with camelCase keys and validated with
//! [`validate`] before any stack is opened.

mod validate;

pub use validate::Validator;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::ConfigError;

/// Load a configuration record from a JSON file.
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Account a stack is deployed into. Exactly one variant must be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountConf {
    /// Create a member account in the organization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_account: Option<NewAccount>,
    /// Use an account that already exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_account: Option<ExistingAccount>,
}

/// A member account to create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    /// Account name.
    pub name: String,
    /// Root email address.
    pub email: String,
    /// Organizational unit or root id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Role assumed in the new account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_name: Option<String>,
}

/// An account that already exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistingAccount {
    /// Twelve-digit account id.
    pub account_id: String,
    /// Role assumed in the account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_name: Option<String>,
}

/// Role assumed in member accounts when none is configured.
pub const DEFAULT_ROLE_NAME: &str = "OrganizationAccountAccessRole";

/// Network layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VpcConf {
    /// VPC CIDR block.
    pub cidr: String,
    /// Number of availability zones (one public and one private subnet each).
    #[serde(default = "default_az_count")]
    pub az_count: u32,
    /// Prefix length of every subnet.
    #[serde(default = "default_subnet_prefix")]
    pub subnet_prefix: u8,
    /// Number of NAT gateways.
    #[serde(default = "default_nat_gateways")]
    pub nat_gateways: u32,
}

fn default_az_count() -> u32 {
    3
}

fn default_subnet_prefix() -> u8 {
    20
}

fn default_nat_gateways() -> u32 {
    1
}

/// Kubernetes cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EksConf {
    /// Kubernetes version.
    pub version: String,
    /// Managed node groups.
    pub node_groups: Vec<NodeGroupConf>,
}

/// Managed node group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeGroupConf {
    /// Node group name.
    pub name: String,
    /// EC2 instance types.
    pub instance_types: Vec<String>,
    /// Minimum node count.
    pub min_size: u32,
    /// Maximum node count.
    pub max_size: u32,
    /// Initial node count.
    pub desired_size: u32,
    /// Root volume size.
    #[serde(default = "default_disk_size")]
    pub disk_size_gb: u32,
}

fn default_disk_size() -> u32 {
    50
}

/// Aurora PostgreSQL serverless v2 cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuroraConf {
    /// Engine version.
    pub engine_version: String,
    /// Minimum ACUs.
    pub min_capacity: f64,
    /// Maximum ACUs.
    pub max_capacity: f64,
    /// Number of cluster instances.
    #[serde(default = "default_instances")]
    pub instances: u32,
    /// Initial database.
    pub database_name: String,
    /// Master user.
    pub master_username: String,
}

fn default_instances() -> u32 {
    1
}

/// Managed Redis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElasticacheConf {
    /// Cache node type.
    pub node_type: String,
    /// Replicas besides the primary.
    #[serde(default)]
    pub num_replicas: u32,
    /// Redis engine version.
    pub engine_version: String,
}

/// Managed Kafka.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MskConf {
    /// Kafka version.
    pub kafka_version: String,
    /// Broker count; a multiple of the private subnet count.
    pub number_of_broker_nodes: u32,
    /// Broker instance type.
    pub instance_type: String,
    /// EBS volume per broker.
    pub volume_size_gb: u32,
}

/// Vector database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilvusConf {
    /// Helm chart version.
    pub chart_version: String,
    /// Query node replicas.
    #[serde(default = "default_replicas")]
    pub replicas: u32,
}

fn default_replicas() -> u32 {
    1
}

/// Binlog topic kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinlogTopic {
    /// Change log.
    Log,
    /// Request log.
    ReqLog,
}

impl BinlogTopic {
    /// Topic suffix.
    pub fn as_str(&self) -> &'static str {
        match self {
            BinlogTopic::Log => "log",
            BinlogTopic::ReqLog => "req_log",
        }
    }

    /// Kafka topic name for a plane.
    pub fn topic_name(&self, plane_id: i64) -> String {
        format!("p_{}_nitrous_{}", plane_id, self.as_str())
    }
}

/// Kafka topics used by Nitrous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinlogConf {
    /// Partitions per topic.
    pub partitions: u32,
    /// Replication factor per topic.
    pub replication_factor: u32,
    /// Topic retention.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_ms: Option<i64>,
    /// Topics to create.
    pub topics: Vec<BinlogTopic>,
}

/// Nitrous service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NitrousConf {
    /// Container image.
    pub image: String,
    /// Deployment replicas.
    #[serde(default = "default_replicas")]
    pub replicas: u32,
    /// Binlog topics.
    pub binlog: BinlogConf,
}

/// Ingress controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressConf {
    /// Base domain served by the plane.
    pub domain: String,
    /// Internet-facing load balancer.
    #[serde(default = "default_true")]
    pub public: bool,
}

fn default_true() -> bool {
    true
}

/// Certificate issuance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertConf {
    /// ACME account email.
    pub acme_email: String,
    /// ACME directory URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acme_server: Option<String>,
}

/// Let's Encrypt production directory.
pub const DEFAULT_ACME_SERVER: &str = "https://acme-v02.api.letsencrypt.org/directory";

/// OpenTelemetry collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryConf {
    /// Deploy the collector.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Managed Prometheus with an in-cluster agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrometheusConf {
    /// Deploy the workspace and agent.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Scrape interval.
    #[serde(default = "default_scrape_interval")]
    pub scrape_interval_secs: u32,
}

fn default_scrape_interval() -> u32 {
    30
}

/// A data plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPlaneConf {
    /// Plane id.
    pub plane_id: i64,
    /// AWS region.
    pub region: String,
    /// Target account.
    pub account_conf: AccountConf,
    /// Network.
    pub vpc: VpcConf,
    /// Cluster.
    pub eks: EksConf,
    /// Database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aurora: Option<AuroraConf>,
    /// Managed Redis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elasticache: Option<ElasticacheConf>,
    /// Kafka.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msk: Option<MskConf>,
    /// Vector database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milvus: Option<MilvusConf>,
    /// Nitrous; requires `msk`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nitrous: Option<NitrousConf>,
    /// Ingress.
    pub ingress: IngressConf,
    /// Certificates.
    pub cert: CertConf,
    /// Telemetry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telemetry: Option<TelemetryConf>,
    /// Metrics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prometheus: Option<PrometheusConf>,
    /// Protect stateful resources against deletion.
    #[serde(default)]
    pub protect: bool,
}

/// The mothership control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MothershipConf {
    /// Mothership id.
    pub mothership_id: i64,
    /// AWS region.
    pub region: String,
    /// Target account.
    pub account_conf: AccountConf,
    /// Network.
    pub vpc: VpcConf,
    /// Cluster.
    pub eks: EksConf,
    /// Control database.
    pub aurora: AuroraConf,
    /// Ingress.
    pub ingress: IngressConf,
    /// Certificates.
    pub cert: CertConf,
    /// API image.
    pub image: String,
    /// API replicas.
    #[serde(default = "default_replicas")]
    pub replicas: u32,
    /// Protect stateful resources against deletion.
    #[serde(default)]
    pub protect: bool,
}

/// Customer owning a tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerConf {
    /// Customer id.
    pub customer_id: i64,
    /// Display name.
    pub name: String,
}

/// In-cluster Redis of a tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedisConf {
    /// Helm chart version.
    pub chart_version: String,
    /// Persistent volume size.
    #[serde(default = "default_persistence")]
    pub persistence_gb: u32,
}

fn default_persistence() -> u32 {
    8
}

/// A tier hosted on a plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierConf {
    /// Tier id.
    pub tier_id: i64,
    /// Hosting plane.
    pub plane_id: i64,
    /// Owning customer.
    pub customer: CustomerConf,
    /// API image.
    pub image: String,
    /// API replicas.
    #[serde(default = "default_replicas")]
    pub api_replicas: u32,
    /// Tier Redis.
    pub redis: RedisConf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_minimal_json() {
        let vpc: VpcConf = serde_json::from_str(r#"{"cidr": "10.10.0.0/16"}"#).unwrap();
        assert_eq!(vpc.az_count, 3);
        assert_eq!(vpc.subnet_prefix, 20);
        assert_eq!(vpc.nat_gateways, 1);

        let ingress: IngressConf = serde_json::from_str(r#"{"domain": "p1.example.com"}"#).unwrap();
        assert!(ingress.public);
    }

    #[test]
    fn test_binlog_topic_names() {
        let binlog: BinlogConf = serde_json::from_str(
            r#"{"partitions": 1, "replicationFactor": 3, "topics": ["log", "req_log"]}"#,
        )
        .unwrap();
        let names: Vec<String> = binlog.topics.iter().map(|t| t.topic_name(7)).collect();
        assert_eq!(names, vec!["p_7_nitrous_log", "p_7_nitrous_req_log"]);
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("plane.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = load::<DataPlaneConf>(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("plane.json"));

        let missing = load::<DataPlaneConf>(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(missing, ConfigError::Read { .. }));
    }
}
