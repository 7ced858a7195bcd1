// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration validation.
//!
//! Every record is checked in full and all violations are reported at once.

use ipnet::Ipv4Net;
use std::collections::HashSet;
use std::fmt::Display;

use super::*;
use crate::config::{ConfigError, Violation};

/// Highest number of availability zones a region layout may use.
const MAX_AZ_COUNT: u32 = 6;

/// Collects configuration violations.
#[derive(Debug, Default)]
pub struct Validator {
    violations: Vec<Violation>,
}

impl Validator {
    /// Create an empty validator.
    pub fn new() -> Self {
        Self::default()
    }

    fn error(&mut self, field: &str, value: impl Display, message: impl Into<String>) {
        self.violations.push(Violation {
            field: field.to_string(),
            value: value.to_string(),
            message: message.into(),
        });
    }

    /// Record a violation unless `ok` holds.
    pub fn check(
        &mut self,
        ok: bool,
        field: &str,
        value: impl Display,
        message: impl Into<String>,
    ) -> &mut Self {
        if !ok {
            self.error(field, value, message);
        }
        self
    }

    /// Value must not be blank.
    pub fn non_empty(&mut self, field: &str, value: &str) -> &mut Self {
        self.check(!value.trim().is_empty(), field, value, "Value cannot be empty")
    }

    /// Value must be positive.
    pub fn positive(&mut self, field: &str, value: i64) -> &mut Self {
        self.check(value > 0, field, value, "Value must be positive")
    }

    /// Value must lie in `[min, max]`.
    pub fn range_f64(&mut self, field: &str, value: f64, min: f64, max: f64) -> &mut Self {
        self.check(
            (min..=max).contains(&value),
            field,
            value,
            format!("Value must be between {} and {}", min, max),
        )
    }

    /// Value must be an http(s) URL.
    pub fn url(&mut self, field: &str, value: &str) -> &mut Self {
        self.check(
            value.starts_with("http://") || value.starts_with("https://"),
            field,
            value,
            "URL must start with http:// or https://",
        )
    }

    /// Violations recorded so far.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Ok if nothing was recorded.
    pub fn finish(self) -> Result<(), ConfigError> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(self.violations))
        }
    }
}

fn account(v: &mut Validator, conf: &AccountConf) {
    match (&conf.new_account, &conf.existing_account) {
        (Some(new), None) => {
            v.non_empty("accountConf.newAccount.name", &new.name);
            v.check(
                new.email.contains('@'),
                "accountConf.newAccount.email",
                &new.email,
                "Email address required",
            );
        }
        (None, Some(existing)) => {
            v.check(
                existing.account_id.len() == 12
                    && existing.account_id.chars().all(|c| c.is_ascii_digit()),
                "accountConf.existingAccount.accountId",
                &existing.account_id,
                "Account id must be 12 digits",
            );
        }
        (Some(_), Some(_)) => {
            v.check(
                false,
                "accountConf",
                "newAccount, existingAccount",
                "Exactly one of newAccount or existingAccount must be set",
            );
        }
        (None, None) => {
            v.check(
                false,
                "accountConf",
                "none",
                "Exactly one of newAccount or existingAccount must be set",
            );
        }
    }
}

fn vpc(v: &mut Validator, conf: &VpcConf) {
    v.check(
        (1..=MAX_AZ_COUNT).contains(&conf.az_count),
        "vpc.azCount",
        conf.az_count,
        format!("Value must be between 1 and {}", MAX_AZ_COUNT),
    );
    v.check(
        conf.nat_gateways >= 1 && conf.nat_gateways <= conf.az_count,
        "vpc.natGateways",
        conf.nat_gateways,
        "Value must be between 1 and azCount",
    );

    let Ok(net) = conf.cidr.parse::<Ipv4Net>() else {
        v.check(false, "vpc.cidr", &conf.cidr, "Not an IPv4 CIDR block");
        return;
    };
    if conf.subnet_prefix <= net.prefix_len() || conf.subnet_prefix > 28 {
        v.check(
            false,
            "vpc.subnetPrefix",
            conf.subnet_prefix,
            format!("Value must be between {} and 28", net.prefix_len() + 1),
        );
        return;
    }
    let available = 1u64 << (conf.subnet_prefix - net.prefix_len());
    v.check(
        available >= 2 * u64::from(conf.az_count),
        "vpc.subnetPrefix",
        conf.subnet_prefix,
        format!(
            "{} fits {} subnets, {} needed",
            conf.cidr,
            available,
            2 * conf.az_count
        ),
    );
}

fn eks(v: &mut Validator, conf: &EksConf) {
    v.non_empty("eks.version", &conf.version);
    v.check(
        !conf.node_groups.is_empty(),
        "eks.nodeGroups",
        0,
        "At least one node group is required",
    );
    let mut names = HashSet::new();
    for (i, group) in conf.node_groups.iter().enumerate() {
        let field = |name: &str| format!("eks.nodeGroups[{}].{}", i, name);
        v.non_empty(&field("name"), &group.name);
        v.check(
            names.insert(group.name.as_str()),
            &field("name"),
            &group.name,
            "Node group names must be unique",
        );
        v.check(
            !group.instance_types.is_empty(),
            &field("instanceTypes"),
            "[]",
            "At least one instance type is required",
        );
        v.check(
            group.max_size >= 1,
            &field("maxSize"),
            group.max_size,
            "Value must be positive",
        );
        v.check(
            group.min_size <= group.desired_size && group.desired_size <= group.max_size,
            &field("desiredSize"),
            group.desired_size,
            format!(
                "Value must be between minSize ({}) and maxSize ({})",
                group.min_size, group.max_size
            ),
        );
    }
}

fn aurora(v: &mut Validator, conf: &AuroraConf) {
    v.non_empty("aurora.engineVersion", &conf.engine_version);
    v.range_f64("aurora.minCapacity", conf.min_capacity, 0.5, 128.0);
    v.range_f64("aurora.maxCapacity", conf.max_capacity, 0.5, 128.0);
    v.check(
        conf.min_capacity <= conf.max_capacity,
        "aurora.minCapacity",
        conf.min_capacity,
        "Value must not exceed maxCapacity",
    );
    v.positive("aurora.instances", i64::from(conf.instances));
    v.check(
        !conf.database_name.is_empty()
            && conf
                .database_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_'),
        "aurora.databaseName",
        &conf.database_name,
        "Value must be a non-empty identifier",
    );
    v.non_empty("aurora.masterUsername", &conf.master_username);
}

fn ingress_and_cert(v: &mut Validator, ingress: &IngressConf, cert: &CertConf) {
    v.non_empty("ingress.domain", &ingress.domain);
    v.check(
        cert.acme_email.contains('@'),
        "cert.acmeEmail",
        &cert.acme_email,
        "Email address required",
    );
    if let Some(server) = &cert.acme_server {
        v.url("cert.acmeServer", server);
    }
}

impl DataPlaneConf {
    /// Validate the plane configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut v = Validator::new();
        v.positive("planeId", self.plane_id);
        v.non_empty("region", &self.region);
        account(&mut v, &self.account_conf);
        vpc(&mut v, &self.vpc);
        eks(&mut v, &self.eks);
        if let Some(conf) = &self.aurora {
            aurora(&mut v, conf);
        }
        if let Some(conf) = &self.elasticache {
            v.non_empty("elasticache.nodeType", &conf.node_type);
            v.non_empty("elasticache.engineVersion", &conf.engine_version);
        }
        if let Some(conf) = &self.msk {
            v.non_empty("msk.kafkaVersion", &conf.kafka_version);
            v.positive("msk.volumeSizeGb", i64::from(conf.volume_size_gb));
            // One private subnet per availability zone
            let subnets = self.vpc.az_count.max(1);
            v.check(
                conf.number_of_broker_nodes > 0 && conf.number_of_broker_nodes % subnets == 0,
                "msk.numberOfBrokerNodes",
                conf.number_of_broker_nodes,
                format!(
                    "Value must be a non-zero multiple of the private subnet count ({})",
                    subnets
                ),
            );
        }
        if let Some(conf) = &self.milvus {
            v.non_empty("milvus.chartVersion", &conf.chart_version);
            v.positive("milvus.replicas", i64::from(conf.replicas));
        }
        if let Some(conf) = &self.nitrous {
            v.check(
                self.msk.is_some(),
                "nitrous",
                "set",
                "Nitrous requires msk to be configured",
            );
            v.non_empty("nitrous.image", &conf.image);
            let binlog = &conf.binlog;
            v.check(
                binlog.replication_factor >= 1,
                "nitrous.binlog.replicationFactor",
                binlog.replication_factor,
                "Value must be >= 1",
            );
            if let Some(msk) = &self.msk {
                v.check(
                    binlog.replication_factor <= msk.number_of_broker_nodes,
                    "nitrous.binlog.replicationFactor",
                    binlog.replication_factor,
                    "Value must not exceed msk.numberOfBrokerNodes",
                );
            }
            v.check(
                binlog.partitions >= 1,
                "nitrous.binlog.partitions",
                binlog.partitions,
                "Value must be >= 1",
            );
            let unique: HashSet<_> = binlog.topics.iter().collect();
            v.check(
                !binlog.topics.is_empty() && unique.len() == binlog.topics.len(),
                "nitrous.binlog.topics",
                binlog.topics.len(),
                "Topics must be non-empty and unique",
            );
        }
        ingress_and_cert(&mut v, &self.ingress, &self.cert);
        if let Some(conf) = &self.prometheus {
            v.positive(
                "prometheus.scrapeIntervalSecs",
                i64::from(conf.scrape_interval_secs),
            );
        }
        v.finish()
    }
}

impl MothershipConf {
    /// Validate the mothership configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut v = Validator::new();
        v.positive("mothershipId", self.mothership_id);
        v.non_empty("region", &self.region);
        account(&mut v, &self.account_conf);
        vpc(&mut v, &self.vpc);
        eks(&mut v, &self.eks);
        aurora(&mut v, &self.aurora);
        ingress_and_cert(&mut v, &self.ingress, &self.cert);
        v.non_empty("image", &self.image);
        v.positive("replicas", i64::from(self.replicas));
        v.finish()
    }
}

impl TierConf {
    /// Validate the tier configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut v = Validator::new();
        v.positive("tierId", self.tier_id);
        v.positive("planeId", self.plane_id);
        v.positive("customer.customerId", self.customer.customer_id);
        v.non_empty("customer.name", &self.customer.name);
        v.non_empty("image", &self.image);
        v.positive("apiReplicas", i64::from(self.api_replicas));
        v.non_empty("redis.chartVersion", &self.redis.chart_version);
        v.positive("redis.persistenceGb", i64::from(self.redis.persistence_gb));
        v.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plane() -> DataPlaneConf {
        serde_json::from_value(json!({
            "planeId": 7,
            "region": "eu-west-1",
            "accountConf": {"existingAccount": {"accountId": "123456789012"}},
            "vpc": {"cidr": "10.20.0.0/16"},
            "eks": {"version": "1.29", "nodeGroups": [{
                "name": "general", "instanceTypes": ["m6i.xlarge"],
                "minSize": 2, "maxSize": 6, "desiredSize": 3
            }]},
            "msk": {"kafkaVersion": "3.6.0", "numberOfBrokerNodes": 3,
                    "instanceType": "kafka.m5.large", "volumeSizeGb": 100},
            "nitrous": {"image": "nitrous:1.0", "binlog": {
                "partitions": 1, "replicationFactor": 2, "topics": ["log", "req_log"]
            }},
            "ingress": {"domain": "p7.example.com"},
            "cert": {"acmeEmail": "ops@example.com"}
        }))
        .unwrap()
    }

    fn fields(err: ConfigError) -> Vec<String> {
        err.violations().iter().map(|v| v.field.clone()).collect()
    }

    #[test]
    fn test_valid_plane() {
        assert!(plane().validate().is_ok());
    }

    #[test]
    fn test_account_exactly_one() {
        let mut conf = plane();
        conf.account_conf.new_account = Some(NewAccount {
            name: "p7".into(),
            email: "p7@example.com".into(),
            parent_id: None,
            role_name: None,
        });
        assert_eq!(fields(conf.validate().unwrap_err()), vec!["accountConf"]);

        conf.account_conf = AccountConf::default();
        assert_eq!(fields(conf.validate().unwrap_err()), vec!["accountConf"]);
    }

    #[test]
    fn test_broker_count_multiple_of_subnets() {
        let mut conf = plane();
        if let Some(msk) = conf.msk.as_mut() {
            msk.number_of_broker_nodes = 4;
        }
        assert_eq!(
            fields(conf.validate().unwrap_err()),
            vec!["msk.numberOfBrokerNodes"]
        );
    }

    #[test]
    fn test_nitrous_requires_msk_and_sane_binlog() {
        let mut conf = plane();
        conf.msk = None;
        if let Some(nitrous) = conf.nitrous.as_mut() {
            nitrous.binlog.replication_factor = 0;
            nitrous.binlog.topics = vec![BinlogTopic::Log, BinlogTopic::Log];
        }
        let fields = fields(conf.validate().unwrap_err());
        assert!(fields.contains(&"nitrous".to_string()));
        assert!(fields.contains(&"nitrous.binlog.replicationFactor".to_string()));
        assert!(fields.contains(&"nitrous.binlog.topics".to_string()));
    }

    #[test]
    fn test_subnets_must_fit_cidr() {
        let mut conf = plane();
        conf.vpc.cidr = "10.20.0.0/24".into();
        conf.vpc.subnet_prefix = 26;
        assert_eq!(fields(conf.validate().unwrap_err()), vec!["vpc.subnetPrefix"]);

        conf.vpc.cidr = "not-a-cidr".into();
        assert_eq!(fields(conf.validate().unwrap_err()), vec!["vpc.cidr"]);
    }

    #[test]
    fn test_node_group_sizes_and_aurora_capacity() {
        let mut conf = plane();
        conf.eks.node_groups[0].desired_size = 9;
        conf.aurora = Some(AuroraConf {
            engine_version: "15.4".into(),
            min_capacity: 0.25,
            max_capacity: 4.0,
            instances: 1,
            database_name: "plane".into(),
            master_username: "postgres".into(),
        });
        let fields = fields(conf.validate().unwrap_err());
        assert_eq!(
            fields,
            vec!["eks.nodeGroups[0].desiredSize", "aurora.minCapacity"]
        );
    }

    #[test]
    fn test_tier_reports_every_violation() {
        let conf: TierConf = serde_json::from_value(json!({
            "tierId": 0,
            "planeId": 7,
            "customer": {"customerId": 3, "name": ""},
            "image": "api:2.1",
            "redis": {"chartVersion": "18.6.1"}
        }))
        .unwrap();
        assert_eq!(
            fields(conf.validate().unwrap_err()),
            vec!["tierId", "customer.name"]
        );
    }
}
