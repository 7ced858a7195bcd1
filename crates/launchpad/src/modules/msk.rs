// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! MSK Kafka cluster with SASL/SCRAM authentication.
//!
//! MSK only accepts SCRAM secrets whose name starts with `AmazonMSK_` and
//! that are encrypted with a customer managed KMS key, so the module
//! declares both next to the cluster.

use launchpad_engine::{ModuleOutput, Resource, StackContext};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::eks::EksOutput;
use super::vpc::VpcOutput;
use super::{Scope, random_password, service_security_group};
use crate::conf::MskConf;
use crate::config::{ConfigError, Violation};
use crate::error::Result;

const SCRAM_PORT: u16 = 9096;
const USERNAME: &str = "launchpad";

/// Kafka connection details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MskOutput {
    /// Cluster ARN.
    pub cluster_arn: String,
    /// Comma separated SASL/SCRAM bootstrap brokers.
    pub bootstrap_brokers_sasl_scram: String,
    /// SCRAM user.
    pub username: String,
    /// SCRAM password.
    pub password: String,
}

impl ModuleOutput for MskOutput {}

/// Broker nodes are spread evenly over the client subnets.
pub fn check_brokers(conf: &MskConf, subnet_count: usize) -> std::result::Result<(), ConfigError> {
    let brokers = conf.number_of_broker_nodes as usize;
    if subnet_count == 0 || brokers == 0 || brokers % subnet_count != 0 {
        return Err(ConfigError::Invalid(vec![Violation {
            field: "msk.numberOfBrokerNodes".to_string(),
            value: brokers.to_string(),
            message: format!(
                "must be a non-zero multiple of the private subnet count ({})",
                subnet_count
            ),
        }]));
    }
    Ok(())
}

fn server_properties() -> String {
    [
        "auto.create.topics.enable=false",
        "default.replication.factor=3",
        "min.insync.replicas=2",
        "num.partitions=1",
        "log.retention.hours=168",
    ]
    .join("\n")
}

/// Declare the cluster in the private subnets.
pub async fn setup(
    ctx: &StackContext,
    scope: &Scope,
    conf: &MskConf,
    vpc: &VpcOutput,
    eks: &EksOutput,
) -> Result<MskOutput> {
    check_brokers(conf, vpc.private_subnet_ids.len())?;

    let sg = service_security_group(
        ctx,
        scope,
        "msk-sg",
        &vpc.vpc_id,
        SCRAM_PORT,
        &eks.security_group_id,
    )
    .await?;

    let configuration = ctx
        .register(
            Resource::new("aws:msk/configuration:Configuration", scope.name("msk-config"))
                .input("name", scope.name("msk-config"))
                .input("kafkaVersions", json!([conf.kafka_version]))
                .input("serverProperties", server_properties())
                .provider(&scope.aws),
        )
        .await?;

    let key = ctx
        .register(
            Resource::new("aws:kms/key:Key", scope.name("msk-scram-key"))
                .input("description", format!("{} MSK SCRAM secrets", scope.prefix))
                .input("enableKeyRotation", true)
                .input("tags", scope.tags("msk-scram-key"))
                .provider(&scope.aws),
        )
        .await?;

    let password = random_password(ctx, scope.name("msk-scram-password"), 32).await?;

    let secret = ctx
        .register(
            Resource::new("aws:secretsmanager/secret:Secret", scope.name("msk-scram"))
                .input("name", format!("AmazonMSK_{}", scope.prefix))
                .input("kmsKeyId", key.arn()?)
                .input("tags", scope.tags("msk-scram"))
                .provider(&scope.aws),
        )
        .await?;
    let version = ctx
        .register(
            Resource::new(
                "aws:secretsmanager/secretVersion:SecretVersion",
                scope.name("msk-scram-version"),
            )
            .input("secretId", secret.id())
            .input(
                "secretString",
                json!({"username": USERNAME, "password": password}).to_string(),
            )
            .provider(&scope.aws),
        )
        .await?;

    let cluster = ctx
        .register(
            Resource::new("aws:msk/cluster:Cluster", scope.name("msk"))
                .input("clusterName", scope.name("msk"))
                .input("kafkaVersion", conf.kafka_version.as_str())
                .input("numberOfBrokerNodes", conf.number_of_broker_nodes)
                .input(
                    "brokerNodeGroupInfo",
                    json!({
                        "instanceType": conf.instance_type,
                        "clientSubnets": vpc.private_subnet_ids,
                        "securityGroups": [sg.id()],
                        "storageInfo": {
                            "ebsStorageInfo": {"volumeSize": conf.volume_size_gb}
                        },
                    }),
                )
                .input("clientAuthentication", json!({"sasl": {"scram": true}}))
                .input(
                    "configurationInfo",
                    json!({"arn": configuration.arn()?, "revision": 1}),
                )
                .input(
                    "encryptionInfo",
                    json!({"encryptionInTransit": {"clientBroker": "TLS", "inCluster": true}}),
                )
                .input("tags", scope.tags("msk"))
                .provider(&scope.aws)
                .protect(scope.protect)
                .delete_before_replace(),
        )
        .await?;

    ctx.register(
        Resource::new(
            "aws:msk/scramSecretAssociation:ScramSecretAssociation",
            scope.name("msk-scram-association"),
        )
        .input("clusterArn", cluster.arn()?)
        .input("secretArnLists", json!([secret.arn()?]))
        .provider(&scope.aws)
        .depends_on(&version),
    )
    .await?;

    Ok(MskOutput {
        cluster_arn: cluster.arn()?,
        bootstrap_brokers_sasl_scram: cluster.get_str("bootstrapBrokersSaslScram")?,
        username: USERNAME.to_string(),
        password,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conf(brokers: u32) -> MskConf {
        MskConf {
            kafka_version: "3.6.0".into(),
            number_of_broker_nodes: brokers,
            instance_type: "kafka.m5.large".into(),
            volume_size_gb: 100,
        }
    }

    #[test]
    fn test_check_brokers() {
        assert!(check_brokers(&conf(3), 3).is_ok());
        assert!(check_brokers(&conf(6), 3).is_ok());
        let err = check_brokers(&conf(4), 3).unwrap_err();
        assert_eq!(err.violations()[0].field, "msk.numberOfBrokerNodes");
        assert!(check_brokers(&conf(0), 3).is_err());
    }
}
