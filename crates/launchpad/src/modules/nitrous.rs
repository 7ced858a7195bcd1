// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Nitrous streaming service and its binlog topics.
//!
//! Topics are named `p_{planeId}_nitrous_{kind}`. The pods read the Kafka
//! connection from the `kafka-conf-msk` secret (`servers`, `username`,
//! `password`) and the topic names from the `nitrous-config` map.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use launchpad_engine::{ModuleOutput, Resource, StackContext};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::k8s::{Cluster, app_labels, service_host};
use super::msk::MskOutput;
use crate::conf::NitrousConf;
use crate::error::Result;

/// Namespace of the deployment.
pub const NAMESPACE: &str = "nitrous";
/// Secret carrying the Kafka connection.
pub const KAFKA_SECRET: &str = "kafka-conf-msk";
const CONFIG_MAP: &str = "nitrous-config";
const PORT: u16 = 8080;

/// Deployed Nitrous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NitrousOutput {
    /// Namespace.
    pub namespace: String,
    /// Binlog topic names.
    pub topics: Vec<String>,
    /// Kafka connection secret.
    pub secret_name: String,
    /// Service endpoint (`host:port`).
    pub endpoint: String,
}

impl ModuleOutput for NitrousOutput {}

fn encode(value: &str) -> Value {
    Value::String(STANDARD.encode(value))
}

/// Declare the topics, connection secret and the service.
pub async fn setup(
    ctx: &StackContext,
    plane_id: i64,
    cluster: &Cluster,
    conf: &NitrousConf,
    msk: &MskOutput,
) -> Result<NitrousOutput> {
    let kafka = ctx
        .provider(
            "kafka",
            cluster.name("kafka"),
            json!({
                "bootstrapServers": msk.bootstrap_brokers_sasl_scram.split(',').collect::<Vec<_>>(),
                "tlsEnabled": true,
                "saslMechanism": "scram-sha512",
                "saslUsername": msk.username,
                "saslPassword": msk.password,
            }),
        )
        .await?;

    let mut topics = Vec::with_capacity(conf.binlog.topics.len());
    let mut topic_config = Map::new();
    if let Some(retention) = conf.binlog.retention_ms {
        topic_config.insert("retention.ms".into(), json!(retention.to_string()));
    }
    for kind in &conf.binlog.topics {
        let topic = ctx
            .register(
                Resource::new(
                    "kafka:index/topic:Topic",
                    cluster.name(&format!("topic-{}", kind.as_str())),
                )
                .input("name", kind.topic_name(plane_id))
                .input("partitions", conf.binlog.partitions)
                .input("replicationFactor", conf.binlog.replication_factor)
                .input("config", Value::Object(topic_config.clone()))
                .provider(&kafka)
                // Topic names are unique per cluster
                .delete_before_replace(),
            )
            .await?;
        topics.push(topic.get_str("name")?);
    }

    let namespace = cluster.namespace(ctx, NAMESPACE).await?;
    let secret = cluster
        .object(
            ctx,
            "kubernetes:core/v1:Secret",
            "nitrous-kafka-secret",
            json!({
                "metadata": {"name": KAFKA_SECRET, "namespace": NAMESPACE},
                "type": "Opaque",
                "data": {
                    "servers": encode(&msk.bootstrap_brokers_sasl_scram),
                    "username": encode(&msk.username),
                    "password": encode(&msk.password),
                },
            }),
            &[&namespace],
        )
        .await?;

    let mut config_data = Map::new();
    config_data.insert("PLANE_ID".into(), json!(plane_id.to_string()));
    for (kind, topic) in conf.binlog.topics.iter().zip(&topics) {
        config_data.insert(
            format!("{}_TOPIC", kind.as_str().to_uppercase()),
            json!(topic),
        );
    }
    let config_map = cluster
        .object(
            ctx,
            "kubernetes:core/v1:ConfigMap",
            "nitrous-config",
            json!({
                "metadata": {"name": CONFIG_MAP, "namespace": NAMESPACE},
                "data": config_data,
            }),
            &[&namespace],
        )
        .await?;

    let secret_env = |key: &str, env: &str| {
        json!({
            "name": env,
            "valueFrom": {"secretKeyRef": {"name": KAFKA_SECRET, "key": key}}
        })
    };
    cluster
        .object(
            ctx,
            "kubernetes:apps/v1:Deployment",
            "nitrous-deployment",
            json!({
                "metadata": {"name": "nitrous", "namespace": NAMESPACE, "labels": app_labels("nitrous")},
                "spec": {
                    "replicas": conf.replicas,
                    "selector": {"matchLabels": app_labels("nitrous")},
                    "template": {
                        "metadata": {"labels": app_labels("nitrous")},
                        "spec": {
                            "containers": [{
                                "name": "nitrous",
                                "image": conf.image,
                                "ports": [{"containerPort": PORT}],
                                "env": [
                                    secret_env("servers", "KAFKA_SERVERS"),
                                    secret_env("username", "KAFKA_USERNAME"),
                                    secret_env("password", "KAFKA_PASSWORD"),
                                ],
                                "envFrom": [{"configMapRef": {"name": CONFIG_MAP}}],
                            }]
                        }
                    }
                }
            }),
            &[&secret, &config_map],
        )
        .await?;

    cluster
        .object(
            ctx,
            "kubernetes:core/v1:Service",
            "nitrous-service",
            json!({
                "metadata": {"name": "nitrous", "namespace": NAMESPACE},
                "spec": {
                    "selector": app_labels("nitrous"),
                    "ports": [{"name": "http", "port": PORT, "targetPort": PORT}],
                }
            }),
            &[&namespace],
        )
        .await?;

    Ok(NitrousOutput {
        namespace: NAMESPACE.to_string(),
        topics,
        secret_name: KAFKA_SECRET.to_string(),
        endpoint: format!("{}:{}", service_host("nitrous", NAMESPACE), PORT),
    })
}
