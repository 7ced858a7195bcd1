// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-cluster Redis for one tier.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use launchpad_engine::{ModuleOutput, ResourceOutputs, StackContext};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::k8s::{Chart, Cluster, service_host};
use super::random_password;
use crate::conf::RedisConf;
use crate::error::Result;

const CHART_REPO: &str = "https://charts.bitnami.com/bitnami";
const SECRET_NAME: &str = "redis-auth";

/// Redis connection details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedisOutput {
    /// Service host of the master.
    pub host: String,
    /// Port.
    pub port: u16,
    /// Secret holding the `redis-password` key.
    pub secret_name: String,
}

impl ModuleOutput for RedisOutput {}

/// Install Redis into `namespace`.
pub async fn setup(
    ctx: &StackContext,
    cluster: &Cluster,
    namespace: &ResourceOutputs,
    namespace_name: &str,
    conf: &RedisConf,
) -> Result<RedisOutput> {
    let password = random_password(ctx, cluster.name("redis-password"), 24).await?;
    let secret = cluster
        .object(
            ctx,
            "kubernetes:core/v1:Secret",
            "redis-auth",
            json!({
                "metadata": {"name": SECRET_NAME, "namespace": namespace_name},
                "type": "Opaque",
                "data": {"redis-password": STANDARD.encode(&password)},
            }),
            &[namespace],
        )
        .await?;

    cluster
        .helm_release(
            ctx,
            Chart {
                release: "redis",
                namespace: namespace_name,
                chart: "redis",
                version: &conf.chart_version,
                repo: CHART_REPO,
                values: json!({
                    "architecture": "standalone",
                    "auth": {
                        "enabled": true,
                        "existingSecret": SECRET_NAME,
                        "existingSecretPasswordKey": "redis-password",
                    },
                    "master": {
                        "persistence": {"size": format!("{}Gi", conf.persistence_gb)}
                    },
                }),
            },
            &[namespace, &secret],
        )
        .await?;

    Ok(RedisOutput {
        host: service_host("redis-master", namespace_name),
        port: 6379,
        secret_name: SECRET_NAME.to_string(),
    })
}
