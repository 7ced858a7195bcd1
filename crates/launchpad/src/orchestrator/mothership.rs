// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mothership: control plane cluster running the management API on top of
//! its own Aurora database.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use launchpad_engine::{ModuleOutput, StackContext};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::{WebApp, secret_env, web_app};
use crate::conf::MothershipConf;
use crate::error::Result;
use crate::modules::Scope;
use crate::modules::account::{self, AccountOutput};
use crate::modules::aurora::{self, AuroraOutput};
use crate::modules::cert::{self, CertOutput};
use crate::modules::eks::{self, EksOutput};
use crate::modules::ingress::{self, IngressOutput};
use crate::modules::k8s::Cluster;
use crate::modules::vpc::{self, VpcOutput};

const NAMESPACE: &str = "mothership";
const DB_SECRET: &str = "mothership-db";
const API_PORT: u16 = 8080;

/// Outputs of a mothership stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MothershipOutput {
    /// Mothership id.
    pub mothership_id: i64,
    /// AWS region.
    pub region: String,
    /// Target account.
    pub account: AccountOutput,
    /// Network.
    pub vpc: VpcOutput,
    /// Cluster.
    pub eks: EksOutput,
    /// Control database.
    pub aurora: AuroraOutput,
    /// Ingress controller.
    pub ingress: IngressOutput,
    /// Certificate issuer.
    pub cert: CertOutput,
    /// Public API URL.
    pub api_url: String,
}

impl ModuleOutput for MothershipOutput {}

/// Declare the mothership.
pub async fn setup(ctx: &StackContext, conf: &MothershipConf) -> Result<MothershipOutput> {
    let prefix = format!("m{}", conf.mothership_id);
    info!(mothership_id = conf.mothership_id, region = %conf.region, "Declaring mothership");

    let account = account::setup(ctx, &prefix, &conf.account_conf, conf.protect).await?;
    let aws = account::provider(ctx, &prefix, &conf.region, &account).await?;
    let scope = Scope {
        prefix: prefix.clone(),
        region: conf.region.clone(),
        aws,
        protect: conf.protect,
    };

    let vpc = vpc::setup(ctx, &scope, &conf.vpc).await?;
    let eks = eks::setup(ctx, &scope, &conf.eks, &vpc, &account.role_arn).await?;
    let aurora = aurora::setup(ctx, &scope, &conf.aurora, &vpc, &eks).await?;

    let cluster = Cluster::connect(ctx, &prefix, &eks.kubeconfig).await?;
    let (ingress, cert) = tokio::try_join!(
        ingress::setup(ctx, &cluster, &conf.ingress),
        cert::setup(ctx, &cluster, &conf.cert),
    )?;

    let namespace = cluster.namespace(ctx, NAMESPACE).await?;
    let db_secret = cluster
        .object(
            ctx,
            "kubernetes:core/v1:Secret",
            "mothership-db-secret",
            json!({
                "metadata": {"name": DB_SECRET, "namespace": NAMESPACE},
                "type": "Opaque",
                "data": {
                    "host": STANDARD.encode(&aurora.endpoint),
                    "port": STANDARD.encode(aurora.port.to_string()),
                    "database": STANDARD.encode(&aurora.database_name),
                    "username": STANDARD.encode(&aurora.master_username),
                    "passwordSecretArn": STANDARD.encode(&aurora.master_password_secret_arn),
                },
            }),
            &[&namespace],
        )
        .await?;

    let api_url = web_app(
        ctx,
        &cluster,
        WebApp {
            name: "mothership-api",
            namespace: NAMESPACE,
            image: &conf.image,
            replicas: conf.replicas,
            port: API_PORT,
            host: format!("mothership.{}", conf.ingress.domain),
            ingress_class: &ingress.ingress_class,
            issuer: &cert.issuer_name,
            env: vec![
                secret_env("DB_HOST", DB_SECRET, "host"),
                secret_env("DB_PORT", DB_SECRET, "port"),
                secret_env("DB_NAME", DB_SECRET, "database"),
                secret_env("DB_USER", DB_SECRET, "username"),
                secret_env("DB_PASSWORD_SECRET_ARN", DB_SECRET, "passwordSecretArn"),
                json!({"name": "AWS_REGION", "value": conf.region}),
            ],
        },
        &[&db_secret],
    )
    .await?;

    Ok(MothershipOutput {
        mothership_id: conf.mothership_id,
        region: conf.region.clone(),
        account,
        vpc,
        eks,
        aurora,
        ingress,
        cert,
        api_url,
    })
}
