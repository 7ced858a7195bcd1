// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tier: one customer's namespace on a data plane.
//!
//! The tier reads the plane stack's outputs, so the plane must have been
//! deployed first and must carry an Aurora cluster.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use launchpad_engine::{ModuleOutput, Resource, StackContext};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::data_plane::PlaneOutput;
use super::{WebApp, secret_env, web_app};
use crate::conf::TierConf;
use crate::error::{Error, Result};
use crate::modules::k8s::Cluster;
use crate::modules::{random_password, redis};

const DB_SECRET: &str = "tier-db";
const API_PORT: u16 = 8080;

/// Outputs of a tier stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierOutput {
    /// Tier id.
    pub tier_id: i64,
    /// Plane hosting the tier.
    pub plane_id: i64,
    /// Owning customer.
    pub customer_id: i64,
    /// Customer display name.
    pub customer_name: String,
    /// Kubernetes namespace.
    pub namespace: String,
    /// Public API URL.
    pub api_url: String,
    /// Tier database on the plane's Aurora cluster.
    pub database_name: String,
    /// In-cluster Redis host.
    pub redis_host: String,
}

impl ModuleOutput for TierOutput {}

/// Name of the stack a plane is deployed to.
pub fn plane_stack(plane_id: i64) -> String {
    format!("plane-{}", plane_id)
}

/// Declare the tier.
pub async fn setup(ctx: &StackContext, conf: &TierConf) -> Result<TierOutput> {
    let plane: PlaneOutput =
        serde_json::from_value(ctx.stack_reference(&plane_stack(conf.plane_id)).await?)?;
    let aurora = plane.aurora.as_ref().ok_or(Error::PlaneComponentMissing {
        plane_id: conf.plane_id,
        component: "aurora",
    })?;
    info!(tier_id = conf.tier_id, plane_id = conf.plane_id, "Declaring tier");

    let prefix = format!("t{}", conf.tier_id);
    let namespace_name = format!("tier-{}", conf.tier_id);
    let database_name = format!("tier_{}", conf.tier_id);

    let cluster = Cluster::connect(ctx, &prefix, &plane.eks.kubeconfig).await?;
    let namespace = cluster.namespace(ctx, &namespace_name).await?;

    let redis = redis::setup(ctx, &cluster, &namespace, &namespace_name, &conf.redis).await?;

    let postgres = ctx
        .provider(
            "postgresql",
            cluster.name("postgresql"),
            json!({
                "host": aurora.endpoint,
                "port": aurora.port,
                "database": aurora.database_name,
                "username": aurora.master_username,
                "passwordSecretArn": aurora.master_password_secret_arn,
                "sslmode": "require",
            }),
        )
        .await?;

    let password = random_password(ctx, cluster.name("db-password"), 32).await?;
    let role = ctx
        .register(
            Resource::new("postgresql:index/role:Role", cluster.name("db-role"))
                .input("name", database_name.as_str())
                .input("login", true)
                .input("password", password.as_str())
                .provider(&postgres),
        )
        .await?;
    ctx.register(
        Resource::new("postgresql:index/database:Database", cluster.name("db"))
            .input("name", database_name.as_str())
            .input("owner", database_name.as_str())
            .provider(&postgres)
            .depends_on(&role),
    )
    .await?;

    let db_secret = cluster
        .object(
            ctx,
            "kubernetes:core/v1:Secret",
            "db-secret",
            json!({
                "metadata": {"name": DB_SECRET, "namespace": namespace_name},
                "type": "Opaque",
                "data": {
                    "host": STANDARD.encode(&aurora.endpoint),
                    "port": STANDARD.encode(aurora.port.to_string()),
                    "database": STANDARD.encode(&database_name),
                    "username": STANDARD.encode(&database_name),
                    "password": STANDARD.encode(&password),
                },
            }),
            &[&namespace],
        )
        .await?;

    let api_url = web_app(
        ctx,
        &cluster,
        WebApp {
            name: "api",
            namespace: &namespace_name,
            image: &conf.image,
            replicas: conf.api_replicas,
            port: API_PORT,
            host: format!("t{}.{}", conf.tier_id, plane.ingress.domain),
            ingress_class: &plane.ingress.ingress_class,
            issuer: &plane.cert.issuer_name,
            env: vec![
                json!({"name": "TIER_ID", "value": conf.tier_id.to_string()}),
                json!({"name": "CUSTOMER_ID", "value": conf.customer.customer_id.to_string()}),
                secret_env("DB_HOST", DB_SECRET, "host"),
                secret_env("DB_PORT", DB_SECRET, "port"),
                secret_env("DB_NAME", DB_SECRET, "database"),
                secret_env("DB_USER", DB_SECRET, "username"),
                secret_env("DB_PASSWORD", DB_SECRET, "password"),
                json!({"name": "REDIS_HOST", "value": redis.host}),
                secret_env("REDIS_PASSWORD", &redis.secret_name, "redis-password"),
            ],
        },
        &[&db_secret],
    )
    .await?;

    Ok(TierOutput {
        tier_id: conf.tier_id,
        plane_id: conf.plane_id,
        customer_id: conf.customer.customer_id,
        customer_name: conf.customer.name.clone(),
        namespace: namespace_name,
        api_url,
        database_name,
        redis_host: redis.host,
    })
}
