// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Aurora PostgreSQL (serverless v2) cluster.
//!
//! The master password is generated by a random password resource and
//! stored in Secrets Manager. Only the secret ARN leaves this module.

use launchpad_engine::{ModuleOutput, Resource, StackContext};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::eks::EksOutput;
use super::vpc::VpcOutput;
use super::{Scope, random_password, service_security_group};
use crate::conf::AuroraConf;
use crate::error::Result;

const ENGINE: &str = "aurora-postgresql";
const PORT: u16 = 5432;

/// Database connection details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuroraOutput {
    /// Cluster identifier.
    pub cluster_identifier: String,
    /// Writer endpoint.
    pub endpoint: String,
    /// Reader endpoint.
    pub reader_endpoint: String,
    /// Port.
    pub port: u16,
    /// Initial database.
    pub database_name: String,
    /// Master user.
    pub master_username: String,
    /// Secrets Manager secret holding `{username, password}`.
    pub master_password_secret_arn: String,
    /// Security group of the cluster.
    pub security_group_id: String,
}

impl ModuleOutput for AuroraOutput {}

/// Declare the database cluster, reachable from the EKS nodes.
pub async fn setup(
    ctx: &StackContext,
    scope: &Scope,
    conf: &AuroraConf,
    vpc: &VpcOutput,
    eks: &EksOutput,
) -> Result<AuroraOutput> {
    let identifier = scope.name("aurora");

    let subnet_group = ctx
        .register(
            Resource::new("aws:rds/subnetGroup:SubnetGroup", scope.name("aurora-subnets"))
                .input("name", scope.name("aurora-subnets"))
                .input("subnetIds", json!(vpc.private_subnet_ids))
                .input("tags", scope.tags("aurora-subnets"))
                .provider(&scope.aws),
        )
        .await?;

    let sg = service_security_group(
        ctx,
        scope,
        "aurora-sg",
        &vpc.vpc_id,
        PORT,
        &eks.security_group_id,
    )
    .await?;

    let password = random_password(ctx, scope.name("aurora-master-password"), 32).await?;

    let secret = ctx
        .register(
            Resource::new("aws:secretsmanager/secret:Secret", scope.name("aurora-master"))
                .input("name", format!("{}/master", identifier))
                .input("tags", scope.tags("aurora-master"))
                .provider(&scope.aws),
        )
        .await?;
    ctx.register(
        Resource::new(
            "aws:secretsmanager/secretVersion:SecretVersion",
            scope.name("aurora-master-version"),
        )
        .input("secretId", secret.id())
        .input(
            "secretString",
            json!({"username": conf.master_username, "password": password}).to_string(),
        )
        .provider(&scope.aws),
    )
    .await?;

    let cluster = ctx
        .register(
            Resource::new("aws:rds/cluster:Cluster", identifier.as_str())
                .input("clusterIdentifier", identifier.as_str())
                .input("engine", ENGINE)
                .input("engineMode", "provisioned")
                .input("engineVersion", conf.engine_version.as_str())
                .input("databaseName", conf.database_name.as_str())
                .input("masterUsername", conf.master_username.as_str())
                .input("masterPassword", password)
                .input("port", PORT)
                .input("dbSubnetGroupName", subnet_group.id())
                .input("vpcSecurityGroupIds", json!([sg.id()]))
                .input(
                    "serverlessv2ScalingConfiguration",
                    json!({
                        "minCapacity": conf.min_capacity,
                        "maxCapacity": conf.max_capacity,
                    }),
                )
                .input("storageEncrypted", true)
                .input("deletionProtection", scope.protect)
                .input("skipFinalSnapshot", !scope.protect)
                .input("tags", scope.tags("aurora"))
                .provider(&scope.aws)
                .protect(scope.protect)
                .delete_before_replace(),
        )
        .await?;

    for i in 0..conf.instances {
        let name = format!("{}-{}", identifier, i);
        ctx.register(
            Resource::new("aws:rds/clusterInstance:ClusterInstance", name.as_str())
                .input("identifier", name.as_str())
                .input("clusterIdentifier", cluster.id())
                .input("instanceClass", "db.serverless")
                .input("engine", ENGINE)
                .input("engineVersion", conf.engine_version.as_str())
                .input("tags", scope.tags(&format!("aurora-{}", i)))
                .provider(&scope.aws)
                .delete_before_replace(),
        )
        .await?;
    }

    Ok(AuroraOutput {
        cluster_identifier: cluster.id().to_string(),
        endpoint: cluster.get_str("endpoint")?,
        reader_endpoint: cluster.get_str("readerEndpoint")?,
        port: PORT,
        database_name: conf.database_name.clone(),
        master_username: conf.master_username.clone(),
        master_password_secret_arn: secret.arn()?,
        security_group_id: sg.id().to_string(),
    })
}
