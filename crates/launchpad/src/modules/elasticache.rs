// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! ElastiCache Redis replication group.

use launchpad_engine::{ModuleOutput, Resource, StackContext};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::eks::EksOutput;
use super::vpc::VpcOutput;
use super::{Scope, service_security_group};
use crate::conf::ElasticacheConf;
use crate::error::Result;

const PORT: u16 = 6379;

/// Cache endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElasticacheOutput {
    /// Replication group id.
    pub replication_group_id: String,
    /// Primary endpoint.
    pub primary_endpoint: String,
    /// Reader endpoint.
    pub reader_endpoint: String,
    /// Port.
    pub port: u16,
}

impl ModuleOutput for ElasticacheOutput {}

/// Declare the replication group.
pub async fn setup(
    ctx: &StackContext,
    scope: &Scope,
    conf: &ElasticacheConf,
    vpc: &VpcOutput,
    eks: &EksOutput,
) -> Result<ElasticacheOutput> {
    let subnet_group = ctx
        .register(
            Resource::new(
                "aws:elasticache/subnetGroup:SubnetGroup",
                scope.name("cache-subnets"),
            )
            .input("name", scope.name("cache-subnets"))
            .input("subnetIds", json!(vpc.private_subnet_ids))
            .provider(&scope.aws),
        )
        .await?;

    let sg = service_security_group(
        ctx,
        scope,
        "cache-sg",
        &vpc.vpc_id,
        PORT,
        &eks.security_group_id,
    )
    .await?;

    let group_id = scope.name("cache");
    let group = ctx
        .register(
            Resource::new(
                "aws:elasticache/replicationGroup:ReplicationGroup",
                group_id.as_str(),
            )
            .input("replicationGroupId", group_id.as_str())
            .input("description", format!("{} redis", scope.prefix))
            .input("engine", "redis")
            .input("engineVersion", conf.engine_version.as_str())
            .input("nodeType", conf.node_type.as_str())
            .input("numCacheClusters", conf.num_replicas + 1)
            .input("automaticFailoverEnabled", conf.num_replicas > 0)
            .input("multiAzEnabled", conf.num_replicas > 0)
            .input("port", PORT)
            .input("subnetGroupName", subnet_group.id())
            .input("securityGroupIds", json!([sg.id()]))
            .input("atRestEncryptionEnabled", true)
            .input("transitEncryptionEnabled", true)
            .input("tags", scope.tags("cache"))
            .provider(&scope.aws)
            .protect(scope.protect),
        )
        .await?;

    Ok(ElasticacheOutput {
        replication_group_id: group.id().to_string(),
        primary_endpoint: group.get_str("primaryEndpointAddress")?,
        reader_endpoint: group.get_str("readerEndpointAddress")?,
        port: PORT,
    })
}
