// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Resource modules.
//!
//! Each module declares a fixed bundle of resources through the stack
//! context and returns a plain output struct. Output structs implement
//! [`ModuleOutput`], so they can only hold resolved data.
//!
//! | Module | Package(s) | Output |
//! |--------|------------|--------|
//! | [`account`] | aws | [`account::AccountOutput`] |
//! | [`vpc`] | aws | [`vpc::VpcOutput`] |
//! | [`eks`] | aws | [`eks::EksOutput`] |
//! | [`iam`] | aws | [`iam::IrsaOutput`] |
//! | [`aurora`] | aws, random | [`aurora::AuroraOutput`] |
//! | [`elasticache`] | aws | [`elasticache::ElasticacheOutput`] |
//! | [`redis`] | kubernetes, helm, random | [`redis::RedisOutput`] |
//! | [`msk`] | aws, random | [`msk::MskOutput`] |
//! | [`milvus`] | aws, kubernetes, helm | [`milvus::MilvusOutput`] |
//! | [`nitrous`] | kafka, kubernetes | [`nitrous::NitrousOutput`] |
//! | [`ingress`] | kubernetes, helm | [`ingress::IngressOutput`] |
//! | [`cert`] | kubernetes, helm | [`cert::CertOutput`] |
//! | [`telemetry`] | kubernetes, helm | [`telemetry::TelemetryOutput`] |
//! | [`prometheus`] | aws, kubernetes, helm | [`prometheus::PrometheusOutput`] |
//! | [`k8s`] | kubernetes, helm | [`k8s::Cluster`] |

pub mod account;
pub mod aurora;
pub mod cert;
pub mod eks;
pub mod elasticache;
pub mod iam;
pub mod ingress;
pub mod k8s;
pub mod milvus;
pub mod msk;
pub mod nitrous;
pub mod prometheus;
pub mod redis;
pub mod telemetry;
pub mod vpc;

use launchpad_engine::{ProviderRef, Resource, ResourceOutputs, StackContext};
use serde_json::{Value, json};

use crate::error::Result;

/// Naming and provider context shared by the AWS modules of one stack.
#[derive(Debug, Clone)]
pub struct Scope {
    /// Prefix of every resource name (e.g. `p42`).
    pub prefix: String,
    /// AWS region.
    pub region: String,
    /// AWS provider bound to the target account.
    pub aws: ProviderRef,
    /// Protect stateful resources.
    pub protect: bool,
}

impl Scope {
    /// Prefixed resource name.
    pub fn name(&self, suffix: &str) -> String {
        format!("{}-{}", self.prefix, suffix)
    }

    /// Standard tags, with `Name` set to the prefixed name.
    pub fn tags(&self, suffix: &str) -> Value {
        json!({
            "Name": self.name(suffix),
            "launchpad:stack": self.prefix,
            "managed-by": "launchpad",
        })
    }
}

/// IAM trust policy for an AWS service principal.
pub(crate) fn service_trust_policy(service: &str) -> String {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": {"Service": service},
            "Action": "sts:AssumeRole"
        }]
    })
    .to_string()
}

/// Security group egress rule allowing all outbound traffic.
pub(crate) fn allow_all_egress() -> Value {
    json!([{
        "protocol": "-1",
        "fromPort": 0,
        "toPort": 0,
        "cidrBlocks": ["0.0.0.0/0"]
    }])
}

/// Security group admitting `port` from another security group.
pub(crate) async fn service_security_group(
    ctx: &StackContext,
    scope: &Scope,
    suffix: &str,
    vpc_id: &str,
    port: u16,
    source_security_group_id: &str,
) -> Result<ResourceOutputs> {
    let sg = ctx
        .register(
            Resource::new("aws:ec2/securityGroup:SecurityGroup", scope.name(suffix))
                .input("name", scope.name(suffix))
                .input("description", format!("{} access", suffix))
                .input("vpcId", vpc_id)
                .input("egress", allow_all_egress())
                .input("tags", scope.tags(suffix))
                .provider(&scope.aws),
        )
        .await?;

    ctx.register(
        Resource::new(
            "aws:ec2/securityGroupRule:SecurityGroupRule",
            scope.name(&format!("{}-ingress-{}", suffix, port)),
        )
        .input("type", "ingress")
        .input("protocol", "tcp")
        .input("fromPort", port)
        .input("toPort", port)
        .input("securityGroupId", sg.id())
        .input("sourceSecurityGroupId", source_security_group_id)
        .provider(&scope.aws),
    )
    .await?;

    Ok(sg)
}

/// Random password without special characters.
pub(crate) async fn random_password(
    ctx: &StackContext,
    name: String,
    length: u32,
) -> Result<String> {
    let password = ctx
        .register(
            Resource::new("random:index/randomPassword:RandomPassword", name)
                .input("length", length)
                .input("special", false),
        )
        .await?;
    Ok(password.get_str("result")?)
}
