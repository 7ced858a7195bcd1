// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! VPC with public and private subnets per availability zone.
//!
//! The VPC CIDR is split into equal blocks of `subnetPrefix`; the first
//! `azCount` blocks become public subnets and the next `azCount` private
//! ones. Private route tables send egress through NAT gateways spread
//! round-robin over the zones.

use ipnet::Ipv4Net;
use launchpad_engine::{ModuleOutput, Resource, ResourceOutputs, StackContext};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::Scope;
use crate::conf::VpcConf;
use crate::error::{Error, Result};

/// Network identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VpcOutput {
    /// VPC id.
    pub vpc_id: String,
    /// VPC CIDR block.
    pub cidr: String,
    /// Availability zones in subnet order.
    pub availability_zones: Vec<String>,
    /// Public subnet ids, one per zone.
    pub public_subnet_ids: Vec<String>,
    /// Private subnet ids, one per zone.
    pub private_subnet_ids: Vec<String>,
    /// NAT gateway ids.
    pub nat_gateway_ids: Vec<String>,
}

impl ModuleOutput for VpcOutput {}

/// Availability zone names of a region (`eu-west-1a`, `eu-west-1b`, ...).
pub fn availability_zones(region: &str, count: u32) -> Vec<String> {
    ('a'..='z')
        .take(count as usize)
        .map(|letter| format!("{}{}", region, letter))
        .collect()
}

/// Split `cidr` into the first `count` blocks of length `prefix`.
pub fn split_cidr(cidr: &str, prefix: u8, count: usize) -> Result<Vec<String>> {
    let net: Ipv4Net = cidr
        .parse()
        .map_err(|e| Error::Network(format!("{}: {}", cidr, e)))?;
    let blocks: Vec<String> = net
        .subnets(prefix)
        .map_err(|_| Error::Network(format!("cannot split {} into /{}", cidr, prefix)))?
        .take(count)
        .map(|n| n.to_string())
        .collect();
    if blocks.len() < count {
        return Err(Error::Network(format!(
            "{} holds {} /{} blocks, {} needed",
            cidr,
            blocks.len(),
            prefix,
            count
        )));
    }
    Ok(blocks)
}

/// Declare the network.
pub async fn setup(ctx: &StackContext, scope: &Scope, conf: &VpcConf) -> Result<VpcOutput> {
    let azs = availability_zones(&scope.region, conf.az_count);
    let blocks = split_cidr(&conf.cidr, conf.subnet_prefix, azs.len() * 2)?;
    let (public_blocks, private_blocks) = blocks.split_at(azs.len());

    let vpc = ctx
        .register(
            Resource::new("aws:ec2/vpc:Vpc", scope.name("vpc"))
                .input("cidrBlock", conf.cidr.as_str())
                .input("enableDnsHostnames", true)
                .input("enableDnsSupport", true)
                .input("tags", scope.tags("vpc"))
                .provider(&scope.aws),
        )
        .await?;

    let igw = ctx
        .register(
            Resource::new(
                "aws:ec2/internetGateway:InternetGateway",
                scope.name("igw"),
            )
            .input("vpcId", vpc.id())
            .input("tags", scope.tags("igw"))
            .provider(&scope.aws),
        )
        .await?;

    let mut public = Vec::with_capacity(azs.len());
    let mut private = Vec::with_capacity(azs.len());
    for (i, az) in azs.iter().enumerate() {
        let mut tags = scope.tags(&format!("public-{}", az));
        tags["kubernetes.io/role/elb"] = json!("1");
        public.push(
            ctx.register(
                Resource::new("aws:ec2/subnet:Subnet", scope.name(&format!("public-{}", az)))
                    .input("vpcId", vpc.id())
                    .input("cidrBlock", public_blocks[i].as_str())
                    .input("availabilityZone", az.as_str())
                    .input("mapPublicIpOnLaunch", true)
                    .input("tags", tags)
                    .provider(&scope.aws),
            )
            .await?,
        );

        let mut tags = scope.tags(&format!("private-{}", az));
        tags["kubernetes.io/role/internal-elb"] = json!("1");
        private.push(
            ctx.register(
                Resource::new("aws:ec2/subnet:Subnet", scope.name(&format!("private-{}", az)))
                    .input("vpcId", vpc.id())
                    .input("cidrBlock", private_blocks[i].as_str())
                    .input("availabilityZone", az.as_str())
                    .input("tags", tags)
                    .provider(&scope.aws),
            )
            .await?,
        );
    }

    let public_rt = ctx
        .register(
            Resource::new("aws:ec2/routeTable:RouteTable", scope.name("public-rt"))
                .input("vpcId", vpc.id())
                .input(
                    "routes",
                    json!([{"cidrBlock": "0.0.0.0/0", "gatewayId": igw.id()}]),
                )
                .input("tags", scope.tags("public-rt"))
                .provider(&scope.aws),
        )
        .await?;
    for (subnet, az) in public.iter().zip(&azs) {
        associate(ctx, scope, &format!("public-{}", az), subnet, &public_rt).await?;
    }

    let mut nats: Vec<ResourceOutputs> = Vec::new();
    for (i, subnet) in public.iter().take(conf.nat_gateways as usize).enumerate() {
        let eip = ctx
            .register(
                Resource::new("aws:ec2/eip:Eip", scope.name(&format!("nat-eip-{}", i)))
                    .input("domain", "vpc")
                    .input("tags", scope.tags(&format!("nat-eip-{}", i)))
                    .provider(&scope.aws)
                    .depends_on(&igw),
            )
            .await?;
        nats.push(
            ctx.register(
                Resource::new("aws:ec2/natGateway:NatGateway", scope.name(&format!("nat-{}", i)))
                    .input("allocationId", eip.id())
                    .input("subnetId", subnet.id())
                    .input("tags", scope.tags(&format!("nat-{}", i)))
                    .provider(&scope.aws),
            )
            .await?,
        );
    }

    let mut private_rt_ids = Vec::with_capacity(azs.len());
    for (i, (subnet, az)) in private.iter().zip(&azs).enumerate() {
        let mut rt = Resource::new(
            "aws:ec2/routeTable:RouteTable",
            scope.name(&format!("private-rt-{}", az)),
        )
        .input("vpcId", vpc.id())
        .input("tags", scope.tags(&format!("private-rt-{}", az)))
        .provider(&scope.aws);
        if !nats.is_empty() {
            let nat = &nats[i % nats.len()];
            rt = rt.input(
                "routes",
                json!([{"cidrBlock": "0.0.0.0/0", "natGatewayId": nat.id()}]),
            );
        }
        let rt = ctx.register(rt).await?;
        associate(ctx, scope, &format!("private-{}", az), subnet, &rt).await?;
        private_rt_ids.push(rt.id().to_string());
    }

    ctx.register(
        Resource::new("aws:ec2/vpcEndpoint:VpcEndpoint", scope.name("s3-endpoint"))
            .input("vpcId", vpc.id())
            .input("serviceName", format!("com.amazonaws.{}.s3", scope.region))
            .input("vpcEndpointType", "Gateway")
            .input("routeTableIds", json!(private_rt_ids))
            .input("tags", scope.tags("s3-endpoint"))
            .provider(&scope.aws),
    )
    .await?;

    Ok(VpcOutput {
        vpc_id: vpc.id().to_string(),
        cidr: conf.cidr.clone(),
        availability_zones: azs,
        public_subnet_ids: public.iter().map(|s| s.id().to_string()).collect(),
        private_subnet_ids: private.iter().map(|s| s.id().to_string()).collect(),
        nat_gateway_ids: nats.iter().map(|n| n.id().to_string()).collect(),
    })
}

async fn associate(
    ctx: &StackContext,
    scope: &Scope,
    suffix: &str,
    subnet: &ResourceOutputs,
    route_table: &ResourceOutputs,
) -> Result<()> {
    ctx.register(
        Resource::new(
            "aws:ec2/routeTableAssociation:RouteTableAssociation",
            scope.name(&format!("{}-rta", suffix)),
        )
        .input("subnetId", subnet.id())
        .input("routeTableId", route_table.id())
        .provider(&scope.aws),
    )
    .await?;
    Ok(())
}
