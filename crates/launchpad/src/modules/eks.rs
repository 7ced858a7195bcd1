// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! EKS cluster, OIDC provider and managed node groups.

use launchpad_engine::{ModuleOutput, Resource, ResourceOutputs, StackContext};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::vpc::VpcOutput;
use super::{Scope, allow_all_egress, service_trust_policy};
use crate::conf::EksConf;
use crate::error::Result;

const CLUSTER_POLICIES: &[&str] = &[
    "arn:aws:iam::aws:policy/AmazonEKSClusterPolicy",
    "arn:aws:iam::aws:policy/AmazonEKSVPCResourceController",
];

const NODE_POLICIES: &[&str] = &[
    "arn:aws:iam::aws:policy/AmazonEKSWorkerNodePolicy",
    "arn:aws:iam::aws:policy/AmazonEKS_CNI_Policy",
    "arn:aws:iam::aws:policy/AmazonEC2ContainerRegistryReadOnly",
];

/// Root CA thumbprint of the EKS OIDC endpoints.
const OIDC_THUMBPRINT: &str = "9e99a48a9960b14926bb7f3b02e22da2b0ab7280";

/// Cluster access details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EksOutput {
    /// Cluster name.
    pub cluster_name: String,
    /// API server endpoint.
    pub endpoint: String,
    /// Base64 cluster CA.
    pub certificate_authority: String,
    /// IAM OIDC provider ARN.
    pub oidc_provider_arn: String,
    /// OIDC issuer URL.
    pub oidc_issuer: String,
    /// Node role ARN.
    pub node_role_arn: String,
    /// Cluster security group id.
    pub security_group_id: String,
    /// Kubeconfig (JSON) authenticating through the provisioning role.
    pub kubeconfig: String,
}

impl ModuleOutput for EksOutput {}

/// Kubeconfig that obtains tokens with `aws eks get-token`.
pub fn kubeconfig(
    cluster_name: &str,
    endpoint: &str,
    certificate_authority: &str,
    region: &str,
    role_arn: &str,
) -> String {
    json!({
        "apiVersion": "v1",
        "kind": "Config",
        "clusters": [{
            "name": cluster_name,
            "cluster": {
                "server": endpoint,
                "certificate-authority-data": certificate_authority,
            }
        }],
        "contexts": [{
            "name": cluster_name,
            "context": {"cluster": cluster_name, "user": cluster_name}
        }],
        "current-context": cluster_name,
        "users": [{
            "name": cluster_name,
            "user": {
                "exec": {
                    "apiVersion": "client.authentication.k8s.io/v1beta1",
                    "command": "aws",
                    "args": [
                        "eks", "get-token",
                        "--cluster-name", cluster_name,
                        "--region", region,
                        "--role-arn", role_arn
                    ]
                }
            }
        }]
    })
    .to_string()
}

async fn role(
    ctx: &StackContext,
    scope: &Scope,
    suffix: &str,
    service: &str,
    policies: &[&str],
) -> Result<(ResourceOutputs, Vec<ResourceOutputs>)> {
    let role = ctx
        .register(
            Resource::new("aws:iam/role:Role", scope.name(suffix))
                .input("name", scope.name(suffix))
                .input("assumeRolePolicy", service_trust_policy(service))
                .input("tags", scope.tags(suffix))
                .provider(&scope.aws),
        )
        .await?;

    let mut attachments = Vec::with_capacity(policies.len());
    for policy in policies {
        let short = policy.rsplit('/').next().unwrap_or(policy);
        attachments.push(
            ctx.register(
                Resource::new(
                    "aws:iam/rolePolicyAttachment:RolePolicyAttachment",
                    scope.name(&format!("{}-{}", suffix, short)),
                )
                .input("role", role.id())
                .input("policyArn", *policy)
                .provider(&scope.aws),
            )
            .await?,
        );
    }
    Ok((role, attachments))
}

/// Declare the cluster.
pub async fn setup(
    ctx: &StackContext,
    scope: &Scope,
    conf: &EksConf,
    vpc: &VpcOutput,
    provisioning_role_arn: &str,
) -> Result<EksOutput> {
    let (cluster_role, cluster_attachments) = role(
        ctx,
        scope,
        "eks-cluster-role",
        "eks.amazonaws.com",
        CLUSTER_POLICIES,
    )
    .await?;

    let sg = ctx
        .register(
            Resource::new(
                "aws:ec2/securityGroup:SecurityGroup",
                scope.name("eks-cluster-sg"),
            )
            .input("name", scope.name("eks-cluster-sg"))
            .input("description", "EKS control plane")
            .input("vpcId", vpc.vpc_id.as_str())
            .input("egress", allow_all_egress())
            .input("tags", scope.tags("eks-cluster-sg"))
            .provider(&scope.aws),
        )
        .await?;

    let subnet_ids: Vec<&str> = vpc
        .private_subnet_ids
        .iter()
        .chain(&vpc.public_subnet_ids)
        .map(String::as_str)
        .collect();

    let mut cluster = Resource::new("aws:eks/cluster:Cluster", scope.name("eks"))
        .input("name", scope.prefix.as_str())
        .input("version", conf.version.as_str())
        .input("roleArn", cluster_role.arn()?)
        .input(
            "vpcConfig",
            json!({
                "subnetIds": subnet_ids,
                "securityGroupIds": [sg.id()],
                "endpointPrivateAccess": true,
                "endpointPublicAccess": true,
            }),
        )
        .input(
            "accessConfig",
            json!({"authenticationMode": "API_AND_CONFIG_MAP"}),
        )
        .input("tags", scope.tags("eks"))
        .provider(&scope.aws)
        .protect(scope.protect)
        .delete_before_replace();
    for attachment in &cluster_attachments {
        cluster = cluster.depends_on(attachment);
    }
    let cluster = ctx.register(cluster).await?;

    let cluster_name = cluster.get_str("name")?;
    let endpoint = cluster.get_str("endpoint")?;
    let certificate_authority = cluster.get_str("certificateAuthorityData")?;
    let oidc_issuer = cluster.get_str("oidcIssuer")?;

    let oidc = ctx
        .register(
            Resource::new(
                "aws:iam/openIdConnectProvider:OpenIdConnectProvider",
                scope.name("eks-oidc"),
            )
            .input("url", oidc_issuer.as_str())
            .input("clientIdLists", json!(["sts.amazonaws.com"]))
            .input("thumbprintLists", json!([OIDC_THUMBPRINT]))
            .provider(&scope.aws),
        )
        .await?;

    let (node_role, node_attachments) = role(
        ctx,
        scope,
        "eks-node-role",
        "ec2.amazonaws.com",
        NODE_POLICIES,
    )
    .await?;
    let node_role_arn = node_role.arn()?;

    for group in &conf.node_groups {
        let suffix = format!("ng-{}", group.name);
        let mut node_group = Resource::new("aws:eks/nodeGroup:NodeGroup", scope.name(&suffix))
            .input("clusterName", cluster_name.as_str())
            .input("nodeGroupName", group.name.as_str())
            .input("nodeRoleArn", node_role_arn.as_str())
            .input("subnetIds", json!(vpc.private_subnet_ids))
            .input("instanceTypes", json!(group.instance_types))
            .input("diskSize", group.disk_size_gb)
            .input(
                "scalingConfig",
                json!({
                    "minSize": group.min_size,
                    "maxSize": group.max_size,
                    "desiredSize": group.desired_size,
                }),
            )
            .input("tags", scope.tags(&suffix))
            .provider(&scope.aws)
            // The cluster autoscaler owns the live size
            .ignore_changes("scalingConfig.desiredSize")
            .delete_before_replace()
            .depends_on(&cluster);
        for attachment in &node_attachments {
            node_group = node_group.depends_on(attachment);
        }
        ctx.register(node_group).await?;
    }

    Ok(EksOutput {
        kubeconfig: kubeconfig(
            &cluster_name,
            &endpoint,
            &certificate_authority,
            &scope.region,
            provisioning_role_arn,
        ),
        cluster_name,
        endpoint,
        certificate_authority,
        oidc_provider_arn: oidc.arn()?,
        oidc_issuer,
        node_role_arn,
        security_group_id: sg.id().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kubeconfig_uses_role() {
        let config: serde_json::Value = serde_json::from_str(&kubeconfig(
            "p1",
            "https://ABC.gr7.eu-west-1.eks.amazonaws.com",
            "LS0t",
            "eu-west-1",
            "arn:aws:iam::123456789012:role/OrganizationAccountAccessRole",
        ))
        .unwrap();
        assert_eq!(config["current-context"], "p1");
        let args = config["users"][0]["user"]["exec"]["args"].as_array().unwrap();
        assert!(args.iter().any(|a| a == "--role-arn"));
        assert_eq!(
            config["clusters"][0]["cluster"]["server"],
            "https://ABC.gr7.eu-west-1.eks.amazonaws.com"
        );
    }
}
