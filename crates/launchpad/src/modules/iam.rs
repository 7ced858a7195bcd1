// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! IAM roles for Kubernetes service accounts (IRSA).

use launchpad_engine::{ModuleOutput, Resource, StackContext};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::Scope;
use super::eks::EksOutput;
use crate::error::Result;

/// Role bound to a service account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IrsaOutput {
    /// Role ARN, used in the `eks.amazonaws.com/role-arn` annotation.
    pub role_arn: String,
    /// Role name.
    pub role_name: String,
}

impl ModuleOutput for IrsaOutput {}

/// Permissions granted to the role.
#[derive(Debug, Clone)]
pub enum Permissions {
    /// Attach a managed policy.
    Managed(String),
    /// Attach an inline policy document.
    Inline(Value),
}

/// Trust policy allowing one service account to assume a role through the
/// cluster's OIDC provider.
pub fn irsa_trust_policy(eks: &EksOutput, namespace: &str, service_account: &str) -> String {
    let issuer = eks.oidc_issuer.trim_start_matches("https://");
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": {"Federated": eks.oidc_provider_arn},
            "Action": "sts:AssumeRoleWithWebIdentity",
            "Condition": {
                "StringEquals": {
                    format!("{}:sub", issuer): format!("system:serviceaccount:{}:{}", namespace, service_account),
                    format!("{}:aud", issuer): "sts.amazonaws.com",
                }
            }
        }]
    })
    .to_string()
}

/// Declare a role for `namespace/service_account`.
pub async fn irsa(
    ctx: &StackContext,
    scope: &Scope,
    eks: &EksOutput,
    suffix: &str,
    namespace: &str,
    service_account: &str,
    permissions: Permissions,
) -> Result<IrsaOutput> {
    let role_name = scope.name(&format!("{}-irsa", suffix));
    let role = ctx
        .register(
            Resource::new("aws:iam/role:Role", role_name.as_str())
                .input("name", role_name.as_str())
                .input(
                    "assumeRolePolicy",
                    irsa_trust_policy(eks, namespace, service_account),
                )
                .input("tags", scope.tags(&format!("{}-irsa", suffix)))
                .provider(&scope.aws),
        )
        .await?;

    match permissions {
        Permissions::Managed(policy_arn) => {
            ctx.register(
                Resource::new(
                    "aws:iam/rolePolicyAttachment:RolePolicyAttachment",
                    format!("{}-attachment", role_name),
                )
                .input("role", role.id())
                .input("policyArn", policy_arn)
                .provider(&scope.aws),
            )
            .await?;
        }
        Permissions::Inline(document) => {
            ctx.register(
                Resource::new(
                    "aws:iam/rolePolicy:RolePolicy",
                    format!("{}-policy", role_name),
                )
                .input("role", role.id())
                .input("policy", document.to_string())
                .provider(&scope.aws),
            )
            .await?;
        }
    }

    Ok(IrsaOutput {
        role_arn: role.arn()?,
        role_name: role.id().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trust_policy_binds_service_account() {
        let eks = EksOutput {
            cluster_name: "p1".into(),
            endpoint: "https://x".into(),
            certificate_authority: "ca".into(),
            oidc_provider_arn: "arn:aws:iam::1:oidc-provider/oidc.eks.eu-west-1.amazonaws.com/id/AB".into(),
            oidc_issuer: "https://oidc.eks.eu-west-1.amazonaws.com/id/AB".into(),
            node_role_arn: "arn".into(),
            security_group_id: "sg-1".into(),
            kubeconfig: "{}".into(),
        };
        let policy: Value = serde_json::from_str(&irsa_trust_policy(&eks, "milvus", "milvus")).unwrap();
        let condition = &policy["Statement"][0]["Condition"]["StringEquals"];
        assert_eq!(
            condition["oidc.eks.eu-west-1.amazonaws.com/id/AB:sub"],
            "system:serviceaccount:milvus:milvus"
        );
    }
}
