// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! cert-manager with an ACME cluster issuer.

use launchpad_engine::{ModuleOutput, StackContext};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::ingress::INGRESS_CLASS;
use super::k8s::{Chart, Cluster};
use crate::conf::{CertConf, DEFAULT_ACME_SERVER};
use crate::error::Result;

const NAMESPACE: &str = "cert-manager";
const CHART_VERSION: &str = "v1.14.5";
const CHART_REPO: &str = "https://charts.jetstack.io";
/// Name of the cluster issuer.
pub const ISSUER: &str = "letsencrypt";

/// Issuer referenced by ingress annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertOutput {
    /// ClusterIssuer name.
    pub issuer_name: String,
}

impl ModuleOutput for CertOutput {}

/// Install cert-manager and the issuer.
pub async fn setup(ctx: &StackContext, cluster: &Cluster, conf: &CertConf) -> Result<CertOutput> {
    let namespace = cluster.namespace(ctx, NAMESPACE).await?;
    let release = cluster
        .helm_release(
            ctx,
            Chart {
                release: "cert-manager",
                namespace: NAMESPACE,
                chart: "cert-manager",
                version: CHART_VERSION,
                repo: CHART_REPO,
                values: json!({"installCRDs": true}),
            },
            &[&namespace],
        )
        .await?;

    // CRDs come with the release
    cluster
        .object(
            ctx,
            "kubernetes:cert-manager.io/v1:ClusterIssuer",
            "cluster-issuer",
            json!({
                "metadata": {"name": ISSUER},
                "spec": {
                    "acme": {
                        "email": conf.acme_email,
                        "server": conf.acme_server.as_deref().unwrap_or(DEFAULT_ACME_SERVER),
                        "privateKeySecretRef": {"name": format!("{}-account-key", ISSUER)},
                        "solvers": [{"http01": {"ingress": {"ingressClassName": INGRESS_CLASS}}}]
                    }
                }
            }),
            &[&release],
        )
        .await?;

    Ok(CertOutput {
        issuer_name: ISSUER.to_string(),
    })
}
