// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Amazon Managed Prometheus workspace fed by an in-cluster agent.

use launchpad_engine::{ModuleOutput, Resource, StackContext};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::Scope;
use super::eks::EksOutput;
use super::iam::{self, Permissions};
use super::k8s::{Chart, Cluster};
use crate::conf::PrometheusConf;
use crate::error::Result;

const NAMESPACE: &str = "prometheus";
const SERVICE_ACCOUNT: &str = "prometheus-agent";
const CHART_VERSION: &str = "25.21.0";
const CHART_REPO: &str = "https://prometheus-community.github.io/helm-charts";
const REMOTE_WRITE_POLICY: &str = "arn:aws:iam::aws:policy/AmazonPrometheusRemoteWriteAccess";

/// Workspace endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrometheusOutput {
    /// AMP workspace id.
    pub workspace_id: String,
    /// Remote write URL.
    pub remote_write_url: String,
    /// Query URL.
    pub query_url: String,
}

impl ModuleOutput for PrometheusOutput {}

/// Declare the workspace, the agent role and the agent.
pub async fn setup(
    ctx: &StackContext,
    scope: &Scope,
    cluster: &Cluster,
    eks: &EksOutput,
    conf: &PrometheusConf,
) -> Result<PrometheusOutput> {
    let workspace = ctx
        .register(
            Resource::new("aws:amp/workspace:Workspace", scope.name("amp"))
                .input("alias", scope.name("amp"))
                .input("tags", scope.tags("amp"))
                .provider(&scope.aws),
        )
        .await?;
    let endpoint = workspace.get_str("prometheusEndpoint")?;
    let remote_write_url = format!("{}api/v1/remote_write", endpoint);

    let role = iam::irsa(
        ctx,
        scope,
        eks,
        "prometheus",
        NAMESPACE,
        SERVICE_ACCOUNT,
        Permissions::Managed(REMOTE_WRITE_POLICY.to_string()),
    )
    .await?;

    let namespace = cluster.namespace(ctx, NAMESPACE).await?;
    cluster
        .helm_release(
            ctx,
            Chart {
                release: "prometheus-agent",
                namespace: NAMESPACE,
                chart: "prometheus",
                version: CHART_VERSION,
                repo: CHART_REPO,
                values: json!({
                    "serviceAccounts": {
                        "server": {
                            "name": SERVICE_ACCOUNT,
                            "annotations": {"eks.amazonaws.com/role-arn": role.role_arn},
                        }
                    },
                    "alertmanager": {"enabled": false},
                    "prometheus-pushgateway": {"enabled": false},
                    "server": {
                        "global": {"scrape_interval": format!("{}s", conf.scrape_interval_secs)},
                        "remoteWrite": [{
                            "url": remote_write_url,
                            "sigv4": {"region": scope.region},
                        }],
                    },
                }),
            },
            &[&namespace],
        )
        .await?;

    Ok(PrometheusOutput {
        workspace_id: workspace.id().to_string(),
        remote_write_url,
        query_url: format!("{}api/v1/query", endpoint),
    })
}
