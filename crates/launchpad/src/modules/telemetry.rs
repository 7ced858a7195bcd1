// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! OpenTelemetry collector.

use launchpad_engine::{ModuleOutput, StackContext};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::k8s::{Chart, Cluster, service_host};
use crate::error::Result;

const NAMESPACE: &str = "telemetry";
const CHART_VERSION: &str = "0.90.1";
const CHART_REPO: &str = "https://open-telemetry.github.io/opentelemetry-helm-charts";

/// Collector endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryOutput {
    /// OTLP gRPC endpoint.
    pub otlp_endpoint: String,
}

impl ModuleOutput for TelemetryOutput {}

/// Install the collector as a deployment.
pub async fn setup(ctx: &StackContext, cluster: &Cluster) -> Result<TelemetryOutput> {
    let namespace = cluster.namespace(ctx, NAMESPACE).await?;
    cluster
        .helm_release(
            ctx,
            Chart {
                release: "otel-collector",
                namespace: NAMESPACE,
                chart: "opentelemetry-collector",
                version: CHART_VERSION,
                repo: CHART_REPO,
                values: json!({
                    "mode": "deployment",
                    "image": {"repository": "otel/opentelemetry-collector-contrib"},
                    "presets": {"kubernetesAttributes": {"enabled": true}},
                }),
            },
            &[&namespace],
        )
        .await?;

    Ok(TelemetryOutput {
        otlp_endpoint: format!(
            "http://{}:4317",
            service_host("otel-collector-opentelemetry-collector", NAMESPACE)
        ),
    })
}
