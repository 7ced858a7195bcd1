// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! ingress-nginx controller behind an AWS network load balancer.

use launchpad_engine::{ModuleOutput, StackContext};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::k8s::{Chart, Cluster};
use crate::conf::IngressConf;
use crate::error::Result;

const NAMESPACE: &str = "ingress-nginx";
const CHART_VERSION: &str = "4.10.1";
const CHART_REPO: &str = "https://kubernetes.github.io/ingress-nginx";
/// Ingress class served by the controller.
pub const INGRESS_CLASS: &str = "nginx";

/// Ingress controller details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressOutput {
    /// Ingress class name.
    pub ingress_class: String,
    /// Controller service (`namespace/name`).
    pub controller_service: String,
    /// Base domain of hosted services.
    pub domain: String,
}

impl ModuleOutput for IngressOutput {}

/// Install the controller.
pub async fn setup(
    ctx: &StackContext,
    cluster: &Cluster,
    conf: &IngressConf,
) -> Result<IngressOutput> {
    let scheme = if conf.public {
        "internet-facing"
    } else {
        "internal"
    };
    let namespace = cluster.namespace(ctx, NAMESPACE).await?;
    cluster
        .helm_release(
            ctx,
            Chart {
                release: "ingress-nginx",
                namespace: NAMESPACE,
                chart: "ingress-nginx",
                version: CHART_VERSION,
                repo: CHART_REPO,
                values: json!({
                    "controller": {
                        "ingressClassResource": {"name": INGRESS_CLASS, "default": true},
                        "service": {
                            "annotations": {
                                "service.beta.kubernetes.io/aws-load-balancer-type": "nlb",
                                "service.beta.kubernetes.io/aws-load-balancer-scheme": scheme,
                                "service.beta.kubernetes.io/aws-load-balancer-cross-zone-load-balancing-enabled": "true",
                            }
                        }
                    }
                }),
            },
            &[&namespace],
        )
        .await?;

    Ok(IngressOutput {
        ingress_class: INGRESS_CLASS.to_string(),
        controller_service: format!("{}/ingress-nginx-controller", NAMESPACE),
        domain: conf.domain.clone(),
    })
}
