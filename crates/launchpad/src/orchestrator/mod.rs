// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Composite programs.
//!
//! An orchestrator calls module `setup` functions in dependency order and
//! threads their outputs into downstream inputs. Modules that do not
//! depend on each other run concurrently with `tokio::try_join!`.
//!
//! ```text
//! data_plane:  account -> vpc -> eks -> (aurora | elasticache | msk)
//!              -> k8s -> (ingress | cert | telemetry | prometheus)
//!              -> milvus -> nitrous
//! mothership:  account -> vpc -> eks -> aurora -> k8s -> (ingress | cert)
//!              -> api
//! tier:        plane outputs -> k8s -> namespace -> redis | database
//!              -> api
//! ```

pub mod data_plane;
pub mod mothership;
pub mod tier;

use launchpad_engine::{ResourceOutputs, StackContext};
use serde_json::{Value, json};

use crate::error::Result;
use crate::modules::k8s::{Cluster, app_labels};

/// An HTTP service exposed through the ingress controller.
pub(crate) struct WebApp<'a> {
    pub name: &'a str,
    pub namespace: &'a str,
    pub image: &'a str,
    pub replicas: u32,
    pub port: u16,
    pub host: String,
    pub ingress_class: &'a str,
    pub issuer: &'a str,
    pub env: Vec<Value>,
}

/// Environment variable read from a secret key.
pub(crate) fn secret_env(env: &str, secret: &str, key: &str) -> Value {
    json!({
        "name": env,
        "valueFrom": {"secretKeyRef": {"name": secret, "key": key}}
    })
}

/// Declare deployment, service and TLS ingress. Returns the public URL.
pub(crate) async fn web_app(
    ctx: &StackContext,
    cluster: &Cluster,
    app: WebApp<'_>,
    depends_on: &[&ResourceOutputs],
) -> Result<String> {
    let labels = app_labels(app.name);
    let deployment = cluster
        .object(
            ctx,
            "kubernetes:apps/v1:Deployment",
            &format!("{}-deployment", app.name),
            json!({
                "metadata": {"name": app.name, "namespace": app.namespace, "labels": labels},
                "spec": {
                    "replicas": app.replicas,
                    "selector": {"matchLabels": labels},
                    "template": {
                        "metadata": {"labels": labels},
                        "spec": {
                            "containers": [{
                                "name": app.name,
                                "image": app.image,
                                "ports": [{"containerPort": app.port}],
                                "env": app.env,
                                "readinessProbe": {
                                    "httpGet": {"path": "/health", "port": app.port}
                                },
                            }]
                        }
                    }
                }
            }),
            depends_on,
        )
        .await?;

    let service = cluster
        .object(
            ctx,
            "kubernetes:core/v1:Service",
            &format!("{}-service", app.name),
            json!({
                "metadata": {"name": app.name, "namespace": app.namespace},
                "spec": {
                    "selector": labels,
                    "ports": [{"name": "http", "port": 80, "targetPort": app.port}],
                }
            }),
            &[&deployment],
        )
        .await?;

    cluster
        .object(
            ctx,
            "kubernetes:networking.k8s.io/v1:Ingress",
            &format!("{}-ingress", app.name),
            json!({
                "metadata": {
                    "name": app.name,
                    "namespace": app.namespace,
                    "annotations": {"cert-manager.io/cluster-issuer": app.issuer},
                },
                "spec": {
                    "ingressClassName": app.ingress_class,
                    "tls": [{"hosts": [app.host], "secretName": format!("{}-tls", app.name)}],
                    "rules": [{
                        "host": app.host,
                        "http": {"paths": [{
                            "path": "/",
                            "pathType": "Prefix",
                            "backend": {"service": {"name": app.name, "port": {"number": 80}}}
                        }]}
                    }]
                }
            }),
            &[&service],
        )
        .await?;

    Ok(format!("https://{}", app.host))
}
