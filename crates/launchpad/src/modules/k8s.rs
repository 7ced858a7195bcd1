// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Kubernetes and Helm providers bound to one cluster, plus helpers for
//! the objects every in-cluster module declares.

use launchpad_engine::{ProviderRef, Resource, ResourceOutputs, StackContext};
use serde_json::{Value, json};

use crate::error::Result;

/// Providers for one cluster.
#[derive(Debug, Clone)]
pub struct Cluster {
    /// Prefix of resource names declared through this cluster.
    pub prefix: String,
    /// `kubernetes` provider instance.
    pub kubernetes: ProviderRef,
    /// `helm` provider instance.
    pub helm: ProviderRef,
}

/// A Helm chart to install.
#[derive(Debug, Clone)]
pub struct Chart<'a> {
    /// Release name.
    pub release: &'a str,
    /// Target namespace.
    pub namespace: &'a str,
    /// Chart name in the repository.
    pub chart: &'a str,
    /// Chart version.
    pub version: &'a str,
    /// Chart repository URL.
    pub repo: &'a str,
    /// Values passed to the chart.
    pub values: Value,
}

impl Cluster {
    /// Register the providers for a cluster reachable with `kubeconfig`.
    pub async fn connect(ctx: &StackContext, prefix: &str, kubeconfig: &str) -> Result<Self> {
        let settings = json!({ "kubeconfig": kubeconfig });
        let kubernetes = ctx
            .provider("kubernetes", format!("{}-k8s", prefix), settings.clone())
            .await?;
        let helm = ctx
            .provider("helm", format!("{}-helm", prefix), settings)
            .await?;
        Ok(Self {
            prefix: prefix.to_string(),
            kubernetes,
            helm,
        })
    }

    /// Prefixed resource name.
    pub fn name(&self, suffix: &str) -> String {
        format!("{}-{}", self.prefix, suffix)
    }

    /// Declare a namespace.
    pub async fn namespace(&self, ctx: &StackContext, name: &str) -> Result<ResourceOutputs> {
        Ok(ctx
            .register(
                Resource::new("kubernetes:core/v1:Namespace", self.name(&format!("ns-{}", name)))
                    .input(
                        "metadata",
                        json!({
                            "name": name,
                            "labels": {"app.kubernetes.io/managed-by": "launchpad"}
                        }),
                    )
                    .provider(&self.kubernetes),
            )
            .await?)
    }

    /// Declare a Kubernetes object. `body` holds `metadata`, `spec`, `data`, ...
    pub async fn object(
        &self,
        ctx: &StackContext,
        type_token: &str,
        suffix: &str,
        body: Value,
        depends_on: &[&ResourceOutputs],
    ) -> Result<ResourceOutputs> {
        let mut resource = Resource::new(type_token, self.name(suffix))
            .inputs(body)
            .provider(&self.kubernetes);
        for dep in depends_on {
            resource = resource.depends_on(dep);
        }
        Ok(ctx.register(resource).await?)
    }

    /// Install a Helm release.
    pub async fn helm_release(
        &self,
        ctx: &StackContext,
        chart: Chart<'_>,
        depends_on: &[&ResourceOutputs],
    ) -> Result<ResourceOutputs> {
        let mut resource = Resource::new("helm:v3:Release", self.name(chart.release))
            .input("name", chart.release)
            .input("namespace", chart.namespace)
            .input("chart", chart.chart)
            .input("version", chart.version)
            .input("repositoryOpts", json!({ "repo": chart.repo }))
            .input("values", chart.values)
            .input("atomic", true)
            .provider(&self.helm);
        for dep in depends_on {
            resource = resource.depends_on(dep);
        }
        Ok(ctx.register(resource).await?)
    }
}

/// In-cluster DNS name of a service.
pub fn service_host(name: &str, namespace: &str) -> String {
    format!("{}.{}.svc.cluster.local", name, namespace)
}

/// Labels selecting the pods of an app.
pub fn app_labels(app: &str) -> Value {
    json!({ "app.kubernetes.io/name": app })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_host() {
        assert_eq!(
            service_host("milvus", "milvus"),
            "milvus.milvus.svc.cluster.local"
        );
    }
}
