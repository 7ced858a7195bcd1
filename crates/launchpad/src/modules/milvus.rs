// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Milvus vector database backed by S3.

use launchpad_engine::{ModuleOutput, Resource, StackContext};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::Scope;
use super::eks::EksOutput;
use super::iam::{self, Permissions};
use super::k8s::{Chart, Cluster, service_host};
use crate::conf::MilvusConf;
use crate::error::Result;

const NAMESPACE: &str = "milvus";
const SERVICE_ACCOUNT: &str = "milvus";
const CHART_REPO: &str = "https://zilliztech.github.io/milvus-helm/";
const PORT: u16 = 19530;

/// Milvus endpoint and storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilvusOutput {
    /// gRPC endpoint (`host:port`).
    pub endpoint: String,
    /// Object storage bucket.
    pub bucket: String,
    /// Role used by the Milvus pods.
    pub role_arn: String,
}

impl ModuleOutput for MilvusOutput {}

/// Declare the bucket, the IRSA role and the release.
pub async fn setup(
    ctx: &StackContext,
    scope: &Scope,
    cluster: &Cluster,
    eks: &EksOutput,
    conf: &MilvusConf,
) -> Result<MilvusOutput> {
    let bucket = ctx
        .register(
            Resource::new("aws:s3/bucket:Bucket", scope.name("milvus-bucket"))
                .input("bucket", format!("{}-milvus-{}", scope.prefix, scope.region))
                .input("forceDestroy", !scope.protect)
                .input("tags", scope.tags("milvus"))
                .provider(&scope.aws)
                .protect(scope.protect),
        )
        .await?;
    let bucket_arn = bucket.arn()?;

    let role = iam::irsa(
        ctx,
        scope,
        eks,
        "milvus",
        NAMESPACE,
        SERVICE_ACCOUNT,
        Permissions::Inline(json!({
            "Version": "2012-10-17",
            "Statement": [{
                "Effect": "Allow",
                "Action": ["s3:GetObject", "s3:PutObject", "s3:DeleteObject", "s3:ListBucket"],
                "Resource": [bucket_arn, format!("{}/*", bucket_arn)]
            }]
        })),
    )
    .await?;

    let namespace = cluster.namespace(ctx, NAMESPACE).await?;
    cluster
        .helm_release(
            ctx,
            Chart {
                release: "milvus",
                namespace: NAMESPACE,
                chart: "milvus",
                version: &conf.chart_version,
                repo: CHART_REPO,
                values: json!({
                    "cluster": {"enabled": true},
                    "serviceAccount": {
                        "create": true,
                        "name": SERVICE_ACCOUNT,
                        "annotations": {"eks.amazonaws.com/role-arn": role.role_arn},
                    },
                    "minio": {"enabled": false},
                    "externalS3": {
                        "enabled": true,
                        "host": format!("s3.{}.amazonaws.com", scope.region),
                        "port": 443,
                        "useSSL": true,
                        "useIAM": true,
                        "cloudProvider": "aws",
                        "bucketName": bucket.id(),
                    },
                    "queryNode": {"replicas": conf.replicas},
                }),
            },
            &[&namespace],
        )
        .await?;

    Ok(MilvusOutput {
        endpoint: format!("{}:{}", service_host("milvus", NAMESPACE), PORT),
        bucket: bucket.id().to_string(),
        role_arn: role.role_arn,
    })
}
