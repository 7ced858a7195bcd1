// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Data plane: one account, network and cluster with the optional data
//! services a plane can carry.

use launchpad_engine::{ModuleOutput, StackContext};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::conf::DataPlaneConf;
use crate::error::{Error, Result};
use crate::modules::account::{self, AccountOutput};
use crate::modules::aurora::{self, AuroraOutput};
use crate::modules::cert::{self, CertOutput};
use crate::modules::eks::{self, EksOutput};
use crate::modules::elasticache::{self, ElasticacheOutput};
use crate::modules::ingress::{self, IngressOutput};
use crate::modules::k8s::Cluster;
use crate::modules::milvus::{self, MilvusOutput};
use crate::modules::msk::{self, MskOutput};
use crate::modules::nitrous::{self, NitrousOutput};
use crate::modules::prometheus::{self, PrometheusOutput};
use crate::modules::telemetry::{self, TelemetryOutput};
use crate::modules::vpc::{self, VpcOutput};
use crate::modules::Scope;

/// Outputs of a plane stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaneOutput {
    /// Plane id.
    pub plane_id: i64,
    /// AWS region.
    pub region: String,
    /// Target account.
    pub account: AccountOutput,
    /// Network.
    pub vpc: VpcOutput,
    /// Cluster.
    pub eks: EksOutput,
    /// Aurora, if configured.
    pub aurora: Option<AuroraOutput>,
    /// ElastiCache, if configured.
    pub elasticache: Option<ElasticacheOutput>,
    /// MSK, if configured.
    pub msk: Option<MskOutput>,
    /// Milvus, if configured.
    pub milvus: Option<MilvusOutput>,
    /// Nitrous, if configured.
    pub nitrous: Option<NitrousOutput>,
    /// Ingress controller.
    pub ingress: IngressOutput,
    /// Certificate issuer.
    pub cert: CertOutput,
    /// Telemetry collector, if enabled.
    pub telemetry: Option<TelemetryOutput>,
    /// Prometheus, if enabled.
    pub prometheus: Option<PrometheusOutput>,
}

impl ModuleOutput for PlaneOutput {}

/// Resource name prefix of a plane.
pub fn prefix(plane_id: i64) -> String {
    format!("p{}", plane_id)
}

/// Declare the plane.
pub async fn setup(ctx: &StackContext, conf: &DataPlaneConf) -> Result<PlaneOutput> {
    let prefix = prefix(conf.plane_id);
    info!(plane_id = conf.plane_id, region = %conf.region, "Declaring data plane");

    let account = account::setup(ctx, &prefix, &conf.account_conf, conf.protect).await?;
    let aws = account::provider(ctx, &prefix, &conf.region, &account).await?;
    let scope = Scope {
        prefix: prefix.clone(),
        region: conf.region.clone(),
        aws,
        protect: conf.protect,
    };

    let vpc = vpc::setup(ctx, &scope, &conf.vpc).await?;
    let eks = eks::setup(ctx, &scope, &conf.eks, &vpc, &account.role_arn).await?;

    let (aurora, elasticache, msk) = tokio::try_join!(
        async {
            match &conf.aurora {
                Some(c) => aurora::setup(ctx, &scope, c, &vpc, &eks).await.map(Some),
                None => Ok(None),
            }
        },
        async {
            match &conf.elasticache {
                Some(c) => elasticache::setup(ctx, &scope, c, &vpc, &eks).await.map(Some),
                None => Ok(None),
            }
        },
        async {
            match &conf.msk {
                Some(c) => msk::setup(ctx, &scope, c, &vpc, &eks).await.map(Some),
                None => Ok(None),
            }
        },
    )?;

    let cluster = Cluster::connect(ctx, &prefix, &eks.kubeconfig).await?;

    let (ingress, cert, telemetry, prometheus) = tokio::try_join!(
        ingress::setup(ctx, &cluster, &conf.ingress),
        cert::setup(ctx, &cluster, &conf.cert),
        async {
            match &conf.telemetry {
                Some(c) if c.enabled => telemetry::setup(ctx, &cluster).await.map(Some),
                _ => Ok(None),
            }
        },
        async {
            match &conf.prometheus {
                Some(c) if c.enabled => prometheus::setup(ctx, &scope, &cluster, &eks, c)
                    .await
                    .map(Some),
                _ => Ok(None),
            }
        },
    )?;

    let milvus = match &conf.milvus {
        Some(c) => Some(milvus::setup(ctx, &scope, &cluster, &eks, c).await?),
        None => None,
    };

    let nitrous = match (&conf.nitrous, &msk) {
        (Some(c), Some(msk)) => Some(nitrous::setup(ctx, conf.plane_id, &cluster, c, msk).await?),
        (Some(_), None) => {
            return Err(Error::PlaneComponentMissing {
                plane_id: conf.plane_id,
                component: "msk",
            });
        }
        (None, _) => None,
    };

    Ok(PlaneOutput {
        plane_id: conf.plane_id,
        region: conf.region.clone(),
        account,
        vpc,
        eks,
        aurora,
        elasticache,
        msk,
        milvus,
        nitrous,
        ingress,
        cert,
        telemetry,
        prometheus,
    })
}
