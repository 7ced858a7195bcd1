// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mothership bookkeeping.
//!
//! After a plane or tier stack is deployed, its outputs are read back and
//! recorded in the mothership database:
//!
//! | Table | Key | Written from |
//! |-------|-----|--------------|
//! | `customer` | `customer_id` | tier outputs |
//! | `data_plane` | `plane_id` | plane outputs |
//! | `tier` | `tier_id` | tier outputs |
//!
//! Destroyed stacks keep their rows with `deleted_at` set.

pub mod jsonpath;
mod updater;

pub use updater::{MothershipDb, SyncOutcome};

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::migrate::Migrator;

/// Mothership schema migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// A `customer` row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CustomerRow {
    /// Customer id.
    pub customer_id: i64,
    /// Display name.
    pub name: String,
    /// First recorded.
    pub created_at: DateTime<Utc>,
    /// Last synced.
    pub updated_at: DateTime<Utc>,
}

/// A `data_plane` row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DataPlaneRow {
    /// Plane id.
    pub plane_id: i64,
    /// AWS region.
    pub region: String,
    /// Account the plane runs in.
    pub account_id: String,
    /// VPC id.
    pub vpc_id: String,
    /// EKS cluster name.
    pub eks_cluster_name: String,
    /// EKS API endpoint.
    pub eks_endpoint: String,
    /// SASL/SCRAM bootstrap brokers, if the plane has MSK.
    pub kafka_bootstrap: Option<String>,
    /// Aurora writer endpoint, if the plane has Aurora.
    pub db_endpoint: Option<String>,
    /// Stack outputs without secrets.
    pub outputs: Value,
    /// `ready` or `deleted`.
    pub status: String,
    /// First recorded.
    pub created_at: DateTime<Utc>,
    /// Last synced.
    pub updated_at: DateTime<Utc>,
    /// When the stack was destroyed.
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A `tier` row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TierRow {
    /// Tier id.
    pub tier_id: i64,
    /// Hosting plane.
    pub plane_id: i64,
    /// Owning customer.
    pub customer_id: i64,
    /// Kubernetes namespace.
    pub namespace: String,
    /// Public API URL.
    pub api_url: String,
    /// Tier database name.
    pub database_name: String,
    /// Stack outputs.
    pub outputs: Value,
    /// `ready` or `deleted`.
    pub status: String,
    /// First recorded.
    pub created_at: DateTime<Utc>,
    /// Last synced.
    pub updated_at: DateTime<Utc>,
    /// When the stack was destroyed.
    pub deleted_at: Option<DateTime<Utc>>,
}
