// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mothership database sync tests.
//!
//! Require a PostgreSQL database in TEST_MOTHERSHIP_DATABASE_URL.

mod common;

use common::*;
use launchpad::mothership::SyncOutcome;
use launchpad::{Action, Error, MothershipDb, StackKind};

async fn db() -> MothershipDb {
    let url = std::env::var("TEST_MOTHERSHIP_DATABASE_URL").unwrap();
    MothershipDb::connect(&url).await.unwrap()
}

/// Ids unique across runs against the same database.
fn unique_id() -> i64 {
    chrono::Utc::now().timestamp_micros() % 1_000_000_000 + 1
}

#[tokio::test]
async fn test_sync_plane_and_tier() {
    skip_if_no_db!();
    let db = db().await;
    let h = Harness::new();
    let plane_id = unique_id();
    let tier_id = plane_id + 1;

    let plane = h
        .launcher
        .data_plane(&plane_conf(plane_id), Action::Up)
        .await
        .unwrap();
    let outcome = db
        .sync_stack(&plane.stack, Some(&plane.outputs))
        .await
        .unwrap();
    assert_eq!(outcome, SyncOutcome::Plane(plane_id));

    let row = db.plane(plane_id).await.unwrap().unwrap();
    assert_eq!(row.region, "eu-west-1");
    assert_eq!(row.account_id, "123456789012");
    assert_eq!(row.status, "ready");
    assert_eq!(
        row.kafka_bootstrap.as_deref(),
        plane.outputs["msk"]["bootstrapBrokersSaslScram"].as_str()
    );
    assert!(row.outputs["msk"].get("password").is_none());
    assert!(row.outputs["eks"].get("kubeconfig").is_none());

    let tier = h
        .launcher
        .tier(&tier_conf(tier_id, plane_id), Action::Up)
        .await
        .unwrap();
    let outcome = db.sync_stack(&tier.stack, Some(&tier.outputs)).await.unwrap();
    assert_eq!(outcome, SyncOutcome::Tier(tier_id));

    let row = db.tier(tier_id).await.unwrap().unwrap();
    assert_eq!(row.plane_id, plane_id);
    assert_eq!(row.namespace, format!("tier-{}", tier_id));
    let customer = db.customer(row.customer_id).await.unwrap().unwrap();
    assert_eq!(customer.name, "Acme");
}

#[tokio::test]
async fn test_resync_upserts_and_deletion_is_recorded() {
    skip_if_no_db!();
    let db = db().await;
    let h = Harness::new();
    let plane_id = unique_id();

    let report = h
        .launcher
        .data_plane(&plane_conf(plane_id), Action::Up)
        .await
        .unwrap();
    db.sync_plane(&report.stack, &report.outputs).await.unwrap();
    let first = db.plane(plane_id).await.unwrap().unwrap();

    let mut outputs = report.outputs.clone();
    outputs["msk"] = serde_json::Value::Null;
    db.sync_plane(&report.stack, &outputs).await.unwrap();
    let second = db.plane(plane_id).await.unwrap().unwrap();
    assert_eq!(second.created_at, first.created_at);
    assert!(second.updated_at >= first.updated_at);
    assert!(second.kafka_bootstrap.is_none());

    let outcome = db.sync_stack(&report.stack, None).await.unwrap();
    assert_eq!(outcome, SyncOutcome::Deleted(StackKind::Plane(plane_id)));
    let deleted = db.plane(plane_id).await.unwrap().unwrap();
    assert_eq!(deleted.status, "deleted");
    assert!(deleted.deleted_at.is_some());
    assert!(!db.mark_plane_deleted(plane_id).await.unwrap());

    db.sync_plane(&report.stack, &report.outputs).await.unwrap();
    let restored = db.plane(plane_id).await.unwrap().unwrap();
    assert_eq!(restored.status, "ready");
    assert!(restored.deleted_at.is_none());
}

#[tokio::test]
async fn test_sync_rejects_incomplete_outputs() {
    skip_if_no_db!();
    let db = db().await;

    let err = db
        .sync_stack("plane-1", Some(&serde_json::json!({"planeId": 1})))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MissingStackOutput { ref path, .. } if path == "region"));

    let outcome = db
        .sync_stack("mothership-1", Some(&serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(outcome, SyncOutcome::Skipped);

    assert!(matches!(
        db.sync_stack("cluster-1", None).await,
        Err(Error::UnknownStackKind(_))
    ));
}
