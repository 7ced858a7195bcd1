// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! End-to-end stack runs against mock provider plugins.

mod common;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use common::*;
use launchpad::config::ConfigError;
use launchpad::{Action, Error};
use launchpad_engine::output::find_unresolved;
use launchpad_engine::provider::MockCall;
use launchpad_engine::{EngineError, StateStore, StepOp};

#[tokio::test]
async fn test_plane_up_is_idempotent() {
    let h = Harness::new();
    let conf = plane_conf(1);

    let first = h.launcher.data_plane(&conf, Action::Up).await.unwrap();
    assert_eq!(first.stack, "plane-1");
    assert!(first.summary.create > 0);
    assert_eq!(first.summary.same, 0);
    assert!(find_unresolved(&first.outputs).is_none());
    assert_eq!(first.outputs["planeId"], 1);
    assert_eq!(first.outputs["account"]["accountId"], "123456789012");
    assert!(first.outputs["eks"]["endpoint"].is_string());
    assert!(first.outputs["msk"]["bootstrapBrokersSaslScram"].is_string());

    let creates = h.aws.ops().await.creates;
    let second = h.launcher.data_plane(&conf, Action::Up).await.unwrap();
    assert!(!second.summary.has_changes(), "{}", second.summary);
    assert!(second.steps.iter().all(|s| s.op == StepOp::Same));
    assert_eq!(second.outputs, first.outputs);
    assert_eq!(h.aws.ops().await.creates, creates);
}

#[tokio::test]
async fn test_plane_declares_binlog_topics_and_kafka_secret() {
    let h = Harness::new();
    let report = h.launcher.data_plane(&plane_conf(3), Action::Up).await.unwrap();

    let topics = h.kafka.resources_of_type("kafka:index/topic:Topic").await;
    let names: Vec<&str> = topics
        .iter()
        .filter_map(|t| t.inputs["name"].as_str())
        .collect();
    assert_eq!(names, vec!["p_3_nitrous_log", "p_3_nitrous_req_log"]);
    for topic in &topics {
        assert_eq!(topic.inputs["partitions"], 1);
        assert_eq!(topic.inputs["replicationFactor"], 2);
    }
    assert_eq!(
        report.outputs["nitrous"]["topics"],
        serde_json::json!(["p_3_nitrous_log", "p_3_nitrous_req_log"])
    );

    let secrets: Vec<_> = h
        .kubernetes
        .resources_of_type("kubernetes:core/v1:Secret")
        .await
        .into_iter()
        .filter(|s| s.inputs["metadata"]["name"] == "kafka-conf-msk")
        .collect();
    assert_eq!(secrets.len(), 1);
    let data = secrets[0].inputs["data"].as_object().unwrap();
    let mut keys: Vec<&str> = data.keys().map(String::as_str).collect();
    keys.sort();
    assert_eq!(keys, vec!["password", "servers", "username"]);

    let servers = STANDARD
        .decode(data["servers"].as_str().unwrap())
        .unwrap();
    assert_eq!(
        String::from_utf8(servers).unwrap(),
        report.outputs["msk"]["bootstrapBrokersSaslScram"].as_str().unwrap()
    );
}

#[tokio::test]
async fn test_invalid_plane_fails_before_any_resource() {
    let h = Harness::new();

    let mut json = plane_json(4);
    json["accountConf"]["newAccount"] =
        serde_json::json!({"name": "plane-4", "email": "aws+p4@example.com"});
    let conf = serde_json::from_value(json).unwrap();
    let err = h.launcher.data_plane(&conf, Action::Up).await.unwrap_err();
    match err {
        Error::Config(ConfigError::Invalid(violations)) => {
            assert_eq!(violations[0].field, "accountConf");
        }
        other => panic!("unexpected error: {}", other),
    }

    let mut json = plane_json(4);
    json["msk"]["numberOfBrokerNodes"] = serde_json::json!(4);
    let conf = serde_json::from_value(json).unwrap();
    let err = h.launcher.data_plane(&conf, Action::Up).await.unwrap_err();
    assert!(err.to_string().contains("msk.numberOfBrokerNodes"));

    assert_eq!(h.aws.ops().await.creates, 0);
    assert_eq!(h.store.save_count(), 0);
    assert!(h.launcher.list_stacks().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_preview_creates_nothing() {
    let h = Harness::new();
    let report = h
        .launcher
        .data_plane(&plane_conf(5), Action::Preview)
        .await
        .unwrap();

    assert_eq!(report.action, Action::Preview);
    assert!(report.summary.create > 0);
    assert!(report.steps.iter().all(|s| s.op == StepOp::Create));
    assert_eq!(h.aws.ops().await.creates, 0);
    assert_eq!(h.kafka.ops().await.creates, 0);
    assert!(h.store.load("launchpad", "plane-5").await.unwrap().is_none());
}

#[tokio::test]
async fn test_binlog_replication_change_replaces_topics() {
    let h = Harness::new();
    h.launcher.data_plane(&plane_conf(6), Action::Up).await.unwrap();

    let mut json = plane_json(6);
    json["nitrous"]["binlog"]["replicationFactor"] = serde_json::json!(3);
    let conf = serde_json::from_value(json).unwrap();
    let report = h.launcher.data_plane(&conf, Action::Up).await.unwrap();

    let replaced: Vec<&str> = report
        .steps
        .iter()
        .filter(|s| s.op == StepOp::Replace)
        .map(|s| s.name.as_str())
        .collect();
    assert_eq!(replaced, vec!["p6-topic-log", "p6-topic-req_log"]);
    let topics = h.kafka.resources_of_type("kafka:index/topic:Topic").await;
    assert_eq!(topics.len(), 2);
    for topic in topics {
        assert_eq!(topic.inputs["replicationFactor"], 3);
    }

    // The old topic is gone before one with the same name is created
    let calls: Vec<MockCall> = h
        .kafka
        .calls()
        .await
        .into_iter()
        .filter(|c| {
            matches!(c, MockCall::Create(n) | MockCall::Delete(n) if n == "p6-topic-log")
        })
        .collect();
    assert_eq!(
        calls,
        vec![
            MockCall::Create("p6-topic-log".to_string()),
            MockCall::Delete("p6-topic-log".to_string()),
            MockCall::Create("p6-topic-log".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_removed_component_is_deleted() {
    let h = Harness::new();
    let mut json = plane_json(7);
    json["milvus"] = serde_json::json!({"chartVersion": "4.1.0"});
    let conf = serde_json::from_value(json).unwrap();
    let report = h.launcher.data_plane(&conf, Action::Up).await.unwrap();
    assert!(report.outputs["milvus"]["bucket"].is_string());
    assert!(!h.aws.resources_of_type("aws:s3/bucket:Bucket").await.is_empty());
    assert!(h.aws.resource("p7-milvus-bucket").await.is_some());
    assert!(h.helm.resource("p7-milvus").await.is_some());

    let report = h.launcher.data_plane(&plane_conf(7), Action::Up).await.unwrap();
    assert!(report.summary.delete > 0);
    assert!(report.outputs["milvus"].is_null());
    assert!(h.aws.resources_of_type("aws:s3/bucket:Bucket").await.is_empty());
}

#[tokio::test]
async fn test_tier_on_plane() {
    let h = Harness::new();
    h.launcher.data_plane(&plane_conf(8), Action::Up).await.unwrap();

    let report = h.launcher.tier(&tier_conf(21, 8), Action::Up).await.unwrap();
    assert_eq!(report.stack, "tier-21");
    assert_eq!(report.outputs["apiUrl"], "https://t21.p8.example.com");
    assert_eq!(report.outputs["namespace"], "tier-21");
    assert_eq!(report.outputs["databaseName"], "tier_21");
    assert_eq!(report.outputs["customerId"], 921);

    let databases = h
        .postgresql
        .resources_of_type("postgresql:index/database:Database")
        .await;
    assert_eq!(databases.len(), 1);
    assert_eq!(databases[0].inputs["owner"], "tier_21");
    let aurora_endpoint = h
        .launcher
        .outputs("plane-8")
        .await
        .unwrap()["aurora"]["endpoint"]
        .clone();
    assert_eq!(databases[0].settings["host"], aurora_endpoint);
    assert_eq!(databases[0].settings["sslmode"], "require");

    let mut stacks = h.launcher.list_stacks().await.unwrap();
    stacks.sort();
    assert_eq!(stacks, vec!["plane-8", "tier-21"]);
}

#[tokio::test]
async fn test_tier_requires_deployed_plane() {
    let h = Harness::new();
    let err = h.launcher.tier(&tier_conf(22, 99), Action::Up).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Engine(EngineError::StackNotFound(ref stack)) if stack == "plane-99"
    ));

    let mut json = plane_json(9);
    json.as_object_mut().unwrap().remove("aurora");
    let conf = serde_json::from_value(json).unwrap();
    h.launcher.data_plane(&conf, Action::Up).await.unwrap();
    let err = h.launcher.tier(&tier_conf(23, 9), Action::Up).await.unwrap_err();
    assert!(matches!(
        err,
        Error::PlaneComponentMissing { plane_id: 9, component: "aurora" }
    ));
    assert_eq!(h.postgresql.ops().await.creates, 0);
}

#[tokio::test]
async fn test_mothership_up_and_protected_destroy() {
    let h = Harness::new();
    let conf = mothership_conf(1);
    let report = h.launcher.mothership(&conf, Action::Up).await.unwrap();
    assert_eq!(report.stack, "mothership-1");
    assert_eq!(report.outputs["apiUrl"], "https://mothership.ms.example.com");
    assert!(report.outputs["account"]["accountId"].is_string());

    let err = h
        .launcher
        .mothership(&conf, Action::Destroy)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Engine(EngineError::Protected(_))));
    assert_eq!(h.aws.ops().await.deletes, 0);
    assert!(h.launcher.outputs("mothership-1").await.is_ok());
}

#[tokio::test]
async fn test_destroy_clears_outputs() {
    let h = Harness::new();
    h.launcher.data_plane(&plane_conf(10), Action::Up).await.unwrap();
    let live = h.aws.resources().await.len();
    assert!(live > 0);

    let report = h
        .launcher
        .data_plane(&plane_conf(10), Action::Destroy)
        .await
        .unwrap();
    assert_eq!(report.action, Action::Destroy);
    assert!(report.outputs.is_null());
    assert!(report.summary.delete >= live);
    assert!(h.aws.resources().await.is_empty());
    assert!(h.kafka.resources().await.is_empty());

    let err = h.launcher.outputs("plane-10").await.unwrap_err();
    assert!(matches!(err, Error::Engine(EngineError::StackNotFound(_))));
}

#[tokio::test]
async fn test_refresh_drops_vanished_resources() {
    let h = Harness::new();
    h.launcher.data_plane(&plane_conf(11), Action::Up).await.unwrap();
    let topic = h.kafka.resource("p11-topic-log").await.unwrap();
    assert!(h.kafka.remove_externally(&topic.id).await);

    let summary = h.launcher.refresh("plane-11").await.unwrap();
    assert_eq!(summary.delete, 1);

    let report = h.launcher.data_plane(&plane_conf(11), Action::Up).await.unwrap();
    assert_eq!(report.summary.create, 1);
    assert!(h.kafka.resource("p11-topic-log").await.is_some());
}
