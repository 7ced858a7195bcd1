// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP provider plugin protocol tests.

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use launchpad_engine::provider::{HttpProvider, ProviderError, ResourceRequest};
use launchpad_engine::{
    EngineError, MemoryStateStore, Provider, ProviderRegistry, Resource, Stack,
};

fn request() -> ResourceRequest {
    ResourceRequest {
        type_token: "aws:ec2/vpc:Vpc".into(),
        name: "vpc".into(),
        inputs: json!({"cidrBlock": "10.0.0.0/16"}),
        settings: json!({"region": "eu-west-1"}),
    }
}

#[tokio::test]
async fn test_create_posts_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/create"))
        .and(body_partial_json(json!({
            "type": "aws:ec2/vpc:Vpc",
            "name": "vpc",
            "inputs": {"cidrBlock": "10.0.0.0/16"},
            "settings": {"region": "eu-west-1"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "vpc-0abc",
            "outputs": {"id": "vpc-0abc", "cidrBlock": "10.0.0.0/16"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = HttpProvider::new("aws", server.uri()).unwrap();
    let created = provider.create(&request()).await.unwrap();
    assert_eq!(created.id, "vpc-0abc");
    assert_eq!(created.outputs["cidrBlock"], "10.0.0.0/16");
}

#[tokio::test]
async fn test_plugin_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/create"))
        .respond_with(ResponseTemplate::new(409).set_body_string("VpcLimitExceeded"))
        .mount(&server)
        .await;

    let provider = HttpProvider::new("aws", server.uri()).unwrap();
    let err = provider.create(&request()).await.unwrap_err();
    assert!(matches!(
        err,
        ProviderError::Plugin { status: 409, ref body } if body == "VpcLimitExceeded"
    ));
}

#[tokio::test]
async fn test_check_and_read() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/check"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"failures": ["cidrBlock too small"]})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/read"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"outputs": null})))
        .mount(&server)
        .await;

    let provider = HttpProvider::new("aws", format!("{}/", server.uri())).unwrap();
    assert_eq!(
        provider.check(&request()).await.unwrap(),
        vec!["cidrBlock too small"]
    );

    let old = launchpad_engine::state::ResourceState {
        name: "vpc".into(),
        type_token: "aws:ec2/vpc:Vpc".into(),
        id: "vpc-0abc".into(),
        inputs: json!({}),
        inputs_hash: String::new(),
        outputs: json!({}),
        dependencies: vec![],
        provider: None,
        protect: false,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    };
    assert!(provider.read(&old, &json!({})).await.unwrap().is_none());
}

#[tokio::test]
async fn test_stack_up_through_plugin() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/check"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"failures": []})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/create"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "vpc-0abc",
            "outputs": {"id": "vpc-0abc"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = HttpProvider::new("aws", server.uri()).unwrap();
    let stack = Stack::builder()
        .project("launchpad-test")
        .name("http")
        .store(Arc::new(MemoryStateStore::new()))
        .providers(ProviderRegistry::new().with(Arc::new(provider)))
        .build()
        .unwrap();

    let program = |ctx: launchpad_engine::StackContext| async move {
        let vpc = ctx
            .register(Resource::new("aws:ec2/vpc:Vpc", "vpc").input("cidrBlock", "10.0.0.0/16"))
            .await?;
        Ok::<_, EngineError>(json!({"vpcId": vpc.id()}))
    };

    let first = stack.up(program).await.unwrap();
    assert_eq!(first.outputs["vpcId"], "vpc-0abc");

    // Unchanged inputs make no create call
    let second = stack.up(program).await.unwrap();
    assert_eq!(second.summary.same, 1);
}
