// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock provider for testing and simulated runs.
//!
//! Keeps resources in memory and derives identifiers and computed outputs
//! (ARNs, endpoints, generated passwords) deterministically from the
//! resource name, so repeated runs produce identical outputs.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::traits::*;
use crate::state::ResourceState;

/// A resource held by the mock provider.
#[derive(Debug, Clone, PartialEq)]
pub struct MockResource {
    /// Assigned identifier.
    pub id: String,
    /// Type token.
    pub type_token: String,
    /// Resource name.
    pub name: String,
    /// Last applied inputs.
    pub inputs: Value,
    /// Current outputs.
    pub outputs: Value,
    /// Provider settings used for the last call.
    pub settings: Value,
}

/// Counters of provider calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockOps {
    /// Number of create calls.
    pub creates: usize,
    /// Number of update calls.
    pub updates: usize,
    /// Number of delete calls.
    pub deletes: usize,
    /// Number of read calls.
    pub reads: usize,
    /// Number of preview calls.
    pub previews: usize,
}

/// A mutating call seen by the mock, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// `create` of the named resource.
    Create(String),
    /// `update` of the named resource.
    Update(String),
    /// `delete` of the named resource.
    Delete(String),
}

/// Mock provider for one package.
pub struct MockProvider {
    package: String,
    resources: Arc<Mutex<HashMap<String, MockResource>>>,
    ops: Arc<Mutex<MockOps>>,
    fail_on: Arc<Mutex<HashSet<String>>>,
    fail_delete_on: Arc<Mutex<HashSet<String>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
    /// Optional delay to simulate API latency (in milliseconds)
    pub execution_delay_ms: u64,
}

impl MockProvider {
    /// Create a mock provider for a package.
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            resources: Arc::new(Mutex::new(HashMap::new())),
            ops: Arc::new(Mutex::new(MockOps::default())),
            fail_on: Arc::new(Mutex::new(HashSet::new())),
            fail_delete_on: Arc::new(Mutex::new(HashSet::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            execution_delay_ms: 0,
        }
    }

    /// Make create/update of the named resource fail.
    pub async fn fail_on(&self, name: impl Into<String>) {
        self.fail_on.lock().await.insert(name.into());
    }

    /// Stop failing calls for the named resource.
    pub async fn clear_failure(&self, name: &str) {
        self.fail_on.lock().await.remove(name);
    }

    /// Make delete of the named resource fail.
    pub async fn fail_delete_on(&self, name: impl Into<String>) {
        self.fail_delete_on.lock().await.insert(name.into());
    }

    /// Stop failing deletes of the named resource.
    pub async fn clear_delete_failure(&self, name: &str) {
        self.fail_delete_on.lock().await.remove(name);
    }

    /// Mutating calls in the order they were made.
    pub async fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().await.clone()
    }

    /// Call counters.
    pub async fn ops(&self) -> MockOps {
        *self.ops.lock().await
    }

    /// All live resources, sorted by name.
    pub async fn resources(&self) -> Vec<MockResource> {
        let mut all: Vec<MockResource> = self.resources.lock().await.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Live resources of one type, sorted by name.
    pub async fn resources_of_type(&self, type_token: &str) -> Vec<MockResource> {
        self.resources()
            .await
            .into_iter()
            .filter(|r| r.type_token == type_token)
            .collect()
    }

    /// Live resource by name.
    pub async fn resource(&self, name: &str) -> Option<MockResource> {
        self.resources
            .lock()
            .await
            .values()
            .find(|r| r.name == name)
            .cloned()
    }

    /// Delete a resource behind the engine's back (simulates drift).
    pub async fn remove_externally(&self, id: &str) -> bool {
        let mut resources = self.resources.lock().await;
        let before = resources.len();
        resources.retain(|_, r| r.id != id);
        resources.len() != before
    }

    async fn simulate_latency(&self) {
        if self.execution_delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.execution_delay_ms)).await;
        }
    }

    async fn check_failure(&self, name: &str) -> Result<()> {
        if self.fail_on.lock().await.contains(name) {
            return Err(ProviderError::Other(format!("injected failure for {}", name)));
        }
        Ok(())
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn package(&self) -> &str {
        &self.package
    }

    async fn check(&self, request: &ResourceRequest) -> Result<Vec<String>> {
        Ok(check_inputs(request))
    }

    async fn create(&self, request: &ResourceRequest) -> Result<CreateResponse> {
        self.simulate_latency().await;
        self.check_failure(&request.name).await?;

        let id = resource_id(request);
        let outputs = compute_outputs(request, &id, 1);

        self.resources.lock().await.insert(
            key(&request.type_token, &id),
            MockResource {
                id: id.clone(),
                type_token: request.type_token.clone(),
                name: request.name.clone(),
                inputs: request.inputs.clone(),
                outputs: outputs.clone(),
                settings: request.settings.clone(),
            },
        );
        self.ops.lock().await.creates += 1;
        self.calls
            .lock()
            .await
            .push(MockCall::Create(request.name.clone()));

        Ok(CreateResponse { id, outputs })
    }

    async fn update(&self, request: &ResourceRequest, old: &ResourceState) -> Result<Value> {
        self.simulate_latency().await;
        self.check_failure(&request.name).await?;

        let revision = old
            .outputs
            .get("revision")
            .and_then(Value::as_i64)
            .unwrap_or(0)
            + 1;
        let outputs = compute_outputs(request, &old.id, revision);

        // Entries recorded by another process are adopted
        self.resources.lock().await.insert(
            key(&old.type_token, &old.id),
            MockResource {
                id: old.id.clone(),
                type_token: request.type_token.clone(),
                name: request.name.clone(),
                inputs: request.inputs.clone(),
                outputs: outputs.clone(),
                settings: request.settings.clone(),
            },
        );

        self.ops.lock().await.updates += 1;
        self.calls
            .lock()
            .await
            .push(MockCall::Update(request.name.clone()));
        Ok(outputs)
    }

    async fn delete(&self, old: &ResourceState, _settings: &Value) -> Result<()> {
        self.simulate_latency().await;
        if self.fail_delete_on.lock().await.contains(&old.name) {
            return Err(ProviderError::Other(format!(
                "injected delete failure for {}",
                old.name
            )));
        }
        // Deleting something already gone is not an error. A replacement
        // that kept the id owns the entry now and must survive.
        let mut resources = self.resources.lock().await;
        let entry = key(&old.type_token, &old.id);
        if resources.get(&entry).is_some_and(|r| r.inputs == old.inputs) {
            resources.remove(&entry);
        }
        drop(resources);
        self.ops.lock().await.deletes += 1;
        self.calls.lock().await.push(MockCall::Delete(old.name.clone()));
        Ok(())
    }

    async fn read(&self, old: &ResourceState, _settings: &Value) -> Result<Option<Value>> {
        self.ops.lock().await.reads += 1;
        Ok(self
            .resources
            .lock()
            .await
            .get(&key(&old.type_token, &old.id))
            .map(|r| r.outputs.clone()))
    }

    async fn preview(
        &self,
        request: &ResourceRequest,
        old: Option<&ResourceState>,
    ) -> Result<Value> {
        self.ops.lock().await.previews += 1;
        let (id, revision) = match old {
            Some(old) if old.type_token == request.type_token => (
                old.id.clone(),
                old.outputs
                    .get("revision")
                    .and_then(Value::as_i64)
                    .unwrap_or(0)
                    + 1,
            ),
            _ => (resource_id(request), 1),
        };
        Ok(compute_outputs(request, &id, revision))
    }
}

fn key(type_token: &str, id: &str) -> String {
    format!("{}|{}", type_token, id)
}

fn hex_hash(seed: &str) -> String {
    Sha256::digest(seed.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn short_hash(request: &ResourceRequest, len: usize) -> String {
    let mut h = hex_hash(&format!("{}::{}", request.type_token, request.name));
    h.truncate(len);
    h
}

fn digits(seed: &str, len: usize) -> String {
    Sha256::digest(seed.as_bytes())
        .iter()
        .map(|b| char::from(b'0' + b % 10))
        .take(len)
        .collect()
}

fn kind(type_token: &str) -> &str {
    type_token.rsplit(':').next().unwrap_or(type_token)
}

fn service(type_token: &str) -> &str {
    type_token
        .split(':')
        .nth(1)
        .and_then(|m| m.split('/').next())
        .unwrap_or("")
}

fn input_str<'a>(request: &'a ResourceRequest, key: &str) -> Option<&'a str> {
    request.inputs.get(key).and_then(Value::as_str)
}

fn region(settings: &Value) -> String {
    settings
        .get("region")
        .and_then(Value::as_str)
        .unwrap_or("us-east-1")
        .to_string()
}

/// Account id from explicit settings or from the assumed role ARN.
fn account(settings: &Value) -> String {
    if let Some(id) = settings.get("accountId").and_then(Value::as_str) {
        return id.to_string();
    }
    settings
        .get("assumeRoleArn")
        .and_then(Value::as_str)
        .and_then(|arn| arn.split(':').nth(4))
        .filter(|id| !id.is_empty())
        .unwrap_or("000000000000")
        .to_string()
}

fn k8s_name<'a>(request: &'a ResourceRequest) -> &'a str {
    request
        .inputs
        .pointer("/metadata/name")
        .and_then(Value::as_str)
        .unwrap_or(&request.name)
}

fn k8s_namespace(request: &ResourceRequest) -> Option<&str> {
    request
        .inputs
        .pointer("/metadata/namespace")
        .and_then(Value::as_str)
}

fn resource_id(request: &ResourceRequest) -> String {
    let t = request.type_token.as_str();
    let h17 = short_hash(request, 17);

    if t.starts_with("kubernetes:") {
        let name = k8s_name(request);
        return match k8s_namespace(request) {
            Some(ns) => format!("{}/{}", ns, name),
            None => name.to_string(),
        };
    }

    match t {
        "aws:ec2/vpc:Vpc" => format!("vpc-{}", h17),
        "aws:ec2/subnet:Subnet" => format!("subnet-{}", h17),
        "aws:ec2/securityGroup:SecurityGroup" => format!("sg-{}", h17),
        "aws:ec2/securityGroupRule:SecurityGroupRule" => format!("sgrule-{}", h17),
        "aws:ec2/internetGateway:InternetGateway" => format!("igw-{}", h17),
        "aws:ec2/natGateway:NatGateway" => format!("nat-{}", h17),
        "aws:ec2/eip:Eip" => format!("eipalloc-{}", h17),
        "aws:ec2/routeTable:RouteTable" => format!("rtb-{}", h17),
        "aws:ec2/routeTableAssociation:RouteTableAssociation" => format!("rtbassoc-{}", h17),
        "aws:ec2/vpcEndpoint:VpcEndpoint" => format!("vpce-{}", h17),
        "aws:organizations/account:Account" => digits(&request.name, 12),
        "aws:amp/workspace:Workspace" => format!("ws-{}", short_hash(request, 8)),
        "aws:kms/key:Key" => {
            let h = hex_hash(&request.name);
            format!("{}-{}-{}-{}-{}", &h[0..8], &h[8..12], &h[12..16], &h[16..20], &h[20..32])
        }
        "aws:eks/cluster:Cluster" => input_str(request, "name").unwrap_or(&request.name).into(),
        "aws:rds/cluster:Cluster" => input_str(request, "clusterIdentifier")
            .unwrap_or(&request.name)
            .into(),
        "aws:rds/clusterInstance:ClusterInstance" => input_str(request, "identifier")
            .unwrap_or(&request.name)
            .into(),
        "aws:elasticache/replicationGroup:ReplicationGroup" => {
            input_str(request, "replicationGroupId")
                .unwrap_or(&request.name)
                .into()
        }
        "aws:s3/bucket:Bucket" => input_str(request, "bucket").unwrap_or(&request.name).into(),
        "aws:iam/role:Role" => input_str(request, "name").unwrap_or(&request.name).into(),
        "kafka:index/topic:Topic" => input_str(request, "name").unwrap_or(&request.name).into(),
        "helm:v3:Release" => format!(
            "{}/{}",
            input_str(request, "namespace").unwrap_or("default"),
            input_str(request, "name").unwrap_or(&request.name)
        ),
        "random:index/randomPassword:RandomPassword" => short_hash(request, 16),
        _ => format!("{}-{}", request.name, short_hash(request, 8)),
    }
}

fn password(request: &ResourceRequest) -> String {
    const ALPHABET: &[u8] = b"abcdefghijkmnopqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ23456789";
    let length = request
        .inputs
        .get("length")
        .and_then(Value::as_u64)
        .unwrap_or(16) as usize;

    let mut out = String::with_capacity(length);
    let mut round = 0u32;
    while out.len() < length {
        let digest = Sha256::digest(format!("{}#{}", request.name, round).as_bytes());
        for b in digest.iter() {
            if out.len() == length {
                break;
            }
            out.push(char::from(ALPHABET[*b as usize % ALPHABET.len()]));
        }
        round += 1;
    }
    out
}

fn compute_outputs(request: &ResourceRequest, id: &str, revision: i64) -> Value {
    let mut outputs: Map<String, Value> = match &request.inputs {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    outputs.insert("id".into(), json!(id));

    let t = request.type_token.as_str();
    let region = region(&request.settings);
    let account = account(&request.settings);

    if t.starts_with("aws:") {
        let kind_lower = kind(t).to_lowercase();
        let arn = match t {
            "aws:s3/bucket:Bucket" => format!("arn:aws:s3:::{}", id),
            "aws:organizations/account:Account" => format!(
                "arn:aws:organizations::{}:account/o-{}/{}",
                account,
                short_hash(request, 10),
                id
            ),
            "aws:secretsmanager/secret:Secret" => format!(
                "arn:aws:secretsmanager:{}:{}:secret:{}-{}",
                region,
                account,
                input_str(request, "name").unwrap_or(&request.name),
                short_hash(request, 6)
            ),
            "aws:iam/openIdConnectProvider:OpenIdConnectProvider" => format!(
                "arn:aws:iam::{}:oidc-provider/{}",
                account,
                input_str(request, "url")
                    .unwrap_or(&request.name)
                    .trim_start_matches("https://")
            ),
            _ if service(t) == "iam" => format!("arn:aws:iam::{}:{}/{}", account, kind_lower, id),
            _ => format!(
                "arn:aws:{}:{}:{}:{}/{}",
                service(t),
                region,
                account,
                kind_lower,
                id
            ),
        };
        outputs.insert("arn".into(), json!(arn));
    }

    match t {
        "aws:eks/cluster:Cluster" => {
            let h = short_hash(request, 32).to_uppercase();
            outputs.insert(
                "endpoint".into(),
                json!(format!(
                    "https://{}.gr7.{}.eks.amazonaws.com",
                    &h[..16],
                    region
                )),
            );
            outputs.insert(
                "certificateAuthorityData".into(),
                json!(format!("LS0tLS1CRUdJTiBDRVJUSUZJQ0FURS0tLS0t{}", h)),
            );
            outputs.insert(
                "oidcIssuer".into(),
                json!(format!("https://oidc.eks.{}.amazonaws.com/id/{}", region, h)),
            );
            outputs.insert("status".into(), json!("ACTIVE"));
        }
        "aws:eks/nodeGroup:NodeGroup" => {
            outputs.insert("status".into(), json!("ACTIVE"));
        }
        "aws:rds/cluster:Cluster" => {
            let h = short_hash(request, 12);
            outputs.insert(
                "endpoint".into(),
                json!(format!("{}.cluster-{}.{}.rds.amazonaws.com", id, h, region)),
            );
            outputs.insert(
                "readerEndpoint".into(),
                json!(format!("{}.cluster-ro-{}.{}.rds.amazonaws.com", id, h, region)),
            );
            if !outputs.contains_key("port") {
                outputs.insert("port".into(), json!(5432));
            }
        }
        "aws:elasticache/replicationGroup:ReplicationGroup" => {
            let h = short_hash(request, 6);
            outputs.insert(
                "primaryEndpointAddress".into(),
                json!(format!("master.{}.{}.cache.amazonaws.com", id, h)),
            );
            outputs.insert(
                "readerEndpointAddress".into(),
                json!(format!("replica.{}.{}.cache.amazonaws.com", id, h)),
            );
            if !outputs.contains_key("port") {
                outputs.insert("port".into(), json!(6379));
            }
        }
        "aws:msk/cluster:Cluster" => {
            let brokers = request
                .inputs
                .get("numberOfBrokerNodes")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            let cluster = input_str(request, "clusterName").unwrap_or(&request.name);
            let h = short_hash(request, 6);
            let host = |i: u64, port: u16| {
                format!(
                    "b-{}.{}.{}.c2.kafka.{}.amazonaws.com:{}",
                    i, cluster, h, region, port
                )
            };
            let scram: Vec<String> = (1..=brokers).map(|i| host(i, 9096)).collect();
            let tls: Vec<String> = (1..=brokers).map(|i| host(i, 9094)).collect();
            outputs.insert("bootstrapBrokersSaslScram".into(), json!(scram.join(",")));
            outputs.insert("bootstrapBrokersTls".into(), json!(tls.join(",")));
            outputs.insert(
                "zookeeperConnectString".into(),
                json!(
                    (1..=brokers.min(3))
                        .map(|i| format!("z-{}.{}.{}.c2.kafka.{}.amazonaws.com:2181", i, cluster, h, region))
                        .collect::<Vec<_>>()
                        .join(",")
                ),
            );
        }
        "aws:amp/workspace:Workspace" => {
            outputs.insert(
                "prometheusEndpoint".into(),
                json!(format!(
                    "https://aps-workspaces.{}.amazonaws.com/workspaces/{}/",
                    region, id
                )),
            );
        }
        "aws:s3/bucket:Bucket" => {
            outputs.insert(
                "bucketDomainName".into(),
                json!(format!("{}.s3.amazonaws.com", id)),
            );
        }
        "random:index/randomPassword:RandomPassword" => {
            outputs.insert("result".into(), json!(password(request)));
        }
        "helm:v3:Release" => {
            outputs.insert("status".into(), json!("deployed"));
            outputs.insert("revision".into(), json!(revision));
        }
        t if t.starts_with("kubernetes:") => {
            let uid = hex_hash(&format!("uid::{}", id));
            let meta = outputs
                .entry("metadata")
                .or_insert_with(|| json!({}));
            if let Value::Object(meta) = meta {
                meta.entry("name").or_insert_with(|| json!(k8s_name(request)));
                meta.insert(
                    "uid".into(),
                    json!(format!(
                        "{}-{}-{}-{}-{}",
                        &uid[0..8],
                        &uid[8..12],
                        &uid[12..16],
                        &uid[16..20],
                        &uid[20..32]
                    )),
                );
            }
        }
        _ => {}
    }

    Value::Object(outputs)
}

/// Provider-level constraints enforced by the cloud APIs.
fn check_inputs(request: &ResourceRequest) -> Vec<String> {
    let mut failures = Vec::new();
    if !request.inputs.is_object() {
        failures.push("inputs must be an object".to_string());
        return failures;
    }

    match request.type_token.as_str() {
        "kafka:index/topic:Topic" => {
            let rf = request.inputs.get("replicationFactor").and_then(Value::as_i64);
            if rf.is_none_or(|rf| rf < 1) {
                failures.push("replicationFactor must be >= 1".to_string());
            }
            let partitions = request.inputs.get("partitions").and_then(Value::as_i64);
            if partitions.is_none_or(|p| p < 1) {
                failures.push("partitions must be >= 1".to_string());
            }
        }
        "aws:msk/cluster:Cluster" => {
            let brokers = request
                .inputs
                .get("numberOfBrokerNodes")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            let subnets = request
                .inputs
                .pointer("/brokerNodeGroupInfo/clientSubnets")
                .and_then(Value::as_array)
                .map(Vec::len)
                .unwrap_or(0) as u64;
            if subnets == 0 || brokers == 0 || brokers % subnets != 0 {
                failures.push(format!(
                    "numberOfBrokerNodes ({}) must be a non-zero multiple of the client subnet count ({})",
                    brokers, subnets
                ));
            }
        }
        "aws:ec2/vpc:Vpc" | "aws:ec2/subnet:Subnet" => {
            if input_str(request, "cidrBlock").is_none() {
                failures.push("cidrBlock is required".to_string());
            }
        }
        _ => {}
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn request(type_token: &str, name: &str, inputs: Value) -> ResourceRequest {
        ResourceRequest {
            type_token: type_token.to_string(),
            name: name.to_string(),
            inputs,
            settings: json!({"region": "eu-west-1", "assumeRoleArn": "arn:aws:iam::123456789012:role/admin"}),
        }
    }

    fn state_of(req: &ResourceRequest, created: &CreateResponse) -> ResourceState {
        ResourceState {
            name: req.name.clone(),
            type_token: req.type_token.clone(),
            id: created.id.clone(),
            inputs: req.inputs.clone(),
            inputs_hash: String::new(),
            outputs: created.outputs.clone(),
            dependencies: vec![],
            provider: None,
            protect: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_is_deterministic() {
        let provider = MockProvider::new("aws");
        let req = request("aws:ec2/vpc:Vpc", "plane-vpc", json!({"cidrBlock": "10.0.0.0/16"}));

        let a = provider.create(&req).await.unwrap();
        let preview = provider.preview(&req, None).await.unwrap();

        assert!(a.id.starts_with("vpc-"));
        assert_eq!(a.outputs, preview);
        assert_eq!(
            a.outputs["arn"],
            format!("arn:aws:ec2:eu-west-1:123456789012:vpc/{}", a.id)
        );
    }

    #[tokio::test]
    async fn test_update_delete_read() {
        let provider = MockProvider::new("helm");
        let req = request("helm:v3:Release", "cert-manager", json!({"name": "cert-manager", "namespace": "cert-manager"}));
        let created = provider.create(&req).await.unwrap();
        assert_eq!(created.id, "cert-manager/cert-manager");
        assert_eq!(created.outputs["revision"], 1);

        let old = state_of(&req, &created);
        let mut changed = req.clone();
        changed.inputs["version"] = json!("v1.14.0");
        let outputs = provider.update(&changed, &old).await.unwrap();
        assert_eq!(outputs["revision"], 2);

        assert!(provider.read(&old, &json!({})).await.unwrap().is_some());
        provider.delete(&old, &json!({})).await.unwrap();
        assert!(provider.read(&old, &json!({})).await.unwrap().is_none());

        let ops = provider.ops().await;
        assert_eq!((ops.creates, ops.updates, ops.deletes, ops.reads), (1, 1, 1, 2));
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let provider = MockProvider::new("aws");
        provider.fail_on("broken").await;
        let req = request("aws:s3/bucket:Bucket", "broken", json!({}));
        assert!(matches!(
            provider.create(&req).await,
            Err(ProviderError::Other(_))
        ));
        provider.clear_failure("broken").await;
        assert!(provider.create(&req).await.is_ok());
    }

    #[tokio::test]
    async fn test_check_kafka_topic_replication_factor() {
        let provider = MockProvider::new("kafka");
        let bad = request("kafka:index/topic:Topic", "t", json!({"name": "t", "partitions": 1, "replicationFactor": 0}));
        let good = request("kafka:index/topic:Topic", "t", json!({"name": "t", "partitions": 1, "replicationFactor": 2}));
        assert_eq!(provider.check(&bad).await.unwrap().len(), 1);
        assert!(provider.check(&good).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_check_msk_broker_multiple() {
        let provider = MockProvider::new("aws");
        let req = request(
            "aws:msk/cluster:Cluster",
            "msk",
            json!({"numberOfBrokerNodes": 4, "brokerNodeGroupInfo": {"clientSubnets": ["a", "b", "c"]}}),
        );
        assert_eq!(provider.check(&req).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_msk_bootstrap_brokers() {
        let provider = MockProvider::new("aws");
        let req = request(
            "aws:msk/cluster:Cluster",
            "msk",
            json!({"clusterName": "p-1", "numberOfBrokerNodes": 3, "brokerNodeGroupInfo": {"clientSubnets": ["a", "b", "c"]}}),
        );
        let created = provider.create(&req).await.unwrap();
        let brokers = created.outputs["bootstrapBrokersSaslScram"].as_str().unwrap();
        assert_eq!(brokers.split(',').count(), 3);
        assert!(brokers.split(',').all(|b| b.ends_with(":9096")));
    }

    #[tokio::test]
    async fn test_random_password_length() {
        let provider = MockProvider::new("random");
        let req = request("random:index/randomPassword:RandomPassword", "db-pw", json!({"length": 40}));
        let created = provider.create(&req).await.unwrap();
        assert_eq!(created.outputs["result"].as_str().unwrap().len(), 40);
    }

    #[tokio::test]
    async fn test_kubernetes_ids() {
        let provider = MockProvider::new("kubernetes");
        let req = request(
            "kubernetes:core/v1:Secret",
            "kafka-secret",
            json!({"metadata": {"name": "kafka-conf-msk", "namespace": "nitrous"}}),
        );
        let created = provider.create(&req).await.unwrap();
        assert_eq!(created.id, "nitrous/kafka-conf-msk");
        assert!(created.outputs["metadata"]["uid"].is_string());
    }
}
