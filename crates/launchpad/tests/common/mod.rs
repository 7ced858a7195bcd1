// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for launchpad integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use launchpad::conf::{DataPlaneConf, MothershipConf, TierConf};
use launchpad::{Config, Launcher};
use launchpad_engine::provider::MockProvider;
use launchpad_engine::{MemoryStateStore, ProviderRegistry};
use serde_json::{Value, json};

/// Skip a test when no mothership database is configured.
#[macro_export]
macro_rules! skip_if_no_db {
    () => {
        if std::env::var("TEST_MOTHERSHIP_DATABASE_URL").is_err() {
            eprintln!("Skipping test: TEST_MOTHERSHIP_DATABASE_URL not set");
            return;
        }
    };
}

/// Launcher wired to in-memory state and mock providers.
pub struct Harness {
    pub launcher: Launcher,
    pub store: MemoryStateStore,
    pub aws: Arc<MockProvider>,
    pub random: Arc<MockProvider>,
    pub kubernetes: Arc<MockProvider>,
    pub helm: Arc<MockProvider>,
    pub kafka: Arc<MockProvider>,
    pub postgresql: Arc<MockProvider>,
}

impl Harness {
    pub fn new() -> Self {
        let store = MemoryStateStore::new();
        let aws = Arc::new(MockProvider::new("aws"));
        let random = Arc::new(MockProvider::new("random"));
        let kubernetes = Arc::new(MockProvider::new("kubernetes"));
        let helm = Arc::new(MockProvider::new("helm"));
        let kafka = Arc::new(MockProvider::new("kafka"));
        let postgresql = Arc::new(MockProvider::new("postgresql"));
        let providers = ProviderRegistry::new()
            .with(aws.clone())
            .with(random.clone())
            .with(kubernetes.clone())
            .with(helm.clone())
            .with(kafka.clone())
            .with(postgresql.clone());

        let launcher = Launcher::new(Config::default())
            .with_store(Arc::new(store.clone()))
            .with_providers(providers);

        Self {
            launcher,
            store,
            aws,
            random,
            kubernetes,
            helm,
            kafka,
            postgresql,
        }
    }
}

pub fn plane_json(plane_id: i64) -> Value {
    json!({
        "planeId": plane_id,
        "region": "eu-west-1",
        "accountConf": {"existingAccount": {"accountId": "123456789012"}},
        "vpc": {"cidr": "10.20.0.0/16"},
        "eks": {"version": "1.29", "nodeGroups": [{
            "name": "general", "instanceTypes": ["m6i.xlarge"],
            "minSize": 2, "maxSize": 6, "desiredSize": 3
        }]},
        "aurora": {
            "engineVersion": "15.4", "minCapacity": 0.5, "maxCapacity": 8,
            "databaseName": "plane", "masterUsername": "launchpad"
        },
        "msk": {"kafkaVersion": "3.6.0", "numberOfBrokerNodes": 3,
                "instanceType": "kafka.m5.large", "volumeSizeGb": 100},
        "nitrous": {"image": "nitrous:1.0", "replicas": 1, "binlog": {
            "partitions": 1, "replicationFactor": 2, "topics": ["log", "req_log"]
        }},
        "ingress": {"domain": format!("p{}.example.com", plane_id)},
        "cert": {"acmeEmail": "ops@example.com"}
    })
}

pub fn plane_conf(plane_id: i64) -> DataPlaneConf {
    serde_json::from_value(plane_json(plane_id)).expect("plane conf")
}

pub fn tier_conf(tier_id: i64, plane_id: i64) -> TierConf {
    serde_json::from_value(json!({
        "tierId": tier_id,
        "planeId": plane_id,
        "customer": {"customerId": 900 + tier_id, "name": "Acme"},
        "image": "api:2.3",
        "apiReplicas": 2,
        "redis": {"chartVersion": "19.0.1"}
    }))
    .expect("tier conf")
}

pub fn mothership_conf(mothership_id: i64) -> MothershipConf {
    serde_json::from_value(json!({
        "mothershipId": mothership_id,
        "region": "eu-central-1",
        "accountConf": {"newAccount": {"name": "mothership", "email": "aws+ms@example.com"}},
        "vpc": {"cidr": "10.0.0.0/16", "azCount": 2},
        "eks": {"version": "1.29", "nodeGroups": [{
            "name": "system", "instanceTypes": ["m6i.large"],
            "minSize": 1, "maxSize": 3, "desiredSize": 2
        }]},
        "aurora": {
            "engineVersion": "15.4", "minCapacity": 0.5, "maxCapacity": 4,
            "databaseName": "mothership", "masterUsername": "launchpad"
        },
        "ingress": {"domain": "ms.example.com"},
        "cert": {"acmeEmail": "ops@example.com"},
        "image": "mothership:1.0",
        "protect": true
    }))
    .expect("mothership conf")
}
