// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for launchpad-engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use launchpad_engine::provider::MockProvider;
use launchpad_engine::{EngineError, MemoryStateStore, ProviderRegistry, Stack, StackConfig};

/// Stack wired to in-memory state and mock providers.
pub struct TestStack {
    pub stack: Stack,
    pub store: MemoryStateStore,
    pub aws: Arc<MockProvider>,
    pub kafka: Arc<MockProvider>,
}

impl TestStack {
    /// Create a stack named `name` with a fresh store.
    pub fn new(name: &str) -> Self {
        Self::with_store(name, MemoryStateStore::new())
    }

    /// Create a stack sharing an existing store.
    pub fn with_store(name: &str, store: MemoryStateStore) -> Self {
        let aws = Arc::new(MockProvider::new("aws"));
        let kafka = Arc::new(MockProvider::new("kafka"));
        let providers = ProviderRegistry::new()
            .with(aws.clone())
            .with(kafka.clone());
        let stack = Stack::builder()
            .project("launchpad-test")
            .name(name)
            .store(Arc::new(store.clone()))
            .providers(providers)
            .config(StackConfig::new().set("aws:region", "eu-west-1"))
            .build()
            .expect("stack");
        Self {
            stack,
            store,
            aws,
            kafka,
        }
    }
}

/// Unwrap an error raised inside a program.
pub fn program_error(err: EngineError) -> EngineError {
    match err {
        EngineError::Program(inner) => match inner.downcast::<EngineError>() {
            Ok(e) => *e,
            Err(other) => panic!("program failed with foreign error: {}", other),
        },
        other => other,
    }
}
