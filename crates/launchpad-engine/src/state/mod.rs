// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Stack state snapshots and state stores.

mod file;
mod memory;

pub use file::FileStateStore;
pub use memory::MemoryStateStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Current snapshot format version.
pub const STATE_VERSION: u32 = 1;

/// Errors from state store operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StateError {
    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Another operation holds the stack lock.
    #[error("Stack {0} is locked by another operation")]
    Locked(String),

    /// Snapshot was written by an unsupported format version.
    #[error("Unsupported state version {0}")]
    UnsupportedVersion(u32),
}

/// Result type for state operations.
pub type Result<T> = std::result::Result<T, StateError>;

/// One resource as recorded in state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceState {
    /// Stack-unique resource name.
    pub name: String,
    /// Type token.
    #[serde(rename = "type")]
    pub type_token: String,
    /// Provider-assigned identifier.
    pub id: String,
    /// Inputs the resource was last applied with.
    pub inputs: Value,
    /// Hash of `inputs`.
    pub inputs_hash: String,
    /// Outputs returned by the provider.
    pub outputs: Value,
    /// Names of resources this one depends on (including its provider).
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Name of the provider instance used for this resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Whether deletion is refused.
    #[serde(default)]
    pub protect: bool,
    /// When the resource was created.
    pub created_at: DateTime<Utc>,
    /// When the resource was last changed.
    pub updated_at: DateTime<Utc>,
}

/// A stored configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigValue {
    /// The value.
    pub value: String,
    /// Whether the value must not be printed.
    #[serde(default)]
    pub secret: bool,
}

/// Snapshot of one stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackState {
    /// Snapshot format version.
    pub version: u32,
    /// Project the stack belongs to.
    pub project: String,
    /// Stack name.
    pub stack: String,
    /// Configuration pushed with the last update.
    #[serde(default)]
    pub config: BTreeMap<String, ConfigValue>,
    /// Resources in dependency order (dependencies first).
    #[serde(default)]
    pub resources: Vec<ResourceState>,
    /// Replaced resources whose deletion has not completed yet.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_deletes: Vec<ResourceState>,
    /// Stack outputs of the last successful update.
    #[serde(default)]
    pub outputs: Value,
    /// When the snapshot was written.
    pub updated_at: DateTime<Utc>,
}

impl StackState {
    /// An empty snapshot.
    pub fn new(project: impl Into<String>, stack: impl Into<String>) -> Self {
        Self {
            version: STATE_VERSION,
            project: project.into(),
            stack: stack.into(),
            config: BTreeMap::new(),
            resources: Vec::new(),
            pending_deletes: Vec::new(),
            outputs: Value::Null,
            updated_at: Utc::now(),
        }
    }

    /// Look up a resource by name.
    pub fn resource(&self, name: &str) -> Option<&ResourceState> {
        self.resources.iter().find(|r| r.name == name)
    }
}

/// Guard for an exclusive stack lock. Released on drop.
pub struct StateLock {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl StateLock {
    /// Create a lock guard that runs `release` when dropped.
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for StateLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateLock")
            .field("held", &self.release.is_some())
            .finish()
    }
}

/// Trait for stack state backends.
///
/// Stores only persist snapshots; they never interpret resources.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Backend identifier (e.g., "file", "memory").
    fn backend(&self) -> &'static str;

    /// Load the snapshot of a stack, if any.
    async fn load(&self, project: &str, stack: &str) -> Result<Option<StackState>>;

    /// Persist a snapshot, replacing the previous one.
    async fn save(&self, state: &StackState) -> Result<()>;

    /// Remove the snapshot of a stack.
    async fn delete(&self, project: &str, stack: &str) -> Result<()>;

    /// List stack names of a project.
    async fn list(&self, project: &str) -> Result<Vec<String>>;

    /// Acquire the exclusive lock of a stack.
    ///
    /// Fails with [`StateError::Locked`] if the stack is already locked.
    async fn lock(&self, project: &str, stack: &str) -> Result<StateLock>;
}
