// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Provider trait definitions.
//!
//! Defines the abstract interface for provider plugins.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::diff::{self, DiffResult};
use crate::state::ResourceState;

/// Errors from provider operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProviderError {
    /// The provider does not manage this resource type.
    #[error("Unsupported resource type: {0}")]
    UnsupportedType(String),

    /// The resource does not exist in the cloud.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Transport to the plugin failed.
    #[error("Request failed: {0}")]
    Request(String),

    /// The plugin answered with an error status.
    #[error("Plugin returned {status}: {body}")]
    Plugin {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The plugin response could not be interpreted.
    #[error("Invalid plugin response: {0}")]
    InvalidResponse(String),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error.
    #[error("Other: {0}")]
    Other(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Request(e.to_string())
    }
}

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// A resource operation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequest {
    /// Type token.
    #[serde(rename = "type")]
    pub type_token: String,
    /// Stack-unique resource name.
    pub name: String,
    /// Declared inputs.
    pub inputs: Value,
    /// Settings of the provider instance (region, role, kubeconfig, ...).
    pub settings: Value,
}

/// Response to a create call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateResponse {
    /// Identifier assigned by the cloud.
    pub id: String,
    /// Output properties.
    pub outputs: Value,
}

/// Trait for provider plugins.
///
/// Providers are PURE cloud adapters - they do NOT touch stack state.
/// Diffing decisions, ordering and checkpointing are handled by the caller.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Package served by this provider (e.g., "aws", "kubernetes").
    fn package(&self) -> &str;

    /// Input paths whose change requires replacing a resource of this type.
    fn replace_keys(&self, type_token: &str) -> Vec<String> {
        diff::default_replace_keys(type_token)
    }

    /// Validate inputs. Returns a list of failures (empty when valid).
    async fn check(&self, request: &ResourceRequest) -> Result<Vec<String>> {
        let _ = request;
        Ok(Vec::new())
    }

    /// Compare declared inputs against the recorded resource.
    async fn diff(
        &self,
        request: &ResourceRequest,
        old: &ResourceState,
        ignore_changes: &[String],
    ) -> Result<DiffResult> {
        Ok(diff::diff_inputs(
            &old.inputs,
            &request.inputs,
            &self.replace_keys(&request.type_token),
            ignore_changes,
        ))
    }

    /// Create a resource.
    async fn create(&self, request: &ResourceRequest) -> Result<CreateResponse>;

    /// Update a resource in place. Returns the new outputs.
    async fn update(&self, request: &ResourceRequest, old: &ResourceState) -> Result<Value>;

    /// Delete a resource.
    async fn delete(&self, old: &ResourceState, settings: &Value) -> Result<()>;

    /// Read the live outputs of a resource. `None` if it no longer exists.
    async fn read(&self, old: &ResourceState, settings: &Value) -> Result<Option<Value>>;

    /// Predict the outputs a create or update would produce.
    ///
    /// Values that cannot be predicted are returned as
    /// [`crate::output::UNKNOWN`].
    async fn preview(
        &self,
        request: &ResourceRequest,
        old: Option<&ResourceState>,
    ) -> Result<Value>;
}
