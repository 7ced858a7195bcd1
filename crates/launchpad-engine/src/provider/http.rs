// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP provider plugin.
//!
//! Forwards resource operations to an out-of-process plugin:
//!
//! | Operation | Request | Response |
//! |-----------|---------|----------|
//! | `POST /check` | `{type, name, inputs, settings}` | `{failures: [..]}` |
//! | `POST /create` | `{type, name, inputs, settings}` | `{id, outputs}` |
//! | `POST /update` | `{type, name, id, inputs, oldInputs, oldOutputs, settings}` | `{outputs}` |
//! | `POST /delete` | `{type, name, id, oldInputs, oldOutputs, settings}` | `{}` |
//! | `POST /read` | `{type, name, id, oldInputs, oldOutputs, settings}` | `{outputs \| null}` |
//! | `POST /preview` | `{type, name, id?, inputs, oldOutputs?, settings}` | `{outputs}` |

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use super::traits::*;
use crate::state::ResourceState;

#[derive(Debug, Deserialize)]
struct OutputsResponse {
    #[serde(default)]
    outputs: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct CheckResponse {
    #[serde(default)]
    failures: Vec<String>,
}

/// Provider that talks to a plugin over HTTP.
#[derive(Debug, Clone)]
pub struct HttpProvider {
    package: String,
    endpoint: String,
    client: reqwest::Client,
}

impl HttpProvider {
    /// Default request timeout (provisioning calls can be slow).
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

    /// Create a provider for `package` served at `endpoint`.
    pub fn new(package: impl Into<String>, endpoint: impl Into<String>) -> Result<Self> {
        Self::with_timeout(package, endpoint, Self::DEFAULT_TIMEOUT)
    }

    /// Create a provider with a custom request timeout.
    pub fn with_timeout(
        package: impl Into<String>,
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            package: package.into(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Plugin endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call(&self, op: &str, body: Value) -> Result<Value> {
        let url = format!("{}/{}", self.endpoint, op);
        debug!(package = %self.package, op, url = %url, "Calling provider plugin");

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Plugin {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    fn existing_body(old: &ResourceState, settings: &Value) -> Value {
        json!({
            "type": old.type_token,
            "name": old.name,
            "id": old.id,
            "oldInputs": old.inputs,
            "oldOutputs": old.outputs,
            "settings": settings,
        })
    }

    fn require_outputs(op: &str, value: Value) -> Result<Value> {
        let response: OutputsResponse = serde_json::from_value(value)?;
        response
            .outputs
            .ok_or_else(|| ProviderError::InvalidResponse(format!("{} returned no outputs", op)))
    }
}

#[async_trait]
impl Provider for HttpProvider {
    fn package(&self) -> &str {
        &self.package
    }

    async fn check(&self, request: &ResourceRequest) -> Result<Vec<String>> {
        let value = self.call("check", serde_json::to_value(request)?).await?;
        if value.is_null() {
            return Ok(Vec::new());
        }
        let response: CheckResponse = serde_json::from_value(value)?;
        Ok(response.failures)
    }

    async fn create(&self, request: &ResourceRequest) -> Result<CreateResponse> {
        let value = self.call("create", serde_json::to_value(request)?).await?;
        serde_json::from_value(value)
            .map_err(|e| ProviderError::InvalidResponse(format!("create: {}", e)))
    }

    async fn update(&self, request: &ResourceRequest, old: &ResourceState) -> Result<Value> {
        let body = json!({
            "type": request.type_token,
            "name": request.name,
            "id": old.id,
            "inputs": request.inputs,
            "oldInputs": old.inputs,
            "oldOutputs": old.outputs,
            "settings": request.settings,
        });
        let value = self.call("update", body).await?;
        Self::require_outputs("update", value)
    }

    async fn delete(&self, old: &ResourceState, settings: &Value) -> Result<()> {
        self.call("delete", Self::existing_body(old, settings))
            .await
            .map(|_| ())
    }

    async fn read(&self, old: &ResourceState, settings: &Value) -> Result<Option<Value>> {
        let value = self
            .call("read", Self::existing_body(old, settings))
            .await?;
        if value.is_null() {
            return Ok(None);
        }
        let response: OutputsResponse = serde_json::from_value(value)?;
        Ok(response.outputs.filter(|o| !o.is_null()))
    }

    async fn preview(
        &self,
        request: &ResourceRequest,
        old: Option<&ResourceState>,
    ) -> Result<Value> {
        let mut body = serde_json::to_value(request)?;
        if let (Some(old), Value::Object(map)) = (old, &mut body) {
            map.insert("id".into(), json!(old.id));
            map.insert("oldOutputs".into(), old.outputs.clone());
        }
        let value = self.call("preview", body).await?;
        Self::require_outputs("preview", value)
    }
}
