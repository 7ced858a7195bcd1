// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Stack driver.
//!
//! A [`Stack`] binds a project/stack name to a state store, a set of
//! installed providers and stack configuration. It runs programs in `up`
//! or `preview` mode, destroys everything the stack owns, and refreshes
//! recorded outputs from the cloud.
//!
//! ```ignore
//! let stack = Stack::builder()
//!     .project("launchpad")
//!     .name("plane-42")
//!     .store(Arc::new(FileStateStore::new(".launchpad")))
//!     .providers(registry)
//!     .build()?;
//!
//! let result = stack.up(|ctx| async move { data_plane(ctx, conf).await }).await?;
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

use crate::context::{RunMode, StackContext, Step, StepOp, delete_resource};
use crate::error::{EngineError, Result};
use crate::output::{self, ModuleOutput};
use crate::provider::ProviderRegistry;
use crate::resource::{is_provider_type, package_of};
use crate::state::{ConfigValue, ResourceState, StackState, StateStore};

/// Configuration pushed to a stack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StackConfig {
    values: BTreeMap<String, ConfigValue>,
}

impl StackConfig {
    /// Empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a plain value.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(
            key.into(),
            ConfigValue {
                value: value.into(),
                secret: false,
            },
        );
        self
    }

    /// Set a secret value.
    pub fn set_secret(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(
            key.into(),
            ConfigValue {
                value: value.into(),
                secret: true,
            },
        );
        self
    }

    /// Value of a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|v| v.value.as_str())
    }

    /// Value of a key, or [`EngineError::MissingConfig`].
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| EngineError::MissingConfig(key.to_string()))
    }

    /// Returns true if the key holds a secret.
    pub fn is_secret(&self, key: &str) -> bool {
        self.values.get(key).is_some_and(|v| v.secret)
    }

    /// Iterate keys and values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns true if no keys are set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn to_state(&self) -> BTreeMap<String, ConfigValue> {
        self.values.clone()
    }
}

/// Per-operation counts of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSummary {
    /// Unchanged resources.
    pub same: usize,
    /// Created resources.
    pub create: usize,
    /// Updated resources.
    pub update: usize,
    /// Replaced resources.
    pub replace: usize,
    /// Deleted resources.
    pub delete: usize,
}

impl UpdateSummary {
    /// Count steps by operation.
    pub fn from_steps(steps: &[Step]) -> Self {
        let mut summary = Self::default();
        for step in steps {
            match step.op {
                StepOp::Same => summary.same += 1,
                StepOp::Create => summary.create += 1,
                StepOp::Update => summary.update += 1,
                StepOp::Replace => summary.replace += 1,
                StepOp::Delete => summary.delete += 1,
            }
        }
        summary
    }

    /// Returns true if anything other than `same` happened.
    pub fn has_changes(&self) -> bool {
        self.create + self.update + self.replace + self.delete > 0
    }
}

impl std::fmt::Display for UpdateSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} replaced, {} deleted, {} unchanged",
            self.create, self.update, self.replace, self.delete, self.same
        )
    }
}

/// Result of [`Stack::up`].
#[derive(Debug, Clone)]
pub struct UpResult<O> {
    /// Step counts.
    pub summary: UpdateSummary,
    /// Steps in execution order.
    pub steps: Vec<Step>,
    /// Outputs returned by the program.
    pub outputs: O,
}

/// Result of [`Stack::preview`].
#[derive(Debug, Clone)]
pub struct PreviewResult {
    /// Step counts.
    pub summary: UpdateSummary,
    /// Predicted steps.
    pub steps: Vec<Step>,
    /// Predicted outputs (may contain unknown values).
    pub outputs: Value,
}

/// A named stack of one project.
pub struct Stack {
    project: String,
    name: String,
    store: Arc<dyn StateStore>,
    providers: ProviderRegistry,
    config: StackConfig,
}

impl std::fmt::Debug for Stack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stack")
            .field("project", &self.project)
            .field("name", &self.name)
            .field("backend", &self.store.backend())
            .field("providers", &self.providers)
            .finish()
    }
}

impl Stack {
    /// Create a builder.
    pub fn builder() -> StackBuilder {
        StackBuilder::default()
    }

    /// Project name.
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Stack name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stack configuration.
    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    async fn context(&self, mode: RunMode) -> Result<StackContext> {
        let base = self
            .store
            .load(&self.project, &self.name)
            .await?
            .unwrap_or_else(|| StackState::new(&self.project, &self.name));
        Ok(StackContext::new(
            base,
            mode,
            self.config.clone(),
            self.providers.clone(),
            self.store.clone(),
        ))
    }

    /// Run a program and apply the resulting changes.
    ///
    /// Resources recorded before a failure stay in state.
    pub async fn up<F, Fut, O, E>(&self, program: F) -> Result<UpResult<O>>
    where
        F: FnOnce(StackContext) -> Fut,
        Fut: Future<Output = std::result::Result<O, E>>,
        O: ModuleOutput,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let _lock = self.store.lock(&self.project, &self.name).await?;
        info!(project = %self.project, stack = %self.name, "Stack update started");

        let ctx = self.context(RunMode::Up).await?;
        let outputs = program(ctx.clone())
            .await
            .map_err(|e| EngineError::Program(e.into()))?;
        let value = output::to_resolved_json(&outputs)?;
        ctx.finish(value).await?;

        let steps = ctx.steps().await;
        let summary = UpdateSummary::from_steps(&steps);
        info!(
            project = %self.project,
            stack = %self.name,
            summary = %summary,
            "Stack update completed"
        );
        Ok(UpResult {
            summary,
            steps,
            outputs,
        })
    }

    /// Run a program and report the changes `up` would make.
    pub async fn preview<F, Fut, O, E>(&self, program: F) -> Result<PreviewResult>
    where
        F: FnOnce(StackContext) -> Fut,
        Fut: Future<Output = std::result::Result<O, E>>,
        O: ModuleOutput,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let _lock = self.store.lock(&self.project, &self.name).await?;
        let ctx = self.context(RunMode::Preview).await?;
        let outputs = program(ctx.clone())
            .await
            .map_err(|e| EngineError::Program(e.into()))?;
        let value = serde_json::to_value(&outputs)?;
        ctx.finish(value.clone()).await?;

        let steps = ctx.steps().await;
        let summary = UpdateSummary::from_steps(&steps);
        info!(
            project = %self.project,
            stack = %self.name,
            summary = %summary,
            "Stack preview completed"
        );
        Ok(PreviewResult {
            summary,
            steps,
            outputs: value,
        })
    }

    /// Delete every resource of the stack, dependents first.
    ///
    /// Refuses to start if any resource is protected.
    pub async fn destroy(&self) -> Result<UpdateSummary> {
        let _lock = self.store.lock(&self.project, &self.name).await?;
        let Some(mut state) = self.store.load(&self.project, &self.name).await? else {
            return Ok(UpdateSummary::default());
        };

        if let Some(protected) = state.resources.iter().find(|r| r.protect) {
            return Err(EngineError::Protected(protected.name.clone()));
        }

        info!(
            project = %self.project,
            stack = %self.name,
            resources = state.resources.len(),
            "Stack destroy started"
        );

        let mut summary = UpdateSummary::default();
        let resources = state.resources.clone();
        let leftovers = state.pending_deletes.clone();
        for resource in leftovers.iter().rev() {
            let settings = provider_settings(&resources, resource.provider.as_deref());
            delete_resource(&self.providers, resource, &settings).await?;

            state
                .pending_deletes
                .retain(|r| !(r.name == resource.name && r.id == resource.id));
            state.updated_at = chrono::Utc::now();
            self.store.save(&state).await?;
            summary.delete += 1;
        }

        for resource in resources.iter().rev() {
            let settings = provider_settings(&resources, resource.provider.as_deref());
            delete_resource(&self.providers, resource, &settings).await?;

            state.resources.retain(|r| r.name != resource.name);
            state.updated_at = chrono::Utc::now();
            self.store.save(&state).await?;
            summary.delete += 1;
        }

        state.outputs = Value::Null;
        self.store.save(&state).await?;
        info!(project = %self.project, stack = %self.name, summary = %summary, "Stack destroyed");
        Ok(summary)
    }

    /// Re-read recorded resources from their providers.
    ///
    /// Changed outputs count as updates. Resources that no longer exist are
    /// dropped from state and count as deletes.
    pub async fn refresh(&self) -> Result<UpdateSummary> {
        let _lock = self.store.lock(&self.project, &self.name).await?;
        let mut state = self
            .store
            .load(&self.project, &self.name)
            .await?
            .ok_or_else(|| EngineError::StackNotFound(self.name.clone()))?;

        let mut summary = UpdateSummary::default();
        let resources = state.resources.clone();
        let mut refreshed = Vec::with_capacity(resources.len());

        for resource in resources.iter() {
            if is_provider_type(&resource.type_token) {
                summary.same += 1;
                refreshed.push(resource.clone());
                continue;
            }
            let provider = self.providers.get(package_of(&resource.type_token)?)?;
            let settings = provider_settings(&resources, resource.provider.as_deref());
            match provider.read(resource, &settings).await? {
                Some(outputs) if outputs == resource.outputs => {
                    summary.same += 1;
                    refreshed.push(resource.clone());
                }
                Some(outputs) => {
                    summary.update += 1;
                    let mut updated = resource.clone();
                    updated.outputs = outputs;
                    updated.updated_at = chrono::Utc::now();
                    refreshed.push(updated);
                }
                None => {
                    warn!(
                        stack = %self.name,
                        resource = %resource.name,
                        "Resource no longer exists"
                    );
                    summary.delete += 1;
                }
            }
        }

        state.resources = refreshed;
        state.updated_at = chrono::Utc::now();
        self.store.save(&state).await?;
        info!(project = %self.project, stack = %self.name, summary = %summary, "Stack refreshed");
        Ok(summary)
    }

    /// Outputs of the last successful update.
    pub async fn outputs(&self) -> Result<Value> {
        let state = self
            .store
            .load(&self.project, &self.name)
            .await?
            .ok_or_else(|| EngineError::StackNotFound(self.name.clone()))?;
        Ok(state.outputs)
    }

    /// Current snapshot, if the stack has ever been updated.
    pub async fn state(&self) -> Result<Option<StackState>> {
        Ok(self.store.load(&self.project, &self.name).await?)
    }
}

fn provider_settings(resources: &[ResourceState], provider: Option<&str>) -> Value {
    provider
        .and_then(|name| resources.iter().find(|r| r.name == name))
        .map(|r| r.inputs.clone())
        .unwrap_or_else(|| serde_json::json!({}))
}

/// Builder for [`Stack`].
#[derive(Default)]
pub struct StackBuilder {
    project: Option<String>,
    name: Option<String>,
    store: Option<Arc<dyn StateStore>>,
    providers: ProviderRegistry,
    config: StackConfig,
}

impl StackBuilder {
    /// Set the project name.
    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Set the stack name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the state store.
    pub fn store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the installed providers.
    pub fn providers(mut self, providers: ProviderRegistry) -> Self {
        self.providers = providers;
        self
    }

    /// Set the stack configuration.
    pub fn config(mut self, config: StackConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the stack.
    pub fn build(self) -> Result<Stack> {
        let project = self
            .project
            .filter(|p| !p.is_empty())
            .ok_or_else(|| EngineError::MissingConfig("project".to_string()))?;
        let name = self
            .name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| EngineError::MissingConfig("stack name".to_string()))?;
        let store = self
            .store
            .ok_or_else(|| EngineError::MissingConfig("state store".to_string()))?;
        Ok(Stack {
            project,
            name,
            store,
            providers: self.providers,
            config: self.config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryStateStore;

    fn step(op: StepOp) -> Step {
        Step {
            op,
            name: "r".into(),
            type_token: "aws:ec2/vpc:Vpc".into(),
            changed: Vec::new(),
        }
    }

    #[test]
    fn test_summary_counts_steps() {
        let summary = UpdateSummary::from_steps(&[
            step(StepOp::Same),
            step(StepOp::Create),
            step(StepOp::Create),
            step(StepOp::Delete),
        ]);
        assert_eq!(summary.same, 1);
        assert_eq!(summary.create, 2);
        assert_eq!(summary.delete, 1);
        assert!(summary.has_changes());
        assert!(!UpdateSummary::from_steps(&[step(StepOp::Same)]).has_changes());
    }

    #[test]
    fn test_config_require() {
        let config = StackConfig::new()
            .set("aws:region", "eu-west-1")
            .set_secret("db:password", "hunter2");
        assert_eq!(config.require("aws:region").unwrap(), "eu-west-1");
        assert!(config.is_secret("db:password"));
        assert!(matches!(
            config.require("missing"),
            Err(EngineError::MissingConfig(k)) if k == "missing"
        ));
    }

    #[test]
    fn test_builder_requires_store() {
        let err = Stack::builder().project("p").name("s").build().unwrap_err();
        assert!(matches!(err, EngineError::MissingConfig(_)));

        let stack = Stack::builder()
            .project("p")
            .name("s")
            .store(Arc::new(MemoryStateStore::new()))
            .build()
            .unwrap();
        assert_eq!(stack.name(), "s");
    }
}
