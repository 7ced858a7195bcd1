// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Stack context.
//!
//! A [`StackContext`] is handed to a program for the duration of one run.
//! Programs declare resources through [`StackContext::register`]; the context
//! decides the step for each resource, performs it (or predicts it during
//! preview) and returns resolved outputs.
//!
//! The context is cheap to clone and safe to share between concurrent
//! registrations. Provider calls run without holding the context lock;
//! state checkpoints are serialized through it.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::diff::{self, DiffKind, DiffResult};
use crate::error::{EngineError, Result};
use crate::output::{UNKNOWN, find_unresolved};
use crate::provider::{Provider, ProviderRegistry, ResourceRequest};
use crate::resource::{
    ProviderRef, Resource, ResourceOptions, ResourceOutputs, is_provider_type, package_of,
    provider_type,
};
use crate::stack::StackConfig;
use crate::state::{ResourceState, StackState, StateStore};

/// Whether a run applies changes or only predicts them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Apply changes and checkpoint state.
    Up,
    /// Predict changes without touching providers or state.
    Preview,
}

/// Operation performed on one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOp {
    /// Nothing to do.
    Same,
    /// New resource.
    Create,
    /// In-place change.
    Update,
    /// Create a new resource and delete the old one.
    Replace,
    /// Remove the resource.
    Delete,
}

impl std::fmt::Display for StepOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StepOp::Same => "same",
            StepOp::Create => "create",
            StepOp::Update => "update",
            StepOp::Replace => "replace",
            StepOp::Delete => "delete",
        };
        f.pad(s)
    }
}

/// One step of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Operation.
    pub op: StepOp,
    /// Resource name.
    pub name: String,
    /// Type token.
    #[serde(rename = "type")]
    pub type_token: String,
    /// Changed input paths (update / replace).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changed: Vec<String>,
}

struct RunState {
    /// Snapshot at the start of the run.
    base: StackState,
    /// Resources of `base` by name.
    old: HashMap<String, ResourceState>,
    /// Names declared in this run (including in-flight registrations).
    claimed: HashSet<String>,
    /// Resources registered in this run, in registration order.
    current: Vec<ResourceState>,
    /// Names of `base` resources already deleted from the cloud.
    deleted: HashSet<String>,
    /// Replaced resources still to be deleted.
    retiring: Vec<ResourceState>,
    steps: Vec<Step>,
}

impl RunState {
    fn is_registered(&self, name: &str) -> bool {
        self.current.iter().any(|r| r.name == name)
    }

    fn snapshot(&self) -> StackState {
        let current: HashSet<&str> = self.current.iter().map(|r| r.name.as_str()).collect();
        let mut state = self.base.clone();
        state.resources = self.current.clone();
        state.resources.extend(
            self.base
                .resources
                .iter()
                .filter(|r| !current.contains(r.name.as_str()) && !self.deleted.contains(&r.name))
                .cloned(),
        );
        state.pending_deletes = self.retiring.clone();
        state.updated_at = Utc::now();
        state
    }

    fn provider_settings(&self, provider: Option<&str>) -> Value {
        let Some(name) = provider else {
            return json!({});
        };
        self.current
            .iter()
            .find(|r| r.name == name)
            .or_else(|| self.old.get(name))
            .map(|r| r.inputs.clone())
            .unwrap_or_else(|| json!({}))
    }
}

struct Inner {
    project: String,
    stack: String,
    mode: RunMode,
    config: StackConfig,
    providers: ProviderRegistry,
    store: Arc<dyn StateStore>,
    run: Mutex<RunState>,
}

/// Per-run context for declaring resources.
#[derive(Clone)]
pub struct StackContext {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for StackContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackContext")
            .field("project", &self.inner.project)
            .field("stack", &self.inner.stack)
            .field("mode", &self.inner.mode)
            .finish()
    }
}

/// Delete one recorded resource through its provider.
///
/// Provider instances are bookkeeping only and need no call.
pub(crate) async fn delete_resource(
    providers: &ProviderRegistry,
    resource: &ResourceState,
    settings: &Value,
) -> Result<()> {
    if is_provider_type(&resource.type_token) {
        return Ok(());
    }
    let provider = providers.get(package_of(&resource.type_token)?)?;
    provider.delete(resource, settings).await?;
    Ok(())
}

impl StackContext {
    pub(crate) fn new(
        base: StackState,
        mode: RunMode,
        config: StackConfig,
        providers: ProviderRegistry,
        store: Arc<dyn StateStore>,
    ) -> Self {
        let old = base
            .resources
            .iter()
            .map(|r| (r.name.clone(), r.clone()))
            .collect();
        let retiring = base.pending_deletes.clone();
        Self {
            inner: Arc::new(Inner {
                project: base.project.clone(),
                stack: base.stack.clone(),
                mode,
                config,
                providers,
                store,
                run: Mutex::new(RunState {
                    base,
                    old,
                    claimed: HashSet::new(),
                    current: Vec::new(),
                    deleted: HashSet::new(),
                    retiring,
                    steps: Vec::new(),
                }),
            }),
        }
    }

    /// Project name.
    pub fn project(&self) -> &str {
        &self.inner.project
    }

    /// Stack name.
    pub fn stack(&self) -> &str {
        &self.inner.stack
    }

    /// Run mode.
    pub fn mode(&self) -> RunMode {
        self.inner.mode
    }

    /// Returns true during preview.
    pub fn is_preview(&self) -> bool {
        self.inner.mode == RunMode::Preview
    }

    /// Configuration pushed to the stack.
    pub fn config(&self) -> &StackConfig {
        &self.inner.config
    }

    /// Steps recorded so far.
    pub async fn steps(&self) -> Vec<Step> {
        self.inner.run.lock().await.steps.clone()
    }

    /// Read the outputs of another stack in the same project.
    pub async fn stack_reference(&self, stack: &str) -> Result<Value> {
        let state = self
            .inner
            .store
            .load(&self.inner.project, stack)
            .await?
            .ok_or_else(|| EngineError::StackNotFound(stack.to_string()))?;
        if state.outputs.is_null() {
            return Err(EngineError::StackNotFound(stack.to_string()));
        }
        Ok(state.outputs)
    }

    /// Register a scoped provider instance.
    ///
    /// Resources declared with the returned reference receive `settings`
    /// with every provider call and depend on the instance.
    pub async fn provider(
        &self,
        package: &str,
        name: impl Into<String>,
        settings: Value,
    ) -> Result<ProviderRef> {
        // Plugin must be installed before an instance can be configured
        self.inner.providers.get(package)?;

        let name = name.into();
        let type_token = provider_type(package);
        let old = self.claim(&name, &[]).await?;

        let op = match &old {
            None => StepOp::Create,
            Some(o) if o.type_token != type_token => StepOp::Replace,
            Some(o) if o.inputs == settings => StepOp::Same,
            Some(_) => StepOp::Update,
        };

        if op == StepOp::Replace
            && let Some(old) = &old
        {
            self.replace_cleanup(old).await?;
        }

        let now = Utc::now();
        let state = ResourceState {
            name: name.clone(),
            type_token: type_token.clone(),
            id: name.clone(),
            inputs: settings.clone(),
            inputs_hash: diff::hash_inputs(&settings),
            outputs: json!({}),
            dependencies: Vec::new(),
            provider: None,
            protect: false,
            created_at: match (&old, op) {
                (Some(o), StepOp::Same | StepOp::Update) => o.created_at,
                _ => now,
            },
            updated_at: now,
        };
        self.record(state, op, Vec::new(), None).await?;

        Ok(ProviderRef {
            name,
            package: package.to_string(),
            settings,
        })
    }

    /// Register a resource and return its resolved outputs.
    pub async fn register(&self, resource: Resource) -> Result<ResourceOutputs> {
        let Resource {
            type_token,
            name,
            inputs,
            options,
        } = resource;

        if is_provider_type(&type_token) {
            return Err(EngineError::InvalidTypeToken(type_token));
        }
        let package = package_of(&type_token)?.to_string();
        let provider = self.inner.providers.get(&package)?;

        let settings = match &options.provider {
            Some(p) if p.package != package => {
                return Err(EngineError::ProviderMismatch {
                    resource: name,
                    expected: package,
                    provider: p.name.clone(),
                });
            }
            Some(p) => p.settings.clone(),
            None => json!({}),
        };

        let mut dependencies = options.depends_on.clone();
        if let Some(p) = &options.provider {
            dependencies.push(p.name.clone());
        }
        dependencies.sort();
        dependencies.dedup();

        let old = self.claim(&name, &dependencies).await?;
        let request = ResourceRequest {
            type_token,
            name,
            inputs: Value::Object(inputs),
            settings,
        };

        let failures = provider.check(&request).await?;
        if !failures.is_empty() {
            return Err(EngineError::CheckFailed {
                resource: request.name,
                failures,
            });
        }

        let diff = match &old {
            None => None,
            Some(o) if o.type_token != request.type_token => Some(DiffResult {
                kind: DiffKind::Replace,
                changed: vec!["type".to_string()],
                replaced_by: vec!["type".to_string()],
            }),
            Some(o) => Some(
                provider
                    .diff(&request, o, &options.ignore_changes)
                    .await?,
            ),
        };
        let op = match diff.as_ref().map(|d| d.kind) {
            None => StepOp::Create,
            Some(DiffKind::Same) => StepOp::Same,
            Some(DiffKind::Update) => StepOp::Update,
            Some(DiffKind::Replace) => StepOp::Replace,
        };
        let changed = diff.map(|d| d.changed).unwrap_or_default();

        if op == StepOp::Replace
            && let Some(o) = &old
            && o.protect
        {
            return Err(EngineError::Protected(o.name.clone()));
        }

        debug!(
            stack = %self.inner.stack,
            resource = %request.name,
            op = %op,
            changed = ?changed,
            "Resource diffed"
        );

        let (id, outputs, inputs) = match (op, &old) {
            (StepOp::Same, Some(o)) => (o.id.clone(), o.outputs.clone(), o.inputs.clone()),
            _ => {
                let (id, outputs) = match self.inner.mode {
                    RunMode::Preview => {
                        self.predict(provider.as_ref(), &request, op, old.as_ref())
                            .await?
                    }
                    RunMode::Up => {
                        self.apply(provider.as_ref(), &request, op, old.as_ref(), &options)
                            .await?
                    }
                };
                (id, outputs, request.inputs.clone())
            }
        };

        let now = Utc::now();
        let state = ResourceState {
            name: request.name.clone(),
            type_token: request.type_token.clone(),
            id: id.clone(),
            inputs_hash: diff::hash_inputs(&inputs),
            inputs,
            outputs: outputs.clone(),
            dependencies,
            provider: options.provider.as_ref().map(|p| p.name.clone()),
            protect: options.protect,
            created_at: match (&old, op) {
                (Some(o), StepOp::Same | StepOp::Update) => o.created_at,
                _ => now,
            },
            updated_at: match (&old, op) {
                (Some(o), StepOp::Same) => o.updated_at,
                _ => now,
            },
        };
        let replaced = match (op, old) {
            (StepOp::Replace, Some(o)) if !options.delete_before_replace => Some(o),
            _ => None,
        };
        self.record(state, op, changed, replaced.clone()).await?;
        if let Some(o) = replaced {
            self.retire(&o).await?;
        }

        Ok(ResourceOutputs {
            name: request.name,
            type_token: request.type_token,
            id,
            outputs,
        })
    }

    /// Reserve a name and validate dependencies. Returns the recorded resource.
    async fn claim(&self, name: &str, dependencies: &[String]) -> Result<Option<ResourceState>> {
        let mut run = self.inner.run.lock().await;
        if run.claimed.contains(name) {
            return Err(EngineError::DuplicateResource(name.to_string()));
        }
        if let Some(missing) = dependencies.iter().find(|d| !run.is_registered(d)) {
            return Err(EngineError::UnknownDependency {
                resource: name.to_string(),
                dependency: missing.clone(),
            });
        }
        run.claimed.insert(name.to_string());
        Ok(run.old.get(name).cloned())
    }

    async fn predict(
        &self,
        provider: &dyn Provider,
        request: &ResourceRequest,
        op: StepOp,
        old: Option<&ResourceState>,
    ) -> Result<(String, Value)> {
        let prior = match op {
            StepOp::Update => old,
            _ => None,
        };
        let outputs = provider.preview(request, prior).await?;
        let id = match (prior, outputs.get("id").and_then(Value::as_str)) {
            (Some(o), _) => o.id.clone(),
            (None, Some(id)) => id.to_string(),
            (None, None) => UNKNOWN.to_string(),
        };
        Ok((id, outputs))
    }

    async fn apply(
        &self,
        provider: &dyn Provider,
        request: &ResourceRequest,
        op: StepOp,
        old: Option<&ResourceState>,
        options: &ResourceOptions,
    ) -> Result<(String, Value)> {
        let (id, outputs) = match (op, old) {
            (StepOp::Update, Some(o)) => {
                let outputs = provider.update(request, o).await?;
                (o.id.clone(), outputs)
            }
            (StepOp::Replace, Some(o)) if options.delete_before_replace => {
                self.replace_cleanup(o).await?;
                let created = provider.create(request).await?;
                (created.id, created.outputs)
            }
            // Create-before-delete: the old resource is retired after the
            // replacement is recorded.
            _ => {
                let created = provider.create(request).await?;
                (created.id, created.outputs)
            }
        };

        if let Some(path) = find_unresolved(&outputs) {
            return Err(EngineError::UnresolvedOutput {
                resource: request.name.clone(),
                path,
            });
        }

        info!(
            stack = %self.inner.stack,
            resource = %request.name,
            r#type = %request.type_token,
            op = %op,
            id = %id,
            "Resource applied"
        );
        Ok((id, outputs))
    }

    /// Delete the recorded resource being replaced and checkpoint.
    async fn replace_cleanup(&self, old: &ResourceState) -> Result<()> {
        if self.inner.mode == RunMode::Preview {
            return Ok(());
        }
        let settings = {
            let run = self.inner.run.lock().await;
            run.provider_settings(old.provider.as_deref())
        };
        delete_resource(&self.inner.providers, old, &settings).await?;

        let mut run = self.inner.run.lock().await;
        run.deleted.insert(old.name.clone());
        let snapshot = run.snapshot();
        self.inner.store.save(&snapshot).await?;
        Ok(())
    }

    /// Delete a replaced resource once its replacement is in state.
    ///
    /// Until the delete succeeds the resource stays in the pending deletes
    /// of the snapshot, so a later run retries it.
    async fn retire(&self, old: &ResourceState) -> Result<()> {
        if self.inner.mode == RunMode::Preview {
            return Ok(());
        }
        let settings = {
            let run = self.inner.run.lock().await;
            run.provider_settings(old.provider.as_deref())
        };
        delete_resource(&self.inner.providers, old, &settings).await?;

        let mut run = self.inner.run.lock().await;
        run.retiring
            .retain(|r| !(r.name == old.name && r.id == old.id));
        let snapshot = run.snapshot();
        self.inner.store.save(&snapshot).await?;
        Ok(())
    }

    async fn record(
        &self,
        state: ResourceState,
        op: StepOp,
        changed: Vec<String>,
        replaced: Option<ResourceState>,
    ) -> Result<()> {
        let mut run = self.inner.run.lock().await;
        if self.inner.mode == RunMode::Up
            && let Some(old) = replaced
        {
            run.retiring.push(old);
        }
        run.steps.push(Step {
            op,
            name: state.name.clone(),
            type_token: state.type_token.clone(),
            changed,
        });
        run.current.push(state);

        if self.inner.mode == RunMode::Up && op != StepOp::Same {
            let snapshot = run.snapshot();
            self.inner.store.save(&snapshot).await?;
        }
        Ok(())
    }

    /// Complete the run: delete undeclared resources and store outputs.
    ///
    /// Deletion runs dependents first. If any resource to delete is
    /// protected, nothing is deleted.
    pub(crate) async fn finish(&self, outputs: Value) -> Result<StackState> {
        let mut run = self.inner.run.lock().await;

        // Replacements left over from an earlier run that failed to delete
        // the resource they replaced.
        let leftovers = run.retiring.clone();
        for resource in leftovers.iter().rev() {
            if self.inner.mode == RunMode::Up {
                let settings = run.provider_settings(resource.provider.as_deref());
                delete_resource(&self.inner.providers, resource, &settings).await?;
                run.retiring
                    .retain(|r| !(r.name == resource.name && r.id == resource.id));
                let snapshot = run.snapshot();
                self.inner.store.save(&snapshot).await?;
                info!(
                    stack = %self.inner.stack,
                    resource = %resource.name,
                    id = %resource.id,
                    "Replaced resource deleted"
                );
            }
            run.steps.push(Step {
                op: StepOp::Delete,
                name: resource.name.clone(),
                type_token: resource.type_token.clone(),
                changed: Vec::new(),
            });
        }

        let pending: Vec<ResourceState> = {
            let current: HashSet<&str> = run.current.iter().map(|r| r.name.as_str()).collect();
            run.base
                .resources
                .iter()
                .filter(|r| !current.contains(r.name.as_str()) && !run.deleted.contains(&r.name))
                .cloned()
                .collect()
        };

        if let Some(protected) = pending.iter().find(|r| r.protect) {
            warn!(
                stack = %self.inner.stack,
                resource = %protected.name,
                "Refusing to delete protected resource"
            );
            return Err(EngineError::Protected(protected.name.clone()));
        }

        for resource in pending.iter().rev() {
            if self.inner.mode == RunMode::Up {
                let settings = run.provider_settings(resource.provider.as_deref());
                delete_resource(&self.inner.providers, resource, &settings).await?;
                run.deleted.insert(resource.name.clone());
                let snapshot = run.snapshot();
                self.inner.store.save(&snapshot).await?;
                info!(
                    stack = %self.inner.stack,
                    resource = %resource.name,
                    "Resource deleted"
                );
            }
            run.steps.push(Step {
                op: StepOp::Delete,
                name: resource.name.clone(),
                type_token: resource.type_token.clone(),
                changed: Vec::new(),
            });
        }

        let mut snapshot = run.snapshot();
        snapshot.config = self.inner.config.to_state();
        snapshot.outputs = outputs;
        if self.inner.mode == RunMode::Up {
            self.inner.store.save(&snapshot).await?;
        }
        Ok(snapshot)
    }
}
