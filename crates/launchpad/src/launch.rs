// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Stack drivers.
//!
//! A driver validates a configuration record, names the stack, installs
//! the provider plugins the orchestrator needs, pushes stack configuration
//! and runs `up`, `preview` or `destroy`.
//!
//! | Kind | Stack name | Packages |
//! |------|------------|----------|
//! | plane | `plane-{planeId}` | aws, random, kubernetes, helm, kafka (with nitrous) |
//! | mothership | `mothership-{mothershipId}` | aws, random, kubernetes, helm |
//! | tier | `tier-{tierId}` | kubernetes, helm, random, postgresql |

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use launchpad_engine::provider::{HttpProvider, MockProvider};
use launchpad_engine::resource::{is_provider_type, package_of};
use launchpad_engine::{
    EngineError, FileStateStore, ModuleOutput, ProviderRegistry, Stack, StackConfig, StackContext,
    StateStore, Step, UpdateSummary,
};
use serde_json::Value;
use tracing::{info, warn};

use crate::conf::{DataPlaneConf, MothershipConf, TierConf};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::orchestrator::{data_plane, mothership, tier};

const PLANE_PACKAGES: &[&str] = &["aws", "random", "kubernetes", "helm"];
const MOTHERSHIP_PACKAGES: &[&str] = &["aws", "random", "kubernetes", "helm"];
const TIER_PACKAGES: &[&str] = &["kubernetes", "helm", "random", "postgresql"];

/// What to do with a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Apply the program.
    Up,
    /// Report the changes `up` would make.
    Preview,
    /// Delete every resource.
    Destroy,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Up => "up",
            Action::Preview => "preview",
            Action::Destroy => "destroy",
        })
    }
}

/// Kind of a stack, derived from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackKind {
    /// `plane-{id}`
    Plane(i64),
    /// `mothership-{id}`
    Mothership(i64),
    /// `tier-{id}`
    Tier(i64),
}

impl StackKind {
    /// Parse a stack name.
    pub fn parse(stack: &str) -> Result<Self> {
        let (kind, id) = stack
            .rsplit_once('-')
            .ok_or_else(|| Error::UnknownStackKind(stack.to_string()))?;
        let id: i64 = id
            .parse()
            .map_err(|_| Error::UnknownStackKind(stack.to_string()))?;
        match kind {
            "plane" => Ok(StackKind::Plane(id)),
            "mothership" => Ok(StackKind::Mothership(id)),
            "tier" => Ok(StackKind::Tier(id)),
            _ => Err(Error::UnknownStackKind(stack.to_string())),
        }
    }

    /// Stack name.
    pub fn stack_name(&self) -> String {
        match self {
            StackKind::Plane(id) => format!("plane-{}", id),
            StackKind::Mothership(id) => format!("mothership-{}", id),
            StackKind::Tier(id) => format!("tier-{}", id),
        }
    }
}

/// Result of a driver run.
#[derive(Debug, Clone)]
pub struct LaunchReport {
    /// Stack name.
    pub stack: String,
    /// Action performed.
    pub action: Action,
    /// Step counts.
    pub summary: UpdateSummary,
    /// Steps in execution order (empty for destroy).
    pub steps: Vec<Step>,
    /// Stack outputs (`null` after destroy).
    pub outputs: Value,
}

/// Runs stacks against a state store and a set of provider plugins.
pub struct Launcher {
    config: Config,
    store: Arc<dyn StateStore>,
    providers: Option<ProviderRegistry>,
}

impl Launcher {
    /// Launcher storing state under `config.state_dir`.
    pub fn new(config: Config) -> Self {
        let store = Arc::new(FileStateStore::new(config.state_dir.clone()));
        Self {
            config,
            store,
            providers: None,
        }
    }

    /// Use a different state store.
    pub fn with_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = store;
        self
    }

    /// Use a fixed set of providers instead of resolving plugins from the
    /// configuration.
    pub fn with_providers(mut self, providers: ProviderRegistry) -> Self {
        self.providers = Some(providers);
        self
    }

    /// Process configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// State store.
    pub fn store(&self) -> Arc<dyn StateStore> {
        self.store.clone()
    }

    /// Resolve a provider for each package.
    ///
    /// A configured endpoint wins; otherwise the in-process provider is used
    /// when simulating.
    pub fn install_plugins<S: AsRef<str>>(&self, packages: &[S]) -> Result<ProviderRegistry> {
        if let Some(fixed) = &self.providers {
            for package in packages {
                if !fixed.contains(package.as_ref()) {
                    return Err(unavailable(package.as_ref()));
                }
            }
            return Ok(fixed.clone());
        }

        let mut registry = ProviderRegistry::new();
        for package in packages {
            let package = package.as_ref();
            if let Some(endpoint) = self.config.provider_endpoints.get(package) {
                info!(package, endpoint = %endpoint, "Using provider plugin");
                let provider =
                    HttpProvider::with_timeout(package, endpoint, self.config.provider_timeout)
                        .map_err(EngineError::from)?;
                registry.install(Arc::new(provider));
            } else if self.config.simulate {
                registry.install(Arc::new(MockProvider::new(package)));
            } else {
                return Err(unavailable(package));
            }
        }
        Ok(registry)
    }

    fn stack<S: AsRef<str>>(
        &self,
        name: &str,
        packages: &[S],
        config: StackConfig,
    ) -> Result<Stack> {
        Ok(Stack::builder()
            .project(self.config.project.as_str())
            .name(name)
            .store(self.store.clone())
            .providers(self.install_plugins(packages)?)
            .config(config)
            .build()?)
    }

    async fn run<F, Fut, O>(
        &self,
        name: &str,
        packages: &[&str],
        config: StackConfig,
        action: Action,
        program: F,
    ) -> Result<LaunchReport>
    where
        F: FnOnce(StackContext) -> Fut,
        Fut: Future<Output = Result<O>>,
        O: ModuleOutput,
    {
        info!(stack = name, action = %action, "Running stack");
        if action == Action::Destroy {
            return self.destroy(name).await;
        }

        let stack = self.stack(name, packages, config)?;
        let report = match action {
            Action::Preview => {
                let result = stack.preview(program).await.map_err(flatten)?;
                LaunchReport {
                    stack: name.to_string(),
                    action,
                    summary: result.summary,
                    steps: result.steps,
                    outputs: result.outputs,
                }
            }
            _ => {
                let result = stack.up(program).await.map_err(flatten)?;
                LaunchReport {
                    stack: name.to_string(),
                    action,
                    summary: result.summary,
                    steps: result.steps,
                    outputs: serde_json::to_value(&result.outputs)?,
                }
            }
        };
        info!(stack = name, action = %action, summary = %report.summary, "Stack run finished");
        Ok(report)
    }

    async fn destroy(&self, name: &str) -> Result<LaunchReport> {
        let packages = self.packages_in_state(name).await?;
        let stack = self.stack(name, &packages, StackConfig::new())?;
        let summary = stack.destroy().await?;
        Ok(LaunchReport {
            stack: name.to_string(),
            action: Action::Destroy,
            summary,
            steps: Vec::new(),
            outputs: Value::Null,
        })
    }

    /// Deploy, preview or destroy a data plane.
    pub async fn data_plane(&self, conf: &DataPlaneConf, action: Action) -> Result<LaunchReport> {
        conf.validate()?;
        let name = StackKind::Plane(conf.plane_id).stack_name();

        let mut packages = PLANE_PACKAGES.to_vec();
        if conf.nitrous.is_some() {
            packages.push("kafka");
        }
        let config = StackConfig::new()
            .set("aws:region", conf.region.as_str())
            .set("launchpad:planeId", conf.plane_id.to_string());

        self.run(&name, &packages, config, action, |ctx| async move {
            data_plane::setup(&ctx, conf).await
        })
        .await
    }

    /// Deploy, preview or destroy a mothership.
    pub async fn mothership(&self, conf: &MothershipConf, action: Action) -> Result<LaunchReport> {
        conf.validate()?;
        let name = StackKind::Mothership(conf.mothership_id).stack_name();
        let config = StackConfig::new()
            .set("aws:region", conf.region.as_str())
            .set("launchpad:mothershipId", conf.mothership_id.to_string());

        self.run(&name, MOTHERSHIP_PACKAGES, config, action, |ctx| async move {
            mothership::setup(&ctx, conf).await
        })
        .await
    }

    /// Deploy, preview or destroy a tier.
    pub async fn tier(&self, conf: &TierConf, action: Action) -> Result<LaunchReport> {
        conf.validate()?;
        let name = StackKind::Tier(conf.tier_id).stack_name();
        let config = StackConfig::new()
            .set("launchpad:tierId", conf.tier_id.to_string())
            .set("launchpad:planeId", conf.plane_id.to_string())
            .set("launchpad:customerId", conf.customer.customer_id.to_string());

        self.run(&name, TIER_PACKAGES, config, action, |ctx| async move {
            tier::setup(&ctx, conf).await
        })
        .await
    }

    /// Stacks of the project.
    pub async fn list_stacks(&self) -> Result<Vec<String>> {
        Ok(self.store.list(&self.config.project).await?)
    }

    /// Outputs of a deployed stack.
    pub async fn outputs(&self, name: &str) -> Result<Value> {
        let state = self
            .store
            .load(&self.config.project, name)
            .await?
            .ok_or_else(|| EngineError::StackNotFound(name.to_string()))?;
        if state.outputs.is_null() {
            return Err(EngineError::StackNotFound(name.to_string()).into());
        }
        Ok(state.outputs)
    }

    /// Outputs of a stack, or `None` when the stack was never deployed or
    /// has been destroyed. Any other failure to read state is an error.
    pub async fn recorded_outputs(&self, name: &str) -> Result<Option<Value>> {
        match self.outputs(name).await {
            Ok(outputs) => Ok(Some(outputs)),
            Err(Error::Engine(EngineError::StackNotFound(_))) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Reconcile recorded state with the live resources.
    ///
    /// Refused when a package would be served by the in-process provider.
    pub async fn refresh(&self, name: &str) -> Result<UpdateSummary> {
        let packages = self.packages_in_state(name).await?;
        if let Some(package) = packages.iter().find(|p| self.is_simulated(p)) {
            return Err(Error::SimulatedRefresh {
                stack: name.to_string(),
                package: package.clone(),
            });
        }
        let stack = self.stack(name, &packages, StackConfig::new())?;
        let summary = stack.refresh().await?;
        if summary.delete > 0 {
            warn!(stack = name, dropped = summary.delete, "Resources disappeared outside launchpad");
        }
        Ok(summary)
    }

    fn is_simulated(&self, package: &str) -> bool {
        self.providers.is_none()
            && self.config.simulate
            && !self.config.provider_endpoints.contains_key(package)
    }

    async fn packages_in_state(&self, name: &str) -> Result<Vec<String>> {
        let Some(state) = self.store.load(&self.config.project, name).await? else {
            return Ok(Vec::new());
        };
        let mut packages = BTreeSet::new();
        for resource in &state.resources {
            if is_provider_type(&resource.type_token) {
                continue;
            }
            packages.insert(package_of(&resource.type_token)?.to_string());
        }
        Ok(packages.into_iter().collect())
    }
}

fn unavailable(package: &str) -> Error {
    Error::PluginUnavailable(package.to_string(), package.to_uppercase())
}

/// Surface errors raised by an orchestrator as themselves.
fn flatten(err: EngineError) -> Error {
    match err {
        EngineError::Program(source) => match source.downcast::<Error>() {
            Ok(inner) => *inner,
            Err(other) => Error::Engine(EngineError::Program(other)),
        },
        other => Error::Engine(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_kind_parse() {
        assert_eq!(StackKind::parse("plane-42").unwrap(), StackKind::Plane(42));
        assert_eq!(StackKind::parse("tier-7").unwrap(), StackKind::Tier(7));
        assert_eq!(
            StackKind::parse("mothership-1").unwrap(),
            StackKind::Mothership(1)
        );
        assert!(matches!(
            StackKind::parse("plane-x"),
            Err(Error::UnknownStackKind(_))
        ));
        assert!(matches!(
            StackKind::parse("cluster-1"),
            Err(Error::UnknownStackKind(_))
        ));
        assert_eq!(StackKind::Tier(7).stack_name(), "tier-7");
    }

    #[test]
    fn test_install_plugins_without_endpoint_fails() {
        let launcher = Launcher::new(Config::default());
        let err = launcher.install_plugins(&["aws"]).unwrap_err();
        assert!(err.to_string().contains("LAUNCHPAD_PROVIDER_AWS_ENDPOINT"));
    }

    #[test]
    fn test_install_plugins_simulated_and_http() {
        let config = Config::from_vars([
            ("LAUNCHPAD_SIMULATE", "true"),
            ("LAUNCHPAD_PROVIDER_KAFKA_ENDPOINT", "http://localhost:9000"),
        ])
        .unwrap();
        let launcher = Launcher::new(config);
        let registry = launcher.install_plugins(&["aws", "kafka"]).unwrap();
        assert_eq!(registry.packages(), vec!["aws", "kafka"]);
    }

    #[tokio::test]
    async fn test_recorded_outputs_distinguishes_missing_from_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = Launcher::new(Config::default())
            .with_store(Arc::new(FileStateStore::new(dir.path())));
        assert!(launcher.recorded_outputs("plane-1").await.unwrap().is_none());

        std::fs::create_dir_all(dir.path().join("launchpad")).unwrap();
        std::fs::write(dir.path().join("launchpad/plane-1.json"), "{not json").unwrap();
        let err = launcher.recorded_outputs("plane-1").await.unwrap_err();
        assert!(matches!(err, Error::State(_)));
    }

    #[tokio::test]
    async fn test_refresh_refuses_simulated_packages() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_vars([("LAUNCHPAD_SIMULATE", "true")]).unwrap();
        let launcher =
            Launcher::new(config).with_store(Arc::new(FileStateStore::new(dir.path())));
        let mut state = launchpad_engine::state::StackState::new("launchpad", "plane-1");
        state.resources.push(launchpad_engine::state::ResourceState {
            name: "p1-vpc".into(),
            type_token: "aws:ec2/vpc:Vpc".into(),
            id: "vpc-1".into(),
            inputs: serde_json::json!({"cidrBlock": "10.0.0.0/16"}),
            inputs_hash: String::new(),
            outputs: serde_json::json!({"id": "vpc-1"}),
            dependencies: Vec::new(),
            provider: None,
            protect: false,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        });
        launcher.store().save(&state).await.unwrap();

        let err = launcher.refresh("plane-1").await.unwrap_err();
        assert!(matches!(
            err,
            Error::SimulatedRefresh { ref package, .. } if package == "aws"
        ));
        let kept = launcher.store().load("launchpad", "plane-1").await.unwrap().unwrap();
        assert_eq!(kept.resources, state.resources);
    }

    #[test]
    fn test_flatten_unwraps_program_errors() {
        let err = flatten(EngineError::Program(Box::new(Error::UnknownStackKind(
            "x".into(),
        ))));
        assert!(matches!(err, Error::UnknownStackKind(_)));
    }
}
