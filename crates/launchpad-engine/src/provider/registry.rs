// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Installed provider plugins.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use super::Provider;
use crate::error::{EngineError, Result};

/// Maps package names to installed providers.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a provider for its package, replacing any previous one.
    pub fn install(&mut self, provider: Arc<dyn Provider>) {
        let package = provider.package().to_string();
        info!(package = %package, "Provider plugin installed");
        self.providers.insert(package, provider);
    }

    /// Builder-style [`install`](Self::install).
    pub fn with(mut self, provider: Arc<dyn Provider>) -> Self {
        self.install(provider);
        self
    }

    /// Provider for a package.
    pub fn get(&self, package: &str) -> Result<Arc<dyn Provider>> {
        self.providers
            .get(package)
            .cloned()
            .ok_or_else(|| EngineError::ProviderNotInstalled(package.to_string()))
    }

    /// Returns true if a provider is installed for the package.
    pub fn contains(&self, package: &str) -> bool {
        self.providers.contains_key(package)
    }

    /// Installed package names, sorted.
    pub fn packages(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    /// Fail with the first package that has no installed provider.
    pub fn ensure(&self, packages: &[&str]) -> Result<()> {
        match packages.iter().find(|p| !self.contains(p)) {
            Some(missing) => Err(EngineError::ProviderNotInstalled(missing.to_string())),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("packages", &self.packages())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockProvider;

    #[test]
    fn test_install_and_lookup() {
        let registry = ProviderRegistry::new()
            .with(Arc::new(MockProvider::new("aws")))
            .with(Arc::new(MockProvider::new("kubernetes")));

        assert_eq!(registry.packages(), vec!["aws", "kubernetes"]);
        assert!(registry.get("aws").is_ok());
        assert!(matches!(
            registry.get("kafka"),
            Err(EngineError::ProviderNotInstalled(p)) if p == "kafka"
        ));
    }

    #[test]
    fn test_ensure_reports_missing_package() {
        let registry = ProviderRegistry::new().with(Arc::new(MockProvider::new("aws")));
        assert!(registry.ensure(&["aws"]).is_ok());
        assert!(matches!(
            registry.ensure(&["aws", "helm"]),
            Err(EngineError::ProviderNotInstalled(p)) if p == "helm"
        ));
    }
}
