// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Process configuration for launchpad.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Prefix of per-package plugin endpoint variables.
const ENDPOINT_PREFIX: &str = "LAUNCHPAD_PROVIDER_";
const ENDPOINT_SUFFIX: &str = "_ENDPOINT";

/// Launchpad configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding stack state
    pub state_dir: PathBuf,
    /// Project all stacks belong to
    pub project: String,
    /// Serve packages without an endpoint from the in-process provider
    pub simulate: bool,
    /// HTTP plugin endpoint per package (lowercase package name)
    pub provider_endpoints: BTreeMap<String, String>,
    /// HTTP plugin request timeout
    pub provider_timeout: Duration,
    /// Mothership database URL (required for sync)
    pub mothership_database_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(".launchpad"),
            project: "launchpad".to_string(),
            simulate: false,
            provider_endpoints: BTreeMap::new(),
            provider_timeout: Duration::from_millis(300_000),
            mothership_database_url: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Load configuration from an explicit set of variables.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: BTreeMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let mut config = Self::default();

        if let Some(dir) = vars.get("LAUNCHPAD_STATE_DIR") {
            config.state_dir = PathBuf::from(dir);
        }
        if let Some(project) = vars.get("LAUNCHPAD_PROJECT") {
            if project.trim().is_empty() {
                return Err(ConfigError::InvalidEnvVar {
                    name: "LAUNCHPAD_PROJECT".to_string(),
                    value: project.clone(),
                });
            }
            config.project = project.clone();
        }
        config.simulate = vars
            .get("LAUNCHPAD_SIMULATE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        if let Some(ms) = vars.get("LAUNCHPAD_PROVIDER_TIMEOUT_MS") {
            let ms: u64 = ms.parse().map_err(|_| ConfigError::InvalidEnvVar {
                name: "LAUNCHPAD_PROVIDER_TIMEOUT_MS".to_string(),
                value: ms.clone(),
            })?;
            config.provider_timeout = Duration::from_millis(ms);
        }

        for (name, value) in &vars {
            if let Some(package) = name
                .strip_prefix(ENDPOINT_PREFIX)
                .and_then(|rest| rest.strip_suffix(ENDPOINT_SUFFIX))
                && !package.is_empty()
                && !value.is_empty()
            {
                config
                    .provider_endpoints
                    .insert(package.to_lowercase(), value.clone());
            }
        }

        config.mothership_database_url = vars
            .get("MOTHERSHIP_DATABASE_URL")
            .filter(|v| !v.is_empty())
            .cloned();

        Ok(config)
    }

    /// Environment variable naming the endpoint of a package.
    pub fn endpoint_var(package: &str) -> String {
        format!(
            "{}{}{}",
            ENDPOINT_PREFIX,
            package.to_uppercase(),
            ENDPOINT_SUFFIX
        )
    }

    /// Mothership database URL, or an error naming the variable.
    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.mothership_database_url
            .as_deref()
            .ok_or(ConfigError::MissingEnvVar("MOTHERSHIP_DATABASE_URL"))
    }
}

/// One violated configuration constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Dotted field path (e.g. `msk.numberOfBrokerNodes`)
    pub field: String,
    /// Offending value
    pub value: String,
    /// What is wrong
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} (value: {})", self.field, self.message, self.value)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// An environment variable has an invalid value.
    #[error("Invalid value for {name}: {value}")]
    InvalidEnvVar {
        /// Variable name.
        name: String,
        /// Offending value.
        value: String,
    },

    /// A configuration file could not be read.
    #[error("Cannot read {path}: {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A configuration file is not valid JSON for the expected record.
    #[error("Cannot parse {path}: {source}")]
    Parse {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },

    /// The configuration violates one or more constraints.
    #[error("Invalid configuration: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Invalid(Vec<Violation>),
}

impl ConfigError {
    /// Violations carried by an [`ConfigError::Invalid`] error.
    pub fn violations(&self) -> &[Violation] {
        match self {
            ConfigError::Invalid(v) => v,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(config.state_dir, PathBuf::from(".launchpad"));
        assert_eq!(config.project, "launchpad");
        assert!(!config.simulate);
        assert_eq!(config.provider_timeout, Duration::from_secs(300));
        assert!(config.require_database_url().is_err());
    }

    #[test]
    fn test_provider_endpoints() {
        let config = Config::from_vars([
            ("LAUNCHPAD_PROVIDER_AWS_ENDPOINT", "http://127.0.0.1:9100"),
            ("LAUNCHPAD_PROVIDER_KUBERNETES_ENDPOINT", "http://127.0.0.1:9101"),
            ("LAUNCHPAD_PROVIDER_TIMEOUT_MS", "1500"),
            ("LAUNCHPAD_SIMULATE", "1"),
        ])
        .unwrap();
        assert_eq!(config.provider_endpoints["aws"], "http://127.0.0.1:9100");
        assert_eq!(config.provider_endpoints["kubernetes"], "http://127.0.0.1:9101");
        assert_eq!(config.provider_timeout, Duration::from_millis(1500));
        assert!(config.simulate);
        assert_eq!(Config::endpoint_var("helm"), "LAUNCHPAD_PROVIDER_HELM_ENDPOINT");
    }

    #[test]
    fn test_invalid_timeout() {
        let err = Config::from_vars([("LAUNCHPAD_PROVIDER_TIMEOUT_MS", "soon")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar { ref name, .. } if name == "LAUNCHPAD_PROVIDER_TIMEOUT_MS"));
    }
}
