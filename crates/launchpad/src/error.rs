// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for launchpad.

use thiserror::Error;

/// Launchpad errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration loading or validation failed.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Provisioning engine failed.
    #[error("Engine error: {0}")]
    Engine(#[from] launchpad_engine::EngineError),

    /// Reading or writing stack state failed.
    #[error("State error: {0}")]
    State(#[from] launchpad_engine::state::StateError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Applying mothership migrations failed.
    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Network layout could not be derived.
    #[error("Invalid network layout: {0}")]
    Network(String),

    /// No plugin can serve a package.
    #[error("No provider plugin available for package {0} (set LAUNCHPAD_PROVIDER_{1}_ENDPOINT or LAUNCHPAD_SIMULATE=true)")]
    PluginUnavailable(String, String),

    /// Refresh would compare state against the in-process provider, which
    /// holds nothing from earlier invocations.
    #[error("Cannot refresh {stack}: package {package} is simulated (set LAUNCHPAD_PROVIDER_{upper}_ENDPOINT)", upper = .package.to_uppercase())]
    SimulatedRefresh {
        /// Stack name.
        stack: String,
        /// Simulated package.
        package: String,
    },

    /// A plane lacks a component the caller needs.
    #[error("Plane {plane_id} has no {component}")]
    PlaneComponentMissing {
        /// Plane id.
        plane_id: i64,
        /// Missing component.
        component: &'static str,
    },

    /// A stack output path did not resolve.
    #[error("Stack {stack} has no output at {path}")]
    MissingStackOutput {
        /// Stack name.
        stack: String,
        /// JSON path.
        path: String,
    },

    /// The stack name does not belong to a known stack kind.
    #[error("Unknown stack kind: {0}")]
    UnknownStackKind(String),
}

/// Result type using launchpad Error.
pub type Result<T> = std::result::Result<T, Error>;
