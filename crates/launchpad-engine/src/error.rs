// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for launchpad-engine.

use thiserror::Error;

use crate::provider::ProviderError;
use crate::state::StateError;

/// Engine errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// A provider plugin call failed.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Reading or writing stack state failed.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No provider plugin is installed for the package.
    #[error("Provider plugin not installed: {0}")]
    ProviderNotInstalled(String),

    /// The type token is not of the form `package:module:Kind`.
    #[error("Invalid type token: {0}")]
    InvalidTypeToken(String),

    /// A resource was declared with a provider of another package.
    #[error("Resource {resource} of package {expected} cannot use provider {provider}")]
    ProviderMismatch {
        /// Resource name.
        resource: String,
        /// Package of the resource type.
        expected: String,
        /// Name of the provider reference.
        provider: String,
    },

    /// Two resources in one run share a name.
    #[error("Duplicate resource name: {0}")]
    DuplicateResource(String),

    /// A resource depends on a resource that has not been registered.
    #[error("Resource {resource} depends on unknown resource {dependency}")]
    UnknownDependency {
        /// Declaring resource.
        resource: String,
        /// Missing dependency.
        dependency: String,
    },

    /// A protected resource would have been deleted or replaced.
    #[error("Resource {0} is protected and cannot be deleted")]
    Protected(String),

    /// The provider rejected the resource inputs.
    #[error("Input validation failed for {resource}: {}", failures.join("; "))]
    CheckFailed {
        /// Resource name.
        resource: String,
        /// Failure messages from the provider.
        failures: Vec<String>,
    },

    /// A resource output was requested that the provider did not return.
    #[error("Resource {resource} has no output {key}")]
    MissingOutput {
        /// Resource name.
        resource: String,
        /// Output key.
        key: String,
    },

    /// A resource output has an unexpected JSON type.
    #[error("Output {key} of resource {resource} is not {expected}")]
    OutputType {
        /// Resource name.
        resource: String,
        /// Output key.
        key: String,
        /// Expected type description.
        expected: &'static str,
    },

    /// A provider returned an unknown value outside of preview.
    #[error("Resource {resource} returned unresolved output at {path}")]
    UnresolvedOutput {
        /// Resource name.
        resource: String,
        /// JSON path of the unresolved value.
        path: String,
    },

    /// Stack outputs contained an unresolved value.
    #[error("Stack outputs contain an unresolved value at {0}")]
    UnresolvedStackOutput(String),

    /// The referenced stack has no state.
    #[error("Stack not found: {0}")]
    StackNotFound(String),

    /// A required stack configuration key is missing.
    #[error("Missing required config key: {0}")]
    MissingConfig(String),

    /// The program declaring resources failed.
    #[error("Program failed: {0}")]
    Program(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Result type using EngineError.
pub type Result<T> = std::result::Result<T, EngineError>;
