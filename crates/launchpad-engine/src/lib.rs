// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Launchpad Engine - Declarative Resource Provisioning
//!
//! This crate turns declared resources into create/update/delete calls
//! against provider plugins and tracks what exists in per-stack state.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Programs (launchpad orchestrators)                  │
//! │        data plane / mothership / tier  ──►  resource modules            │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                                    │ ctx.register(resource)
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      launchpad-engine (This Crate)                       │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐     │
//! │  │    Stack    │  │   Context   │  │    Diff     │  │  Provider   │     │
//! │  │ up/preview/ │  │  register/  │  │ same/update │  │  Registry   │     │
//! │  │  destroy    │  │ checkpoint  │  │  /replace   │  │             │     │
//! │  └─────────────┘  └─────────────┘  └─────────────┘  └─────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//!           │                                                │
//!           ▼                                                ▼
//! ┌───────────────────────┐                  ┌──────────────────────────────┐
//! │      State Store      │                  │      Provider Plugins        │
//! │  (file / in-memory)   │                  │  (HTTP plugin / in-process)  │
//! └───────────────────────┘                  └──────────────────────────────┘
//! ```
//!
//! # Resource Lifecycle
//!
//! | Step | When | Provider call |
//! |------|------|---------------|
//! | `same` | inputs unchanged | none |
//! | `create` | not in state | `create` |
//! | `update` | non-replace inputs changed | `update` |
//! | `replace` | replace-key input or type changed | `create` + `delete` |
//! | `delete` | in state but not declared | `delete` |
//!
//! Every mutation during `up` is checkpointed to the state store, so a
//! failed run leaves state describing exactly what was applied.
//!
//! # Modules
//!
//! - [`context`]: Per-run stack context used by programs to declare resources
//! - [`diff`]: Input diffing and hashing
//! - [`error`]: Error types for engine operations
//! - [`output`]: Resolved-output contract for module boundaries
//! - [`provider`]: Provider plugin trait, registry and implementations
//! - [`resource`]: Resource declarations and resolved outputs
//! - [`stack`]: Stack driver (up, preview, destroy, refresh)
//! - [`state`]: State snapshots and stores

#![deny(missing_docs)]

/// Per-run stack context.
pub mod context;

/// Input diffing and hashing.
pub mod diff;

/// Error types for engine operations.
pub mod error;

/// Resolved-output contract for module boundaries.
pub mod output;

/// Provider plugins (trait, registry, in-process and HTTP implementations).
pub mod provider;

/// Resource declarations and outputs.
pub mod resource;

/// Stack driver.
pub mod stack;

/// Stack state snapshots and state stores.
pub mod state;

pub use context::{RunMode, StackContext, Step, StepOp};
pub use error::{EngineError, Result};
pub use output::ModuleOutput;
pub use provider::{Provider, ProviderRegistry};
pub use resource::{ProviderRef, Resource, ResourceOutputs};
pub use stack::{PreviewResult, Stack, StackConfig, UpResult, UpdateSummary};
pub use state::{FileStateStore, MemoryStateStore, StateStore};
