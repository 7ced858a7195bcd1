// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Launchpad - Plane / Tier Provisioning
//!
//! Declares the cloud infrastructure of the multi-tenant plane / tier
//! topology on top of [`launchpad_engine`] and records deployed stacks in
//! the mothership database.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                        launchpad CLI (main.rs)                       │
//! │      plane | mothership | tier | stacks | outputs | refresh | sync   │
//! └──────────────────────────────────────────────────────────────────────┘
//!                 │                                        │
//!                 ▼                                        ▼
//! ┌────────────────────────────────┐        ┌─────────────────────────────┐
//! │  launch (stack drivers)        │        │  mothership (DB updater)    │
//! │  validate, name, plugins, run  │        │  jsonpath, upserts          │
//! └────────────────────────────────┘        └─────────────────────────────┘
//!                 │                                        │
//!                 ▼                                        ▼
//! ┌────────────────────────────────┐        ┌─────────────────────────────┐
//! │  orchestrator                  │        │         PostgreSQL          │
//! │  data_plane, mothership, tier  │        │  customer, data_plane, tier │
//! └────────────────────────────────┘        └─────────────────────────────┘
//!                 │
//!                 ▼
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  modules: account vpc eks iam aurora elasticache msk milvus nitrous  │
//! │           redis ingress cert telemetry prometheus k8s                │
//! └──────────────────────────────────────────────────────────────────────┘
//!                 │
//!                 ▼
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  launchpad-engine: stack context, diff, state, provider plugins      │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Stacks
//!
//! | Stack | Configuration | Outputs |
//! |-------|---------------|---------|
//! | `plane-{planeId}` | [`conf::DataPlaneConf`] | [`orchestrator::data_plane::PlaneOutput`] |
//! | `mothership-{mothershipId}` | [`conf::MothershipConf`] | [`orchestrator::mothership::MothershipOutput`] |
//! | `tier-{tierId}` | [`conf::TierConf`] | [`orchestrator::tier::TierOutput`] |
//!
//! A tier reads the outputs of its plane stack, so planes are deployed
//! first.
//!
//! # Configuration
//!
//! Process settings come from environment variables (see [`config::Config`]);
//! stack settings come from JSON files with camelCase keys (see [`conf`]).
//! Every configuration record is validated before a stack is opened.

#![deny(missing_docs)]

pub mod conf;
pub mod config;
pub mod error;
pub mod launch;
pub mod modules;
pub mod mothership;
pub mod orchestrator;

pub use config::{Config, ConfigError};
pub use error::{Error, Result};
pub use launch::{Action, LaunchReport, Launcher, StackKind};
pub use mothership::MothershipDb;
