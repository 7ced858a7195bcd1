// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Provider plugins - resource CRUD backends.

pub mod http;
pub mod mock;
mod registry;
mod traits;

pub use http::HttpProvider;
pub use mock::{MockCall, MockProvider};
pub use registry::ProviderRegistry;
pub use traits::*;
