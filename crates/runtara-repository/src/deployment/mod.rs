// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Deployment lifecycle: insertion, process definition registration and the
//! cascading delete with version fallback.

mod deployer;
mod fallback;
mod manager;
mod start_triggers;

pub use deployer::{PROCESS_RESOURCE_SUFFIX, is_process_resource};
pub use manager::DeploymentManager;
