// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite implementations of the collaborator interfaces.
//!
//! All implementations are stateless; the connection passed to each call
//! carries the transaction.

mod deployments;
mod event_subscriptions;
mod identity_links;
mod jobs;
mod models;
mod process_definitions;
mod process_instances;
mod resources;

use std::path::Path;

use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::info;

pub use deployments::SqliteDeploymentStore;
pub use event_subscriptions::SqliteEventSubscriptionRegistry;
pub use identity_links::SqliteIdentityLinkStore;
pub use jobs::SqliteJobRegistry;
pub use models::SqliteModelStore;
pub use process_definitions::SqliteProcessDefinitionDirectory;
pub use process_instances::SqliteProcessInstanceManager;
pub use resources::SqliteResourceRepository;

use crate::error::Result;
use crate::migrations;

/// Connect to `database_url` and apply pending migrations.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    migrations::run_sqlite(&pool).await?;
    info!("Repository migrations applied");

    Ok(pool)
}

/// Open (creating if needed) a database file and apply pending migrations.
///
/// Parent directories are created as needed.
pub async fn from_path(path: impl AsRef<Path>, max_connections: u32) -> Result<SqlitePool> {
    let path = path.as_ref();

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let url = format!("sqlite:{}?mode=rwc", path.to_string_lossy());
    connect(&url, max_connections).await
}

/// In-memory pool with migrations applied.
#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory SQLite pool");

    migrations::run_sqlite(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}
