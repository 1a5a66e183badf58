// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Transactional entry point.
//!
//! Each command opens its own transaction, runs the manager operation on it
//! and commits. Returning early on error drops the transaction, which rolls
//! back every write the command made.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use runtara_repository::{DeploymentBuilder, NoopDispatcher, RepositoryService};
//!
//! let service = RepositoryService::from_path(".data/repository.db", Arc::new(NoopDispatcher)).await?;
//! let deployment = DeploymentBuilder::new("orders")
//!     .resource("orders.process.json", std::fs::read("orders.process.json")?)
//!     .build();
//! service.deploy(&deployment).await?;
//! service.delete_deployment(&deployment.deployment.id, true).await?;
//! ```

use std::path::Path;
use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::Config;
use crate::deployment::DeploymentManager;
use crate::entities::{Deployment, NewDeployment, ProcessDefinition, Resource};
use crate::error::{Error, Result};
use crate::events::EventDispatcher;
use crate::store::{Collaborators, DeploymentQuery, NativeQuery, Page, sqlite};

/// Pool size used by [`RepositoryService::from_path`].
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Deployment repository backed by a SQLite pool.
#[derive(Clone)]
pub struct RepositoryService {
    pool: SqlitePool,
    manager: DeploymentManager,
}

impl RepositoryService {
    /// Create a service over an already migrated pool.
    pub fn new(pool: SqlitePool, collaborators: Collaborators) -> Self {
        Self {
            pool,
            manager: DeploymentManager::new(collaborators),
        }
    }

    /// Connect using `config` and apply migrations.
    pub async fn from_config(config: &Config, events: Arc<dyn EventDispatcher>) -> Result<Self> {
        let pool = sqlite::connect(&config.database_url, config.max_connections).await?;
        Ok(Self::new(pool, Collaborators::sqlite(events)))
    }

    /// Open (creating if needed) a database file and apply migrations.
    pub async fn from_path(path: impl AsRef<Path>, events: Arc<dyn EventDispatcher>) -> Result<Self> {
        let pool = sqlite::from_path(path, DEFAULT_MAX_CONNECTIONS).await?;
        Ok(Self::new(pool, Collaborators::sqlite(events)))
    }

    /// The underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The deployment manager commands run through.
    pub fn manager(&self) -> &DeploymentManager {
        &self.manager
    }

    /// Persist a deployment and its resources.
    pub async fn insert_deployment(&self, deployment: &NewDeployment) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        self.manager.insert_deployment(&mut *tx, deployment).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Persist a deployment and register its process definitions.
    pub async fn deploy(&self, deployment: &NewDeployment) -> Result<Vec<ProcessDefinition>> {
        let mut tx = self.pool.begin().await?;
        let definitions = self.manager.deploy(&mut *tx, deployment).await?;
        tx.commit().await?;
        Ok(definitions)
    }

    /// Delete a deployment and everything derived from it.
    pub async fn delete_deployment(&self, deployment_id: &str, cascade: bool) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        self.manager
            .delete_deployment(&mut *tx, deployment_id, cascade)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Deployment with the given id, if any.
    pub async fn find_deployment_by_id(&self, deployment_id: &str) -> Result<Option<Deployment>> {
        let mut conn = self.pool.acquire().await?;
        self.manager
            .find_deployment_by_id(&mut *conn, deployment_id)
            .await
    }

    /// Deployment with the given id; fails with [`Error::DeploymentNotFound`].
    pub async fn get_deployment(&self, deployment_id: &str) -> Result<Deployment> {
        self.find_deployment_by_id(deployment_id)
            .await?
            .ok_or_else(|| Error::DeploymentNotFound(deployment_id.to_string()))
    }

    /// Most recently deployed deployment with the given name.
    pub async fn find_latest_deployment_by_name(&self, name: &str) -> Result<Option<Deployment>> {
        let mut conn = self.pool.acquire().await?;
        self.manager
            .find_latest_deployment_by_name(&mut *conn, name)
            .await
    }

    /// Deployments matching `query`, optionally paged.
    pub async fn find_deployments_by_query_criteria(
        &self,
        query: &DeploymentQuery,
        page: Option<Page>,
    ) -> Result<Vec<Deployment>> {
        let mut conn = self.pool.acquire().await?;
        self.manager
            .find_deployments_by_query_criteria(&mut *conn, query, page)
            .await
    }

    /// Number of deployments matching `query`.
    pub async fn find_deployment_count_by_query_criteria(
        &self,
        query: &DeploymentQuery,
    ) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        self.manager
            .find_deployment_count_by_query_criteria(&mut *conn, query)
            .await
    }

    /// Deployments returned by a native `SELECT`.
    pub async fn find_deployments_by_native_query(
        &self,
        query: &NativeQuery,
        page: Page,
    ) -> Result<Vec<Deployment>> {
        let mut conn = self.pool.acquire().await?;
        self.manager
            .find_deployments_by_native_query(&mut *conn, query, page)
            .await
    }

    /// Number of rows returned by a native `SELECT`.
    pub async fn find_deployment_count_by_native_query(&self, query: &NativeQuery) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        self.manager
            .find_deployment_count_by_native_query(&mut *conn, query)
            .await
    }

    /// Names of the resources attached to a deployment.
    pub async fn get_deployment_resource_names(&self, deployment_id: &str) -> Result<Vec<String>> {
        let mut conn = self.pool.acquire().await?;
        self.manager
            .get_deployment_resource_names(&mut *conn, deployment_id)
            .await
    }

    /// A single resource of a deployment.
    pub async fn get_resource(&self, deployment_id: &str, name: &str) -> Result<Option<Resource>> {
        let mut conn = self.pool.acquire().await?;
        self.manager
            .get_resource(&mut *conn, deployment_id, name)
            .await
    }
}
