// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Collaborator interfaces used by the deployment manager.
//!
//! Every operation takes the connection of the command's transaction, so all
//! reads and writes issued by one command commit or roll back together. The
//! SQLite implementations live in [`sqlite`].

pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;

use crate::entities::{
    Deployment, EventSubscription, IdentityLink, Job, Model, NewProcessDefinition,
    ProcessDefinition, ProcessInstance, Resource, TimerJob,
};
use crate::error::Result;
use crate::events::EventDispatcher;
use crate::process_model::ProcessModel;

/// Connection every collaborator operation runs on.
pub type Connection = sqlx::SqliteConnection;

/// Pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Zero-based index of the first row.
    pub first_result: i64,
    /// Maximum number of rows.
    pub max_results: i64,
}

impl Page {
    /// Create a page.
    pub fn new(first_result: i64, max_results: i64) -> Self {
        Self {
            first_result,
            max_results,
        }
    }
}

/// Sort order for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Ascending (default).
    #[default]
    Asc,
    /// Descending.
    Desc,
}

/// Column a deployment query is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentOrderBy {
    /// Deployment id.
    Id,
    /// Deployment name.
    Name,
    /// Deploy time.
    DeployTime,
    /// Tenant id.
    TenantId,
}

/// Criteria for listing and counting deployments.
///
/// Unset fields do not constrain the result.
#[derive(Debug, Clone, Default)]
pub struct DeploymentQuery {
    /// Exact deployment id.
    pub deployment_id: Option<String>,
    /// Exact name.
    pub name: Option<String>,
    /// SQL `LIKE` pattern on the name.
    pub name_like: Option<String>,
    /// Exact category.
    pub category: Option<String>,
    /// Category differs from this value (deployments without category match).
    pub category_not_equals: Option<String>,
    /// Exact tenant id.
    pub tenant_id: Option<String>,
    /// SQL `LIKE` pattern on the tenant id.
    pub tenant_id_like: Option<String>,
    /// Only deployments without a tenant.
    pub without_tenant_id: bool,
    /// Only deployments containing a process definition with this key.
    pub process_definition_key: Option<String>,
    /// Ordering; defaults to id ascending.
    pub order_by: Option<(DeploymentOrderBy, SortOrder)>,
}

/// A raw, read-only query against the `deployments` table.
///
/// Parameters bind positionally to `?` placeholders.
#[derive(Debug, Clone, Default)]
pub struct NativeQuery {
    /// `SELECT` statement.
    pub sql: String,
    /// Positional parameters.
    pub parameters: Vec<serde_json::Value>,
}

impl NativeQuery {
    /// Create a native query without parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            parameters: Vec::new(),
        }
    }

    /// Append a positional parameter.
    pub fn parameter(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.push(value.into());
        self
    }
}

/// Deployment rows.
#[allow(missing_docs)]
#[async_trait]
pub trait DeploymentStore: Send + Sync {
    async fn insert(&self, conn: &mut Connection, deployment: &Deployment) -> Result<()>;

    /// Delete the row; returns false when no row matched.
    async fn delete(&self, conn: &mut Connection, deployment_id: &str) -> Result<bool>;

    async fn find_by_id(
        &self,
        conn: &mut Connection,
        deployment_id: &str,
    ) -> Result<Option<Deployment>>;

    /// Most recently deployed deployment with this name.
    async fn find_latest_by_name(
        &self,
        conn: &mut Connection,
        name: &str,
    ) -> Result<Option<Deployment>>;

    async fn find_by_query_criteria(
        &self,
        conn: &mut Connection,
        query: &DeploymentQuery,
        page: Option<Page>,
    ) -> Result<Vec<Deployment>>;

    async fn count_by_query_criteria(
        &self,
        conn: &mut Connection,
        query: &DeploymentQuery,
    ) -> Result<i64>;

    async fn find_by_native_query(
        &self,
        conn: &mut Connection,
        query: &NativeQuery,
        page: Page,
    ) -> Result<Vec<Deployment>>;

    async fn count_by_native_query(&self, conn: &mut Connection, query: &NativeQuery)
    -> Result<i64>;
}

/// Resources attached to deployments.
#[allow(missing_docs)]
#[async_trait]
pub trait ResourceRepository: Send + Sync {
    async fn insert(&self, conn: &mut Connection, resource: &Resource) -> Result<()>;

    async fn find_by_deployment_id(
        &self,
        conn: &mut Connection,
        deployment_id: &str,
    ) -> Result<Vec<Resource>>;

    async fn find_by_deployment_id_and_name(
        &self,
        conn: &mut Connection,
        deployment_id: &str,
        name: &str,
    ) -> Result<Option<Resource>>;

    async fn find_names_by_deployment_id(
        &self,
        conn: &mut Connection,
        deployment_id: &str,
    ) -> Result<Vec<String>>;

    async fn delete_by_deployment_id(&self, conn: &mut Connection, deployment_id: &str)
    -> Result<u64>;
}

/// Editor models.
#[allow(missing_docs)]
#[async_trait]
pub trait ModelStore: Send + Sync {
    async fn insert(&self, conn: &mut Connection, model: &Model) -> Result<()>;

    async fn update(&self, conn: &mut Connection, model: &Model) -> Result<()>;

    async fn find_by_id(&self, conn: &mut Connection, model_id: &str) -> Result<Option<Model>>;

    async fn find_by_deployment_id(
        &self,
        conn: &mut Connection,
        deployment_id: &str,
    ) -> Result<Vec<Model>>;
}

/// Versioned process definitions and their parsed models.
///
/// Lookups scoped by `tenant` select definitions of that tenant when `Some`,
/// and definitions without a tenant when `None`.
#[allow(missing_docs)]
#[async_trait]
pub trait ProcessDefinitionDirectory: Send + Sync {
    /// Register a definition as the next version of its (key, tenant).
    async fn insert(
        &self,
        conn: &mut Connection,
        definition: &NewProcessDefinition,
    ) -> Result<ProcessDefinition>;

    async fn find_by_id(
        &self,
        conn: &mut Connection,
        definition_id: &str,
    ) -> Result<Option<ProcessDefinition>>;

    /// Definitions of a deployment, ordered by key then version.
    async fn find_by_deployment_id(
        &self,
        conn: &mut Connection,
        deployment_id: &str,
    ) -> Result<Vec<ProcessDefinition>>;

    async fn find_latest_by_key(
        &self,
        conn: &mut Connection,
        key: &str,
        tenant: Option<&str>,
    ) -> Result<Option<ProcessDefinition>>;

    async fn find_by_key_and_version(
        &self,
        conn: &mut Connection,
        key: &str,
        version: i32,
        tenant: Option<&str>,
    ) -> Result<Option<ProcessDefinition>>;

    /// Parsed process of a definition; `None` when the definition or its model is missing.
    async fn get_process_model(
        &self,
        conn: &mut Connection,
        definition_id: &str,
    ) -> Result<Option<ProcessModel>>;

    async fn delete_by_deployment_id(&self, conn: &mut Connection, deployment_id: &str)
    -> Result<u64>;
}

/// Asynchronous jobs.
#[allow(missing_docs)]
#[async_trait]
pub trait JobRegistry: Send + Sync {
    async fn find_by_id(&self, conn: &mut Connection, job_id: &str) -> Result<Option<Job>>;

    async fn find_by_type_and_process_definition_id(
        &self,
        conn: &mut Connection,
        handler_type: &str,
        process_definition_id: &str,
    ) -> Result<Vec<Job>>;

    /// Persist a timer so the executor picks it up when due.
    async fn schedule(&self, conn: &mut Connection, timer: &TimerJob) -> Result<Job>;

    async fn delete(&self, conn: &mut Connection, job: &Job) -> Result<()>;
}

/// Message and signal subscriptions.
#[allow(missing_docs)]
#[async_trait]
pub trait EventSubscriptionRegistry: Send + Sync {
    async fn insert(&self, conn: &mut Connection, subscription: &EventSubscription) -> Result<()>;

    /// Subscriptions of `event_type` whose configuration equals `configuration`
    /// within `tenant_id`.
    async fn find_by_configuration(
        &self,
        conn: &mut Connection,
        event_type: &str,
        configuration: &str,
        tenant_id: &str,
    ) -> Result<Vec<EventSubscription>>;

    async fn delete(&self, conn: &mut Connection, subscription: &EventSubscription) -> Result<()>;

    /// Delete every subscription, of any event type, configured for
    /// `process_definition_id` within `tenant_id`.
    async fn delete_by_process_definition(
        &self,
        conn: &mut Connection,
        process_definition_id: &str,
        tenant_id: &str,
    ) -> Result<u64>;
}

/// Authorization links of process definitions.
#[allow(missing_docs)]
#[async_trait]
pub trait IdentityLinkStore: Send + Sync {
    async fn insert(&self, conn: &mut Connection, link: &IdentityLink) -> Result<()>;

    async fn find_by_process_definition(
        &self,
        conn: &mut Connection,
        process_definition_id: &str,
    ) -> Result<Vec<IdentityLink>>;

    async fn delete_by_process_definition(
        &self,
        conn: &mut Connection,
        process_definition_id: &str,
    ) -> Result<u64>;
}

/// Process instance lifecycle as far as undeployment needs it.
#[allow(missing_docs)]
#[async_trait]
pub trait ProcessInstanceManager: Send + Sync {
    async fn insert(&self, conn: &mut Connection, instance: &ProcessInstance) -> Result<()>;

    async fn find_by_id(
        &self,
        conn: &mut Connection,
        instance_id: &str,
    ) -> Result<Option<ProcessInstance>>;

    /// Terminate every running instance of a definition with `reason`.
    ///
    /// With `cascade`, running sub-process instances started by the
    /// terminated instances are terminated as well. Returns the number of
    /// instances terminated.
    async fn delete_all_by_process_definition(
        &self,
        conn: &mut Connection,
        process_definition_id: &str,
        reason: &str,
        cascade: bool,
    ) -> Result<u64>;
}

/// The collaborators a deployment manager works against.
#[derive(Clone)]
pub struct Collaborators {
    /// Deployment rows.
    pub deployments: Arc<dyn DeploymentStore>,
    /// Deployment resources.
    pub resources: Arc<dyn ResourceRepository>,
    /// Editor models.
    pub models: Arc<dyn ModelStore>,
    /// Process definition directory.
    pub process_definitions: Arc<dyn ProcessDefinitionDirectory>,
    /// Job registry.
    pub jobs: Arc<dyn JobRegistry>,
    /// Event subscription registry.
    pub event_subscriptions: Arc<dyn EventSubscriptionRegistry>,
    /// Identity links.
    pub identity_links: Arc<dyn IdentityLinkStore>,
    /// Process instances.
    pub process_instances: Arc<dyn ProcessInstanceManager>,
    /// Lifecycle event bus.
    pub events: Arc<dyn EventDispatcher>,
}

impl Collaborators {
    /// SQLite-backed collaborators publishing to `events`.
    pub fn sqlite(events: Arc<dyn EventDispatcher>) -> Self {
        Self {
            deployments: Arc::new(sqlite::SqliteDeploymentStore),
            resources: Arc::new(sqlite::SqliteResourceRepository),
            models: Arc::new(sqlite::SqliteModelStore),
            process_definitions: Arc::new(sqlite::SqliteProcessDefinitionDirectory),
            jobs: Arc::new(sqlite::SqliteJobRegistry),
            event_subscriptions: Arc::new(sqlite::SqliteEventSubscriptionRegistry),
            identity_links: Arc::new(sqlite::SqliteIdentityLinkStore),
            process_instances: Arc::new(sqlite::SqliteProcessInstanceManager),
            events,
        }
    }
}
