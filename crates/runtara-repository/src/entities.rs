// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Entity types persisted by the repository.
//!
//! Deployments own their resources and process definitions. Jobs, event
//! subscriptions and identity links hang off a process definition but live in
//! their own registries. Models only point back at the deployment they
//! produced.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::process_model::ProcessModel;

/// Tenant id used for entities that belong to no tenant.
pub const NO_TENANT_ID: &str = "";

/// Handler type of jobs that start a process instance when their timer fires.
pub const TIMER_START_EVENT_HANDLER: &str = "timer-start-event";

/// Event type of message start/catch subscriptions.
pub const MESSAGE_EVENT_TYPE: &str = "message";

/// Event type of signal subscriptions.
pub const SIGNAL_EVENT_TYPE: &str = "signal";

/// Termination reason recorded on instances removed together with their deployment.
pub const DELETED_DEPLOYMENT_REASON: &str = "deleted deployment";

/// Map a stored tenant id to the tenant filter used by directory lookups.
///
/// Returns `None` for the no-tenant sentinel, which selects entities without
/// a tenant.
pub fn tenant_scope(tenant_id: &str) -> Option<&str> {
    if tenant_id == NO_TENANT_ID {
        None
    } else {
        Some(tenant_id)
    }
}

/// A persisted deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Deployment {
    /// Globally unique deployment id.
    pub id: String,
    /// Human-readable name.
    pub name: Option<String>,
    /// Optional category.
    pub category: Option<String>,
    /// Optional business key.
    #[sqlx(rename = "deployment_key")]
    pub key: Option<String>,
    /// Owning tenant, or [`NO_TENANT_ID`].
    pub tenant_id: String,
    /// When the deployment was created.
    pub deploy_time: DateTime<Utc>,
}

/// A deployment that has not been persisted yet, with its resources attached.
#[derive(Debug, Clone)]
pub struct NewDeployment {
    /// The deployment row.
    pub deployment: Deployment,
    /// Resource name to resource content.
    pub resources: BTreeMap<String, Vec<u8>>,
}

/// Builder for [`NewDeployment`].
pub struct DeploymentBuilder {
    id: Option<String>,
    name: Option<String>,
    category: Option<String>,
    key: Option<String>,
    tenant_id: String,
    resources: BTreeMap<String, Vec<u8>>,
}

impl DeploymentBuilder {
    /// Create a new deployment builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
            category: None,
            key: None,
            tenant_id: NO_TENANT_ID.to_string(),
            resources: BTreeMap::new(),
        }
    }

    /// Set custom deployment ID (defaults to UUID if not set)
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set category
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set business key
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set tenant
    pub fn tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = tenant_id.into();
        self
    }

    /// Attach a resource; a later resource with the same name replaces the earlier one.
    pub fn resource(mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.resources.insert(name.into(), bytes.into());
        self
    }

    /// Build the deployment
    pub fn build(self) -> NewDeployment {
        NewDeployment {
            deployment: Deployment {
                id: self.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                name: self.name,
                category: self.category,
                key: self.key,
                tenant_id: self.tenant_id,
                deploy_time: Utc::now(),
            },
            resources: self.resources,
        }
    }
}

/// A resource attached to a deployment.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Resource {
    /// Resource id.
    pub id: String,
    /// Owning deployment.
    pub deployment_id: String,
    /// Resource name, unique within the deployment.
    pub name: String,
    /// Raw content.
    pub bytes: Vec<u8>,
    /// Whether the resource was generated by the engine rather than uploaded.
    pub generated: bool,
}

/// One versioned process definition belonging to a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProcessDefinition {
    /// Definition id (`key:version:uuid`).
    pub id: String,
    /// Process key shared by all versions.
    #[sqlx(rename = "definition_key")]
    pub key: String,
    /// Human-readable name.
    pub name: Option<String>,
    /// Version, monotonic per (key, tenant).
    pub version: i32,
    /// Owning tenant, or [`NO_TENANT_ID`].
    pub tenant_id: String,
    /// Owning deployment.
    pub deployment_id: String,
    /// Resource the definition was parsed from.
    pub resource_name: Option<String>,
    /// When the definition was registered.
    pub created_at: DateTime<Utc>,
}

/// A process definition that has not been registered yet.
///
/// The directory assigns the id and the next version for (key, tenant).
#[derive(Debug, Clone)]
pub struct NewProcessDefinition {
    /// Process key shared by all versions.
    pub key: String,
    /// Human-readable name.
    pub name: Option<String>,
    /// Owning tenant, or [`NO_TENANT_ID`].
    pub tenant_id: String,
    /// Owning deployment.
    pub deployment_id: String,
    /// Resource the definition was parsed from.
    pub resource_name: Option<String>,
    /// Parsed process.
    pub process_model: ProcessModel,
}

/// A model (editor source artifact) that may reference the deployment it produced.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Model {
    /// Model id.
    pub id: String,
    /// Model name.
    pub name: String,
    /// Optional model key.
    #[sqlx(rename = "model_key")]
    pub key: Option<String>,
    /// Optional category.
    pub category: Option<String>,
    /// Model revision.
    pub version: i32,
    /// Deployment produced from this model, if any.
    pub deployment_id: Option<String>,
    /// Owning tenant, or [`NO_TENANT_ID`].
    pub tenant_id: String,
    /// When the model was created.
    pub created_at: DateTime<Utc>,
    /// When the model was last updated.
    pub last_updated_at: DateTime<Utc>,
}

impl Model {
    /// Create a new, unsaved model.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            key: None,
            category: None,
            version: 1,
            deployment_id: None,
            tenant_id: NO_TENANT_ID.to_string(),
            created_at: now,
            last_updated_at: now,
        }
    }
}

/// Kind of asynchronous job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    /// Job fired at a due date.
    #[default]
    Timer,
    /// Job executed as soon as possible.
    Message,
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobType::Timer => write!(f, "timer"),
            JobType::Message => write!(f, "message"),
        }
    }
}

impl std::str::FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "timer" => Ok(JobType::Timer),
            "message" => Ok(JobType::Message),
            _ => Err(format!("Unknown job type: {}", s)),
        }
    }
}

/// A persisted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Job id.
    pub id: String,
    /// Timer or message job.
    pub job_type: JobType,
    /// Handler that executes the job (e.g. [`TIMER_START_EVENT_HANDLER`]).
    pub handler_type: String,
    /// Handler-specific configuration (JSON).
    pub handler_configuration: Option<String>,
    /// Process definition the job belongs to.
    pub process_definition_id: Option<String>,
    /// Process instance the job belongs to, if instance-scoped.
    pub process_instance_id: Option<String>,
    /// Owning tenant, or [`NO_TENANT_ID`].
    pub tenant_id: String,
    /// When the job becomes due.
    pub due_date: Option<DateTime<Utc>>,
    /// Repeat expression for cyclic timers.
    pub repeat: Option<String>,
    /// Maximum number of firings for cyclic timers.
    pub max_iterations: Option<i32>,
    /// Date after which the timer no longer fires.
    pub end_date: Option<DateTime<Utc>>,
    /// Remaining retries.
    pub retries: i32,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
}

/// A timer job that has not been scheduled yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerJob {
    /// Handler that executes the job.
    pub handler_type: String,
    /// Handler-specific configuration (JSON).
    pub handler_configuration: Option<String>,
    /// Process definition the timer is bound to.
    pub process_definition_id: Option<String>,
    /// Process instance the timer is bound to.
    pub process_instance_id: Option<String>,
    /// Owning tenant, or [`NO_TENANT_ID`].
    pub tenant_id: String,
    /// When the timer first fires.
    pub due_date: DateTime<Utc>,
    /// Repeat expression for cyclic timers.
    pub repeat: Option<String>,
    /// Maximum number of firings for cyclic timers.
    pub max_iterations: Option<i32>,
    /// Date after which the timer no longer fires.
    pub end_date: Option<DateTime<Utc>>,
}

/// A message or signal subscription.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct EventSubscription {
    /// Subscription id.
    pub id: String,
    /// Subscription kind ([`MESSAGE_EVENT_TYPE`] or [`SIGNAL_EVENT_TYPE`]).
    pub event_type: String,
    /// Message or signal name.
    pub event_name: Option<String>,
    /// Process definition id for start-event subscriptions.
    pub configuration: Option<String>,
    /// Activity that subscribed.
    pub activity_id: Option<String>,
    /// Process instance for catch-event subscriptions.
    pub process_instance_id: Option<String>,
    /// Owning tenant, or [`NO_TENANT_ID`].
    pub tenant_id: String,
    /// When the subscription was created.
    pub created_at: DateTime<Utc>,
}

/// Authorization link between a process definition and a user or group.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct IdentityLink {
    /// Link id.
    pub id: String,
    /// Process definition the link authorizes.
    pub process_definition_id: String,
    /// Link kind (e.g. `candidate`).
    pub link_type: String,
    /// Linked user.
    pub user_id: Option<String>,
    /// Linked group.
    pub group_id: Option<String>,
    /// When the link was created.
    pub created_at: DateTime<Utc>,
}

/// Process instance status values stored in the `status` column.
pub mod instance_status {
    /// Instance is executing.
    pub const RUNNING: &str = "running";
    /// Instance finished normally.
    pub const COMPLETED: &str = "completed";
    /// Instance was terminated before completion.
    pub const CANCELLED: &str = "cancelled";
}

/// A process instance started from a process definition.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ProcessInstance {
    /// Instance id.
    pub id: String,
    /// Definition the instance runs.
    pub process_definition_id: String,
    /// Parent instance for call-activity sub-processes.
    pub super_instance_id: Option<String>,
    /// Optional business key.
    pub business_key: Option<String>,
    /// Owning tenant, or [`NO_TENANT_ID`].
    pub tenant_id: String,
    /// Current status (see [`instance_status`]).
    pub status: String,
    /// When the instance started.
    pub started_at: DateTime<Utc>,
    /// When the instance finished or was terminated.
    pub finished_at: Option<DateTime<Utc>>,
    /// Why the instance was terminated.
    pub termination_reason: Option<String>,
}
