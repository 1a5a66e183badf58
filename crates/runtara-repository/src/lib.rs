// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Runtara Repository - Deployment Lifecycle Management
//!
//! This crate stores deployments (versioned bundles of process definitions and
//! resources) and removes them again together with everything derived from
//! them: process definitions, timer-start jobs, message subscriptions,
//! identity links and, on request, running process instances.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                 RepositoryService (one transaction per command)   │
//! └───────────────────────────────────────────────────────────────────┘
//!                                  │
//!                                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        DeploymentManager                          │
//! │   insert / deploy  │  cascading delete  │  version fallback       │
//! └───────────────────────────────────────────────────────────────────┘
//!                                  │ &mut SqliteConnection
//!                                  ▼
//! ┌─────────────┐ ┌───────────┐ ┌─────────────┐ ┌──────┐ ┌───────────────┐
//! │ Deployments │ │ Resources │ │ Definitions │ │ Jobs │ │ Subscriptions │ ...
//! └─────────────┘ └───────────┘ └─────────────┘ └──────┘ └───────────────┘
//!                                  │
//!                                  ▼
//!                               SQLite
//! ```
//!
//! # Delete Cascade
//!
//! | Step | Effect |
//! |------|--------|
//! | 1 | Resolve the deployment's process definitions |
//! | 2 | Unlink models that reference the deployment |
//! | 3 | With `cascade`, terminate running instances ("deleted deployment") |
//! | 4 | Delete identity links and event subscriptions of every type |
//! | 5 | Delete the process definitions |
//! | 6 | Cancel timer-start jobs; restore the previous version's timer |
//! | 7 | Delete resources |
//! | 8 | Delete the deployment row |
//!
//! # Configuration
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `RUNTARA_REPOSITORY_DATABASE_URL` | Yes* | - | SQLite connection URL |
//! | `RUNTARA_DATABASE_URL` | Yes* | - | Fallback if above not set |
//! | `RUNTARA_REPOSITORY_MAX_CONNECTIONS` | No | `5` | Pool size |
//! | `RUNTARA_EVENT_DISPATCH_ENABLED` | No | `true` | Publish lifecycle events |
//! | `RUNTARA_EVENT_CHANNEL_CAPACITY` | No | `256` | Broadcast channel capacity |
//!
//! # Modules
//!
//! - [`config`]: Configuration from environment variables
//! - [`deployment`]: Deployment manager
//! - [`entities`]: Persisted entity types
//! - [`error`]: Error types
//! - [`events`]: Lifecycle event dispatch
//! - [`migrations`]: Embedded SQLite migrations
//! - [`process_model`]: Parsed process structure
//! - [`service`]: Transactional entry point
//! - [`store`]: Collaborator interfaces and SQLite implementations
//! - [`timer`]: Timer-start job construction

#![deny(missing_docs)]

/// Embedded SQLite migrations.
pub mod migrations;

/// Configuration loaded from environment variables.
pub mod config;

/// Deployment insertion and cascading deletion.
pub mod deployment;

/// Persisted entity types.
pub mod entities;

/// Error types for repository operations.
pub mod error;

/// Lifecycle event dispatch.
pub mod events;

/// Parsed process structure stored with each process definition.
pub mod process_model;

/// Transactional entry point over a SQLite pool.
pub mod service;

/// Collaborator interfaces and their SQLite implementations.
pub mod store;

/// Timer-start job construction.
pub mod timer;

pub use config::Config;
pub use deployment::DeploymentManager;
pub use entities::{Deployment, DeploymentBuilder, NewDeployment, ProcessDefinition};
pub use error::{Error, Result};
pub use events::{BroadcastDispatcher, EngineEvent, EngineEventType, EventDispatcher, NoopDispatcher};
pub use service::RepositoryService;
pub use store::{Collaborators, DeploymentQuery, NativeQuery, Page};
