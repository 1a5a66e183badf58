// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Lifecycle event notification.
//!
//! Dispatch is fire-and-forget: a dispatcher never fails and never blocks the
//! command that raised the event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// Kind of lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineEventType {
    /// An entity was inserted.
    EntityCreated,
    /// An entity was removed.
    EntityDeleted,
    /// A job was canceled before it fired.
    JobCanceled,
    /// A timer job was scheduled.
    TimerScheduled,
}

impl std::fmt::Display for EngineEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineEventType::EntityCreated => write!(f, "ENTITY_CREATED"),
            EngineEventType::EntityDeleted => write!(f, "ENTITY_DELETED"),
            EngineEventType::JobCanceled => write!(f, "JOB_CANCELED"),
            EngineEventType::TimerScheduled => write!(f, "TIMER_SCHEDULED"),
        }
    }
}

/// A lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineEvent {
    /// Event kind.
    pub event_type: EngineEventType,
    /// Id of the entity the event is about.
    pub entity_id: String,
    /// Process definition the event relates to.
    pub process_definition_id: Option<String>,
    /// When the event was raised.
    pub created_at: DateTime<Utc>,
}

impl EngineEvent {
    /// Create an event about `entity_id`.
    pub fn new(event_type: EngineEventType, entity_id: impl Into<String>) -> Self {
        Self {
            event_type,
            entity_id: entity_id.into(),
            process_definition_id: None,
            created_at: Utc::now(),
        }
    }

    /// Attach the process definition the event relates to.
    pub fn with_process_definition(mut self, process_definition_id: impl Into<String>) -> Self {
        self.process_definition_id = Some(process_definition_id.into());
        self
    }
}

/// Publishes lifecycle events to observers.
pub trait EventDispatcher: Send + Sync {
    /// Whether events should be built and dispatched at all.
    fn is_enabled(&self) -> bool;

    /// Publish an event. Delivery failures are swallowed.
    fn dispatch(&self, event: EngineEvent);
}

/// Dispatcher that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDispatcher;

impl EventDispatcher for NoopDispatcher {
    fn is_enabled(&self) -> bool {
        false
    }

    fn dispatch(&self, _event: EngineEvent) {}
}

/// Dispatcher backed by a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastDispatcher {
    sender: broadcast::Sender<EngineEvent>,
    enabled: bool,
}

impl BroadcastDispatcher {
    /// Create a dispatcher whose channel buffers up to `capacity` events per receiver.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            enabled: true,
        }
    }

    /// Enable or disable dispatching.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Subscribe to events dispatched after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }
}

impl EventDispatcher for BroadcastDispatcher {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn dispatch(&self, event: EngineEvent) {
        // No receivers is not an error for fire-and-forget delivery.
        if let Err(e) = self.sender.send(event) {
            trace!(event_type = %e.0.event_type, "Dropped event with no subscribers");
        }
    }
}
