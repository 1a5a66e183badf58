// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Parsed process model stored alongside each process definition.
//!
//! Parsing process XML is done by the deployer; the repository only keeps the
//! parsed structure (as JSON) so start-event metadata can be read back when a
//! timer-start trigger has to be re-created.

use serde::{Deserialize, Serialize};

/// A parsed process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessModel {
    /// Process id from the source document.
    pub id: String,
    /// Optional process name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Flow elements in document order.
    #[serde(default)]
    pub flow_elements: Vec<FlowElement>,
}

/// An element of the process graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowElement {
    /// Start event.
    StartEvent(StartEvent),
    /// Task or sub-process.
    Activity {
        /// Element id.
        id: String,
        /// Optional element name.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// Connection between two elements.
    SequenceFlow {
        /// Element id.
        id: String,
        /// Source element id.
        source_ref: String,
        /// Target element id.
        target_ref: String,
    },
    /// End event.
    EndEvent {
        /// Element id.
        id: String,
    },
}

/// A start event and the event definitions that trigger it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartEvent {
    /// Element id.
    pub id: String,
    /// Optional element name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Trigger definitions; empty for a plain (none) start event.
    #[serde(default)]
    pub event_definitions: Vec<EventDefinition>,
}

/// Trigger attached to an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventDefinition {
    /// Timer trigger.
    Timer(TimerEventDefinition),
    /// Message trigger.
    Message {
        /// Referenced message name.
        message_ref: String,
    },
    /// Signal trigger.
    Signal {
        /// Referenced signal name.
        signal_ref: String,
    },
    /// Error trigger.
    Error {
        /// Referenced error code.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_code: Option<String>,
    },
    /// Conditional trigger.
    Conditional {
        /// Condition expression.
        condition: String,
    },
}

/// Timer configuration. Exactly one of date, duration or cycle is expected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerEventDefinition {
    /// Absolute fire date (ISO-8601).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_date: Option<String>,
    /// Relative delay (ISO-8601 duration).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_duration: Option<String>,
    /// Repeating interval (`R[n]/[start/]duration`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_cycle: Option<String>,
    /// Date after which a cyclic timer stops firing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

impl ProcessModel {
    /// All start events in document order.
    pub fn start_events(&self) -> impl Iterator<Item = &StartEvent> {
        self.flow_elements.iter().filter_map(|element| match element {
            FlowElement::StartEvent(start) => Some(start),
            _ => None,
        })
    }

    /// The first start event that owns at least one event definition, paired
    /// with that event's first definition.
    ///
    /// Later start events and later definitions on the same event are never
    /// considered.
    pub fn first_start_event_definition(&self) -> Option<(&StartEvent, &EventDefinition)> {
        self.start_events()
            .find_map(|start| start.event_definitions.first().map(|def| (start, def)))
    }
}
