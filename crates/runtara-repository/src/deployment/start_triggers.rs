// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Timer-start jobs and message-start subscriptions of process definitions.

use chrono::Utc;
use tracing::{debug, info};

use crate::entities::{
    EventSubscription, Job, MESSAGE_EVENT_TYPE, ProcessDefinition, TIMER_START_EVENT_HANDLER,
};
use crate::error::Result;
use crate::events::{EngineEvent, EngineEventType, EventDispatcher};
use crate::process_model::{EventDefinition, ProcessModel};
use crate::store::{Collaborators, Connection};
use crate::timer;

/// Build and dispatch an event only when the dispatcher is enabled.
pub(super) fn notify(events: &dyn EventDispatcher, build: impl FnOnce() -> EngineEvent) {
    if events.is_enabled() {
        events.dispatch(build());
    }
}

/// Cancel every timer-start job of `definition`.
///
/// Each job is announced as canceled before its row is deleted.
pub(super) async fn cancel_timer_start_jobs(
    collaborators: &Collaborators,
    conn: &mut Connection,
    definition: &ProcessDefinition,
) -> Result<usize> {
    let jobs = collaborators
        .jobs
        .find_by_type_and_process_definition_id(conn, TIMER_START_EVENT_HANDLER, &definition.id)
        .await?;

    for job in &jobs {
        notify(collaborators.events.as_ref(), || {
            EngineEvent::new(EngineEventType::JobCanceled, &job.id)
                .with_process_definition(&definition.id)
        });
        collaborators.jobs.delete(conn, job).await?;
        debug!(
            job_id = %job.id,
            process_definition_id = %definition.id,
            "Canceled timer-start job"
        );
    }

    Ok(jobs.len())
}

/// Schedule the timer-start job of `definition` if its process starts on a timer.
///
/// Only the first start event that has event definitions is considered, and
/// only its first definition. Returns `None` when that definition is not a
/// timer or the timer yields no due date.
pub(super) async fn schedule_timer_start(
    collaborators: &Collaborators,
    conn: &mut Connection,
    definition: &ProcessDefinition,
    model: &ProcessModel,
) -> Result<Option<Job>> {
    let Some((start_event, event_definition)) = model.first_start_event_definition() else {
        return Ok(None);
    };

    let timer_definition = match event_definition {
        EventDefinition::Timer(timer_definition) => timer_definition,
        EventDefinition::Message { .. }
        | EventDefinition::Signal { .. }
        | EventDefinition::Error { .. }
        | EventDefinition::Conditional { .. } => return Ok(None),
    };

    let Some(mut timer_job) = timer::timer_start_job(timer_definition, &start_event.id, Utc::now())
    else {
        return Ok(None);
    };
    timer_job.process_definition_id = Some(definition.id.clone());
    timer_job.tenant_id = definition.tenant_id.clone();

    let job = collaborators.jobs.schedule(conn, &timer_job).await?;
    notify(collaborators.events.as_ref(), || {
        EngineEvent::new(EngineEventType::TimerScheduled, &job.id)
            .with_process_definition(&definition.id)
    });
    info!(
        job_id = %job.id,
        process_definition_id = %definition.id,
        due_date = ?job.due_date,
        "Scheduled timer-start job"
    );

    Ok(Some(job))
}

/// Remove the message-start subscriptions of `definition`.
pub(super) async fn remove_message_start_subscriptions(
    collaborators: &Collaborators,
    conn: &mut Connection,
    definition: &ProcessDefinition,
) -> Result<usize> {
    let subscriptions = collaborators
        .event_subscriptions
        .find_by_configuration(conn, MESSAGE_EVENT_TYPE, &definition.id, &definition.tenant_id)
        .await?;

    for subscription in &subscriptions {
        collaborators
            .event_subscriptions
            .delete(conn, subscription)
            .await?;
    }

    Ok(subscriptions.len())
}

/// Subscribe `definition` to the message its first triggered start event waits for.
pub(super) async fn add_message_start_subscription(
    collaborators: &Collaborators,
    conn: &mut Connection,
    definition: &ProcessDefinition,
    model: &ProcessModel,
) -> Result<Option<EventSubscription>> {
    let Some((start_event, EventDefinition::Message { message_ref })) =
        model.first_start_event_definition()
    else {
        return Ok(None);
    };

    let subscription = EventSubscription {
        id: uuid::Uuid::new_v4().to_string(),
        event_type: MESSAGE_EVENT_TYPE.to_string(),
        event_name: Some(message_ref.clone()),
        configuration: Some(definition.id.clone()),
        activity_id: Some(start_event.id.clone()),
        process_instance_id: None,
        tenant_id: definition.tenant_id.clone(),
        created_at: Utc::now(),
    };
    collaborators
        .event_subscriptions
        .insert(conn, &subscription)
        .await?;

    Ok(Some(subscription))
}
