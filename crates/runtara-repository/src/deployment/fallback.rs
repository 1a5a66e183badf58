// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Version fallback of timer-start triggers.
//!
//! When the latest version of a process is removed, the nearest lower
//! remaining version of the same key (and tenant) becomes the latest again
//! and gets its timer-start job back.

use tracing::{debug, info};

use crate::entities::{Job, ProcessDefinition, tenant_scope};
use crate::error::Result;
use crate::store::{Collaborators, Connection};

use super::start_triggers;

/// Whether `definition` is the current latest version of its key and tenant.
///
/// A missing latest definition or a different id is not an error; it only
/// means no fallback applies.
pub(super) async fn is_latest_version(
    collaborators: &Collaborators,
    conn: &mut Connection,
    definition: &ProcessDefinition,
) -> Result<bool> {
    let latest = collaborators
        .process_definitions
        .find_latest_by_key(conn, &definition.key, tenant_scope(&definition.tenant_id))
        .await?;

    Ok(latest.is_some_and(|latest| latest.id == definition.id))
}

/// Nearest existing version below `definition`, skipping gaps.
pub(super) async fn find_previous_version(
    collaborators: &Collaborators,
    conn: &mut Connection,
    definition: &ProcessDefinition,
) -> Result<Option<ProcessDefinition>> {
    let tenant = tenant_scope(&definition.tenant_id);

    for version in (1..definition.version).rev() {
        let previous = collaborators
            .process_definitions
            .find_by_key_and_version(conn, &definition.key, version, tenant)
            .await?;
        if previous.is_some() {
            return Ok(previous);
        }
    }

    Ok(None)
}

/// Cancel the timer-start jobs of a removed definition and, if it was the
/// latest version, restore the previous version's timer-start job.
///
/// `was_latest` must be resolved before the definition rows are deleted.
pub(super) async fn reschedule_previous_timer(
    collaborators: &Collaborators,
    conn: &mut Connection,
    removed: &ProcessDefinition,
    was_latest: bool,
) -> Result<Option<Job>> {
    start_triggers::cancel_timer_start_jobs(collaborators, conn, removed).await?;

    if !was_latest {
        debug!(
            process_definition_id = %removed.id,
            "Removed definition was not the latest version, no fallback"
        );
        return Ok(None);
    }

    let Some(previous) = find_previous_version(collaborators, conn, removed).await? else {
        debug!(
            process_definition_id = %removed.id,
            "No previous version to fall back to"
        );
        return Ok(None);
    };

    let Some(model) = collaborators
        .process_definitions
        .get_process_model(conn, &previous.id)
        .await?
    else {
        debug!(
            process_definition_id = %previous.id,
            "Previous version has no process model"
        );
        return Ok(None);
    };

    let job = start_triggers::schedule_timer_start(collaborators, conn, &previous, &model).await?;
    if job.is_some() {
        info!(
            removed = %removed.id,
            restored = %previous.id,
            "Restored timer-start trigger of previous version"
        );
    }

    Ok(job)
}
