// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Registration of process definitions found in deployment resources.
//!
//! Resources named `*.process.json` hold a serialized [`ProcessModel`]. Each
//! one becomes the next version of the process key (the model id) within the
//! deployment's tenant. The new version takes over the start triggers of the
//! version it supersedes.

use tracing::info;

use crate::entities::{NewDeployment, NewProcessDefinition, ProcessDefinition, tenant_scope};
use crate::error::{Error, Result};
use crate::process_model::ProcessModel;
use crate::store::{Collaborators, Connection};

use super::start_triggers;

/// Suffix of resources parsed as process models.
pub const PROCESS_RESOURCE_SUFFIX: &str = ".process.json";

/// Whether a resource name denotes a process model.
pub fn is_process_resource(name: &str) -> bool {
    name.ends_with(PROCESS_RESOURCE_SUFFIX)
}

/// Parse the process model resources of `deployment`, in resource-name order.
pub(super) fn parse_process_resources(
    deployment: &NewDeployment,
) -> Result<Vec<(&str, ProcessModel)>> {
    deployment
        .resources
        .iter()
        .filter(|(name, _)| is_process_resource(name))
        .map(|(name, bytes)| {
            let model = serde_json::from_slice::<ProcessModel>(bytes).map_err(|e| {
                Error::InvalidRequest(format!("resource '{name}' is not a process model: {e}"))
            })?;
            if model.id.is_empty() {
                return Err(Error::InvalidRequest(format!(
                    "resource '{name}' has a process model without id"
                )));
            }
            Ok((name.as_str(), model))
        })
        .collect()
}

/// Register one process definition and move the start triggers of the
/// version it supersedes onto it.
pub(super) async fn register(
    collaborators: &Collaborators,
    conn: &mut Connection,
    deployment: &NewDeployment,
    resource_name: &str,
    model: ProcessModel,
) -> Result<ProcessDefinition> {
    let tenant_id = &deployment.deployment.tenant_id;

    let superseded = collaborators
        .process_definitions
        .find_latest_by_key(conn, &model.id, tenant_scope(tenant_id))
        .await?;

    let definition = collaborators
        .process_definitions
        .insert(
            conn,
            &NewProcessDefinition {
                key: model.id.clone(),
                name: model.name.clone(),
                tenant_id: tenant_id.clone(),
                deployment_id: deployment.deployment.id.clone(),
                resource_name: Some(resource_name.to_string()),
                process_model: model.clone(),
            },
        )
        .await?;

    if let Some(superseded) = &superseded {
        start_triggers::cancel_timer_start_jobs(collaborators, conn, superseded).await?;
        start_triggers::remove_message_start_subscriptions(collaborators, conn, superseded)
            .await?;
    }

    start_triggers::schedule_timer_start(collaborators, conn, &definition, &model).await?;
    start_triggers::add_message_start_subscription(collaborators, conn, &definition, &model)
        .await?;

    info!(
        process_definition_id = %definition.id,
        version = definition.version,
        superseded = ?superseded.as_ref().map(|d| &d.id),
        "Deployed process definition"
    );

    Ok(definition)
}
