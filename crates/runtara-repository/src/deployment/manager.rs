// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Deployment manager.
//!
//! Every command runs on the connection of a single transaction owned by the
//! caller. The manager never commits; a failure at any step leaves the
//! rollback to the caller.

use chrono::Utc;
use tracing::{debug, info, instrument};

use crate::entities::{
    DELETED_DEPLOYMENT_REASON, Deployment, NewDeployment, ProcessDefinition, Resource,
};
use crate::error::Result;
use crate::events::{EngineEvent, EngineEventType};
use crate::store::{Collaborators, Connection, DeploymentQuery, NativeQuery, Page};

use super::start_triggers::{self, notify};
use super::{deployer, fallback};

/// Persists deployments and removes them together with everything derived from them.
#[derive(Clone)]
pub struct DeploymentManager {
    collaborators: Collaborators,
}

impl DeploymentManager {
    /// Create a manager working against `collaborators`.
    pub fn new(collaborators: Collaborators) -> Self {
        Self { collaborators }
    }

    /// The collaborators this manager works against.
    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Persist the deployment row, then each of its resources tagged with the
    /// deployment id.
    #[instrument(skip_all, fields(deployment_id = %deployment.deployment.id))]
    pub async fn insert_deployment(
        &self,
        conn: &mut Connection,
        deployment: &NewDeployment,
    ) -> Result<()> {
        let c = &self.collaborators;
        let row = &deployment.deployment;

        c.deployments.insert(conn, row).await?;

        for (name, bytes) in &deployment.resources {
            let resource = Resource {
                id: uuid::Uuid::new_v4().to_string(),
                deployment_id: row.id.clone(),
                name: name.clone(),
                bytes: bytes.clone(),
                generated: false,
            };
            c.resources.insert(conn, &resource).await?;
        }

        notify(c.events.as_ref(), || {
            EngineEvent::new(EngineEventType::EntityCreated, &row.id)
        });
        info!(
            resources = deployment.resources.len(),
            "Inserted deployment"
        );

        Ok(())
    }

    /// Insert a deployment and register a process definition for every
    /// `*.process.json` resource it carries.
    ///
    /// Returns the registered definitions in resource-name order.
    pub async fn deploy(
        &self,
        conn: &mut Connection,
        deployment: &NewDeployment,
    ) -> Result<Vec<ProcessDefinition>> {
        let models = deployer::parse_process_resources(deployment)?;

        self.insert_deployment(conn, deployment).await?;

        let mut definitions = Vec::with_capacity(models.len());
        for (resource_name, model) in models {
            let definition =
                deployer::register(&self.collaborators, conn, deployment, resource_name, model)
                    .await?;
            definitions.push(definition);
        }

        Ok(definitions)
    }

    /// Delete a deployment and everything derived from it.
    ///
    /// Models that reference the deployment are unlinked, not deleted. With
    /// `cascade`, running instances of the deployment's process definitions
    /// are terminated first; without it they are left untouched. When a
    /// removed definition was the latest version of its key, the previous
    /// version's timer-start trigger is restored.
    ///
    /// Deleting an unknown id is a no-op.
    #[instrument(skip(self, conn))]
    pub async fn delete_deployment(
        &self,
        conn: &mut Connection,
        deployment_id: &str,
        cascade: bool,
    ) -> Result<()> {
        let c = &self.collaborators;

        let definitions = c
            .process_definitions
            .find_by_deployment_id(conn, deployment_id)
            .await?;
        debug!(definitions = definitions.len(), "Resolved process definitions");

        let models = c.models.find_by_deployment_id(conn, deployment_id).await?;
        for mut model in models {
            model.deployment_id = None;
            model.last_updated_at = Utc::now();
            c.models.update(conn, &model).await?;
            debug!(model_id = %model.id, "Unlinked model");
        }

        if !definitions.is_empty() {
            self.remove_process_definitions(conn, deployment_id, &definitions, cascade)
                .await?;
        }

        let resources = c.resources.delete_by_deployment_id(conn, deployment_id).await?;
        let existed = c.deployments.delete(conn, deployment_id).await?;

        if existed {
            notify(c.events.as_ref(), || {
                EngineEvent::new(EngineEventType::EntityDeleted, deployment_id)
            });
        }
        info!(
            definitions = definitions.len(),
            resources,
            existed,
            "Deleted deployment"
        );

        Ok(())
    }

    async fn remove_process_definitions(
        &self,
        conn: &mut Connection,
        deployment_id: &str,
        definitions: &[ProcessDefinition],
        cascade: bool,
    ) -> Result<()> {
        let c = &self.collaborators;

        if cascade {
            for definition in definitions {
                let terminated = c
                    .process_instances
                    .delete_all_by_process_definition(
                        conn,
                        &definition.id,
                        DELETED_DEPLOYMENT_REASON,
                        cascade,
                    )
                    .await?;
                if terminated > 0 {
                    info!(
                        process_definition_id = %definition.id,
                        terminated,
                        "Terminated running process instances"
                    );
                }
            }
        }

        for definition in definitions {
            c.identity_links
                .delete_by_process_definition(conn, &definition.id)
                .await?;

            let messages =
                start_triggers::remove_message_start_subscriptions(c, conn, definition).await?;
            let others = c
                .event_subscriptions
                .delete_by_process_definition(conn, &definition.id, &definition.tenant_id)
                .await?;
            debug!(
                process_definition_id = %definition.id,
                messages,
                others,
                "Removed event subscriptions"
            );
        }

        // Latest-version checks must see the definitions still in place.
        let mut was_latest = Vec::with_capacity(definitions.len());
        for definition in definitions {
            was_latest.push(fallback::is_latest_version(c, conn, definition).await?);
        }

        c.process_definitions
            .delete_by_deployment_id(conn, deployment_id)
            .await?;

        for (definition, was_latest) in definitions.iter().zip(was_latest) {
            fallback::reschedule_previous_timer(c, conn, definition, was_latest).await?;
        }

        Ok(())
    }

    /// Deployment with the given id.
    pub async fn find_deployment_by_id(
        &self,
        conn: &mut Connection,
        deployment_id: &str,
    ) -> Result<Option<Deployment>> {
        self.collaborators
            .deployments
            .find_by_id(conn, deployment_id)
            .await
    }

    /// Most recently deployed deployment with the given name.
    pub async fn find_latest_deployment_by_name(
        &self,
        conn: &mut Connection,
        name: &str,
    ) -> Result<Option<Deployment>> {
        self.collaborators
            .deployments
            .find_latest_by_name(conn, name)
            .await
    }

    /// Deployments matching `query`, optionally paged.
    pub async fn find_deployments_by_query_criteria(
        &self,
        conn: &mut Connection,
        query: &DeploymentQuery,
        page: Option<Page>,
    ) -> Result<Vec<Deployment>> {
        self.collaborators
            .deployments
            .find_by_query_criteria(conn, query, page)
            .await
    }

    /// Number of deployments matching `query`.
    pub async fn find_deployment_count_by_query_criteria(
        &self,
        conn: &mut Connection,
        query: &DeploymentQuery,
    ) -> Result<i64> {
        self.collaborators
            .deployments
            .count_by_query_criteria(conn, query)
            .await
    }

    /// Deployments returned by a native `SELECT`.
    pub async fn find_deployments_by_native_query(
        &self,
        conn: &mut Connection,
        query: &NativeQuery,
        page: Page,
    ) -> Result<Vec<Deployment>> {
        self.collaborators
            .deployments
            .find_by_native_query(conn, query, page)
            .await
    }

    /// Number of rows returned by a native `SELECT`.
    pub async fn find_deployment_count_by_native_query(
        &self,
        conn: &mut Connection,
        query: &NativeQuery,
    ) -> Result<i64> {
        self.collaborators
            .deployments
            .count_by_native_query(conn, query)
            .await
    }

    /// Names of the resources attached to a deployment.
    pub async fn get_deployment_resource_names(
        &self,
        conn: &mut Connection,
        deployment_id: &str,
    ) -> Result<Vec<String>> {
        self.collaborators
            .resources
            .find_names_by_deployment_id(conn, deployment_id)
            .await
    }

    /// A single resource of a deployment.
    pub async fn get_resource(
        &self,
        conn: &mut Connection,
        deployment_id: &str,
        name: &str,
    ) -> Result<Option<Resource>> {
        self.collaborators
            .resources
            .find_by_deployment_id_and_name(conn, deployment_id, name)
            .await
    }
}
