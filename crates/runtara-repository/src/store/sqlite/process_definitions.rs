// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite process definition directory.
//!
//! The parsed process is stored as JSON next to the definition row. Tenant
//! scoped lookups bind `None` for the no-tenant sentinel and compare against
//! `COALESCE(?, '')`.

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use crate::entities::{NewProcessDefinition, ProcessDefinition};
use crate::error::Result;
use crate::process_model::ProcessModel;
use crate::store::{Connection, ProcessDefinitionDirectory};

const SELECT_DEFINITION: &str = r#"
    SELECT id, definition_key, name, version, tenant_id, deployment_id,
           resource_name, created_at
    FROM process_definitions
"#;

/// Process definitions in SQLite.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteProcessDefinitionDirectory;

#[async_trait]
impl ProcessDefinitionDirectory for SqliteProcessDefinitionDirectory {
    async fn insert(
        &self,
        conn: &mut Connection,
        definition: &NewProcessDefinition,
    ) -> Result<ProcessDefinition> {
        let version: i32 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(MAX(version), 0) + 1
            FROM process_definitions
            WHERE definition_key = ? AND tenant_id = ?
            "#,
        )
        .bind(&definition.key)
        .bind(&definition.tenant_id)
        .fetch_one(&mut *conn)
        .await?;

        let stored = ProcessDefinition {
            id: format!("{}:{}:{}", definition.key, version, uuid::Uuid::new_v4()),
            key: definition.key.clone(),
            name: definition.name.clone(),
            version,
            tenant_id: definition.tenant_id.clone(),
            deployment_id: definition.deployment_id.clone(),
            resource_name: definition.resource_name.clone(),
            created_at: Utc::now(),
        };
        let process_model = serde_json::to_string(&definition.process_model)?;

        sqlx::query(
            r#"
            INSERT INTO process_definitions (id, definition_key, name, version, tenant_id,
                                             deployment_id, resource_name, process_model,
                                             created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&stored.id)
        .bind(&stored.key)
        .bind(&stored.name)
        .bind(stored.version)
        .bind(&stored.tenant_id)
        .bind(&stored.deployment_id)
        .bind(&stored.resource_name)
        .bind(&process_model)
        .bind(stored.created_at)
        .execute(&mut *conn)
        .await?;

        debug!(
            process_definition_id = %stored.id,
            version = stored.version,
            "Registered process definition"
        );

        Ok(stored)
    }

    async fn find_by_id(
        &self,
        conn: &mut Connection,
        definition_id: &str,
    ) -> Result<Option<ProcessDefinition>> {
        let sql = format!("{SELECT_DEFINITION} WHERE id = ?");
        let definition = sqlx::query_as::<_, ProcessDefinition>(&sql)
            .bind(definition_id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(definition)
    }

    async fn find_by_deployment_id(
        &self,
        conn: &mut Connection,
        deployment_id: &str,
    ) -> Result<Vec<ProcessDefinition>> {
        let sql = format!(
            "{SELECT_DEFINITION} WHERE deployment_id = ? ORDER BY definition_key, version"
        );
        let definitions = sqlx::query_as::<_, ProcessDefinition>(&sql)
            .bind(deployment_id)
            .fetch_all(&mut *conn)
            .await?;

        Ok(definitions)
    }

    async fn find_latest_by_key(
        &self,
        conn: &mut Connection,
        key: &str,
        tenant: Option<&str>,
    ) -> Result<Option<ProcessDefinition>> {
        let sql = format!(
            "{SELECT_DEFINITION} WHERE definition_key = ? AND tenant_id = COALESCE(?, '') \
             ORDER BY version DESC LIMIT 1"
        );
        let definition = sqlx::query_as::<_, ProcessDefinition>(&sql)
            .bind(key)
            .bind(tenant)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(definition)
    }

    async fn find_by_key_and_version(
        &self,
        conn: &mut Connection,
        key: &str,
        version: i32,
        tenant: Option<&str>,
    ) -> Result<Option<ProcessDefinition>> {
        let sql = format!(
            "{SELECT_DEFINITION} WHERE definition_key = ? AND version = ? \
             AND tenant_id = COALESCE(?, '')"
        );
        let definition = sqlx::query_as::<_, ProcessDefinition>(&sql)
            .bind(key)
            .bind(version)
            .bind(tenant)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(definition)
    }

    async fn get_process_model(
        &self,
        conn: &mut Connection,
        definition_id: &str,
    ) -> Result<Option<ProcessModel>> {
        let raw: Option<Option<String>> =
            sqlx::query_scalar("SELECT process_model FROM process_definitions WHERE id = ?")
                .bind(definition_id)
                .fetch_optional(&mut *conn)
                .await?;

        match raw.flatten() {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn delete_by_deployment_id(
        &self,
        conn: &mut Connection,
        deployment_id: &str,
    ) -> Result<u64> {
        let result = sqlx::query("DELETE FROM process_definitions WHERE deployment_id = ?")
            .bind(deployment_id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected())
    }
}
