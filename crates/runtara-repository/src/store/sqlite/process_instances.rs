// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite process instance termination.
//!
//! Terminating an instance marks it cancelled with the given reason and
//! removes the jobs and event subscriptions scoped to it. Sub-process
//! instances are reached through `super_instance_id`.

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use crate::entities::{ProcessInstance, instance_status};
use crate::error::Result;
use crate::store::{Connection, ProcessInstanceManager};

/// Process instances in SQLite.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteProcessInstanceManager;

async fn running_instance_ids(
    conn: &mut Connection,
    column_sql: &str,
    value: &str,
) -> Result<Vec<String>> {
    let ids = sqlx::query_scalar::<_, String>(column_sql)
        .bind(value)
        .bind(instance_status::RUNNING)
        .fetch_all(&mut *conn)
        .await?;

    Ok(ids)
}

async fn terminate(conn: &mut Connection, instance_id: &str, reason: &str) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE process_instances
        SET status = ?2, termination_reason = ?3, finished_at = ?4
        WHERE id = ?1
        "#,
    )
    .bind(instance_id)
    .bind(instance_status::CANCELLED)
    .bind(reason)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM jobs WHERE process_instance_id = ?")
        .bind(instance_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query("DELETE FROM event_subscriptions WHERE process_instance_id = ?")
        .bind(instance_id)
        .execute(&mut *conn)
        .await?;

    debug!(instance_id, reason, "Terminated process instance");
    Ok(())
}

#[async_trait]
impl ProcessInstanceManager for SqliteProcessInstanceManager {
    async fn insert(&self, conn: &mut Connection, instance: &ProcessInstance) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO process_instances (id, process_definition_id, super_instance_id,
                                           business_key, tenant_id, status, started_at,
                                           finished_at, termination_reason)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&instance.id)
        .bind(&instance.process_definition_id)
        .bind(&instance.super_instance_id)
        .bind(&instance.business_key)
        .bind(&instance.tenant_id)
        .bind(&instance.status)
        .bind(instance.started_at)
        .bind(instance.finished_at)
        .bind(&instance.termination_reason)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn find_by_id(
        &self,
        conn: &mut Connection,
        instance_id: &str,
    ) -> Result<Option<ProcessInstance>> {
        let instance = sqlx::query_as::<_, ProcessInstance>(
            r#"
            SELECT id, process_definition_id, super_instance_id, business_key, tenant_id,
                   status, started_at, finished_at, termination_reason
            FROM process_instances
            WHERE id = ?
            "#,
        )
        .bind(instance_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(instance)
    }

    async fn delete_all_by_process_definition(
        &self,
        conn: &mut Connection,
        process_definition_id: &str,
        reason: &str,
        cascade: bool,
    ) -> Result<u64> {
        let mut pending = running_instance_ids(
            conn,
            "SELECT id FROM process_instances WHERE process_definition_id = ? AND status = ?",
            process_definition_id,
        )
        .await?;

        let mut terminated = 0;
        while let Some(instance_id) = pending.pop() {
            if cascade {
                let children = running_instance_ids(
                    conn,
                    "SELECT id FROM process_instances WHERE super_instance_id = ? AND status = ?",
                    &instance_id,
                )
                .await?;
                pending.extend(children);
            }

            terminate(conn, &instance_id, reason).await?;
            terminated += 1;
        }

        Ok(terminated)
    }
}
