// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::entities::{Job, JobType, TimerJob};
use crate::error::{Error, Result};
use crate::store::{Connection, JobRegistry};

const SELECT_JOB: &str = r#"
    SELECT id, job_type, handler_type, handler_configuration, process_definition_id,
           process_instance_id, tenant_id, due_date, repeat_expression, max_iterations,
           end_date, retries, created_at
    FROM jobs
"#;

/// Default retries of a freshly scheduled job.
const DEFAULT_RETRIES: i32 = 3;

#[derive(sqlx::FromRow)]
struct JobRow {
    id: String,
    job_type: String,
    handler_type: String,
    handler_configuration: Option<String>,
    process_definition_id: Option<String>,
    process_instance_id: Option<String>,
    tenant_id: String,
    due_date: Option<DateTime<Utc>>,
    repeat_expression: Option<String>,
    max_iterations: Option<i32>,
    end_date: Option<DateTime<Utc>>,
    retries: i32,
    created_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for Job {
    type Error = Error;

    fn try_from(row: JobRow) -> Result<Self> {
        let job_type = row.job_type.parse::<JobType>().map_err(Error::Other)?;
        Ok(Job {
            id: row.id,
            job_type,
            handler_type: row.handler_type,
            handler_configuration: row.handler_configuration,
            process_definition_id: row.process_definition_id,
            process_instance_id: row.process_instance_id,
            tenant_id: row.tenant_id,
            due_date: row.due_date,
            repeat: row.repeat_expression,
            max_iterations: row.max_iterations,
            end_date: row.end_date,
            retries: row.retries,
            created_at: row.created_at,
        })
    }
}

/// Jobs in SQLite.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteJobRegistry;

#[async_trait]
impl JobRegistry for SqliteJobRegistry {
    async fn find_by_id(&self, conn: &mut Connection, job_id: &str) -> Result<Option<Job>> {
        let sql = format!("{SELECT_JOB} WHERE id = ?");
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(job_id)
            .fetch_optional(&mut *conn)
            .await?;

        row.map(Job::try_from).transpose()
    }

    async fn find_by_type_and_process_definition_id(
        &self,
        conn: &mut Connection,
        handler_type: &str,
        process_definition_id: &str,
    ) -> Result<Vec<Job>> {
        let sql = format!(
            "{SELECT_JOB} WHERE handler_type = ? AND process_definition_id = ? \
             ORDER BY created_at, id"
        );
        let rows = sqlx::query_as::<_, JobRow>(&sql)
            .bind(handler_type)
            .bind(process_definition_id)
            .fetch_all(&mut *conn)
            .await?;

        rows.into_iter().map(Job::try_from).collect()
    }

    async fn schedule(&self, conn: &mut Connection, timer: &TimerJob) -> Result<Job> {
        let job = Job {
            id: uuid::Uuid::new_v4().to_string(),
            job_type: JobType::Timer,
            handler_type: timer.handler_type.clone(),
            handler_configuration: timer.handler_configuration.clone(),
            process_definition_id: timer.process_definition_id.clone(),
            process_instance_id: timer.process_instance_id.clone(),
            tenant_id: timer.tenant_id.clone(),
            due_date: Some(timer.due_date),
            repeat: timer.repeat.clone(),
            max_iterations: timer.max_iterations,
            end_date: timer.end_date,
            retries: DEFAULT_RETRIES,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO jobs (id, job_type, handler_type, handler_configuration,
                              process_definition_id, process_instance_id, tenant_id,
                              due_date, repeat_expression, max_iterations, end_date,
                              retries, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(job.job_type.to_string())
        .bind(&job.handler_type)
        .bind(&job.handler_configuration)
        .bind(&job.process_definition_id)
        .bind(&job.process_instance_id)
        .bind(&job.tenant_id)
        .bind(job.due_date)
        .bind(&job.repeat)
        .bind(job.max_iterations)
        .bind(job.end_date)
        .bind(job.retries)
        .bind(job.created_at)
        .execute(&mut *conn)
        .await?;

        debug!(job_id = %job.id, due_date = ?job.due_date, "Scheduled timer job");

        Ok(job)
    }

    async fn delete(&self, conn: &mut Connection, job: &Job) -> Result<()> {
        sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(&job.id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }
}
