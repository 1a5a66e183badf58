// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later

use async_trait::async_trait;

use crate::entities::Model;
use crate::error::Result;
use crate::store::{Connection, ModelStore};

const SELECT_MODEL: &str = r#"
    SELECT id, name, model_key, category, version, deployment_id, tenant_id,
           created_at, last_updated_at
    FROM models
"#;

/// Editor models in SQLite.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteModelStore;

#[async_trait]
impl ModelStore for SqliteModelStore {
    async fn insert(&self, conn: &mut Connection, model: &Model) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO models (id, name, model_key, category, version, deployment_id,
                                tenant_id, created_at, last_updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&model.id)
        .bind(&model.name)
        .bind(&model.key)
        .bind(&model.category)
        .bind(model.version)
        .bind(&model.deployment_id)
        .bind(&model.tenant_id)
        .bind(model.created_at)
        .bind(model.last_updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn update(&self, conn: &mut Connection, model: &Model) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE models
            SET name = ?2, model_key = ?3, category = ?4, version = ?5,
                deployment_id = ?6, tenant_id = ?7, last_updated_at = ?8
            WHERE id = ?1
            "#,
        )
        .bind(&model.id)
        .bind(&model.name)
        .bind(&model.key)
        .bind(&model.category)
        .bind(model.version)
        .bind(&model.deployment_id)
        .bind(&model.tenant_id)
        .bind(model.last_updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, conn: &mut Connection, model_id: &str) -> Result<Option<Model>> {
        let sql = format!("{SELECT_MODEL} WHERE id = ?");
        let model = sqlx::query_as::<_, Model>(&sql)
            .bind(model_id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(model)
    }

    async fn find_by_deployment_id(
        &self,
        conn: &mut Connection,
        deployment_id: &str,
    ) -> Result<Vec<Model>> {
        let sql = format!("{SELECT_MODEL} WHERE deployment_id = ? ORDER BY created_at, id");
        let models = sqlx::query_as::<_, Model>(&sql)
            .bind(deployment_id)
            .fetch_all(&mut *conn)
            .await?;

        Ok(models)
    }
}
