// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later

use async_trait::async_trait;

use crate::entities::Resource;
use crate::error::Result;
use crate::store::{Connection, ResourceRepository};

/// Deployment resources in SQLite.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteResourceRepository;

#[async_trait]
impl ResourceRepository for SqliteResourceRepository {
    async fn insert(&self, conn: &mut Connection, resource: &Resource) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO deployment_resources (id, deployment_id, name, bytes, generated)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&resource.id)
        .bind(&resource.deployment_id)
        .bind(&resource.name)
        .bind(&resource.bytes)
        .bind(resource.generated)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn find_by_deployment_id(
        &self,
        conn: &mut Connection,
        deployment_id: &str,
    ) -> Result<Vec<Resource>> {
        let resources = sqlx::query_as::<_, Resource>(
            r#"
            SELECT id, deployment_id, name, bytes, generated
            FROM deployment_resources
            WHERE deployment_id = ?
            ORDER BY name
            "#,
        )
        .bind(deployment_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(resources)
    }

    async fn find_by_deployment_id_and_name(
        &self,
        conn: &mut Connection,
        deployment_id: &str,
        name: &str,
    ) -> Result<Option<Resource>> {
        let resource = sqlx::query_as::<_, Resource>(
            r#"
            SELECT id, deployment_id, name, bytes, generated
            FROM deployment_resources
            WHERE deployment_id = ? AND name = ?
            "#,
        )
        .bind(deployment_id)
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(resource)
    }

    async fn find_names_by_deployment_id(
        &self,
        conn: &mut Connection,
        deployment_id: &str,
    ) -> Result<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(
            "SELECT name FROM deployment_resources WHERE deployment_id = ? ORDER BY name",
        )
        .bind(deployment_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(names)
    }

    async fn delete_by_deployment_id(
        &self,
        conn: &mut Connection,
        deployment_id: &str,
    ) -> Result<u64> {
        let result = sqlx::query("DELETE FROM deployment_resources WHERE deployment_id = ?")
            .bind(deployment_id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::DeploymentBuilder;
    use crate::store::DeploymentStore;
    use crate::store::sqlite::{SqliteDeploymentStore, test_pool};

    fn resource(deployment_id: &str, name: &str, bytes: &[u8]) -> Resource {
        Resource {
            id: uuid::Uuid::new_v4().to_string(),
            deployment_id: deployment_id.to_string(),
            name: name.to_string(),
            bytes: bytes.to_vec(),
            generated: false,
        }
    }

    #[tokio::test]
    async fn test_resources_by_deployment() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let repo = SqliteResourceRepository;

        let deployment = DeploymentBuilder::new("orders").id("dep-1").build();
        SqliteDeploymentStore
            .insert(&mut conn, &deployment.deployment)
            .await
            .unwrap();

        repo.insert(&mut conn, &resource("dep-1", "b.json", b"{}"))
            .await
            .unwrap();
        repo.insert(&mut conn, &resource("dep-1", "a.json", b"[]"))
            .await
            .unwrap();

        let names = repo
            .find_names_by_deployment_id(&mut conn, "dep-1")
            .await
            .unwrap();
        assert_eq!(names, vec!["a.json", "b.json"]);

        let found = repo
            .find_by_deployment_id_and_name(&mut conn, "dep-1", "a.json")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.bytes, b"[]".to_vec());
        assert!(!found.generated);

        assert_eq!(
            repo.delete_by_deployment_id(&mut conn, "dep-1").await.unwrap(),
            2
        );
        assert!(
            repo.find_by_deployment_id(&mut conn, "dep-1")
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_duplicate_resource_name_is_rejected() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let repo = SqliteResourceRepository;

        let deployment = DeploymentBuilder::new("orders").id("dep-1").build();
        SqliteDeploymentStore
            .insert(&mut conn, &deployment.deployment)
            .await
            .unwrap();

        repo.insert(&mut conn, &resource("dep-1", "a.json", b"1"))
            .await
            .unwrap();
        let result = repo
            .insert(&mut conn, &resource("dep-1", "a.json", b"2"))
            .await;
        assert!(result.is_err());
    }
}
