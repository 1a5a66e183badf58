// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later

use async_trait::async_trait;

use crate::entities::IdentityLink;
use crate::error::Result;
use crate::store::{Connection, IdentityLinkStore};

/// Identity links in SQLite.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteIdentityLinkStore;

#[async_trait]
impl IdentityLinkStore for SqliteIdentityLinkStore {
    async fn insert(&self, conn: &mut Connection, link: &IdentityLink) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO identity_links (id, process_definition_id, link_type, user_id,
                                        group_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&link.id)
        .bind(&link.process_definition_id)
        .bind(&link.link_type)
        .bind(&link.user_id)
        .bind(&link.group_id)
        .bind(link.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn find_by_process_definition(
        &self,
        conn: &mut Connection,
        process_definition_id: &str,
    ) -> Result<Vec<IdentityLink>> {
        let links = sqlx::query_as::<_, IdentityLink>(
            r#"
            SELECT id, process_definition_id, link_type, user_id, group_id, created_at
            FROM identity_links
            WHERE process_definition_id = ?
            ORDER BY created_at, id
            "#,
        )
        .bind(process_definition_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(links)
    }

    async fn delete_by_process_definition(
        &self,
        conn: &mut Connection,
        process_definition_id: &str,
    ) -> Result<u64> {
        let result = sqlx::query("DELETE FROM identity_links WHERE process_definition_id = ?")
            .bind(process_definition_id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::sqlite::test_pool;
    use chrono::Utc;

    #[tokio::test]
    async fn test_delete_by_process_definition() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let store = SqliteIdentityLinkStore;

        for (definition, group) in [("pd-1", "sales"), ("pd-1", "ops"), ("pd-2", "sales")] {
            let link = IdentityLink {
                id: uuid::Uuid::new_v4().to_string(),
                process_definition_id: definition.to_string(),
                link_type: "candidate".to_string(),
                user_id: None,
                group_id: Some(group.to_string()),
                created_at: Utc::now(),
            };
            store.insert(&mut conn, &link).await.unwrap();
        }

        assert_eq!(
            store
                .delete_by_process_definition(&mut conn, "pd-1")
                .await
                .unwrap(),
            2
        );
        assert!(
            store
                .find_by_process_definition(&mut conn, "pd-1")
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(
            store
                .find_by_process_definition(&mut conn, "pd-2")
                .await
                .unwrap()
                .len(),
            1
        );
    }
}
