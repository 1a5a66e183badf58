// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later

use async_trait::async_trait;

use crate::entities::EventSubscription;
use crate::error::Result;
use crate::store::{Connection, EventSubscriptionRegistry};

/// Event subscriptions in SQLite.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteEventSubscriptionRegistry;

#[async_trait]
impl EventSubscriptionRegistry for SqliteEventSubscriptionRegistry {
    async fn insert(&self, conn: &mut Connection, subscription: &EventSubscription) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO event_subscriptions (id, event_type, event_name, configuration,
                                             activity_id, process_instance_id, tenant_id,
                                             created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&subscription.id)
        .bind(&subscription.event_type)
        .bind(&subscription.event_name)
        .bind(&subscription.configuration)
        .bind(&subscription.activity_id)
        .bind(&subscription.process_instance_id)
        .bind(&subscription.tenant_id)
        .bind(subscription.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn find_by_configuration(
        &self,
        conn: &mut Connection,
        event_type: &str,
        configuration: &str,
        tenant_id: &str,
    ) -> Result<Vec<EventSubscription>> {
        let subscriptions = sqlx::query_as::<_, EventSubscription>(
            r#"
            SELECT id, event_type, event_name, configuration, activity_id,
                   process_instance_id, tenant_id, created_at
            FROM event_subscriptions
            WHERE event_type = ? AND configuration = ? AND tenant_id = ?
            ORDER BY created_at, id
            "#,
        )
        .bind(event_type)
        .bind(configuration)
        .bind(tenant_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(subscriptions)
    }

    async fn delete(&self, conn: &mut Connection, subscription: &EventSubscription) -> Result<()> {
        sqlx::query("DELETE FROM event_subscriptions WHERE id = ?")
            .bind(&subscription.id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    async fn delete_by_process_definition(
        &self,
        conn: &mut Connection,
        process_definition_id: &str,
        tenant_id: &str,
    ) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM event_subscriptions WHERE configuration = ? AND tenant_id = ?")
                .bind(process_definition_id)
                .bind(tenant_id)
                .execute(&mut *conn)
                .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{MESSAGE_EVENT_TYPE, NO_TENANT_ID, SIGNAL_EVENT_TYPE};
    use crate::store::sqlite::test_pool;
    use chrono::Utc;

    fn subscription(event_type: &str, configuration: &str, tenant_id: &str) -> EventSubscription {
        EventSubscription {
            id: uuid::Uuid::new_v4().to_string(),
            event_type: event_type.to_string(),
            event_name: Some("order-received".to_string()),
            configuration: Some(configuration.to_string()),
            activity_id: Some("start".to_string()),
            process_instance_id: None,
            tenant_id: tenant_id.to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_find_by_configuration_is_scoped() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let registry = SqliteEventSubscriptionRegistry;

        let message = subscription(MESSAGE_EVENT_TYPE, "pd-1", NO_TENANT_ID);
        registry.insert(&mut conn, &message).await.unwrap();
        registry
            .insert(&mut conn, &subscription(SIGNAL_EVENT_TYPE, "pd-1", NO_TENANT_ID))
            .await
            .unwrap();
        registry
            .insert(&mut conn, &subscription(MESSAGE_EVENT_TYPE, "pd-1", "acme"))
            .await
            .unwrap();

        let found = registry
            .find_by_configuration(&mut conn, MESSAGE_EVENT_TYPE, "pd-1", NO_TENANT_ID)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, message.id);

        registry.delete(&mut conn, &message).await.unwrap();
        assert!(
            registry
                .find_by_configuration(&mut conn, MESSAGE_EVENT_TYPE, "pd-1", NO_TENANT_ID)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_delete_by_process_definition_removes_every_type() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let registry = SqliteEventSubscriptionRegistry;

        for subscription in [
            subscription(MESSAGE_EVENT_TYPE, "pd-1", NO_TENANT_ID),
            subscription(SIGNAL_EVENT_TYPE, "pd-1", NO_TENANT_ID),
            subscription(SIGNAL_EVENT_TYPE, "pd-1", "acme"),
            subscription(SIGNAL_EVENT_TYPE, "pd-2", NO_TENANT_ID),
        ] {
            registry.insert(&mut conn, &subscription).await.unwrap();
        }

        let deleted = registry
            .delete_by_process_definition(&mut conn, "pd-1", NO_TENANT_ID)
            .await
            .unwrap();
        assert_eq!(deleted, 2);

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM event_subscriptions")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(remaining, 2);
    }
}
