// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite deployment rows.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::Sqlite;
use sqlx::query::QueryAs;
use sqlx::sqlite::SqliteArguments;

use crate::entities::Deployment;
use crate::error::{Error, Result};
use crate::store::{
    Connection, DeploymentOrderBy, DeploymentQuery, DeploymentStore, NativeQuery, Page, SortOrder,
};

const SELECT_COLUMNS: &str =
    "SELECT d.id, d.name, d.category, d.deployment_key, d.tenant_id, d.deploy_time";

const CRITERIA: &str = r#"
    FROM deployments d
    WHERE (?1 IS NULL OR d.id = ?1)
      AND (?2 IS NULL OR d.name = ?2)
      AND (?3 IS NULL OR d.name LIKE ?3)
      AND (?4 IS NULL OR d.category = ?4)
      AND (?5 IS NULL OR d.category IS NULL OR d.category <> ?5)
      AND (?6 IS NULL OR d.tenant_id = ?6)
      AND (?7 IS NULL OR d.tenant_id LIKE ?7)
      AND (?8 = 0 OR d.tenant_id = '')
      AND (?9 IS NULL OR EXISTS (
            SELECT 1 FROM process_definitions p
            WHERE p.deployment_id = d.id AND p.definition_key = ?9
      ))
"#;

/// Deployment rows in SQLite.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDeploymentStore;

fn bind_criteria<'q, O>(
    query: QueryAs<'q, Sqlite, O, SqliteArguments<'q>>,
    criteria: &'q DeploymentQuery,
) -> QueryAs<'q, Sqlite, O, SqliteArguments<'q>> {
    query
        .bind(criteria.deployment_id.as_deref())
        .bind(criteria.name.as_deref())
        .bind(criteria.name_like.as_deref())
        .bind(criteria.category.as_deref())
        .bind(criteria.category_not_equals.as_deref())
        .bind(criteria.tenant_id.as_deref())
        .bind(criteria.tenant_id_like.as_deref())
        .bind(criteria.without_tenant_id)
        .bind(criteria.process_definition_key.as_deref())
}

fn bind_native<'q, O>(
    mut query: QueryAs<'q, Sqlite, O, SqliteArguments<'q>>,
    parameters: &'q [Value],
) -> QueryAs<'q, Sqlite, O, SqliteArguments<'q>> {
    for parameter in parameters {
        query = match parameter {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => query.bind(i),
                None => query.bind(n.as_f64()),
            },
            Value::String(s) => query.bind(s.as_str()),
            other => query.bind(other.to_string()),
        };
    }
    query
}

fn order_clause(order_by: Option<(DeploymentOrderBy, SortOrder)>) -> &'static str {
    match order_by {
        None | Some((DeploymentOrderBy::Id, SortOrder::Asc)) => "ORDER BY d.id ASC",
        Some((DeploymentOrderBy::Id, SortOrder::Desc)) => "ORDER BY d.id DESC",
        Some((DeploymentOrderBy::Name, SortOrder::Asc)) => "ORDER BY d.name ASC, d.id ASC",
        Some((DeploymentOrderBy::Name, SortOrder::Desc)) => "ORDER BY d.name DESC, d.id ASC",
        Some((DeploymentOrderBy::DeployTime, SortOrder::Asc)) => {
            "ORDER BY d.deploy_time ASC, d.id ASC"
        }
        Some((DeploymentOrderBy::DeployTime, SortOrder::Desc)) => {
            "ORDER BY d.deploy_time DESC, d.id ASC"
        }
        Some((DeploymentOrderBy::TenantId, SortOrder::Asc)) => {
            "ORDER BY d.tenant_id ASC, d.id ASC"
        }
        Some((DeploymentOrderBy::TenantId, SortOrder::Desc)) => {
            "ORDER BY d.tenant_id DESC, d.id ASC"
        }
    }
}

/// Reject anything but a single `SELECT` statement.
fn validated_native_sql(query: &NativeQuery) -> Result<&str> {
    let sql = query.sql.trim().trim_end_matches(';').trim_end();
    if !sql.to_ascii_lowercase().starts_with("select") {
        return Err(Error::InvalidRequest(
            "native deployment queries must be SELECT statements".to_string(),
        ));
    }
    if sql.contains(';') {
        return Err(Error::InvalidRequest(
            "native deployment queries must be a single statement".to_string(),
        ));
    }
    Ok(sql)
}

#[async_trait]
impl DeploymentStore for SqliteDeploymentStore {
    async fn insert(&self, conn: &mut Connection, deployment: &Deployment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO deployments (id, name, category, deployment_key, tenant_id, deploy_time)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&deployment.id)
        .bind(&deployment.name)
        .bind(&deployment.category)
        .bind(&deployment.key)
        .bind(&deployment.tenant_id)
        .bind(deployment.deploy_time)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn delete(&self, conn: &mut Connection, deployment_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM deployments WHERE id = ?")
            .bind(deployment_id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_by_id(
        &self,
        conn: &mut Connection,
        deployment_id: &str,
    ) -> Result<Option<Deployment>> {
        let sql = format!("{SELECT_COLUMNS} FROM deployments d WHERE d.id = ?");
        let deployment = sqlx::query_as::<_, Deployment>(&sql)
            .bind(deployment_id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(deployment)
    }

    async fn find_latest_by_name(
        &self,
        conn: &mut Connection,
        name: &str,
    ) -> Result<Option<Deployment>> {
        let sql = format!(
            "{SELECT_COLUMNS} FROM deployments d WHERE d.name = ? \
             ORDER BY d.deploy_time DESC, d.rowid DESC LIMIT 1"
        );
        let deployment = sqlx::query_as::<_, Deployment>(&sql)
            .bind(name)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(deployment)
    }

    async fn find_by_query_criteria(
        &self,
        conn: &mut Connection,
        query: &DeploymentQuery,
        page: Option<Page>,
    ) -> Result<Vec<Deployment>> {
        let sql = format!(
            "{SELECT_COLUMNS} {CRITERIA} {} LIMIT ?10 OFFSET ?11",
            order_clause(query.order_by)
        );
        let (limit, offset) = page.map_or((-1, 0), |p| (p.max_results, p.first_result));

        let deployments = bind_criteria(sqlx::query_as::<_, Deployment>(&sql), query)
            .bind(limit)
            .bind(offset)
            .fetch_all(&mut *conn)
            .await?;

        Ok(deployments)
    }

    async fn count_by_query_criteria(
        &self,
        conn: &mut Connection,
        query: &DeploymentQuery,
    ) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) {CRITERIA}");
        let (count,) = bind_criteria(sqlx::query_as::<_, (i64,)>(&sql), query)
            .fetch_one(&mut *conn)
            .await?;

        Ok(count)
    }

    async fn find_by_native_query(
        &self,
        conn: &mut Connection,
        query: &NativeQuery,
        page: Page,
    ) -> Result<Vec<Deployment>> {
        let sql = format!(
            "SELECT * FROM ({}) LIMIT ? OFFSET ?",
            validated_native_sql(query)?
        );

        let deployments = bind_native(sqlx::query_as::<_, Deployment>(&sql), &query.parameters)
            .bind(page.max_results)
            .bind(page.first_result)
            .fetch_all(&mut *conn)
            .await?;

        Ok(deployments)
    }

    async fn count_by_native_query(
        &self,
        conn: &mut Connection,
        query: &NativeQuery,
    ) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM ({})", validated_native_sql(query)?);
        let (count,) = bind_native(sqlx::query_as::<_, (i64,)>(&sql), &query.parameters)
            .fetch_one(&mut *conn)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::DeploymentBuilder;
    use crate::store::sqlite::test_pool;

    #[test]
    fn test_validated_native_sql() {
        let ok = NativeQuery::new("select * from deployments where name = ?;");
        assert_eq!(
            validated_native_sql(&ok).unwrap(),
            "select * from deployments where name = ?"
        );

        let delete = NativeQuery::new("DELETE FROM deployments");
        assert!(matches!(
            validated_native_sql(&delete),
            Err(Error::InvalidRequest(_))
        ));

        let stacked = NativeQuery::new("SELECT * FROM deployments; DROP TABLE deployments");
        assert!(matches!(
            validated_native_sql(&stacked),
            Err(Error::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_insert_find_delete() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let store = SqliteDeploymentStore;

        let deployment = DeploymentBuilder::new("orders")
            .tenant_id("acme")
            .key("orders-key")
            .build()
            .deployment;
        store.insert(&mut conn, &deployment).await.unwrap();

        let found = store
            .find_by_id(&mut conn, &deployment.id)
            .await
            .unwrap()
            .expect("deployment should exist");
        assert_eq!(found.name.as_deref(), Some("orders"));
        assert_eq!(found.key.as_deref(), Some("orders-key"));
        assert_eq!(found.tenant_id, "acme");

        assert!(store.delete(&mut conn, &deployment.id).await.unwrap());
        assert!(!store.delete(&mut conn, &deployment.id).await.unwrap());
        assert!(
            store
                .find_by_id(&mut conn, &deployment.id)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_find_latest_by_name() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let store = SqliteDeploymentStore;

        assert!(
            store
                .find_latest_by_name(&mut conn, "orders")
                .await
                .unwrap()
                .is_none()
        );

        let mut first = DeploymentBuilder::new("orders").build().deployment;
        first.deploy_time -= chrono::TimeDelta::minutes(5);
        let second = DeploymentBuilder::new("orders").build().deployment;
        store.insert(&mut conn, &first).await.unwrap();
        store.insert(&mut conn, &second).await.unwrap();

        let latest = store
            .find_latest_by_name(&mut conn, "orders")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, second.id);
    }

    #[tokio::test]
    async fn test_query_criteria() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let store = SqliteDeploymentStore;

        let deployments = vec![
            DeploymentBuilder::new("alpha").id("d1").category("c1").build(),
            DeploymentBuilder::new("beta").id("d2").tenant_id("acme").build(),
            DeploymentBuilder::new("alphabet")
                .id("d3")
                .tenant_id("acme")
                .category("c2")
                .build(),
        ];
        for bundle in &deployments {
            store.insert(&mut conn, &bundle.deployment).await.unwrap();
        }

        let by_name_like = DeploymentQuery {
            name_like: Some("alpha%".to_string()),
            ..Default::default()
        };
        let found = store
            .find_by_query_criteria(&mut conn, &by_name_like, None)
            .await
            .unwrap();
        let ids: Vec<_> = found.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["d1", "d3"]);

        let without_tenant = DeploymentQuery {
            without_tenant_id: true,
            ..Default::default()
        };
        assert_eq!(
            store
                .count_by_query_criteria(&mut conn, &without_tenant)
                .await
                .unwrap(),
            1
        );

        let not_c1 = DeploymentQuery {
            category_not_equals: Some("c1".to_string()),
            ..Default::default()
        };
        assert_eq!(
            store.count_by_query_criteria(&mut conn, &not_c1).await.unwrap(),
            2
        );

        let acme_by_name_desc = DeploymentQuery {
            tenant_id: Some("acme".to_string()),
            order_by: Some((DeploymentOrderBy::Name, SortOrder::Desc)),
            ..Default::default()
        };
        let page = store
            .find_by_query_criteria(&mut conn, &acme_by_name_desc, Some(Page::new(0, 1)))
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, "d2");

        let second_page = store
            .find_by_query_criteria(&mut conn, &acme_by_name_desc, Some(Page::new(1, 1)))
            .await
            .unwrap();
        assert_eq!(second_page[0].id, "d3");
    }

    #[tokio::test]
    async fn test_native_query() {
        let pool = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let store = SqliteDeploymentStore;

        for name in ["one", "two", "three"] {
            let deployment = DeploymentBuilder::new(name).tenant_id("acme").build();
            store.insert(&mut conn, &deployment.deployment).await.unwrap();
        }

        let query = NativeQuery::new("SELECT * FROM deployments WHERE tenant_id = ? AND name <> ?")
            .parameter("acme")
            .parameter("two");

        assert_eq!(store.count_by_native_query(&mut conn, &query).await.unwrap(), 2);

        let page = store
            .find_by_native_query(&mut conn, &query, Page::new(0, 1))
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_ne!(page[0].name.as_deref(), Some("two"));
    }
}
