use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use crate::database::models::{
    SubscriptionRecord, TenantRecord, UsageCounter, UserRecord,
};
use crate::database::{TenantDirectory, UsageCounters, UserDirectory};
use crate::error::StoreError;

const USER_SELECT: &str = r#"
    SELECT u.id, u.email, u.tenant_id, u.is_active, u.password_hash,
           r.name AS role,
           COALESCE(array_agg(p.name) FILTER (WHERE p.name IS NOT NULL), '{}') AS permissions
    FROM users u
    JOIN roles r ON r.id = u.role_id
    LEFT JOIN role_permissions rp ON rp.role_id = r.id
    LEFT JOIN permissions p ON p.id = rp.permission_id
"#;

/// 基于 Postgres 的用户、租户、订阅及用量查询
#[derive(Clone)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    tenant_id: String,
    plan: String,
    status: String,
    end_date: Option<DateTime<Utc>>,
    features: Vec<String>,
    limits: Json<HashMap<String, i64>>,
}

#[async_trait]
impl UserDirectory for PgDirectory {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        let sql = format!("{USER_SELECT} WHERE u.id = $1 GROUP BY u.id, r.name");
        let user = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let sql = format!("{USER_SELECT} WHERE lower(u.email) = lower($1) GROUP BY u.id, r.name");
        let user = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}

#[async_trait]
impl TenantDirectory for PgDirectory {
    async fn find_tenant(&self, tenant_id: &str) -> Result<Option<TenantRecord>, StoreError> {
        let tenant = sqlx::query_as::<_, TenantRecord>(
            "SELECT id, name, is_active FROM tenants WHERE id = $1",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tenant)
    }

    async fn find_subscription(
        &self,
        tenant_id: &str,
    ) -> Result<Option<SubscriptionRecord>, StoreError> {
        let row = sqlx::query_as::<_, SubscriptionRow>(
            r#"
            SELECT s.tenant_id, p.name AS plan, s.status, s.end_date, p.features, p.limits
            FROM subscriptions s
            JOIN plans p ON p.id = s.plan_id
            WHERE s.tenant_id = $1
            ORDER BY s.created_at DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            let status = row.status.parse().map_err(StoreError::Corrupt)?;
            Ok(SubscriptionRecord {
                tenant_id: row.tenant_id,
                plan: row.plan,
                status,
                end_date: row.end_date,
                features: row.features,
                limits: row.limits.0,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl UsageCounters for PgDirectory {
    async fn usage(
        &self,
        tenant_id: &str,
        resource: &str,
    ) -> Result<Option<UsageCounter>, StoreError> {
        let counter = sqlx::query_as::<_, UsageCounter>(
            r#"
            SELECT current_value AS current, limit_value AS "limit"
            FROM tenant_usage
            WHERE tenant_id = $1 AND resource = $2
            "#,
        )
        .bind(tenant_id)
        .bind(resource)
        .fetch_optional(&self.pool)
        .await?;
        Ok(counter)
    }
}
