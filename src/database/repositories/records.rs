use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;

use crate::database::{Aggregate, DataStore, Filter, Record, ensure_id};
use crate::error::StoreError;

/// 基于 `tenant_records` JSONB 表的文档存储。
/// 过滤条件用 `data @> filter` 实现，即包含匹配。
#[derive(Clone)]
pub struct PgDataStore {
    pool: PgPool,
}

impl PgDataStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// 聚合语句。只统计 JSON 数字和数字字符串，其他值视为 NULL 跳过，
/// 与 `MemoryDataStore` 的行为一致。
fn aggregate_sql(aggregate: &Aggregate) -> String {
    let function = match aggregate {
        Aggregate::Sum(_) => "SUM",
        Aggregate::Avg(_) => "AVG",
        Aggregate::Min(_) => "MIN",
        Aggregate::Max(_) => "MAX",
    };
    format!(
        r#"
        SELECT {function}(
            CASE
                WHEN jsonb_typeof(data->$3) = 'number' THEN (data->>$3)::float8
                WHEN jsonb_typeof(data->$3) = 'string'
                    AND (data->>$3) ~ '^[-+]?([0-9]+(\.[0-9]*)?|\.[0-9]+)([eE][-+]?[0-9]+)?$'
                    THEN (data->>$3)::float8
            END
        )
        FROM tenant_records
        WHERE collection = $1 AND data @> $2
        "#
    )
}

#[async_trait]
impl DataStore for PgDataStore {
    async fn find_many(&self, collection: &str, filter: Filter) -> Result<Vec<Record>, StoreError> {
        let rows: Vec<(Json<Record>,)> = sqlx::query_as(
            r#"
            SELECT data FROM tenant_records
            WHERE collection = $1 AND data @> $2
            ORDER BY created_at
            "#,
        )
        .bind(collection)
        .bind(Json(filter))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(data,)| data.0).collect())
    }

    async fn find_first(
        &self,
        collection: &str,
        filter: Filter,
    ) -> Result<Option<Record>, StoreError> {
        let row: Option<(Json<Record>,)> = sqlx::query_as(
            r#"
            SELECT data FROM tenant_records
            WHERE collection = $1 AND data @> $2
            ORDER BY created_at
            LIMIT 1
            "#,
        )
        .bind(collection)
        .bind(Json(filter))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(data,)| data.0))
    }

    async fn count(&self, collection: &str, filter: Filter) -> Result<u64, StoreError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM tenant_records WHERE collection = $1 AND data @> $2",
        )
        .bind(collection)
        .bind(Json(filter))
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }

    async fn aggregate(
        &self,
        collection: &str,
        filter: Filter,
        aggregate: Aggregate,
    ) -> Result<Option<f64>, StoreError> {
        let sql = aggregate_sql(&aggregate);
        let (value,): (Option<f64>,) = sqlx::query_as(&sql)
            .bind(collection)
            .bind(Json(filter))
            .bind(aggregate.field())
            .fetch_one(&self.pool)
            .await?;
        Ok(value)
    }

    async fn create(&self, collection: &str, mut record: Record) -> Result<Record, StoreError> {
        ensure_id(&mut record);
        let (data,): (Json<Record>,) = sqlx::query_as(
            "INSERT INTO tenant_records (collection, data) VALUES ($1, $2) RETURNING data",
        )
        .bind(collection)
        .bind(Json(record))
        .fetch_one(&self.pool)
        .await?;
        Ok(data.0)
    }

    async fn create_many(&self, collection: &str, records: Vec<Record>) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for mut record in records {
            ensure_id(&mut record);
            inserted += sqlx::query("INSERT INTO tenant_records (collection, data) VALUES ($1, $2)")
                .bind(collection)
                .bind(Json(record))
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;
        Ok(inserted)
    }

    async fn update(
        &self,
        collection: &str,
        filter: Filter,
        patch: Record,
    ) -> Result<Option<Record>, StoreError> {
        let row: Option<(Json<Record>,)> = sqlx::query_as(
            r#"
            UPDATE tenant_records SET data = data || $3
            WHERE id = (
                SELECT id FROM tenant_records
                WHERE collection = $1 AND data @> $2
                ORDER BY created_at
                LIMIT 1
            )
            RETURNING data
            "#,
        )
        .bind(collection)
        .bind(Json(filter))
        .bind(Json(patch))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(data,)| data.0))
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Filter,
        patch: Record,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE tenant_records SET data = data || $3 WHERE collection = $1 AND data @> $2",
        )
        .bind(collection)
        .bind(Json(filter))
        .bind(Json(patch))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, collection: &str, filter: Filter) -> Result<Option<Record>, StoreError> {
        let row: Option<(Json<Record>,)> = sqlx::query_as(
            r#"
            DELETE FROM tenant_records
            WHERE id = (
                SELECT id FROM tenant_records
                WHERE collection = $1 AND data @> $2
                ORDER BY created_at
                LIMIT 1
            )
            RETURNING data
            "#,
        )
        .bind(collection)
        .bind(Json(filter))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(data,)| data.0))
    }

    async fn delete_many(&self, collection: &str, filter: Filter) -> Result<u64, StoreError> {
        let result =
            sqlx::query("DELETE FROM tenant_records WHERE collection = $1 AND data @> $2")
                .bind(collection)
                .bind(Json(filter))
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}
