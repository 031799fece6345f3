// 认证/租户核心依赖的外部接口，以及业务模块经 `TenantScope` 使用的通用数据访问接口

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::StoreError;

pub mod memory;
pub mod models;
pub mod repositories;

pub use memory::{MemoryDataStore, MemoryDirectory};
pub use models::{SubscriptionRecord, SubscriptionStatus, TenantRecord, UsageCounter, UserRecord};
pub use repositories::{PgDataStore, PgDirectory};

/// 每条租户数据都带有的字段
pub const TENANT_FIELD: &str = "tenantId";

/// 存储的文档
pub type Record = Map<String, Value>;

/// 顶层字段的相等条件，全部满足才算匹配
pub type Filter = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aggregate {
    Sum(String),
    Avg(String),
    Min(String),
    Max(String),
}

impl Aggregate {
    pub fn field(&self) -> &str {
        match self {
            Aggregate::Sum(f) | Aggregate::Avg(f) | Aggregate::Min(f) | Aggregate::Max(f) => f,
        }
    }
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;
}

#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn find_tenant(&self, tenant_id: &str) -> Result<Option<TenantRecord>, StoreError>;

    /// 租户最近一条订阅，不论状态
    async fn find_subscription(
        &self,
        tenant_id: &str,
    ) -> Result<Option<SubscriptionRecord>, StoreError>;
}

#[async_trait]
pub trait UsageCounters: Send + Sync {
    async fn usage(
        &self,
        tenant_id: &str,
        resource: &str,
    ) -> Result<Option<UsageCounter>, StoreError>;
}

/// 未按租户隔离的文档存储，只应由 `TenantScope` 直接调用
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn find_many(&self, collection: &str, filter: Filter) -> Result<Vec<Record>, StoreError>;

    async fn find_first(
        &self,
        collection: &str,
        filter: Filter,
    ) -> Result<Option<Record>, StoreError>;

    async fn count(&self, collection: &str, filter: Filter) -> Result<u64, StoreError>;

    async fn aggregate(
        &self,
        collection: &str,
        filter: Filter,
        aggregate: Aggregate,
    ) -> Result<Option<f64>, StoreError>;

    async fn create(&self, collection: &str, record: Record) -> Result<Record, StoreError>;

    async fn create_many(&self, collection: &str, records: Vec<Record>) -> Result<u64, StoreError>;

    /// 更新第一条匹配的记录
    async fn update(
        &self,
        collection: &str,
        filter: Filter,
        patch: Record,
    ) -> Result<Option<Record>, StoreError>;

    async fn update_many(
        &self,
        collection: &str,
        filter: Filter,
        patch: Record,
    ) -> Result<u64, StoreError>;

    /// 删除第一条匹配的记录
    async fn delete(&self, collection: &str, filter: Filter) -> Result<Option<Record>, StoreError>;

    async fn delete_many(&self, collection: &str, filter: Filter) -> Result<u64, StoreError>;
}

/// 调用方未提供 `id` 时自动生成
pub(crate) fn ensure_id(record: &mut Record) {
    if !record.contains_key("id") {
        record.insert("id".into(), Value::String(uuid::Uuid::new_v4().to_string()));
    }
}

pub(crate) fn matches(record: &Record, filter: &Filter) -> bool {
    filter
        .iter()
        .all(|(field, expected)| record.get(field) == Some(expected))
}
