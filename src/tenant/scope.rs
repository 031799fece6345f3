use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::database::{Aggregate, DataStore, Filter, Record, TENANT_FIELD};
use crate::error::AppError;
use crate::utils::with_timeout;

/// 绑定到单个租户的数据访问句柄。
///
/// 每个过滤条件都会合并 `tenantId = <当前租户>`，每条写入的记录都会被强制
/// 写入同一字段，覆盖调用方传入的值；针对其他租户数据的操作因此匹配不到任何行。
/// 句柄只由租户中间件构造，处理器拿不到原始存储。
#[derive(Clone)]
pub struct TenantScope {
    store: Arc<dyn DataStore>,
    tenant_id: String,
    timeout: Duration,
}

impl fmt::Debug for TenantScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantScope")
            .field("tenant_id", &self.tenant_id)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl TenantScope {
    pub(crate) fn new(
        store: Arc<dyn DataStore>,
        tenant_id: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            tenant_id: tenant_id.into(),
            timeout,
        }
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    fn stamp(&self, mut map: Record) -> Record {
        map.insert(TENANT_FIELD.into(), Value::String(self.tenant_id.clone()));
        map
    }

    pub async fn find_many(&self, collection: &str, filter: Filter) -> Result<Vec<Record>, AppError> {
        let query = self.store.find_many(collection, self.stamp(filter));
        Ok(with_timeout(self.timeout, query).await?)
    }

    pub async fn find_first(
        &self,
        collection: &str,
        filter: Filter,
    ) -> Result<Option<Record>, AppError> {
        let query = self.store.find_first(collection, self.stamp(filter));
        Ok(with_timeout(self.timeout, query).await?)
    }

    pub async fn count(&self, collection: &str, filter: Filter) -> Result<u64, AppError> {
        let query = self.store.count(collection, self.stamp(filter));
        Ok(with_timeout(self.timeout, query).await?)
    }

    pub async fn aggregate(
        &self,
        collection: &str,
        filter: Filter,
        aggregate: Aggregate,
    ) -> Result<Option<f64>, AppError> {
        let query = self
            .store
            .aggregate(collection, self.stamp(filter), aggregate);
        Ok(with_timeout(self.timeout, query).await?)
    }

    pub async fn create(&self, collection: &str, record: Record) -> Result<Record, AppError> {
        let query = self.store.create(collection, self.stamp(record));
        Ok(with_timeout(self.timeout, query).await?)
    }

    pub async fn create_many(&self, collection: &str, records: Vec<Record>) -> Result<u64, AppError> {
        let records = records.into_iter().map(|r| self.stamp(r)).collect();
        let query = self.store.create_many(collection, records);
        Ok(with_timeout(self.timeout, query).await?)
    }

    /// patch 同样会被写入当前租户，记录无法被改到其他租户名下
    pub async fn update(
        &self,
        collection: &str,
        filter: Filter,
        patch: Record,
    ) -> Result<Option<Record>, AppError> {
        let query = self
            .store
            .update(collection, self.stamp(filter), self.stamp(patch));
        Ok(with_timeout(self.timeout, query).await?)
    }

    pub async fn update_many(
        &self,
        collection: &str,
        filter: Filter,
        patch: Record,
    ) -> Result<u64, AppError> {
        let query = self
            .store
            .update_many(collection, self.stamp(filter), self.stamp(patch));
        Ok(with_timeout(self.timeout, query).await?)
    }

    pub async fn delete(&self, collection: &str, filter: Filter) -> Result<Option<Record>, AppError> {
        let query = self.store.delete(collection, self.stamp(filter));
        Ok(with_timeout(self.timeout, query).await?)
    }

    pub async fn delete_many(&self, collection: &str, filter: Filter) -> Result<u64, AppError> {
        let query = self.store.delete_many(collection, self.stamp(filter));
        Ok(with_timeout(self.timeout, query).await?)
    }
}
