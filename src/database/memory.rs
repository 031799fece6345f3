//! 内存实现，供测试和本地开发使用

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use super::{
    Aggregate, DataStore, Filter, Record, SubscriptionRecord, TenantDirectory, TenantRecord,
    UsageCounter, UsageCounters, UserDirectory, UserRecord, ensure_id, matches,
};
use crate::error::StoreError;

/// 用户、租户、订阅和用量计数都保存在内存 map 中。
///
/// `set_unavailable` 和 `set_latency` 用于模拟后端故障。
#[derive(Default)]
pub struct MemoryDirectory {
    users: RwLock<HashMap<String, UserRecord>>,
    tenants: RwLock<HashMap<String, TenantRecord>>,
    subscriptions: RwLock<HashMap<String, SubscriptionRecord>>,
    usage: RwLock<HashMap<(String, String), UsageCounter>>,
    unavailable: AtomicBool,
    latency: RwLock<Option<Duration>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: UserRecord) {
        self.users.write().insert(user.id.clone(), user);
    }

    pub fn insert_tenant(&self, tenant: TenantRecord) {
        self.tenants.write().insert(tenant.id.clone(), tenant);
    }

    pub fn insert_subscription(&self, subscription: SubscriptionRecord) {
        self.subscriptions
            .write()
            .insert(subscription.tenant_id.clone(), subscription);
    }

    pub fn set_usage(&self, tenant_id: &str, resource: &str, counter: UsageCounter) {
        self.usage
            .write()
            .insert((tenant_id.to_string(), resource.to_string()), counter);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write() = latency;
    }

    async fn simulate(&self) -> Result<(), StoreError> {
        let latency = *self.latency.read();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory directory offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        self.simulate().await?;
        Ok(self.users.read().get(user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        self.simulate().await?;
        Ok(self
            .users
            .read()
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }
}

#[async_trait]
impl TenantDirectory for MemoryDirectory {
    async fn find_tenant(&self, tenant_id: &str) -> Result<Option<TenantRecord>, StoreError> {
        self.simulate().await?;
        Ok(self.tenants.read().get(tenant_id).cloned())
    }

    async fn find_subscription(
        &self,
        tenant_id: &str,
    ) -> Result<Option<SubscriptionRecord>, StoreError> {
        self.simulate().await?;
        Ok(self.subscriptions.read().get(tenant_id).cloned())
    }
}

#[async_trait]
impl UsageCounters for MemoryDirectory {
    async fn usage(
        &self,
        tenant_id: &str,
        resource: &str,
    ) -> Result<Option<UsageCounter>, StoreError> {
        self.simulate().await?;
        Ok(self
            .usage
            .read()
            .get(&(tenant_id.to_string(), resource.to_string()))
            .copied())
    }
}

/// 按插入顺序保存的 JSON 文档集合，`set_latency` 用于模拟慢存储
#[derive(Default)]
pub struct MemoryDataStore {
    collections: RwLock<HashMap<String, Vec<Record>>>,
    latency: RwLock<Option<Duration>>,
}

impl MemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write() = latency;
    }

    async fn delay(&self) {
        let latency = *self.latency.read();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    /// 集合中的全部记录，不区分租户
    pub fn snapshot(&self, collection: &str) -> Vec<Record> {
        self.collections
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }
}

fn numeric(record: &Record, field: &str) -> Option<f64> {
    match record.get(field)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

fn apply_patch(record: &mut Record, patch: &Record) {
    for (field, value) in patch {
        record.insert(field.clone(), value.clone());
    }
}

#[async_trait]
impl DataStore for MemoryDataStore {
    async fn find_many(&self, collection: &str, filter: Filter) -> Result<Vec<Record>, StoreError> {
        self.delay().await;
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|rows| rows.iter().filter(|r| matches(r, &filter)).cloned().collect())
            .unwrap_or_default())
    }

    async fn find_first(
        &self,
        collection: &str,
        filter: Filter,
    ) -> Result<Option<Record>, StoreError> {
        self.delay().await;
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|rows| rows.iter().find(|r| matches(r, &filter)).cloned()))
    }

    async fn count(&self, collection: &str, filter: Filter) -> Result<u64, StoreError> {
        self.delay().await;
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|rows| rows.iter().filter(|r| matches(r, &filter)).count() as u64)
            .unwrap_or(0))
    }

    async fn aggregate(
        &self,
        collection: &str,
        filter: Filter,
        aggregate: Aggregate,
    ) -> Result<Option<f64>, StoreError> {
        self.delay().await;
        let values: Vec<f64> = self
            .find_many(collection, filter)
            .await?
            .iter()
            .filter_map(|r| numeric(r, aggregate.field()))
            .collect();
        if values.is_empty() {
            return Ok(None);
        }

        let result = match aggregate {
            Aggregate::Sum(_) => values.iter().sum(),
            Aggregate::Avg(_) => values.iter().sum::<f64>() / values.len() as f64,
            Aggregate::Min(_) => values.iter().copied().fold(f64::INFINITY, f64::min),
            Aggregate::Max(_) => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        };
        Ok(Some(result))
    }

    async fn create(&self, collection: &str, mut record: Record) -> Result<Record, StoreError> {
        self.delay().await;
        ensure_id(&mut record);
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn create_many(&self, collection: &str, records: Vec<Record>) -> Result<u64, StoreError> {
        self.delay().await;
        let mut collections = self.collections.write();
        let rows = collections.entry(collection.to_string()).or_default();
        let count = records.len() as u64;
        for mut record in records {
            ensure_id(&mut record);
            rows.push(record);
        }
        Ok(count)
    }

    async fn update(
        &self,
        collection: &str,
        filter: Filter,
        patch: Record,
    ) -> Result<Option<Record>, StoreError> {
        self.delay().await;
        let mut collections = self.collections.write();
        let Some(rows) = collections.get_mut(collection) else {
            return Ok(None);
        };
        Ok(rows.iter_mut().find(|r| matches(r, &filter)).map(|row| {
            apply_patch(row, &patch);
            row.clone()
        }))
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Filter,
        patch: Record,
    ) -> Result<u64, StoreError> {
        self.delay().await;
        let mut collections = self.collections.write();
        let Some(rows) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let mut updated = 0;
        for row in rows.iter_mut().filter(|r| matches(r, &filter)) {
            apply_patch(row, &patch);
            updated += 1;
        }
        Ok(updated)
    }

    async fn delete(&self, collection: &str, filter: Filter) -> Result<Option<Record>, StoreError> {
        self.delay().await;
        let mut collections = self.collections.write();
        let Some(rows) = collections.get_mut(collection) else {
            return Ok(None);
        };
        Ok(rows
            .iter()
            .position(|r| matches(r, &filter))
            .map(|index| rows.remove(index)))
    }

    async fn delete_many(&self, collection: &str, filter: Filter) -> Result<u64, StoreError> {
        self.delay().await;
        let mut collections = self.collections.write();
        let Some(rows) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|r| !matches(r, &filter));
        Ok((before - rows.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn aggregates_over_matching_rows() {
        let store = MemoryDataStore::new();
        store
            .create_many(
                "invoices",
                vec![
                    record(json!({ "kind": "a", "total": 10 })),
                    record(json!({ "kind": "a", "total": 30 })),
                    record(json!({ "kind": "b", "total": 100 })),
                ],
            )
            .await
            .unwrap();

        let filter = record(json!({ "kind": "a" }));
        let sum = store
            .aggregate("invoices", filter.clone(), Aggregate::Sum("total".into()))
            .await
            .unwrap();
        let max = store
            .aggregate("invoices", filter, Aggregate::Max("total".into()))
            .await
            .unwrap();
        assert_eq!(sum, Some(40.0));
        assert_eq!(max, Some(30.0));
    }

    #[tokio::test]
    async fn single_update_touches_only_first_match() {
        let store = MemoryDataStore::new();
        store.create("tasks", record(json!({ "id": "1", "done": false }))).await.unwrap();
        store.create("tasks", record(json!({ "id": "2", "done": false }))).await.unwrap();

        let updated = store
            .update("tasks", record(json!({ "done": false })), record(json!({ "done": true })))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated["id"], "1");
        assert_eq!(store.count("tasks", record(json!({ "done": false }))).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn aggregate_skips_non_numeric_values() {
        let store = MemoryDataStore::new();
        for total in [json!(10), json!("30"), json!("n/a"), json!("inf"), json!(true), json!(null)] {
            store
                .create("invoices", record(json!({ "total": total })))
                .await
                .unwrap();
        }

        let sum = store
            .aggregate("invoices", Filter::new(), Aggregate::Sum("total".into()))
            .await
            .unwrap();
        assert_eq!(sum, Some(40.0));
    }
}
